use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{NewPost, Post};

use super::PostStore;

/// Post store that lives in process memory. Suitable for small
/// deployments that don't need history across restarts, and for tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    posts: BTreeMap<String, Post>,
    last_update_at: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn count(&self) -> Result<u64> {
        Ok(self.inner.lock().await.posts.len() as u64)
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.inner.lock().await.posts.contains_key(id))
    }

    async fn insert(&self, post: NewPost) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.posts.contains_key(&post.id) {
            return Ok(false);
        }
        inner.posts.insert(post.id.clone(), Post::from(post));
        Ok(true)
    }

    async fn find_unsent(&self) -> Result<Vec<Post>> {
        let inner = self.inner.lock().await;
        let mut unsent: Vec<Post> = inner.posts.values().filter(|p| !p.sent).cloned().collect();
        unsent.sort_by(|a, b| {
            a.extracted_at
                .cmp(&b.extracted_at)
                .then(b.feed_position.cmp(&a.feed_position))
        });
        Ok(unsent)
    }

    async fn mark_sent(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(post) = inner.posts.get_mut(id) {
            if !post.sent {
                post.sent = true;
                post.sent_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn last_update_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.inner.lock().await.last_update_at)
    }

    async fn record_update(&self, at: DateTime<Utc>) -> Result<()> {
        self.inner.lock().await.last_update_at = Some(at);
        Ok(())
    }
}
