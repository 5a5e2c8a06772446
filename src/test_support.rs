// Scripted collaborators and fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::{MemoryStore, PostStore};
use crate::delivery::DeliveryChannel;
use crate::error::{AppError, Result};
use crate::feed::FeedRenderer;
use crate::models::{NewPost, Post};

// =============================================================================
// Fixtures
// =============================================================================

pub fn new_post(id: &str, extracted_at: DateTime<Utc>, feed_position: i64) -> NewPost {
    NewPost {
        id: id.to_string(),
        raw_content: format!("<article><p>post {}</p></article>", id),
        metadata: serde_json::json!({ "top_level_post_id": id }),
        display_text: format!("post {}", id),
        extracted_at,
        feed_position,
    }
}

/// One feed article the way the mobile site renders it.
pub fn article(id: &str, text: &str) -> String {
    format!(
        r#"<article data-ft='{{"top_level_post_id":"{id}","page_id":"1"}}'><div><p>{text}</p></div><footer><a href="/like?id={id}">Like</a></footer></article>"#
    )
}

/// A feed page holding one article per id, each with text `post <id>`.
pub fn page(ids: &[&str]) -> String {
    let articles: String = ids
        .iter()
        .map(|id| article(id, &format!("post {}", id)))
        .collect();
    format!(
        r#"<html><body><div id="objects_container"><section>{}</section></div></body></html>"#,
        articles
    )
}

// =============================================================================
// Mock Renderer
// =============================================================================

/// Serves a fixed list of pages and records how it was driven.
pub struct MockRenderer {
    pages: Vec<String>,
    current: Option<usize>,
    pub started: bool,
    pub closed: bool,
    pub opened: Vec<String>,
    /// Calls to `advance_to_next_page`, successful or not.
    pub advances: usize,
    loads: usize,
    fail_start: bool,
    fail_open: bool,
    fail_advance: bool,
}

impl MockRenderer {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            current: None,
            started: false,
            closed: false,
            opened: Vec::new(),
            advances: 0,
            loads: 0,
            fail_start: false,
            fail_open: false,
            fail_advance: false,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_advance(mut self) -> Self {
        self.fail_advance = true;
        self
    }

    /// Pages actually loaded: the opened page plus every successful advance.
    pub fn pages_requested(&self) -> usize {
        self.loads
    }
}

#[async_trait]
impl FeedRenderer for MockRenderer {
    async fn start(&mut self) -> Result<()> {
        if self.fail_start {
            return Err(AppError::Renderer("login was rejected".into()));
        }
        self.started = true;
        Ok(())
    }

    async fn open(&mut self, url: &str) -> Result<()> {
        if self.fail_open {
            return Err(AppError::Renderer(format!("cannot reach {}", url)));
        }
        self.opened.push(url.to_string());
        self.current = Some(0);
        self.loads += 1;
        Ok(())
    }

    async fn current_markup(&self) -> Result<String> {
        self.current
            .and_then(|index| self.pages.get(index).cloned())
            .ok_or_else(|| AppError::Renderer("no page is open".into()))
    }

    async fn advance_to_next_page(&mut self) -> Result<bool> {
        self.advances += 1;
        if self.fail_advance {
            return Err(AppError::Renderer("connection reset".into()));
        }
        match self.current {
            Some(index) if index + 1 < self.pages.len() => {
                self.current = Some(index + 1);
                self.loads += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.current = None;
        Ok(())
    }
}

// =============================================================================
// Mock Channel
// =============================================================================

/// Records sent messages; fails on the chosen call indices (0-based).
#[derive(Default)]
pub struct MockChannel {
    sent: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
    fail_on: Vec<usize>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on.push(call);
        self
    }

    /// Successfully delivered (destination, text) pairs.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliveryChannel for MockChannel {
    async fn send(&self, destination: &str, text: &str) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.contains(&call) {
            return Err(AppError::Telegram("Too Many Requests: retry after 5".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), text.to_string()));
        Ok(())
    }
}

// =============================================================================
// Counting Store
// =============================================================================

/// In-memory store that counts existence checks.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    exists_calls: AtomicUsize,
}

impl CountingStore {
    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostStore for CountingStore {
    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(id).await
    }

    async fn insert(&self, post: NewPost) -> Result<bool> {
        self.inner.insert(post).await
    }

    async fn find_unsent(&self) -> Result<Vec<Post>> {
        self.inner.find_unsent().await
    }

    async fn mark_sent(&self, id: &str) -> Result<()> {
        self.inner.mark_sent(id).await
    }

    async fn last_update_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.inner.last_update_at().await
    }

    async fn record_update(&self, at: DateTime<Utc>) -> Result<()> {
        self.inner.record_update(at).await
    }
}
