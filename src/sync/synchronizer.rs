use chrono::Utc;
use futures::TryStreamExt;

use crate::db::PostStore;
use crate::error::Result;
use crate::feed::{walk_feed, FeedRenderer};

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Number of posts requested from the feed.
    pub budget: usize,
    /// Posts pulled from the feed and checked against the store.
    pub examined: usize,
    /// Ids stored during this pass, newest first.
    pub new_posts: Vec<String>,
    /// Whether an already stored post was reached. `false` means the pass
    /// ran out of budget or feed before catching up.
    pub reached_boundary: bool,
}

/// Pulls new posts from the feed into the store, stopping at the first
/// post that is already known.
pub struct Synchronizer<'a, S: PostStore + ?Sized> {
    store: &'a S,
    feed_url: &'a str,
    bootstrap_posts: usize,
    max_posts: usize,
}

impl<'a, S: PostStore + ?Sized> Synchronizer<'a, S> {
    pub fn new(store: &'a S, feed_url: &'a str, bootstrap_posts: usize, max_posts: usize) -> Self {
        Self {
            store,
            feed_url,
            bootstrap_posts,
            max_posts,
        }
    }

    /// Small on the very first pass, larger once history exists.
    pub async fn budget(&self) -> Result<usize> {
        if self.store.count().await? == 0 {
            tracing::info!(
                "This is the first update. Getting recent {} posts",
                self.bootstrap_posts
            );
            Ok(self.bootstrap_posts)
        } else {
            tracing::info!("Updating...");
            Ok(self.max_posts)
        }
    }

    /// Run one pass inside a render session. The session is closed on
    /// every exit path; a pass error takes precedence over a close error.
    pub async fn run<R: FeedRenderer + ?Sized>(&self, renderer: &mut R) -> Result<SyncReport> {
        let budget = self.budget().await?;

        let outcome = match renderer.start().await {
            Ok(()) => self.pull(renderer, budget).await,
            Err(e) => Err(e),
        };

        if let Err(e) = renderer.close().await {
            tracing::warn!("Failed to close render session: {}", e);
        }

        if let Err(e) = &outcome {
            tracing::error!("Sync pass failed: {}", e);
        }
        outcome
    }

    async fn pull<R: FeedRenderer + ?Sized>(
        &self,
        renderer: &mut R,
        budget: usize,
    ) -> Result<SyncReport> {
        let mut report = SyncReport {
            budget,
            ..SyncReport::default()
        };

        let posts = walk_feed(renderer, self.feed_url, Some(budget), Utc::now());
        futures::pin_mut!(posts);

        while let Some(post) = posts.try_next().await? {
            report.examined += 1;

            if self.store.exists(&post.id).await? {
                tracing::info!("No more new posts");
                report.reached_boundary = true;
                break;
            }

            let id = post.id.clone();
            let headline = post.headline().to_string();
            if self.store.insert(post).await? {
                tracing::info!(">> {}...", headline);
                report.new_posts.push(id);
            }
        }

        if !report.reached_boundary && report.examined == budget {
            tracing::warn!("Stopped after {} posts without reaching a known post", budget);
        }
        tracing::info!("{} new posts synced", report.new_posts.len());
        Ok(report)
    }
}
