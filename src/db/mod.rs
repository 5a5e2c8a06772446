mod memory;
mod repository;
mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{NewPost, Post};

pub use memory::MemoryStore;
pub use repository::Repository;

/// Persistence capabilities the sync and delivery passes rely on.
///
/// Every mutation is a single-record commit, so an interrupted pass leaves
/// the store consistent.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Number of stored posts, sent or not.
    async fn count(&self) -> Result<u64>;

    async fn exists(&self, id: &str) -> Result<bool>;

    /// Stores a post as unsent. Returns `false`, leaving the stored record
    /// untouched, when the id is already present.
    async fn insert(&self, post: NewPost) -> Result<bool>;

    /// Unsent posts, oldest first: earlier passes before later ones, and
    /// within a pass the reverse of feed order.
    async fn find_unsent(&self) -> Result<Vec<Post>>;

    /// Flags a post as delivered. Already-sent posts are left as they are.
    async fn mark_sent(&self, id: &str) -> Result<()>;

    async fn last_update_at(&self) -> Result<Option<DateTime<Utc>>>;

    async fn record_update(&self, at: DateTime<Utc>) -> Result<()>;
}
