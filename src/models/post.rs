use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post as extracted from a feed page, before it reaches the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    /// Identifier taken from the post's own metadata; the dedup key.
    pub id: String,
    /// Post markup with its footer removed.
    pub raw_content: String,
    /// The post's metadata blob, kept verbatim.
    pub metadata: serde_json::Value,
    pub display_text: String,
    /// Shared by every post of one sync pass.
    pub extracted_at: DateTime<Utc>,
    /// Index within the pass, 0 being the newest post.
    pub feed_position: i64,
}

impl NewPost {
    pub fn headline(&self) -> &str {
        headline(&self.display_text)
    }
}

/// A stored post. Content never changes after insertion; only the
/// delivery flag moves, and only from unsent to sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub raw_content: String,
    pub metadata: serde_json::Value,
    pub display_text: String,
    pub extracted_at: DateTime<Utc>,
    pub feed_position: i64,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn headline(&self) -> &str {
        headline(&self.display_text)
    }
}

impl From<NewPost> for Post {
    fn from(post: NewPost) -> Self {
        Self {
            id: post.id,
            raw_content: post.raw_content,
            metadata: post.metadata,
            display_text: post.display_text,
            extracted_at: post.extracted_at,
            feed_position: post.feed_position,
            sent: false,
            sent_at: None,
        }
    }
}

fn headline(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
