use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{NewPost, Post};

use super::schema::SCHEMA;
use super::PostStore;

const LAST_UPDATE_KEY: &str = "last_update_at";

/// SQLite-backed post store.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::with_connection(conn).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl PostStore for Repository {
    async fn count(&self) -> Result<u64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let found = conn
                    .query_row("SELECT 1 FROM posts WHERE id = ?1", params![id], |_| Ok(()))
                    .optional()?;
                Ok(found.is_some())
            })
            .await?;
        Ok(exists)
    }

    async fn insert(&self, post: NewPost) -> Result<bool> {
        let metadata = serde_json::to_string(&post.metadata)?;
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO posts (id, raw_content, metadata, display_text, extracted_at, feed_position)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(id) DO NOTHING"#,
                    params![
                        post.id,
                        post.raw_content,
                        metadata,
                        post.display_text,
                        format_datetime(&post.extracted_at),
                        post.feed_position,
                    ],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(inserted)
    }

    async fn find_unsent(&self) -> Result<Vec<Post>> {
        let posts = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, raw_content, metadata, display_text, extracted_at, feed_position, sent, sent_at
                       FROM posts
                       WHERE sent = 0
                       ORDER BY extracted_at ASC, feed_position DESC"#,
                )?;
                let posts = stmt
                    .query_map([], post_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(posts)
            })
            .await?;
        Ok(posts)
    }

    async fn mark_sent(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        let sent_at = format_datetime(&Utc::now());
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE posts SET sent = 1, sent_at = ?2 WHERE id = ?1 AND sent = 0",
                    params![id, sent_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn last_update_at(&self) -> Result<Option<DateTime<Utc>>> {
        let value = self
            .conn
            .call(|conn| {
                let value: Option<String> = conn
                    .query_row(
                        "SELECT value FROM sync_state WHERE key = ?1",
                        params![LAST_UPDATE_KEY],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await?;
        Ok(value.and_then(|s| parse_datetime(&s)))
    }

    async fn record_update(&self, at: DateTime<Utc>) -> Result<()> {
        let value = format_datetime(&at);
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO sync_state (key, value) VALUES (?1, ?2)
                       ON CONFLICT(key) DO UPDATE SET value = excluded.value"#,
                    params![LAST_UPDATE_KEY, value],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn datetime_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unparseable timestamp {raw:?}").into(),
        )
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    let metadata: String = row.get(2)?;
    let metadata = serde_json::from_str(&metadata)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Post {
        id: row.get(0)?,
        raw_content: row.get(1)?,
        metadata,
        display_text: row.get(3)?,
        extracted_at: datetime_column(row, 4)?,
        feed_position: row.get(5)?,
        sent: row.get::<_, i64>(6)? != 0,
        sent_at: row
            .get::<_, Option<String>>(7)?
            .and_then(|s| parse_datetime(&s)),
    })
}
