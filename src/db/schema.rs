pub const SCHEMA: &str = r#"
-- posts table
CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY,
    raw_content TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    display_text TEXT NOT NULL,
    extracted_at TEXT NOT NULL,
    feed_position INTEGER NOT NULL DEFAULT 0,
    sent INTEGER NOT NULL DEFAULT 0,
    sent_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_posts_unsent ON posts(sent, extracted_at, feed_position);

-- sync_state table (key/value bookkeeping, e.g. last update time)
CREATE TABLE IF NOT EXISTS sync_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
