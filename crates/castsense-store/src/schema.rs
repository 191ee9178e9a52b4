//! Database schema SQL.

/// Collected corpus: discussion threads and their comments.
pub const CORPUS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS episode_posts (
    post_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    created_utc INTEGER NOT NULL,
    score INTEGER NOT NULL DEFAULT 0,
    num_comments INTEGER NOT NULL DEFAULT 0,
    fetched_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    comment_key TEXT PRIMARY KEY,
    episode_post_id TEXT NOT NULL,
    episode_title TEXT NOT NULL,
    author TEXT NOT NULL,
    text TEXT NOT NULL,
    upvote_score INTEGER NOT NULL DEFAULT 0,
    timestamp INTEGER NOT NULL,
    fetched_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(episode_post_id);
CREATE INDEX IF NOT EXISTS idx_comments_timestamp ON comments(timestamp);
"#;

/// Season reference data: roster and episode calendar.
pub const REFERENCE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    canonical_name TEXT PRIMARY KEY COLLATE NOCASE,
    position INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS episodes (
    episode_num INTEGER PRIMARY KEY,
    airdate TEXT NOT NULL
);
"#;

/// Pipeline output and bookkeeping.
pub const ATTRIBUTION_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS attributions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    comment_key TEXT NOT NULL,
    comment TEXT NOT NULL,
    score INTEGER NOT NULL,
    author TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    episode_title TEXT NOT NULL,
    episode_num INTEGER,
    entity TEXT NOT NULL,
    sentiment REAL NOT NULL,
    airdate TEXT
);

CREATE INDEX IF NOT EXISTS idx_attributions_entity ON attributions(entity);
CREATE INDEX IF NOT EXISTS idx_attributions_episode ON attributions(episode_num);
CREATE INDEX IF NOT EXISTS idx_attributions_comment ON attributions(comment_key);

CREATE TABLE IF NOT EXISTS processed_comments (
    comment_key TEXT PRIMARY KEY,
    processed_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    finished_at INTEGER NOT NULL,
    detail_json TEXT
);
"#;
