//! Row types returned by the store.

use castsense_core::Comment;
use serde::{Deserialize, Serialize};

/// A stored comment together with its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredComment {
    pub key: String,
    pub comment: Comment,
}

/// One pipeline run (collect, score, rescore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub kind: String,
    /// Unix millis.
    pub started_at: i64,
    /// Unix millis.
    pub finished_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub episode_posts: i64,
    pub comments: i64,
    pub processed_comments: i64,
    pub attributions: i64,
    pub entities: i64,
    pub episodes: i64,
    pub db_path: String,
    pub db_size_mb: f64,
}
