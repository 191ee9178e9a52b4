//! Data model shared by every stage of the pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A raw discussion comment. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub upvote_score: i64,
    pub author: String,
    /// Creation time, unix seconds.
    pub timestamp: i64,
    pub episode_post_id: String,
    pub episode_title: String,
}

impl Comment {
    /// Stable identity of the comment across fetches.
    ///
    /// The upvote score is left out: it drifts between downloads of the
    /// same thread.
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.episode_post_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.author.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update([0u8]);
        hasher.update(self.text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A tracked contestant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub canonical_name: String,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            canonical_name: name.into(),
        }
    }
}

/// An episode discussion thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodePost {
    pub post_id: String,
    pub title: String,
    pub created_utc: i64,
    pub score: i64,
    pub num_comments: i64,
}

/// Episode number to air date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub episode_num: u32,
    pub airdate: NaiveDate,
}

/// One (comment, entity) attribution in its persisted, row-shaped form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionRow {
    pub comment: String,
    pub score: i64,
    pub author: String,
    pub timestamp: i64,
    pub episode_title: String,
    pub episode_num: Option<u32>,
    pub entity: String,
    pub sentiment: f64,
    pub airdate: Option<NaiveDate>,
}

/// Per-entity, per-episode summary statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub entity: String,
    pub episode_num: u32,
    pub airdate: NaiveDate,
    pub mean_sentiment: f64,
    pub comment_count: usize,
}

/// Display bucket for a mean sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentClass {
    Positive,
    Neutral,
    Negative,
}

impl std::fmt::Display for SentimentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "Positive"),
            Self::Neutral => write!(f, "Neutral"),
            Self::Negative => write!(f, "Negative"),
        }
    }
}
