//! Pipeline run reports.

use serde::Serialize;

/// Which pipeline step ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    /// Roster, calendar and new comments fetched from the sources.
    Collect,
    /// Attribution of comments not yet processed.
    Score,
    /// Attributions cleared and recomputed.
    Rescore,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Collect => "collect",
            RunKind::Score => "score",
            RunKind::Rescore => "rescore",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoreReport {
    /// Comments that received a processed marker in this run.
    #[serde(rename = "commentsProcessed")]
    pub comments_processed: usize,
    /// Comments that mentioned at least one entity.
    #[serde(rename = "commentsAttributed")]
    pub comments_attributed: usize,
    #[serde(rename = "rowsWritten")]
    pub rows_written: usize,
    #[serde(rename = "rosterSize")]
    pub roster_size: usize,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectReport {
    /// Entities stored, or `None` if the roster source failed.
    pub roster: Option<usize>,
    /// Episodes stored, or `None` if the calendar was unavailable or invalid.
    pub episodes: Option<usize>,
    #[serde(rename = "threadsDownloaded")]
    pub threads_downloaded: usize,
    #[serde(rename = "threadsSkipped")]
    pub threads_skipped: Vec<String>,
    #[serde(rename = "commentsFetched")]
    pub comments_fetched: usize,
    #[serde(rename = "commentsStored")]
    pub comments_stored: usize,
}
