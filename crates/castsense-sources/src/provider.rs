//! Provider traits consumed by the pipeline.

use std::future::Future;

use castsense_core::{Comment, Entity, EpisodePost, EpisodeRecord, Result};
use serde::{Deserialize, Serialize};

/// Comments fetched in one collection pass, with the threads they came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentBatch {
    pub comments: Vec<Comment>,
    /// Threads downloaded successfully in this pass.
    pub posts: Vec<EpisodePost>,
    /// Thread IDs skipped after exhausting retries.
    pub skipped: Vec<String>,
}

pub trait RosterProvider: Send + Sync {
    fn get_entities(&self, season: u32) -> impl Future<Output = Result<Vec<Entity>>> + Send;
}

pub trait CommentProvider: Send + Sync {
    /// May be partial or incremental.
    fn get_comments(&self, season: u32) -> impl Future<Output = Result<CommentBatch>> + Send;
}

pub trait CalendarProvider: Send + Sync {
    fn get_calendar(&self, season: u32) -> impl Future<Output = Result<Vec<EpisodeRecord>>> + Send;
}
