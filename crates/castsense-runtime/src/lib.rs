//! Pipeline orchestration: collection from the sources, incremental and
//! full attribution, aggregation and export.

pub mod pipeline;
pub mod types;

pub use pipeline::{Pipeline, SCORE_BATCH_SIZE};
pub use types::*;
