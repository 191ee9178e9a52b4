//! CastSense Core: shared data model, configuration, error type.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CastSenseConfig, DataPaths};
pub use error::{Error, Result};
pub use types::*;
