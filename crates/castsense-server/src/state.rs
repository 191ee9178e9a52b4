//! Shared application state.

use std::sync::Arc;

use castsense_core::CastSenseConfig;
use castsense_infer::SentimentScorer;
use castsense_runtime::Pipeline;
use castsense_store::SqliteStore;
use castsense_summary::LLMConfig;
use parking_lot::RwLock;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: CastSenseConfig,
    pub store: Arc<SqliteStore>,
    pub pipeline: Pipeline,
    pub llm_config: RwLock<LLMConfig>,
    /// Client for LLM provider calls.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: CastSenseConfig,
        store: Arc<SqliteStore>,
        scorer: Arc<dyn SentimentScorer>,
        llm_config: LLMConfig,
    ) -> Self {
        let pipeline = Pipeline::new(store.clone(), scorer);
        Self {
            config,
            store,
            pipeline,
            llm_config: RwLock::new(llm_config),
            http: reqwest::Client::new(),
        }
    }
}
