//! CastSense Infer: sentiment scoring, model management, score cache.
//!
//! Provides the `SentimentScorer` trait. When the `onnx` feature is enabled
//! and model files are present, `OnnxSentimentScorer` loads a three-class
//! RoBERTa sentiment model. Without it, `LexiconScorer` is used.

pub mod cache;
pub mod lexicon;
pub mod onnx_scorer;
pub mod scorer;

pub use cache::ScoreCache;
pub use lexicon::LexiconScorer;
pub use scorer::{SentimentDistribution, SentimentScorer};

#[cfg(feature = "onnx")]
pub use onnx_scorer::OnnxSentimentScorer;

use std::path::Path;
use std::sync::Arc;

/// Create the best available scorer for the given model directory.
///
/// Tries ONNX first (if feature enabled and model files present),
/// falls back to the lexicon scorer.
pub fn create_scorer(model_dir: &Path) -> Arc<dyn SentimentScorer> {
    #[cfg(feature = "onnx")]
    {
        match OnnxSentimentScorer::load(model_dir) {
            Ok(scorer) => {
                tracing::info!("Using ONNX sentiment scorer");
                return Arc::new(scorer);
            }
            Err(e) => {
                tracing::warn!("ONNX scorer unavailable: {}. Falling back to lexicon.", e);
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = model_dir;
        tracing::info!("ONNX feature disabled. Using lexicon sentiment scorer.");
    }

    Arc::new(LexiconScorer::new())
}
