//! Sentiment scorer trait and the three-class distribution it produces.
//!
//! The `SentimentScorer` trait abstracts over the underlying model.
//! Implementations:
//! - `OnnxSentimentScorer`: ONNX Runtime with a three-class RoBERTa sentiment head
//! - `LexiconScorer`: word-list fallback when no model is available

use castsense_core::{Error, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Probabilities over {negative, neutral, positive}. Sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub negative: f32,
    pub neutral: f32,
    pub positive: f32,
}

impl SentimentDistribution {
    /// Build a distribution from raw class logits in model label order
    /// (negative, neutral, positive) using a numerically stable softmax.
    pub fn from_logits(logits: &[f32]) -> Result<Self> {
        if logits.len() != 3 {
            return Err(Error::Inference(format!(
                "expected 3 logits, got {}",
                logits.len()
            )));
        }
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(Error::Inference("non-finite logits".into()));
        }
        let logits = Array1::from_vec(logits.to_vec());
        let max = logits.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let exp = logits.mapv(|v| (v - max).exp());
        let probs = &exp / exp.sum();
        Ok(Self {
            negative: probs[0],
            neutral: probs[1],
            positive: probs[2],
        })
    }

    /// Even three-way split.
    #[cfg(test)]
    pub fn uniform() -> Self {
        Self {
            negative: 1.0 / 3.0,
            neutral: 1.0 / 3.0,
            positive: 1.0 / 3.0,
        }
    }

    /// Compound polarity: P(positive) − P(negative), in [-1, 1].
    pub fn compound(&self) -> f64 {
        (self.positive as f64 - self.negative as f64).clamp(-1.0, 1.0)
    }
}

/// Trait for sentiment backends. Loaded once and shared read-only.
pub trait SentimentScorer: Send + Sync {
    /// Class distribution for a non-empty text span.
    fn distribution(&self, text: &str) -> Result<SentimentDistribution>;

    /// Compound polarity for a text span.
    fn score(&self, text: &str) -> Result<f64> {
        Ok(self.distribution(text)?.compound())
    }

    /// Short backend name for logs and stats.
    fn name(&self) -> &str;
}
