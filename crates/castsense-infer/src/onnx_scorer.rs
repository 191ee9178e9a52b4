//! ONNX-based sentiment scorer.
//!
//! Loads a three-class (negative, neutral, positive) sequence classification
//! model such as cardiffnlp/twitter-roberta-base-sentiment exported to ONNX,
//! together with its HuggingFace tokenizer. Requires the `onnx` feature.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::Path;

    use castsense_core::{Error, Result};
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;
    use tracing::{debug, info};

    use crate::cache::ScoreCache;
    use crate::scorer::{SentimentDistribution, SentimentScorer};

    /// Maximum sequence length for the model; longer spans lose their tail.
    const MAX_SEQ_LEN: usize = 512;

    pub struct OnnxSentimentScorer {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        cache: ScoreCache,
    }

    impl OnnxSentimentScorer {
        /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
        pub fn load(model_dir: &Path) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(Error::Inference(format!(
                    "Model not found: {}",
                    model_path.display()
                )));
            }
            if !tokenizer_path.exists() {
                return Err(Error::Inference(format!(
                    "Tokenizer not found: {}",
                    tokenizer_path.display()
                )));
            }

            // With load-dynamic, ORT_DYLIB_PATH must point to libonnxruntime.
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| Error::Inference(format!("Failed to create session builder: {}", e)))?
                .with_intra_threads(2)
                .map_err(|e| Error::Inference(format!("Failed to set threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| Error::Inference(format!("Failed to load ONNX model: {}", e)))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::Inference(format!("Failed to load tokenizer: {}", e)))?;

            info!("ONNX sentiment scorer loaded: model={}", model_path.display());

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                cache: ScoreCache::default_cache(),
            })
        }

        fn infer(&self, text: &str) -> Result<SentimentDistribution> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| Error::Inference(format!("Tokenization failed: {}", e)))?;

            let seq_len = encoding.get_ids().len().min(MAX_SEQ_LEN);
            if seq_len == 0 {
                return Err(Error::Inference("span produced no tokens".into()));
            }

            let ids: Vec<i64> = encoding.get_ids()[..seq_len]
                .iter()
                .map(|&id| id as i64)
                .collect();
            let mask: Vec<i64> = encoding.get_attention_mask()[..seq_len]
                .iter()
                .map(|&m| m as i64)
                .collect();

            let ids_tensor = Tensor::from_array(([1usize, seq_len], ids))
                .map_err(|e| Error::Inference(format!("ids tensor: {}", e)))?;
            let mask_tensor = Tensor::from_array(([1usize, seq_len], mask))
                .map_err(|e| Error::Inference(format!("mask tensor: {}", e)))?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor])
                .map_err(|e| Error::Inference(format!("ONNX inference failed: {}", e)))?;

            // Logits, shape [1, 3].
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::Inference(format!("output tensor: {}", e)))?;
            let classes = shape.last().copied().unwrap_or(0) as usize;
            if classes != 3 || data.len() < 3 {
                return Err(Error::Inference(format!(
                    "unexpected output shape: {:?}",
                    shape.iter().collect::<Vec<_>>()
                )));
            }

            SentimentDistribution::from_logits(&data[..3])
        }
    }

    impl SentimentScorer for OnnxSentimentScorer {
        fn distribution(&self, text: &str) -> Result<SentimentDistribution> {
            if text.trim().is_empty() {
                return Err(Error::Inference("empty span".into()));
            }
            if let Some(cached) = self.cache.get(text) {
                return Ok(cached);
            }

            let distribution = self.infer(text)?;
            debug!(
                "scored span ({} chars): compound={:.3}",
                text.len(),
                distribution.compound()
            );
            self.cache.put(text.to_string(), distribution);
            Ok(distribution)
        }

        fn name(&self) -> &str {
            "onnx"
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxSentimentScorer;
