//! On-demand narrative summaries of what commenters say about an entity.
//!
//! LLM calls go to external APIs (OpenAI, Anthropic, Groq, Gemini); no
//! local model is required. Failures never propagate: the summary text
//! carries the error message instead.

pub mod config;
pub mod providers;
pub mod summarize;
pub mod types;

pub use config::LLMConfig;
pub use summarize::{prepare_text_for_summary, summarize_comments, summary_prompt};
pub use types::*;
