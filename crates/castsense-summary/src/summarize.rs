//! Narrative summary of the comments about one entity.

use reqwest::Client;
use tracing::{info, warn};

use crate::config::LLMConfig;
use crate::providers::complete;
use crate::types::ChatMessage;

/// Comments this short (after trimming) carry too little to summarise.
pub const MIN_COMMENT_CHARS: usize = 30;
pub const MAX_COMMENTS: usize = 50;
pub const MAX_PROMPT_CHARS: usize = 3000;

pub const PROMPT_PREFIX: &str = "Summarize what people are saying about this person:\n ";
pub const NO_COMMENTS: &str = "No comments available.";

const SUMMARY_MAX_TOKENS: usize = 1024;
const SUMMARY_TEMPERATURE: f64 = 0.4;

/// Clean, cap and join comment texts for the prompt.
///
/// Each comment is trimmed with newlines turned into spaces; comments of
/// `MIN_COMMENT_CHARS` characters or fewer are dropped; the first
/// `MAX_COMMENTS` survivors are joined with spaces and the result cut to
/// `MAX_PROMPT_CHARS` characters.
pub fn prepare_text_for_summary(comments: &[String]) -> String {
    let combined = comments
        .iter()
        .map(|c| c.trim())
        .filter(|c| c.chars().count() > MIN_COMMENT_CHARS)
        .take(MAX_COMMENTS)
        .map(|c| c.replace('\n', " "))
        .collect::<Vec<_>>()
        .join(" ");

    match combined.char_indices().nth(MAX_PROMPT_CHARS) {
        Some((cut, _)) => combined[..cut].to_string(),
        None => combined,
    }
}

pub fn summary_prompt(comments: &[String]) -> String {
    format!("{}{}", PROMPT_PREFIX, prepare_text_for_summary(comments))
}

/// Summarise comments with the configured provider.
///
/// Never fails: problems are reported in the returned text.
pub async fn summarize_comments(client: &Client, config: &LLMConfig, comments: &[String]) -> String {
    if comments.is_empty() {
        return NO_COMMENTS.to_string();
    }

    let Some((provider, model, api_key)) = config.resolve_provider() else {
        return "Error during summarization: no LLM provider configured".to_string();
    };

    let messages = [ChatMessage::user(summary_prompt(comments))];
    match complete(
        client,
        provider,
        &messages,
        &model,
        &api_key,
        SUMMARY_TEMPERATURE,
        SUMMARY_MAX_TOKENS,
    )
    .await
    {
        Ok(summary) => {
            info!("Summarised {} comments with {} ({})", comments.len(), provider, model);
            summary.trim().to_string()
        }
        Err(e) => {
            warn!("Summarization via {} failed: {}", provider, e);
            format!("Error during summarization: {}", e)
        }
    }
}
