//! LLM configuration persistence and provider selection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{LLMConfigResponse, LLMConfigUpdate, LLMProvider};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Stored LLM configuration (persisted to llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    /// Path to config file for saving.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.into()
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: "auto".into(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            gemini_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.into(),
            anthropic_model: DEFAULT_ANTHROPIC_MODEL.into(),
            groq_model: DEFAULT_GROQ_MODEL.into(),
            gemini_model: DEFAULT_GEMINI_MODEL.into(),
            config_path: PathBuf::new(),
        }
    }
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Like `load`, with an arbitrary variable lookup for the key fallback.
    pub fn load_with<F>(config_path: &Path, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: LLMConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        config.config_path = config_path.to_path_buf();

        let env_key = |name: &str| var(name).filter(|k| !k.trim().is_empty());
        if config.openai_api_key.is_none() {
            config.openai_api_key = env_key("OPENAI_API_KEY");
        }
        if config.anthropic_api_key.is_none() {
            config.anthropic_api_key = env_key("ANTHROPIC_API_KEY");
        }
        if config.groq_api_key.is_none() {
            config.groq_api_key = env_key("GROQ_API_KEY");
        }
        if config.gemini_api_key.is_none() {
            config.gemini_api_key = env_key("GEMINI_API_KEY");
        }

        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved LLM config to {}", self.config_path.display());
        Ok(())
    }

    /// Apply an update, merging with existing config. An empty key clears it.
    pub fn apply_update(&mut self, update: &LLMConfigUpdate) {
        fn key(k: &str) -> Option<String> {
            let k = k.trim();
            (!k.is_empty()).then(|| k.to_string())
        }

        if let Some(p) = &update.preferred_provider {
            self.preferred_provider = p.clone();
        }
        if let Some(k) = &update.openai_api_key {
            self.openai_api_key = key(k);
        }
        if let Some(k) = &update.anthropic_api_key {
            self.anthropic_api_key = key(k);
        }
        if let Some(k) = &update.groq_api_key {
            self.groq_api_key = key(k);
        }
        if let Some(k) = &update.gemini_api_key {
            self.gemini_api_key = key(k);
        }
        if let Some(m) = &update.openai_model {
            self.openai_model = m.clone();
        }
        if let Some(m) = &update.anthropic_model {
            self.anthropic_model = m.clone();
        }
        if let Some(m) = &update.groq_model {
            self.groq_model = m.clone();
        }
        if let Some(m) = &update.gemini_model {
            self.gemini_model = m.clone();
        }
    }

    fn provider_entry(&self, provider: LLMProvider) -> Option<(LLMProvider, String, String)> {
        let (key, model) = match provider {
            LLMProvider::OpenAI => (&self.openai_api_key, &self.openai_model),
            LLMProvider::Anthropic => (&self.anthropic_api_key, &self.anthropic_model),
            LLMProvider::Groq => (&self.groq_api_key, &self.groq_model),
            LLMProvider::Gemini => (&self.gemini_api_key, &self.gemini_model),
        };
        key.as_ref().map(|k| (provider, model.clone(), k.clone()))
    }

    /// Resolve which provider, model and API key to use.
    pub fn resolve_provider(&self) -> Option<(LLMProvider, String, String)> {
        // Explicit preference
        if self.preferred_provider != "auto" {
            let provider = match self.preferred_provider.as_str() {
                "openai" => LLMProvider::OpenAI,
                "anthropic" => LLMProvider::Anthropic,
                "groq" => LLMProvider::Groq,
                "gemini" => LLMProvider::Gemini,
                _ => return None,
            };
            return self.provider_entry(provider);
        }

        // Auto mode: Anthropic > Groq > Gemini > OpenAI
        [
            LLMProvider::Anthropic,
            LLMProvider::Groq,
            LLMProvider::Gemini,
            LLMProvider::OpenAI,
        ]
        .into_iter()
        .find_map(|p| self.provider_entry(p))
    }

    /// Build the public config response (no API keys exposed).
    pub fn to_response(&self) -> LLMConfigResponse {
        let (active_provider, active_model) = match self.resolve_provider() {
            Some((provider, model, _)) => (Some(provider.to_string()), Some(model)),
            None => (None, None),
        };
        LLMConfigResponse {
            preferred_provider: self.preferred_provider.clone(),
            openai_configured: self.openai_api_key.is_some(),
            anthropic_configured: self.anthropic_api_key.is_some(),
            groq_configured: self.groq_api_key.is_some(),
            gemini_configured: self.gemini_api_key.is_some(),
            openai_model: self.openai_model.clone(),
            anthropic_model: self.anthropic_model.clone(),
            groq_model: self.groq_model.clone(),
            gemini_model: self.gemini_model.clone(),
            active_provider,
            active_model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_with(keys: &[(&str, &str)]) -> LLMConfig {
        let dir = TempDir::new().unwrap();
        let keys: Vec<(String, String)> = keys
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LLMConfig::load_with(&dir.path().join("llm-config.json"), |name| {
            keys.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
        })
    }

    #[test]
    fn test_no_provider() {
        let config = config_with(&[]);
        assert!(config.resolve_provider().is_none());
        let response = config.to_response();
        assert_eq!(response.active_provider, None);
        assert_eq!(response.active_model, None);
    }

    #[test]
    fn test_auto_order() {
        let config = config_with(&[("OPENAI_API_KEY", "o"), ("GEMINI_API_KEY", "g")]);
        let (provider, model, key) = config.resolve_provider().unwrap();
        assert_eq!(provider, LLMProvider::Gemini);
        assert_eq!(model, DEFAULT_GEMINI_MODEL);
        assert_eq!(key, "g");

        let config = config_with(&[("GEMINI_API_KEY", "g"), ("ANTHROPIC_API_KEY", "a")]);
        assert_eq!(config.resolve_provider().unwrap().0, LLMProvider::Anthropic);
    }

    #[test]
    fn test_explicit_preference_and_blank_env() {
        let mut config = config_with(&[("ANTHROPIC_API_KEY", "a"), ("GROQ_API_KEY", "  ")]);
        assert!(config.groq_api_key.is_none());

        config.apply_update(&LLMConfigUpdate {
            preferred_provider: Some("openai".into()),
            ..Default::default()
        });
        assert!(config.resolve_provider().is_none());

        config.apply_update(&LLMConfigUpdate {
            openai_api_key: Some("sk-test".into()),
            ..Default::default()
        });
        assert_eq!(config.resolve_provider().unwrap().0, LLMProvider::OpenAI);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("llm-config.json");
        let mut config = LLMConfig::load_with(&path, |_| None);
        config.apply_update(&LLMConfigUpdate {
            gemini_api_key: Some("g-key".into()),
            gemini_model: Some("gemini-2.5-pro".into()),
            ..Default::default()
        });
        config.save().unwrap();

        let reloaded = LLMConfig::load_with(&path, |_| None);
        assert_eq!(reloaded.gemini_api_key.as_deref(), Some("g-key"));
        assert_eq!(reloaded.gemini_model, "gemini-2.5-pro");
        let response = reloaded.to_response();
        assert!(response.gemini_configured);
        assert_eq!(response.active_provider.as_deref(), Some("gemini"));
        assert_eq!(response.active_model.as_deref(), Some("gemini-2.5-pro"));
    }
}
