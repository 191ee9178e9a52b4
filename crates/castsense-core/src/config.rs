//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default wiki page for the tracked show. `{season}` is substituted.
pub const DEFAULT_WIKI_URL: &str =
    "https://en.wikipedia.org/wiki/Love_Island_(American_TV_series)_season_{season}";

/// Paths to all CastSense data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite databases (`data/db/`).
    pub db: PathBuf,
    /// Sentiment model files (`data/models/sentiment/`).
    pub sentiment_model: PathBuf,
    /// CSV exports (`data/exports/`).
    pub exports: PathBuf,
    /// Optional hand-maintained roster (`data/roster.json`).
    pub roster_file: PathBuf,
    /// LLM configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db: root.join("db"),
            sentiment_model: root.join("models").join("sentiment"),
            exports: root.join("exports"),
            roster_file: root.join("roster.json"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.db)?;
        std::fs::create_dir_all(&self.exports)?;
        Ok(())
    }
}

/// Top-level CastSense configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastSenseConfig {
    /// HTTP server port.
    pub port: u16,
    /// Season being tracked.
    pub season: u32,
    /// Subreddit hosting the episode discussion threads.
    pub subreddit: String,
    /// Wiki page URL template; `{season}` is replaced by the season number.
    pub wiki_url_template: String,
    /// User agent sent to Reddit and the wiki.
    pub user_agent: String,
    #[serde(skip_serializing)]
    pub reddit_client_id: Option<String>,
    #[serde(skip_serializing)]
    pub reddit_client_secret: Option<String>,
    /// Data directory paths.
    pub data_paths: DataPaths,
}

impl CastSenseConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        Self::from_vars(data_dir, |key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(data_dir: impl AsRef<Path>, var: F) -> std::io::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = var("PORT").and_then(|p| p.parse().ok()).unwrap_or(8080);
        let season = var("CASTSENSE_SEASON")
            .and_then(|s| s.parse().ok())
            .unwrap_or(7);
        let subreddit = var("CASTSENSE_SUBREDDIT").unwrap_or_else(|| "LoveIslandUSA".into());
        let wiki_url_template =
            var("CASTSENSE_WIKI_URL").unwrap_or_else(|| DEFAULT_WIKI_URL.into());
        let user_agent = var("CASTSENSE_USER_AGENT").unwrap_or_else(|| "castsense/0.1".into());

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            season,
            subreddit,
            wiki_url_template,
            user_agent,
            reddit_client_id: var("REDDIT_CLIENT_ID").filter(|s| !s.is_empty()),
            reddit_client_secret: var("REDDIT_CLIENT_SECRET").filter(|s| !s.is_empty()),
            data_paths,
        })
    }

    /// Wiki page for the configured season.
    pub fn wiki_url(&self) -> String {
        self.wiki_url_template
            .replace("{season}", &self.season.to_string())
    }

    /// Database file for the configured season.
    pub fn db_file_name(&self) -> String {
        format!("castsense-s{}.db", self.season)
    }

    /// Reddit search query locating the season's episode threads.
    pub fn search_query(&self) -> String {
        format!("Season {} Episode", self.season)
    }
}
