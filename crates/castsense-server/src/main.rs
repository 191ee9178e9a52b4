//! CastSense: per-contestant sentiment from episode discussion threads.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use castsense_core::CastSenseConfig;
use castsense_runtime::Pipeline;
use castsense_sources::{FileRoster, RedditClient, RedditCorpus, WikiClient};
use castsense_store::SqliteStore;
use castsense_summary::LLMConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("CASTSENSE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_help() {
    println!("CastSense: contestant sentiment from episode discussion threads");
    println!();
    println!("Usage: castsense [command]");
    println!();
    println!("Commands:");
    println!("  (none), serve            Start the dashboard server");
    println!("  collect                  Fetch roster, calendar and new comments");
    println!("  score                    Attribute comments not yet processed");
    println!("  rescore                  Recompute every attribution");
    println!("  update                   collect, then score");
    println!("  export [path.csv]        Write the attribution table as CSV");
    println!("  help                     Show this help message");
}

fn print_report<T: serde::Serialize>(report: &T) {
    match serde_json::to_string_pretty(report) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to render report: {}", e),
    }
}

/// Fetch roster, calendar and new comments for the configured season.
async fn collect(config: &CastSenseConfig, pipeline: &Pipeline) -> anyhow::Result<()> {
    let (Some(client_id), Some(client_secret)) = (
        config.reddit_client_id.as_deref(),
        config.reddit_client_secret.as_deref(),
    ) else {
        anyhow::bail!("REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET must be set to collect comments");
    };

    let reddit = RedditClient::new(client_id, client_secret, &config.user_agent)?;
    let corpus = RedditCorpus::new(reddit, config.subreddit.clone())
        .with_known_posts(pipeline.store().known_post_ids()?);
    let wiki = WikiClient::new(config.wiki_url_template.clone(), &config.user_agent)?;
    let roster_file = FileRoster::new(config.data_paths.roster_file.clone());

    let report = if roster_file.exists() {
        info!("Using roster file {}", roster_file.path().display());
        pipeline
            .collect(config.season, &roster_file, &corpus, &wiki)
            .await?
    } else {
        pipeline.collect(config.season, &wiki, &corpus, &wiki).await?
    };
    print_report(&report);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("serve");

    if matches!(command, "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }
    if !matches!(
        command,
        "serve" | "collect" | "score" | "rescore" | "update" | "export"
    ) {
        eprintln!("Unknown command: {}. Use 'castsense help' for usage.", command);
        std::process::exit(1);
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = CastSenseConfig::from_env(&data_dir)
        .with_context(|| format!("Failed to prepare data directory {}", data_dir.display()))?;
    let store = SqliteStore::open(&config.data_paths.db, &config.db_file_name())
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;
    let store = Arc::new(store);
    let scorer = castsense_infer::create_scorer(&config.data_paths.sentiment_model);
    info!("Season {} (r/{}), scorer: {}", config.season, config.subreddit, scorer.name());

    let pipeline = Pipeline::new(store.clone(), scorer.clone());

    match command {
        "collect" => collect(&config, &pipeline).await,
        "score" => {
            print_report(&pipeline.score_pending()?);
            Ok(())
        }
        "rescore" => {
            print_report(&pipeline.rescore_all()?);
            Ok(())
        }
        "update" => {
            collect(&config, &pipeline).await?;
            print_report(&pipeline.score_pending()?);
            Ok(())
        }
        "export" => {
            let path = args.get(2).map(PathBuf::from).unwrap_or_else(|| {
                config
                    .data_paths
                    .exports
                    .join(format!("attributions-s{}.csv", config.season))
            });
            let rows = pipeline.export_csv(&path)?;
            println!("Wrote {} rows to {}", rows, path.display());
            Ok(())
        }
        _ => serve(config, store, scorer).await,
    }
}

async fn serve(
    config: CastSenseConfig,
    store: Arc<SqliteStore>,
    scorer: Arc<dyn castsense_infer::SentimentScorer>,
) -> anyhow::Result<()> {
    let port = config.port;
    let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);
    let state = Arc::new(AppState::new(config, store, scorer, llm_config));

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("CastSense dashboard listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
