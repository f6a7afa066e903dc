use anyhow::Result;
use clap::Parser;
use pagechat_core::CacheStore;
use pagechat_local::cache::{FsCache, MemoryCache, ScrapeCache};
use pagechat_local::completion::OpenAiCompatClient;
use pagechat_local::scrape::Scraper;
use pagechat_local::LocalFetcher;
use pagechat_server::{app, AppState};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pagechat")]
#[command(about = "Chat API that answers questions about a linked web page", long_about = None)]
struct Cli {
    /// Address to bind the HTTP server on.
    #[arg(long, default_value = "127.0.0.1:3000", env = "PAGECHAT_BIND")]
    bind: String,
    /// Directory for the scrape cache. Unset means an in-memory cache that
    /// dies with the process.
    #[arg(long, env = "PAGECHAT_CACHE_DIR")]
    cache_dir: Option<std::path::PathBuf>,
    /// Completion model override.
    #[arg(long, env = "PAGECHAT_LLM_MODEL")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let store: Arc<dyn CacheStore> = match &cli.cache_dir {
        Some(dir) => Arc::new(FsCache::new(dir.clone())),
        None => Arc::new(MemoryCache::new()),
    };
    let scraper = Scraper::new(Arc::new(LocalFetcher::new()?), ScrapeCache::new(store));
    let completion = Arc::new(OpenAiCompatClient::from_env(
        reqwest::Client::new(),
        cli.model,
    )?);

    let state = Arc::new(AppState {
        scraper,
        completion,
    });

    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    tracing::info!(bind = %cli.bind, "pagechat listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
