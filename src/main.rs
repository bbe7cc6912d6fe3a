use anyhow::{Context, Result};
use clap::Parser;
use eventpoll::config::{Config, SourceConfig};
use eventpoll::feed::{normalize, DisplayItem, FeedPayload};
use eventpoll::fetch::{attempt_fetch, FetchOutcome, HttpTransport, Transport};
use eventpoll::scheduler::Fetcher;
use std::path::PathBuf;
use std::sync::Arc;

/// Get the config directory path (~/.config/eventpoll/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("eventpoll"))
}

#[derive(Parser, Debug)]
#[command(name = "eventpoll", about = "Poll an events feed and print its items")]
struct Args {
    /// Config file (defaults to ~/.config/eventpoll/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Poll this endpoint instead of the configured sources
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Reload interval for --url, in milliseconds
    #[arg(long, value_name = "MS", requires = "url")]
    interval_ms: Option<u64>,

    /// Fallback data file for --url, served when the endpoint refuses connections
    #[arg(long, value_name = "FILE", requires = "url")]
    fallback: Option<PathBuf>,

    /// Fetch each source once, print the items and exit
    #[arg(long)]
    once: bool,
}

fn print_items(url: &str, items: &[DisplayItem]) {
    println!("{} ({} items)", url, items.len());
    for item in items {
        if item.url().is_empty() {
            println!("  {} - {}", item.title(), item.description());
        } else {
            println!("  {} - {} [{}]", item.title(), item.description(), item.url());
        }
    }
}

/// One cycle per source without scheduling. Returns false if any source failed.
async fn run_once(
    transport: &dyn Transport,
    sources: &[(SourceConfig, Option<FeedPayload>)],
) -> bool {
    let mut all_ok = true;
    for (source, fallback) in sources {
        match attempt_fetch(transport, &source.url).await {
            FetchOutcome::Success(payload) => print_items(&source.url, &normalize(&payload)),
            FetchOutcome::ConnectionRefused(detail) => match fallback {
                Some(payload) => {
                    tracing::info!(
                        url = %source.url,
                        detail = %detail,
                        "Connection refused, serving fallback data"
                    );
                    print_items(&source.url, &normalize(payload));
                }
                None => {
                    eprintln!("{}: connection refused: {}", source.url, detail);
                    all_ok = false;
                }
            },
            FetchOutcome::OtherError(e) => {
                eprintln!("{}: {}", source.url, e);
                all_ok = false;
            }
        }
    }
    all_ok
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_config_dir()?.join("config.toml"),
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    if let Some(url) = &args.url {
        let mut source = SourceConfig::new(url.clone());
        if let Some(ms) = args.interval_ms {
            source.reload_interval_ms = ms;
        }
        source.fallback_file = args.fallback.clone();
        config.sources = vec![source];
    }

    if config.sources.is_empty() {
        eprintln!("Error: No sources configured.");
        eprintln!();
        eprintln!("Add [[sources]] entries to {}", config_path.display());
        eprintln!("or pass one with: eventpoll --url <URL>");
        std::process::exit(1);
    }
    config.validate()?;

    let mut sources = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        let fallback = source.load_fallback()?;
        sources.push((source.clone(), fallback));
    }

    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new(reqwest::Client::new()).with_timeout(config.request_timeout()),
    );

    if args.once {
        if !run_once(transport.as_ref(), &sources).await {
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut fetchers = Vec::with_capacity(sources.len());
    for (source, fallback) in sources {
        let fetcher = Fetcher::spawn(source.fetch_source(), Arc::clone(&transport), fallback);
        fetcher.on_items_received(|view| print_items(view.url(), view.items()));
        fetcher.on_fetch_failed(|view, err| eprintln!("{}: {}", view.url(), err));
        fetcher.start_fetch().await?;
        tracing::info!(
            url = %fetcher.url(),
            interval_ms = fetcher.reload_interval().as_millis() as u64,
            "Polling started"
        );
        fetchers.push(fetcher);
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");

    for fetcher in fetchers {
        fetcher.shutdown().await;
    }

    println!("Goodbye!");
    Ok(())
}
