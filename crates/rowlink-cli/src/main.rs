#![doc = include_str!("../README.md")]

mod app;

use anyhow::Context;
use app::cache::AppCache;
use app::config::{AppConfig, CacheBackend, CliArgs, InputSource};
use app::google::GoogleSearchClient;
use app::telemetry::init_telemetry;
use clap::Parser;
use rowlink::{LookupClient, Pipeline, PipelineSummary, RecordCodec};
use tokio::io::AsyncRead;
use tokio::signal;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    init_telemetry();

    let lookup = GoogleSearchClient::new(&config.api_key, &config.engine_id)?;

    match config.query.clone() {
        Some(query) => run_single_query(lookup, &config, &query).await,
        None => run_record_pipeline(lookup, config).await,
    }
}

/// Resolves one key outside the pipeline and prints its first link. The
/// cache is deliberately not consulted: this mode exists to probe what the
/// lookup service returns right now.
async fn run_single_query(
    lookup: GoogleSearchClient,
    config: &AppConfig,
    query: &str,
) -> anyhow::Result<()> {
    let hits = tokio::time::timeout(
        config.pipeline.task_timeout,
        lookup.search(query, &config.pipeline.search),
    )
    .await
    .with_context(|| format!("lookup for {query:?} timed out"))?
    .with_context(|| format!("lookup for {query:?} failed"))?;

    let Some(hit) = hits.first() else {
        anyhow::bail!("no results for {query:?}");
    };
    println!("{}", hit.link);
    Ok(())
}

async fn run_record_pipeline(lookup: GoogleSearchClient, config: AppConfig) -> anyhow::Result<()> {
    let cache = build_cache(&config).await?;
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let started = std::time::Instant::now();
    let summary = match &config.input {
        InputSource::Stdin => run_over(lookup, cache, &config, cancel, tokio::io::stdin()).await?,
        InputSource::File(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open input file {}", path.display()))?;
            run_over(lookup, cache, &config, cancel, file).await?
        }
    };

    tracing::info!(
        emitted = summary.emitted,
        failed = summary.failed,
        cancelled = summary.cancelled,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run complete"
    );
    Ok(())
}

async fn run_over<R>(
    lookup: GoogleSearchClient,
    cache: Option<AppCache>,
    config: &AppConfig,
    cancel: CancellationToken,
    input: R,
) -> anyhow::Result<PipelineSummary>
where
    R: AsyncRead + Unpin,
{
    let records = FramedRead::new(input, RecordCodec::new(config.pipeline.delimiter));
    let summary = Pipeline::new(lookup, cache, config.pipeline.clone(), cancel)
        .run(records, tokio::io::stdout())
        .await?;
    Ok(summary)
}

async fn build_cache(config: &AppConfig) -> anyhow::Result<Option<AppCache>> {
    let cache = match &config.cache {
        CacheBackend::Disabled => None,
        CacheBackend::Memory => Some(AppCache::memory()),
        CacheBackend::Redis { addr, db } => Some(AppCache::redis(addr, *db).await?),
    };
    Ok(cache)
}

async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, draining in-flight records...");
    cancel.cancel();
}
