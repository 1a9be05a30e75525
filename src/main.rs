//! codebrief - incremental source tree summarizer
//!
//! Entry point for the codebrief CLI.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Confirm};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use codebrief::config::DEFAULT_TOKEN_CEILING;
use codebrief::logging::init_tracing;
use codebrief::storage::RecordStore;
use codebrief::summary::{CostEstimator, OpenAiConfig, OpenAiSummarizer, PricingTable};
use codebrief::watcher::{
    FileFilter, FileWatcher, PipelineConfig, SummaryPipeline, TreeScanner, WatchLoop,
    WatcherConfig,
};
use codebrief::{Config, Error, Result};

/// codebrief - keep a natural-language summary beside every source file
#[derive(Parser, Debug)]
#[command(name = "codebrief")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root directory to summarize and watch
    #[arg(short, long, env = "CODE_DIR", default_value = ".")]
    dir: PathBuf,

    /// Directory names to skip
    #[arg(
        long,
        env = "IGNORE_LIST",
        value_delimiter = ',',
        default_value = "node_modules,.git,target"
    )]
    ignore: Vec<String>,

    /// File extensions to summarize
    #[arg(
        long,
        env = "FILE_EXTENSIONS_TO_PROCESS",
        value_delimiter = ',',
        default_value = ".js"
    )]
    extensions: Vec<String>,

    /// Model used for summaries
    #[arg(short, long, env = "SUMMARY_MODEL", default_value = "gpt-3.5-turbo")]
    model: String,

    /// Summarize every new or changed file before watching
    #[arg(long)]
    all: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Files estimated above this many tokens are not summarized
    #[arg(long, env = "CODEBRIEF_TOKEN_CEILING", default_value_t = DEFAULT_TOKEN_CEILING)]
    token_ceiling: f64,

    /// Retries after a failed summarization request
    #[arg(long, env = "CODEBRIEF_MAX_RETRIES", default_value = "0")]
    max_retries: u32,

    /// Summarization requests allowed in flight
    #[arg(long, env = "CODEBRIEF_MAX_CONCURRENT_REQUESTS", default_value = "1")]
    max_concurrent_requests: usize,

    /// Path substrings ignored by the watcher
    #[arg(
        long,
        env = "CODEBRIEF_WATCH_EXCLUDE",
        value_delimiter = ',',
        default_value = "node_modules,helpers"
    )]
    watch_exclude: Vec<String>,

    /// Also skip paths matched by the root's .gitignore
    #[arg(long, env = "CODEBRIEF_RESPECT_GITIGNORE")]
    respect_gitignore: bool,

    /// Exit after the full pass instead of watching
    #[arg(long)]
    no_watch: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CODEBRIEF_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "CODEBRIEF_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let root_dir = self.dir.canonicalize().map_err(|e| {
            Error::config(format!(
                "cannot resolve directory '{}': {e}",
                self.dir.display()
            ))
        })?;

        Ok(Config {
            root_dir,
            ignore_dirs: self.ignore,
            extensions: self.extensions,
            respect_gitignore: self.respect_gitignore,
            watch_exclude: self.watch_exclude,
            model: self.model,
            token_ceiling: self.token_ceiling,
            max_concurrent_requests: self.max_concurrent_requests,
            max_retries: self.max_retries,
            log_level: self.log_level,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json)?;

    tracing::info!("codebrief v{} starting...", env!("CARGO_PKG_VERSION"));

    let full_pass = cli.all;
    let skip_prompt = cli.yes;
    let watch = !cli.no_watch;

    let config = cli.into_config()?;
    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    let filter = FileFilter::from_config(&config);
    let scanner = TreeScanner::new(filter.clone());

    if !preflight(&scanner, &config.model, skip_prompt).await? {
        println!("Aborted summarizing the project.");
        return Ok(());
    }

    let store = RecordStore::initialize(config.database_path())?;
    let summarizer = OpenAiSummarizer::new(OpenAiConfig::from_env()?)?;
    let pipeline = Arc::new(SummaryPipeline::new(
        store,
        Arc::new(summarizer),
        PipelineConfig::from_config(&config),
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let mut store_failures = false;
    if full_pass {
        let report = pipeline.run_full_pass(&scanner, &shutdown).await?;
        println!(
            "Summarized {} of {} files ({} unchanged, {} too large, {} removed, {} failed)",
            report.summarized,
            report.scanned,
            report.unchanged,
            report.skipped_oversized,
            report.deleted,
            report.failed
        );
        store_failures = report.has_store_failures();
    }

    if watch && !shutdown.is_cancelled() {
        let watcher = FileWatcher::new(&WatcherConfig::new(
            &config.root_dir,
            config.watch_ignored_dirs(),
            config.watch_exclusions(),
        ))?;
        println!("Watching for file changes...");
        let watch_loop = WatchLoop::new(Arc::clone(&pipeline), filter);
        watch_loop.run(watcher, shutdown.clone()).await;
        store_failures |= watch_loop.stats().snapshot().has_store_failures();
    }

    if store_failures {
        return Err(Error::internal(
            "one or more summaries could not be saved to the record store",
        ));
    }

    tracing::info!("codebrief shut down");
    Ok(())
}

/// Print the project-size estimate and ask whether to continue.
async fn preflight(scanner: &TreeScanner, model: &str, skip_prompt: bool) -> Result<bool> {
    let walker = scanner.clone();
    let estimate = tokio::task::spawn_blocking(move || walker.estimate_project_tokens())
        .await
        .map_err(|e| Error::internal(format!("estimate task failed: {e}")))?;
    let cost = PricingTable.estimate(model, 0.0, 0.0, estimate.tokens);

    println!(
        "Project size: ~{:.0} tokens in {} files, estimated cost: ${cost:.4}",
        estimate.tokens, estimate.files
    );

    if skip_prompt {
        return Ok(true);
    }

    tokio::task::spawn_blocking(|| {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Proceed with summarizing the project?")
            .default(false)
            .interact()
    })
    .await
    .map_err(|e| Error::internal(format!("prompt task failed: {e}")))?
    .map_err(|e| Error::internal(format!("confirmation prompt failed: {e}")))
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
