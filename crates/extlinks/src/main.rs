//! extlinks: index the web and file links across a directory of notes.

mod fs_store;
mod report;
mod watcher;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use extlinks_core::{IndexConfig, LinkIndex};
use fs_store::FsDocumentStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "extlinks",
    about = "Live index of external links across a directory of notes"
)]
#[command(version, propagate_version = true)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "EXTLINKS_CONFIG")]
    config: Option<PathBuf>,

    /// Document extension to index (repeatable); overrides the configuration
    #[arg(long = "ext", global = true)]
    extensions: Vec<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a directory once and print the result
    Scan {
        /// Root directory of the document corpus
        root: PathBuf,

        /// Only show the links stored for this document (root-relative path)
        #[arg(short, long)]
        document: Option<String>,
    },

    /// Index a directory, then keep the index current as files change
    Watch {
        /// Root directory of the document corpus
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries reports; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = IndexConfig::load_or_default(cli.config.as_deref())
        .with_context(|| format!("loading configuration from {:?}", cli.config))?;
    if !cli.extensions.is_empty() {
        config.extensions = cli
            .extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .collect();
    }

    match cli.command {
        Commands::Scan { root, document } => {
            cmd_scan(&root, config, document.as_deref(), cli.json).await
        }
        Commands::Watch { root } => cmd_watch(&root, config, cli.json).await,
    }
}

fn open_store(root: &Path, config: IndexConfig) -> anyhow::Result<Arc<FsDocumentStore>> {
    let root = root
        .canonicalize()
        .with_context(|| format!("resolving root directory {}", root.display()))?;
    Ok(Arc::new(FsDocumentStore::new(root, config)))
}

async fn cmd_scan(
    root: &Path,
    config: IndexConfig,
    document: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(root, config.clone())?;
    let index = LinkIndex::new(store, config);
    index
        .trigger_full_scan()
        .await
        .with_context(|| format!("scanning {}", root.display()))?;

    let snapshot = index.snapshot();
    let output = match (document, json) {
        (Some(path), false) => report::render_document(&snapshot, path),
        (Some(path), true) => serde_json::to_string_pretty(snapshot.links_for(path))?,
        (None, false) => report::render_text(&snapshot),
        (None, true) => report::render_json(&snapshot)?,
    };
    println!("{}", output.trim_end());
    Ok(())
}

async fn cmd_watch(root: &Path, config: IndexConfig, json: bool) -> anyhow::Result<()> {
    let store = open_store(root, config.clone())?;
    let index = Arc::new(LinkIndex::new(store.clone(), config));

    // Start watching before the full scan so no change slips between the two.
    let (tx, rx) = index.event_channel();
    let fs_watcher = watcher::watch(Arc::clone(&store), tx)?;

    index
        .trigger_full_scan()
        .await
        .with_context(|| format!("scanning {}", root.display()))?;
    let initial = index.snapshot();
    if json {
        println!("{}", report::render_json(&initial)?);
    } else {
        print!("{}", report::render_text(&initial));
    }

    index.subscribe(move |snapshot| {
        if json {
            match serde_json::to_string(snapshot) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::error!("Failed to serialize snapshot: {}", e),
            }
        } else {
            println!("{} {}", "updated".green().bold(), report::summary(snapshot));
        }
    });

    let worker = tokio::spawn(Arc::clone(&index).run_worker(rx));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("Shutting down");
    // Dropping the watcher closes the event channel, which stops the worker.
    drop(fs_watcher);
    worker.await.context("index worker panicked")?;
    Ok(())
}
