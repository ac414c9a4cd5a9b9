use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;

use linemate_core::config::LinemateConfig;
use linemate_graph::adjacency::TeammateIndex;
use linemate_ingest::pipeline::IngestPipeline;
use linemate_ingest::source::NhlApiSource;
use linemate_store::snapshot::SnapshotEngine;
use linemate_store::store::GraphStore;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "linemate-cli", about = "Ingest NHL games into the linemate graph store")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<String>,

    /// Season start years to ingest, e.g. `2023` or `2021..2024`
    #[arg(short, long)]
    seasons: Option<String>,

    /// Discard existing snapshots and rebuild the store from scratch
    #[arg(long)]
    clear: bool,
}

// ---------------------------------------------------------------------------
// Season selection
// ---------------------------------------------------------------------------

/// Parse a season selection: a single start year (`2023`) or an inclusive
/// range of start years (`2021..2024`).
fn parse_seasons(input: &str) -> Result<Vec<u32>, String> {
    let input = input.trim();
    if let Some((start, end)) = input.split_once("..") {
        let start: u32 = start
            .trim()
            .parse()
            .map_err(|_| format!("invalid start year '{}'", start.trim()))?;
        let end: u32 = end
            .trim()
            .parse()
            .map_err(|_| format!("invalid end year '{}'", end.trim()))?;
        if start > end {
            return Err(format!("season range {start}..{end} runs backwards"));
        }
        Ok((start..=end).collect())
    } else {
        let year: u32 = input
            .parse()
            .map_err(|_| format!("invalid season year '{input}'"))?;
        Ok(vec![year])
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut config = match LinemateConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(ref spec) = cli.seasons {
        match parse_seasons(spec) {
            Ok(seasons) => config.ingest.seasons = seasons,
            Err(e) => {
                tracing::error!("invalid --seasons value: {}", e);
                std::process::exit(1);
            }
        }
    }

    let store = Arc::new(GraphStore::new(&config.store));
    let snapshots = SnapshotEngine::new(config.store.data_dir.clone());

    if cli.clear {
        match snapshots.cleanup_old_snapshots(0) {
            Ok(removed) if removed > 0 => tracing::info!(removed, "cleared existing snapshots"),
            Ok(_) => {}
            Err(e) => {
                tracing::error!("failed to clear snapshots: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match snapshots.latest_snapshot() {
            Ok(Some(path)) => match snapshots.load_snapshot(&path) {
                Ok(snapshot) => {
                    store.load_snapshot_data(snapshot);
                    let inner = store.read();
                    tracing::info!(
                        snapshot = %path.display(),
                        games = inner.game_count(),
                        players = inner.player_count(),
                        "resuming from snapshot"
                    );
                }
                Err(e) => {
                    tracing::error!(snapshot = %path.display(), "failed to load snapshot: {}", e);
                    std::process::exit(1);
                }
            },
            Ok(None) => tracing::info!("no snapshot found, starting from an empty store"),
            Err(e) => {
                tracing::error!("failed to scan snapshot directory: {}", e);
                std::process::exit(1);
            }
        }
    }

    let source = match NhlApiSource::new(&config.source) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            tracing::error!("failed to build the NHL API client: {}", e);
            std::process::exit(1);
        }
    };
    let pipeline = IngestPipeline::new(source, Arc::clone(&store), &config.ingest);

    // Ctrl-C flips the cancellation flag; in-flight games drain before exit.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested, stopping after in-flight games");
            let _ = cancel_tx.send(true);
        }
    });

    tracing::info!(seasons = ?config.ingest.seasons, "starting ingest run");
    let summary = match pipeline.run(&cancel_rx).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("ingest run failed: {}", e);
            std::process::exit(1);
        }
    };

    if config.store.snapshot_enabled && (summary.written > 0 || cli.clear) {
        match snapshots.save_snapshot(&store.to_snapshot()) {
            Ok(path) => tracing::info!(snapshot = %path.display(), "snapshot written"),
            Err(e) => {
                tracing::error!("failed to write snapshot: {}", e);
                std::process::exit(1);
            }
        }
        match snapshots.cleanup_old_snapshots(config.store.snapshots_to_keep) {
            Ok(removed) if removed > 0 => tracing::info!(removed, "pruned old snapshots"),
            Ok(_) => {}
            Err(e) => tracing::warn!("failed to prune old snapshots: {}", e),
        }
    }

    let (games, players, teammate_pairs) = {
        let inner = store.read();
        let index = TeammateIndex::build(inner.games());
        (inner.game_count(), inner.player_count(), index.edge_count())
    };
    tracing::info!(
        written = summary.written,
        skipped = summary.skipped,
        fetch_failures = summary.fetch_failures,
        games,
        players,
        teammate_pairs,
        "ingest complete"
    );
    if summary.cancelled {
        tracing::warn!("run was cancelled before every discovered game was processed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
