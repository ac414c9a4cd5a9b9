//! Season reconciliation and the concurrent game fan-out.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use linemate_core::config::IngestConfig;
use linemate_core::error::{LinemateError, LinemateResult};
use linemate_core::types::{season_for_start_year, GameId};
use linemate_store::store::GraphStore;

use crate::source::GameSource;
use crate::writer::GameWriter;

/// Totals for one ingest run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    /// Games the reconcile step found missing from the store.
    pub discovered: usize,
    pub written: usize,
    /// Games skipped as unavailable, cancelled, or rosterless.
    pub skipped: usize,
    /// Games whose fetch kept failing after retries.
    pub fetch_failures: usize,
    /// True when a shutdown request stopped the run before every
    /// discovered game was dispatched.
    pub cancelled: bool,
}

enum UnitOutcome {
    Written,
    Skipped,
    FetchFailed,
}

/// Drives a delta ingest: list the configured seasons upstream, drop games
/// the store already holds, then fetch and commit the remainder under a
/// bounded concurrency width.
pub struct IngestPipeline {
    source: Arc<dyn GameSource>,
    store: Arc<GraphStore>,
    writer: GameWriter,
    max_concurrent_games: usize,
    seasons: Vec<u32>,
}

impl IngestPipeline {
    pub fn new(
        source: Arc<dyn GameSource>,
        store: Arc<GraphStore>,
        config: &IngestConfig,
    ) -> Self {
        let writer = GameWriter::new(Arc::clone(&store));
        IngestPipeline {
            source,
            store,
            writer,
            max_concurrent_games: config.max_concurrent_games,
            seasons: config.seasons.clone(),
        }
    }

    /// Game ids the upstream listing has that the store does not, in
    /// ascending order.
    pub async fn reconcile(&self) -> LinemateResult<Vec<GameId>> {
        let known: HashSet<GameId> = self.store.read().game_ids().into_iter().collect();

        let mut to_process = Vec::new();
        for year in &self.seasons {
            let season = season_for_start_year(*year);
            let listed = self.source.list_season_game_ids(season).await?;
            to_process.extend(listed.into_iter().filter(|id| !known.contains(id)));
        }
        to_process.sort_unstable();
        to_process.dedup();
        Ok(to_process)
    }

    /// One full ingest pass. Failed fetches are counted and skipped; a
    /// store write failure aborts the run.
    pub async fn run(&self, cancel: &watch::Receiver<bool>) -> LinemateResult<IngestSummary> {
        let to_process = self.reconcile().await?;
        tracing::info!(games = to_process.len(), "reconciled upstream seasons");

        let summary = self.process_games(to_process, cancel).await?;
        tracing::info!(
            discovered = summary.discovered,
            written = summary.written,
            skipped = summary.skipped,
            fetch_failures = summary.fetch_failures,
            cancelled = summary.cancelled,
            "ingest run finished"
        );
        Ok(summary)
    }

    async fn process_games(
        &self,
        ids: Vec<GameId>,
        cancel: &watch::Receiver<bool>,
    ) -> LinemateResult<IngestSummary> {
        let mut summary = IngestSummary {
            discovered: ids.len(),
            ..IngestSummary::default()
        };

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_games));
        let mut join_set: JoinSet<LinemateResult<UnitOutcome>> = JoinSet::new();

        for game_id in ids {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| LinemateError::Internal("ingest semaphore closed".into()))?;
            if *cancel.borrow() {
                summary.cancelled = true;
                break;
            }

            let source = Arc::clone(&self.source);
            let writer = self.writer.clone();
            join_set.spawn(async move {
                let _permit = permit;
                process_one_game(source, writer, game_id).await
            });
        }

        // In-flight games finish even when the loop stopped early.
        while let Some(joined) = join_set.join_next().await {
            let outcome = joined
                .map_err(|e| LinemateError::Internal(format!("ingest worker panicked: {e}")))??;
            match outcome {
                UnitOutcome::Written => summary.written += 1,
                UnitOutcome::Skipped => summary.skipped += 1,
                UnitOutcome::FetchFailed => summary.fetch_failures += 1,
            }
        }

        Ok(summary)
    }
}

async fn process_one_game(
    source: Arc<dyn GameSource>,
    writer: GameWriter,
    game_id: GameId,
) -> LinemateResult<UnitOutcome> {
    let record = match source.fetch_game(game_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::debug!(game_id, "game unavailable upstream, skipping");
            return Ok(UnitOutcome::Skipped);
        }
        Err(err) => {
            tracing::warn!(game_id, error = %err, "fetch failed, skipping game");
            return Ok(UnitOutcome::FetchFailed);
        }
    };

    if record.home.players.is_empty() && record.away.players.is_empty() {
        tracing::debug!(game_id, "no rosters published yet, skipping");
        return Ok(UnitOutcome::Skipped);
    }

    writer.write_game(source.as_ref(), record).await?;
    Ok(UnitOutcome::Written)
}
