//! Folds fetched games into the graph store.

use std::collections::HashMap;
use std::sync::Arc;

use linemate_core::error::LinemateResult;
use linemate_core::types::{GameRecord, PlayerId, PlayerName};
use linemate_store::store::GraphStore;

use crate::source::GameSource;

/// Writes one game at a time into the store, resolving display names for
/// players the store has not seen named yet.
#[derive(Clone)]
pub struct GameWriter {
    store: Arc<GraphStore>,
}

impl GameWriter {
    pub fn new(store: Arc<GraphStore>) -> Self {
        GameWriter { store }
    }

    /// Commit `record`, fetching names only for roster players the store
    /// does not already have a name for. A failed name lookup is logged and
    /// the player stays unnamed; the game still commits.
    pub async fn write_game(
        &self,
        source: &dyn GameSource,
        record: GameRecord,
    ) -> LinemateResult<()> {
        let unnamed: Vec<PlayerId> = {
            let inner = self.store.read();
            record
                .player_ids_sorted()
                .into_iter()
                .filter(|id| inner.player(*id).map_or(true, |p| p.name.is_none()))
                .collect()
        };

        let mut names: HashMap<PlayerId, PlayerName> = HashMap::new();
        for player_id in unnamed {
            match source.fetch_player_name(player_id).await {
                Ok(Some(name)) => {
                    names.insert(player_id, name);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(player_id, error = %err, "name lookup failed, leaving player unnamed");
                }
            }
        }

        self.store.commit_game(record, &names).await
    }
}
