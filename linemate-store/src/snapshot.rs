//! Snapshot persistence for the graph store.
//!
//! A snapshot captures every player and game fact at a point in time and is
//! written as a bincode-serialized binary file. The appearance index is not
//! stored; it is rebuilt when a snapshot is loaded.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use linemate_core::types::{GameRecord, PlayerId, PlayerName, Timestamp};

// ─── Types ─────────────────────────────────────────────────────────────────

/// Metadata about a snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub path: PathBuf,
    pub created_at: Timestamp,
    pub size_bytes: u64,
    pub player_count: u64,
    pub game_count: u64,
}

/// One player row as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player_id: PlayerId,
    pub name: Option<PlayerName>,
    pub touched_at: Timestamp,
}

/// Full store contents at a point in time.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub created_at: Timestamp,
    pub players: Vec<PlayerSnapshot>,
    pub games: Vec<GameRecord>,
}

// ─── SnapshotEngine ────────────────────────────────────────────────────────

/// Creates, loads, lists, and prunes snapshot files in a data directory.
pub struct SnapshotEngine {
    data_dir: PathBuf,
}

impl SnapshotEngine {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Save a snapshot to disk. Returns the path of the written file.
    pub fn save_snapshot(&self, snapshot: &StoreSnapshot) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.data_dir)?;

        let filename = format!("snapshot-{}.bin", snapshot.created_at);
        let path = self.data_dir.join(&filename);

        let data = bincode::serialize(snapshot).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bincode serialize snapshot: {e}"),
            )
        })?;

        let mut file = File::create(&path)?;
        file.write_all(&data)?;
        file.sync_all()?;

        Ok(path)
    }

    /// Load a snapshot from a file on disk.
    pub fn load_snapshot(&self, path: &Path) -> io::Result<StoreSnapshot> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        bincode::deserialize(&data).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bincode deserialize snapshot: {e}"),
            )
        })
    }

    /// List all snapshot metadata, sorted by `created_at` descending (newest
    /// first). Unreadable files are skipped.
    pub fn list_snapshots(&self) -> io::Result<Vec<SnapshotMeta>> {
        if !self.data_dir.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();

        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n.to_string(),
                None => continue,
            };

            if !name.starts_with("snapshot-") || !name.ends_with(".bin") {
                continue;
            }

            match self.load_snapshot(&path) {
                Ok(snap) => {
                    snapshots.push(SnapshotMeta {
                        path,
                        created_at: snap.created_at,
                        size_bytes: entry.metadata()?.len(),
                        player_count: snap.players.len() as u64,
                        game_count: snap.games.len() as u64,
                    });
                }
                Err(_) => continue,
            }
        }

        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(snapshots)
    }

    /// Return the path to the most recent snapshot, if any.
    pub fn latest_snapshot(&self) -> io::Result<Option<PathBuf>> {
        let snapshots = self.list_snapshots()?;
        Ok(snapshots.into_iter().next().map(|m| m.path))
    }

    /// Delete old snapshots, keeping only the `keep` most recent ones.
    /// Returns the number of snapshots deleted.
    pub fn cleanup_old_snapshots(&self, keep: usize) -> io::Result<u32> {
        let snapshots = self.list_snapshots()?;
        let mut deleted = 0u32;

        if snapshots.len() <= keep {
            return Ok(0);
        }

        for meta in snapshots.into_iter().skip(keep) {
            if fs::remove_file(&meta.path).is_ok() {
                deleted += 1;
            }
        }

        Ok(deleted)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────
