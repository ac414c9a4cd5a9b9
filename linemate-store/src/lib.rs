//! Embedded graph store for linemate: player and game facts, write
//! transactions with per-player locking, and snapshot persistence.

pub mod locks;
pub mod snapshot;
pub mod store;
