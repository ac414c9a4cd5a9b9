//! In-memory teammate adjacency index and breadth-first traversal.
//!
//! This crate holds the player-to-teammates map that interactive sessions
//! query on every guess, plus the shortest-path search over it.

pub mod adjacency;
pub mod traversal;
