//! Read-side query engine: filtered teammate, team, and path lookups over
//! the game store.

pub mod engine;
pub mod filter;
