//! Ingestion pipeline: discovers unprocessed games from the upstream stats
//! API and folds each one into the graph store.

pub mod pipeline;
pub mod source;
pub mod writer;
