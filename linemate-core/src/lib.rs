//! Core types, errors, and configuration shared across all linemate crates.

pub mod config;
pub mod error;
pub mod types;
