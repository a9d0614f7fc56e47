//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI. Everything except
//! `run` works on the catalog file alone and needs no bot token.

pub mod run;
pub mod sample;
pub mod search;
pub mod stats;

use std::path::PathBuf;

use crate::config::{Config, CATALOG_FILE};

// Re-export commonly used types
pub use run::run as run_bot;
pub use stats::CatalogStats;

/// Catalog file to inspect: the explicit path, else the configured one.
pub fn catalog_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        Config::load()
            .map(|config| config.catalog_path)
            .unwrap_or_else(|_| PathBuf::from(CATALOG_FILE))
    })
}
