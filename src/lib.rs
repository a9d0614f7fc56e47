//! Song relay bot for Telegram groups.
//!
//! This library provides tools to:
//! - Re-post audio shared in a group as bot-owned messages and catalog them
//! - Serve the catalog back through chat commands (random, list, search, lyrics)
//! - Broadcast a few random songs into a topic every night
//! - Inspect the catalog offline from the CLI

pub mod bot;
pub mod catalog;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod lyrics;
pub mod metrics;
pub mod poller;
pub mod relay;
pub mod scheduler;
pub mod search;
pub mod telegram;

// Re-export common types
pub use catalog::{Catalog, CatalogLock, SharedCatalog, SongRecord};
pub use config::Config;
pub use error::{Error, FailureKind, Result};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
