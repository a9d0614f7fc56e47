//! Long-running bot process.

use tracing::info;

use crate::bot::Bot;
use crate::catalog::CatalogLock;
use crate::config::Config;
use crate::error::Result;

pub async fn run() -> Result<()> {
    let config = Config::load()?;

    // One process per catalog file
    let _lock = CatalogLock::acquire(&config.catalog_path)?;

    info!(
        group_id = config.group_id,
        catalog = %config.catalog_path.display(),
        inline_channel = ?config.inline_channel_id,
        broadcast_thread = ?config.broadcast.thread_id,
        "Starting song relay"
    );

    Bot::from_config(&config)?.run().await
}
