//! Offline fuzzy search over the catalog file.

use std::path::Path;

use tracing::info;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::search::{search, SearchHit, SearchOptions};

/// Search the catalog at `path`.
pub fn find(path: &Path, query: &str, options: SearchOptions) -> Result<Vec<SearchHit>> {
    let catalog = Catalog::load(path)?;
    info!("Searching {} songs for: '{}'", catalog.len(), query);
    Ok(search(catalog.records(), query, options))
}

pub fn run(path: &Path, query: &str, options: SearchOptions) -> Result<()> {
    let hits = find(path, query, options)?;
    if hits.is_empty() {
        println!("No songs found");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{:>2}. [{:.2}] {}", i + 1, hit.score, hit.record.label());
    }
    Ok(())
}
