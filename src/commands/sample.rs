//! Preview a random pick, as `/random` or the nightly broadcast would make it.

use std::path::Path;

use crate::catalog::Catalog;
use crate::error::Result;

pub fn run(path: &Path, count: usize, exclude_threads: &[i64]) -> Result<()> {
    let catalog = Catalog::load(path)?;
    let picks = catalog.sample_filtered(count, exclude_threads);

    if picks.is_empty() {
        println!("Catalog is empty");
        return Ok(());
    }

    for record in &picks {
        println!(
            "{:>8}  {}  {}",
            record
                .message_id
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
            record
                .thread_id
                .map_or_else(|| "-".to_string(), |t| t.to_string()),
            record.label()
        );
    }
    Ok(())
}
