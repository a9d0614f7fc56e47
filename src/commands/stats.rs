//! Catalog statistics for operators.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::catalog::{Catalog, SongRecord, UNKNOWN_PERFORMER, UNKNOWN_TITLE};
use crate::error::Result;

/// Summary of a catalog's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogStats {
    pub total: usize,
    /// Songs per topic; `None` is the general chat.
    pub by_thread: BTreeMap<Option<i64>, usize>,
    /// Most frequent performers, ties broken by name.
    pub top_performers: Vec<(String, usize)>,
    /// Records still carrying a placeholder title or performer.
    pub untagged: usize,
    /// Records without a stored file id (older catalogs).
    pub missing_file_id: usize,
}

impl CatalogStats {
    pub fn collect(records: &[SongRecord], top: usize) -> Self {
        let mut by_thread = BTreeMap::new();
        let mut performers: HashMap<&str, usize> = HashMap::new();
        let mut untagged = 0;
        let mut missing_file_id = 0;

        for record in records {
            *by_thread.entry(record.thread_id).or_insert(0) += 1;
            if record.performer != UNKNOWN_PERFORMER {
                *performers.entry(record.performer.as_str()).or_insert(0) += 1;
            }
            if record.title == UNKNOWN_TITLE || record.performer == UNKNOWN_PERFORMER {
                untagged += 1;
            }
            if record.file_id.is_none() {
                missing_file_id += 1;
            }
        }

        let mut top_performers: Vec<(String, usize)> = performers
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        top_performers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_performers.truncate(top);

        Self {
            total: records.len(),
            by_thread,
            top_performers,
            untagged,
            missing_file_id,
        }
    }

    pub fn print(&self) {
        println!("Songs: {}", self.total);
        println!("Untagged: {}", self.untagged);
        println!("Without file id: {}", self.missing_file_id);

        println!("\nBy topic:");
        for (thread, count) in &self.by_thread {
            match thread {
                Some(id) => println!("  {:>10}  {}", id, count),
                None => println!("  {:>10}  {}", "general", count),
            }
        }

        if !self.top_performers.is_empty() {
            println!("\nTop performers:");
            for (name, count) in &self.top_performers {
                println!("  {} - {}", name, count);
            }
        }
    }
}

pub fn run(path: &Path, top: usize) -> Result<()> {
    let catalog = Catalog::load(path)?;
    CatalogStats::collect(catalog.records(), top).print();
    Ok(())
}
