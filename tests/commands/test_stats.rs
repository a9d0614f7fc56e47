//! Tests for stats command

use song_relay::commands::{stats, CatalogStats};
use song_relay::{Catalog, SongRecord};
use tempfile::tempdir;

#[test]
fn test_stats_on_saved_catalog() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("songs.json");

    let mut catalog = Catalog::new(&path);
    catalog.push(SongRecord::new("One", "Band", 1, Some(2)));
    catalog.push(SongRecord::new("Two", "Band", 2, None));
    catalog.save().unwrap();

    let loaded = Catalog::load(&path).unwrap();
    let stats = CatalogStats::collect(loaded.records(), 3);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.top_performers, vec![("Band".to_string(), 2)]);

    assert!(stats::run(&path, 3).is_ok());
}

#[test]
fn test_stats_missing_catalog_is_empty() {
    let temp = tempdir().unwrap();
    assert!(stats::run(&temp.path().join("absent.json"), 3).is_ok());
}

#[test]
fn test_stats_rejects_corrupt_catalog() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("songs.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(stats::run(&path, 3).is_err());
}
