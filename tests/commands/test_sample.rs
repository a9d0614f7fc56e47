//! Tests for sample command

use song_relay::commands::sample;
use song_relay::{Catalog, SongRecord};
use tempfile::tempdir;

#[test]
fn test_sample_runs_on_catalog() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("songs.json");

    let mut catalog = Catalog::new(&path);
    catalog.push(SongRecord::new("A", "P", 1, Some(1)));
    catalog.push(SongRecord::new("B", "P", 2, Some(2)));
    catalog.save().unwrap();

    assert!(sample::run(&path, 3, &[1]).is_ok());
}

#[test]
fn test_sample_empty_catalog() {
    let temp = tempdir().unwrap();
    assert!(sample::run(&temp.path().join("none.json"), 3, &[]).is_ok());
}
