//! Tests for search command

use song_relay::commands::search;
use song_relay::search::SearchOptions;
use song_relay::{Catalog, SongRecord};
use tempfile::tempdir;

#[test]
fn test_search_reads_catalog_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("songs.json");

    let mut catalog = Catalog::new(&path);
    catalog.push(SongRecord::new("Unwanted Love", "Y", 2, None));
    catalog.push(SongRecord::new("Wanted", "X", 1, None));
    catalog.push(SongRecord::new("Elsewhere", "Z", 3, None));
    catalog.save().unwrap();

    let hits = search::find(&path, "wanted", SearchOptions::default()).unwrap();
    let titles: Vec<&str> = hits.iter().map(|h| h.record.title.as_str()).collect();
    assert_eq!(titles, vec!["Wanted", "Unwanted Love"]);
}

#[test]
fn test_search_limit_is_applied() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("songs.json");

    let mut catalog = Catalog::new(&path);
    for i in 0..10 {
        catalog.push(SongRecord::new(format!("Rain {}", i), "P", i, None));
    }
    catalog.save().unwrap();

    let options = SearchOptions {
        limit: 4,
        ..SearchOptions::default()
    };
    assert_eq!(search::find(&path, "rain", options).unwrap().len(), 4);
}
