//! Song catalog: a flat JSON list of relayed songs.
//!
//! The whole list lives in memory and is rewritten to disk after every
//! mutation. Writes go through a temp file and a rename so a crash never
//! leaves a truncated catalog behind.

pub mod lock;
pub mod record;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{Error, Result};

pub use lock::CatalogLock;
pub use record::{SongRecord, UNKNOWN_PERFORMER, UNKNOWN_TITLE};

/// Catalog shared between the bot loop and the scheduler.
pub type SharedCatalog = Arc<Mutex<Catalog>>;

#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
    records: Vec<SongRecord>,
}

impl Catalog {
    /// Empty catalog backed by `path` (nothing is written until `save`).
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            records: Vec::new(),
        }
    }

    /// Load the catalog, starting empty when the file does not exist yet.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "Catalog file not found, starting empty");
            return Ok(Self::new(path));
        }

        let content = fs::read(path)?;
        let records = if content.iter().all(u8::is_ascii_whitespace) {
            Vec::new()
        } else {
            Self::parse_records(&content)?
        };

        info!(path = %path.display(), records = records.len(), "Catalog loaded");
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// Parse a catalog document (used for uploads as well as loading).
    pub fn parse_records(content: &[u8]) -> Result<Vec<SongRecord>> {
        Ok(serde_json::from_slice(content)?)
    }

    /// Human-readable JSON with four-space indentation.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.records.serialize(&mut serializer)?;
        Ok(buffer)
    }

    /// Rewrite the whole file.
    pub fn save(&self) -> Result<()> {
        let content = self.to_json()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&content)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), records = self.records.len(), "Catalog saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[SongRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: SongRecord) {
        self.records.push(record);
    }

    /// Write `records` to disk, then swap them in. If the save fails the
    /// in-memory catalog is left as it was.
    pub fn replace_all(&mut self, records: Vec<SongRecord>) -> Result<()> {
        let next = Self {
            path: self.path.clone(),
            records,
        };
        next.save()?;
        *self = next;
        Ok(())
    }

    /// Existing record with the same (title, performer, thread_id).
    pub fn find_duplicate(&self, candidate: &SongRecord) -> Option<&SongRecord> {
        self.records.iter().find(|r| r.same_song(candidate))
    }

    /// Record whose "title - performer" label equals `label`.
    pub fn find_by_label(&self, label: &str) -> Option<&SongRecord> {
        let label = label.trim();
        self.records.iter().find(|r| r.label() == label)
    }

    /// Remove the first record equal to `record`.
    pub fn remove(&mut self, record: &SongRecord) -> bool {
        match self.records.iter().position(|r| r == record) {
            Some(index) => {
                self.records.remove(index);
                true
            }
            None => false,
        }
    }

    /// Up to `n` distinct records chosen uniformly at random.
    pub fn sample(&self, n: usize) -> Vec<SongRecord> {
        self.sample_with(n, &[], &mut rand::thread_rng())
    }

    /// Like `sample`, skipping records whose thread is in `exclude_threads`.
    pub fn sample_filtered(&self, n: usize, exclude_threads: &[i64]) -> Vec<SongRecord> {
        self.sample_with(n, exclude_threads, &mut rand::thread_rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(
        &self,
        n: usize,
        exclude_threads: &[i64],
        rng: &mut R,
    ) -> Vec<SongRecord> {
        let candidates: Vec<&SongRecord> = self
            .records
            .iter()
            .filter(|r| !r.thread_id.is_some_and(|t| exclude_threads.contains(&t)))
            .collect();

        candidates
            .choose_multiple(rng, n)
            .map(|r| (*r).clone())
            .collect()
    }
}

/// Wrap a catalog for sharing between tasks.
pub fn shared(catalog: Catalog) -> SharedCatalog {
    Arc::new(Mutex::new(catalog))
}

/// Remove `record` and persist, returning whether anything changed.
pub fn prune_and_save(catalog: &mut Catalog, record: &SongRecord) -> Result<bool> {
    let mut next = catalog.clone();
    if !next.remove(record) {
        return Ok(false);
    }
    next.save()
        .map_err(|e| Error::DataIntegrity(format!("failed to persist pruned catalog: {}", e)))?;
    *catalog = next;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn record(title: &str, performer: &str, message_id: i64, thread_id: Option<i64>) -> SongRecord {
        SongRecord::new(title, performer, message_id, thread_id)
    }

    fn sample_catalog(path: &Path) -> Catalog {
        let mut catalog = Catalog::new(path);
        catalog.push(record("Wanted", "X", 1, Some(3)));
        catalog.push(record("Unwanted Love", "Y", 2, Some(3)));
        catalog.push(record("Ey Iran", "Golnaraghi", 3, Some(9)));
        catalog
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let temp = tempdir().unwrap();
        let catalog = Catalog::load(temp.path().join("songs.json")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn load_empty_file_returns_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("songs.json");
        fs::write(&path, "").unwrap();
        assert!(Catalog::load(&path).unwrap().is_empty());
    }

    #[test]
    fn load_corrupt_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("songs.json");
        fs::write(&path, "[{\"title\": ").unwrap();
        let err = Catalog::load(&path).unwrap_err();
        assert!(matches!(err, Error::SerializationError(_)));
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("songs.json");
        let catalog = sample_catalog(&path);
        catalog.save().unwrap();

        let reloaded = Catalog::load(&path).unwrap();
        assert_eq!(reloaded.records(), catalog.records());

        reloaded.save().unwrap();
        assert_eq!(Catalog::load(&path).unwrap().records(), catalog.records());
    }

    #[test]
    fn save_is_indented_and_keeps_non_ascii() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("songs.json");
        let mut catalog = Catalog::new(&path);
        catalog.push(record("ای ایران", "گلنراقی", 10, None));
        catalog.save().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("ای ایران"));
        assert!(text.contains("\n    {"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn save_creates_missing_parent_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("data").join("songs.json");
        sample_catalog(&path).save().unwrap();
        assert_eq!(Catalog::load(&path).unwrap().len(), 3);
    }

    #[test]
    fn sample_larger_than_catalog_returns_everything_once() {
        let temp = tempdir().unwrap();
        let catalog = sample_catalog(&temp.path().join("songs.json"));

        let picked = catalog.sample(10);
        assert_eq!(picked.len(), 3);
        let ids: HashSet<Option<i64>> = picked.iter().map(|r| r.message_id).collect();
        assert_eq!(ids, HashSet::from([Some(1), Some(2), Some(3)]));
    }

    #[test]
    fn sample_returns_distinct_records() {
        let temp = tempdir().unwrap();
        let mut catalog = Catalog::new(temp.path().join("songs.json"));
        for id in 0..20 {
            catalog.push(record(&format!("Song {id}"), "Band", id, None));
        }

        let mut rng = StdRng::seed_from_u64(7);
        let picked = catalog.sample_with(3, &[], &mut rng);
        assert_eq!(picked.len(), 3);
        let ids: HashSet<Option<i64>> = picked.iter().map(|r| r.message_id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn sample_on_empty_catalog_is_empty() {
        let catalog = Catalog::new("unused.json");
        assert!(catalog.sample(3).is_empty());
    }

    #[test]
    fn sample_filtered_skips_excluded_threads() {
        let temp = tempdir().unwrap();
        let catalog = sample_catalog(&temp.path().join("songs.json"));

        let picked = catalog.sample_filtered(10, &[3]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].message_id, Some(3));
    }

    #[test]
    fn remove_deletes_only_first_match() {
        let temp = tempdir().unwrap();
        let mut catalog = sample_catalog(&temp.path().join("songs.json"));
        let target = catalog.records()[1].clone();

        assert!(catalog.remove(&target));
        assert_eq!(catalog.len(), 2);
        assert!(!catalog.remove(&target));
    }

    #[test]
    fn find_duplicate_uses_title_performer_and_thread() {
        let temp = tempdir().unwrap();
        let catalog = sample_catalog(&temp.path().join("songs.json"));

        assert!(catalog
            .find_duplicate(&record("Wanted", "X", 99, Some(3)))
            .is_some());
        assert!(catalog
            .find_duplicate(&record("Wanted", "X", 99, Some(4)))
            .is_none());
    }

    #[test]
    fn find_by_label_matches_exact_label() {
        let temp = tempdir().unwrap();
        let catalog = sample_catalog(&temp.path().join("songs.json"));

        let found = catalog.find_by_label(" Unwanted Love - Y ").unwrap();
        assert_eq!(found.message_id, Some(2));
        assert!(catalog.find_by_label("Unwanted Love").is_none());
    }

    #[test]
    fn prune_and_save_persists_smaller_catalog() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("songs.json");
        let mut catalog = sample_catalog(&path);
        catalog.save().unwrap();
        let target = catalog.records()[0].clone();

        assert!(prune_and_save(&mut catalog, &target).unwrap());
        assert_eq!(Catalog::load(&path).unwrap().len(), 2);
        assert!(!prune_and_save(&mut catalog, &target).unwrap());
    }

    /// A catalog whose parent "directory" is a regular file cannot be saved.
    fn unwritable_catalog(temp: &Path) -> Catalog {
        let blocker = temp.join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        sample_catalog(&blocker.join("songs.json"))
    }

    #[test]
    fn failed_replace_keeps_previous_records() {
        let temp = tempdir().unwrap();
        let mut catalog = unwritable_catalog(temp.path());
        let before = catalog.records().to_vec();

        let result = catalog.replace_all(vec![record("New", "N", 9, None)]);

        assert!(result.is_err());
        assert_eq!(catalog.records(), before.as_slice());
    }

    #[test]
    fn failed_prune_keeps_record_in_memory() {
        let temp = tempdir().unwrap();
        let mut catalog = unwritable_catalog(temp.path());
        let target = catalog.records()[0].clone();

        assert!(matches!(
            prune_and_save(&mut catalog, &target),
            Err(Error::DataIntegrity(_))
        ));
        assert_eq!(catalog.len(), 3);
        assert!(catalog.records().contains(&target));
    }

    #[test]
    fn replace_all_persists_new_records() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("songs.json");
        let mut catalog = sample_catalog(&path);

        catalog
            .replace_all(vec![record("Only", "One", 1, Some(2))])
            .unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(Catalog::load(&path).unwrap().records(), catalog.records());
    }
}
