//! Flip store contract, stores and epoch maintenance.
//!
//! The store owns persisted flip records.  Everything else reads a snapshot
//! with [`FlipStore::get_flips`] and writes a full replacement with
//! [`FlipStore::save_flips`]; nothing holds a live reference into the store.

use crate::error::StoreError;
use crate::flip::{is_fresh_flip, Flip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Read/write contract for persisted flips.
pub trait FlipStore {
    /// Returns every stored flip.
    fn get_flips(&self) -> Result<Vec<Flip>, StoreError>;

    /// Replaces the stored flips with `flips`.
    fn save_flips(&mut self, flips: Vec<Flip>) -> Result<(), StoreError>;
}

/// Process-local store.
#[derive(Debug, Clone, Default)]
pub struct MemoryFlipStore {
    flips: Vec<Flip>,
}

impl MemoryFlipStore {
    /// Creates a store holding `flips`.
    pub fn new(flips: Vec<Flip>) -> Self {
        Self { flips }
    }
}

impl FlipStore for MemoryFlipStore {
    fn get_flips(&self) -> Result<Vec<Flip>, StoreError> {
        Ok(self.flips.clone())
    }

    fn save_flips(&mut self, flips: Vec<Flip>) -> Result<(), StoreError> {
        self.flips = flips;
        Ok(())
    }
}

/// Store backed by a JSON document; a missing file reads as empty.
#[derive(Debug, Clone)]
pub struct JsonFlipStore {
    path: PathBuf,
}

impl JsonFlipStore {
    /// Opens a store at `path` without touching the file system.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FlipStore for JsonFlipStore {
    fn get_flips(&self) -> Result<Vec<Flip>, StoreError> {
        read_json_or_default(&self.path)
    }

    fn save_flips(&mut self, flips: Vec<Flip>) -> Result<(), StoreError> {
        write_json_atomic(&self.path, &flips)
    }
}

fn read_json_or_default<T>(path: &Path) -> Result<T, StoreError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let bytes = fs::read(path).map_err(|err| StoreError::Io(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| StoreError::Parse(err.to_string()))
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| StoreError::Io(err.to_string()))?;
        }
    }
    let data = serde_json::to_vec_pretty(value).map_err(|err| StoreError::Parse(err.to_string()))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, data).map_err(|err| StoreError::Io(err.to_string()))?;
    fs::rename(&tmp, path).map_err(|err| StoreError::Io(err.to_string()))
}

/// Marks every stored flip as archived.
pub fn archive_flips<S: FlipStore + ?Sized>(store: &mut S) -> Result<(), StoreError> {
    let flips = store
        .get_flips()?
        .into_iter()
        .map(|mut flip| {
            flip.archive();
            flip
        })
        .collect::<Vec<_>>();
    info!(count = flips.len(), "flips archived");
    store.save_flips(flips)
}

/// Drops flips untouched for `max_age_days`; returns how many were removed.
///
/// The store is only rewritten when something is outdated.
pub fn handle_outdated_flips<S: FlipStore + ?Sized>(
    store: &mut S,
    now: u64,
    max_age_days: u64,
) -> Result<usize, StoreError> {
    let flips = store.get_flips()?;
    let before = flips.len();
    let fresh: Vec<Flip> = flips
        .into_iter()
        .filter(|flip| is_fresh_flip(flip, now, max_age_days))
        .collect();
    let removed = before - fresh.len();
    if removed > 0 {
        store.save_flips(fresh)?;
        info!(removed, "outdated flips pruned");
    }
    Ok(removed)
}

/// Archive marker for one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMark {
    /// Whether the epoch's flips were archived.
    pub archived: bool,
    /// When the archive happened, unix seconds.
    pub archived_at: u64,
}

/// Per-epoch record of completed flip archives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveLedger {
    #[serde(skip)]
    path: Option<PathBuf>,
    epochs: BTreeMap<u64, ArchiveMark>,
}

impl ArchiveLedger {
    /// Loads the ledger at `path`; a missing file yields an empty ledger.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let mut ledger: Self = read_json_or_default(path)?;
        ledger.path = Some(path.to_path_buf());
        Ok(ledger)
    }

    /// Returns true when `epoch` has already been archived.
    pub fn did_archive_flips(&self, epoch: u64) -> bool {
        self.epochs
            .get(&epoch)
            .map(|mark| mark.archived)
            .unwrap_or(false)
    }

    /// Records that `epoch` was archived; a repeated call keeps the first mark.
    pub fn mark_flips_archived(&mut self, epoch: u64, now: u64) -> Result<(), StoreError> {
        if self.did_archive_flips(epoch) {
            return Ok(());
        }
        self.epochs.insert(
            epoch,
            ArchiveMark {
                archived: true,
                archived_at: now,
            },
        );
        match &self.path {
            Some(path) => write_json_atomic(path, self),
            None => Ok(()),
        }
    }

    /// Returns the mark for `epoch`, if any.
    pub fn mark(&self, epoch: u64) -> Option<ArchiveMark> {
        self.epochs.get(&epoch).copied()
    }
}

/// Archives all flips once per epoch; returns false if already done.
pub fn rollover_epoch<S: FlipStore + ?Sized>(
    store: &mut S,
    ledger: &mut ArchiveLedger,
    epoch: u64,
    now: u64,
) -> Result<bool, StoreError> {
    if ledger.did_archive_flips(epoch) {
        return Ok(false);
    }
    archive_flips(store)?;
    ledger.mark_flips_archived(epoch, now)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flip::tests::flip_with;
    use crate::flip::FlipType;
    use std::time::{SystemTime, UNIX_EPOCH};

    const DAY: u64 = 24 * 60 * 60;

    fn temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("flip_ceremony_{tag}_{nanos}"));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn json_store_round_trips_and_starts_empty() {
        let dir = temp_dir("store");
        let mut store = JsonFlipStore::new(dir.join("flips.json"));
        assert!(store.get_flips().unwrap().is_empty());
        let flips = vec![flip_with("a", FlipType::Draft, 5)];
        store.save_flips(flips.clone()).unwrap();
        assert_eq!(store.get_flips().unwrap(), flips);
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"keywordPairId\""));
        assert!(raw.contains("\"type\": \"Draft\""));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn archive_marks_every_flip() {
        let mut store = MemoryFlipStore::new(vec![
            flip_with("a", FlipType::Draft, 0),
            flip_with("b", FlipType::Published, 0),
            flip_with("c", FlipType::Archived, 0),
        ]);
        archive_flips(&mut store).unwrap();
        assert!(store
            .get_flips()
            .unwrap()
            .iter()
            .all(|f| f.flip_type == FlipType::Archived));
        let flips = store.get_flips().unwrap();
        assert_eq!(flips[0].archived_from, Some(FlipType::Draft));
        assert_eq!(flips[1].archived_from, Some(FlipType::Published));
    }

    #[test]
    fn prunes_only_outdated_flips() {
        let now = 100 * DAY;
        let mut store = MemoryFlipStore::new(vec![
            flip_with("old", FlipType::Draft, now - 31 * DAY),
            flip_with("new", FlipType::Draft, now - DAY),
        ]);
        assert_eq!(handle_outdated_flips(&mut store, now, 30).unwrap(), 1);
        let left = store.get_flips().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "new");
        assert_eq!(handle_outdated_flips(&mut store, now, 30).unwrap(), 0);
    }

    #[test]
    fn ledger_archives_each_epoch_once() {
        let dir = temp_dir("ledger");
        let path = dir.join("archive.json");
        let mut ledger = ArchiveLedger::load(&path).unwrap();
        let mut store = MemoryFlipStore::new(vec![flip_with("a", FlipType::Draft, 0)]);
        assert!(rollover_epoch(&mut store, &mut ledger, 7, 1_000).unwrap());
        assert!(!rollover_epoch(&mut store, &mut ledger, 7, 2_000).unwrap());

        let reloaded = ArchiveLedger::load(&path).unwrap();
        assert!(reloaded.did_archive_flips(7));
        assert!(!reloaded.did_archive_flips(8));
        assert_eq!(reloaded.mark(7).map(|m| m.archived_at), Some(1_000));
        fs::remove_dir_all(&dir).unwrap();
    }
}
