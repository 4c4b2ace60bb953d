use crate::config::CeremonyConfig;
use crate::flip::{FlipFilter, FlipType};
use crate::store::{handle_outdated_flips, rollover_epoch, ArchiveLedger, FlipStore, JsonFlipStore};
use serde::Serialize;

/// One row of `ceremony flips list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlipRow {
    /// Local id.
    pub id: String,
    /// Lifecycle type.
    #[serde(rename = "type")]
    pub flip_type: FlipType,
    /// Keyword pair id.
    pub keyword_pair_id: u32,
    /// Network hash, once submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Last modification, unix seconds.
    pub last_modified: u64,
}

/// Lists the stored flips matching `filter`, pruning outdated ones first
/// when the config asks for it.
pub fn run_list(cfg: &CeremonyConfig, filter: FlipFilter, now: u64) -> Result<Vec<FlipRow>, String> {
    let mut store = JsonFlipStore::new(&cfg.store_path);
    if cfg.prune_on_load {
        handle_outdated_flips(&mut store, now, cfg.max_flip_age_days).map_err(|e| e.to_string())?;
    }
    let flips = store.get_flips().map_err(|e| e.to_string())?;
    Ok(filter
        .apply(&flips)
        .into_iter()
        .map(|flip| FlipRow {
            id: flip.id.clone(),
            flip_type: flip.flip_type,
            keyword_pair_id: flip.keyword_pair_id,
            hash: flip.hash.clone(),
            last_modified: flip.last_modified(),
        })
        .collect())
}

/// Archives every flip once for `epoch`; returns false if already done.
pub fn run_archive(cfg: &CeremonyConfig, epoch: u64, now: u64) -> Result<bool, String> {
    let mut store = JsonFlipStore::new(&cfg.store_path);
    let mut ledger = ArchiveLedger::load(&cfg.archive_path).map_err(|e| e.to_string())?;
    rollover_epoch(&mut store, &mut ledger, epoch, now).map_err(|e| e.to_string())
}

/// Drops outdated flips; returns how many were removed.
pub fn run_prune(cfg: &CeremonyConfig, now: u64) -> Result<usize, String> {
    let mut store = JsonFlipStore::new(&cfg.store_path);
    handle_outdated_flips(&mut store, now, cfg.max_flip_age_days).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flip::tests::flip_with;
    use std::fs;
    use std::path::PathBuf;

    const DAY: u64 = 24 * 60 * 60;

    fn config(tag: &str) -> (PathBuf, CeremonyConfig) {
        let dir = std::env::temp_dir().join(format!(
            "flip_ceremony_flips_{tag}_{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        let cfg = CeremonyConfig {
            store_path: dir.join("flips.json"),
            archive_path: dir.join("archive.json"),
            ..CeremonyConfig::default()
        };
        (dir, cfg)
    }

    #[test]
    fn list_prunes_then_filters() {
        let (dir, cfg) = config("list");
        let now = 100 * DAY;
        let mut store = JsonFlipStore::new(&cfg.store_path);
        store
            .save_flips(vec![
                flip_with("stale", FlipType::Draft, now - 40 * DAY),
                flip_with("draft", FlipType::Draft, now - DAY),
                flip_with("live", FlipType::Published, now - DAY),
            ])
            .unwrap();
        let rows = run_list(&cfg, FlipFilter::Drafts, now).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "draft");
        assert_eq!(store.get_flips().unwrap().len(), 2);
        assert_eq!(run_prune(&cfg, now).unwrap(), 0);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn archive_runs_once_per_epoch() {
        let (dir, cfg) = config("archive");
        let mut store = JsonFlipStore::new(&cfg.store_path);
        store
            .save_flips(vec![flip_with("a", FlipType::Published, 0)])
            .unwrap();
        assert!(run_archive(&cfg, 3, 10).unwrap());
        assert!(!run_archive(&cfg, 3, 20).unwrap());
        let rows = run_list(
            &CeremonyConfig {
                prune_on_load: false,
                ..cfg.clone()
            },
            FlipFilter::Archived,
            0,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        fs::remove_dir_all(&dir).unwrap();
    }
}
