//! Snapshot persistence for the knowledge base.
//!
//! The entire state — documents, metadata, serialized index and the
//! recorded embedding dimension — lives in a single JSON file, rewritten
//! wholesale after every mutation and read once at startup. Saving is
//! best-effort: an I/O failure is logged and the in-memory state stays
//! authoritative. Loading is forgiving: a missing, near-empty or corrupt
//! snapshot yields the empty first-run state, never an error.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use loreweaver_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::index::FlatIndex;
use crate::types::SettingMetadata;

/// Snapshots shorter than this are treated as absent (first-run state).
const MIN_SNAPSHOT_BYTES: u64 = 10;

/// On-disk snapshot record.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    documents: Vec<String>,
    metadatas: Vec<SettingMetadata>,
    /// Base64-encoded binary index; absent means rebuild from documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    index_bytes: Option<String>,
    model_dimension: Option<usize>,
}

/// State restored from a snapshot.
#[derive(Debug, Default)]
pub struct LoadedSnapshot {
    pub documents: Vec<String>,
    pub metadatas: Vec<SettingMetadata>,
    pub index: Option<FlatIndex>,
    pub dimension: Option<usize>,
}

/// Reads and writes the snapshot file at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Create a store for the given snapshot path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole state to disk. Best-effort: failures are logged
    /// and never propagated, so a full disk cannot crash a mutation that
    /// already succeeded in memory.
    pub fn save(
        &self,
        documents: &[String],
        metadatas: &[SettingMetadata],
        index: Option<&FlatIndex>,
        dimension: usize,
    ) {
        if let Err(e) = self.try_save(documents, metadatas, index, dimension) {
            warn!(path = %self.path.display(), "Failed to save snapshot: {}", e);
        }
    }

    fn try_save(
        &self,
        documents: &[String],
        metadatas: &[SettingMetadata],
        index: Option<&FlatIndex>,
        dimension: usize,
    ) -> AppResult<()> {
        let record = SnapshotFile {
            documents: documents.to_vec(),
            metadatas: metadatas.to_vec(),
            index_bytes: index.map(|i| BASE64.encode(i.to_bytes())),
            model_dimension: Some(dimension),
        };

        let json = serde_json::to_string(&record)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(&self.path, json)?;
        debug!(
            path = %self.path.display(),
            documents = documents.len(),
            "Snapshot written"
        );
        Ok(())
    }

    /// Read the snapshot. Missing/near-empty file means first run;
    /// a corrupt file is logged and also treated as first run.
    pub fn load(&self) -> LoadedSnapshot {
        match self.try_load() {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    "Failed to load snapshot, starting empty: {}",
                    e
                );
                LoadedSnapshot::default()
            }
        }
    }

    fn try_load(&self) -> AppResult<LoadedSnapshot> {
        let size = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            // Missing file is the normal first-run case, not an error.
            Err(_) => return Ok(LoadedSnapshot::default()),
        };

        if size < MIN_SNAPSHOT_BYTES {
            debug!(path = %self.path.display(), size, "Snapshot too small, treating as empty");
            return Ok(LoadedSnapshot::default());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let record: SnapshotFile = serde_json::from_str(&contents)?;

        if record.documents.len() != record.metadatas.len() {
            return Err(AppError::Knowledge(format!(
                "Snapshot has {} documents but {} metadata records",
                record.documents.len(),
                record.metadatas.len()
            )));
        }

        // A damaged index is recoverable: drop it and let the caller
        // rebuild from the documents.
        let index = record.index_bytes.as_deref().and_then(|encoded| {
            BASE64
                .decode(encoded)
                .map_err(AppError::from_base64)
                .and_then(|bytes| FlatIndex::from_bytes(&bytes))
                .map_err(|e| {
                    warn!("Snapshot index unreadable, will rebuild from documents: {}", e);
                })
                .ok()
        });

        Ok(LoadedSnapshot {
            documents: record.documents,
            metadatas: record.metadatas,
            index,
            dimension: record.model_dimension,
        })
    }

    /// Remove the snapshot file, tolerating its absence.
    pub fn delete(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Snapshot deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to delete snapshot: {}", e),
        }
    }
}

/// Helper so base64 decode errors fold into [`AppError`].
trait FromBase64Error {
    fn from_base64(err: base64::DecodeError) -> AppError;
}

impl FromBase64Error for AppError {
    fn from_base64(err: base64::DecodeError) -> AppError {
        AppError::Serialization(format!("Invalid base64 index data: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> SnapshotStore {
        SnapshotStore::new(temp.path().join("snapshot.json"))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let loaded = store_in(&temp).load();

        assert!(loaded.documents.is_empty());
        assert!(loaded.metadatas.is_empty());
        assert!(loaded.index.is_none());
        assert!(loaded.dimension.is_none());
    }

    #[test]
    fn test_load_tiny_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::write(store.path(), "{}").unwrap();

        let loaded = store.load();
        assert!(loaded.documents.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::write(store.path(), "this is not json at all...").unwrap();

        let loaded = store.load();
        assert!(loaded.documents.is_empty());
        assert!(loaded.index.is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let documents = vec!["alpha".to_string(), "beta".to_string()];
        let metadatas = vec![SettingMetadata::character(), SettingMetadata::world_rule()];
        let mut index = FlatIndex::new(2);
        index.add(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();

        store.save(&documents, &metadatas, Some(&index), 2);
        let loaded = store.load();

        assert_eq!(loaded.documents, documents);
        assert_eq!(loaded.metadatas, metadatas);
        assert_eq!(loaded.dimension, Some(2));
        assert_eq!(loaded.index.unwrap(), index);
    }

    #[test]
    fn test_load_without_index_bytes() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::write(
            store.path(),
            r#"{"documents":["only doc"],"metadatas":[{"type":"character"}],"model_dimension":4}"#,
        )
        .unwrap();

        let loaded = store.load();
        assert_eq!(loaded.documents, vec!["only doc".to_string()]);
        assert!(loaded.index.is_none());
        assert_eq!(loaded.dimension, Some(4));
    }

    #[test]
    fn test_load_damaged_index_keeps_documents() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::write(
            store.path(),
            r#"{"documents":["doc"],"metadatas":[{"type":"character"}],"index_bytes":"!!!not-base64!!!","model_dimension":4}"#,
        )
        .unwrap();

        let loaded = store.load();
        assert_eq!(loaded.documents.len(), 1);
        assert!(loaded.index.is_none());
    }

    #[test]
    fn test_mismatched_lengths_treated_as_corrupt() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::write(
            store.path(),
            r#"{"documents":["a","b"],"metadatas":[{"type":"character"}],"model_dimension":4}"#,
        )
        .unwrap();

        let loaded = store.load();
        assert!(loaded.documents.is_empty());
    }

    #[test]
    fn test_delete_tolerates_missing_file() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.delete();
        store.delete();
    }
}
