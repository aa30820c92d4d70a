//! The knowledge base: an ordered store of setting documents with
//! vector search over their embeddings.
//!
//! Documents, metadata and index rows stay aligned by position; the
//! position is the setting's identifier. Every mutation re-persists the
//! whole state. Mutations are validate-then-commit: all fallible work
//! (encoding, index construction) happens before any in-memory change,
//! so a failure leaves the store exactly as it was.

use loreweaver_core::{AppError, AppResult};
use loreweaver_embeddings::EmbeddingBackend;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::index::FlatIndex;
use crate::persistence::SnapshotStore;
use crate::types::SettingMetadata;

/// Retrieval-augmented store of story settings.
#[derive(Debug)]
pub struct KnowledgeBase {
    backend: EmbeddingBackend,
    index: FlatIndex,
    documents: Vec<String>,
    metadatas: Vec<SettingMetadata>,
    snapshot: SnapshotStore,
}

impl KnowledgeBase {
    /// Open the knowledge base backed by the snapshot at `snapshot_path`,
    /// restoring prior state and reconciling it with `backend`'s
    /// dimension.
    pub async fn open(backend: EmbeddingBackend, snapshot_path: impl Into<PathBuf>) -> AppResult<Self> {
        let snapshot = SnapshotStore::new(snapshot_path);
        let loaded = snapshot.load();

        let mut kb = Self {
            index: FlatIndex::new(backend.dimension()),
            backend,
            documents: loaded.documents,
            metadatas: loaded.metadatas,
            snapshot,
        };

        let restored = match loaded.index {
            Some(index)
                if index.dimension() == kb.backend.dimension()
                    && index.len() == kb.documents.len() =>
            {
                kb.index = index;
                true
            }
            Some(index) => {
                info!(
                    index_dimension = index.dimension(),
                    backend_dimension = kb.backend.dimension(),
                    indexed = index.len(),
                    documents = kb.documents.len(),
                    "Restored index does not match current backend, rebuilding"
                );
                false
            }
            None => kb.documents.is_empty(),
        };

        if !restored {
            kb.rebuild_index().await?;
            kb.persist();
        }

        info!(
            backend = kb.backend.name(),
            dimension = kb.backend.dimension(),
            settings = kb.documents.len(),
            "Knowledge base ready"
        );

        Ok(kb)
    }

    /// Active backend kind, for logs and status output.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Embedding dimension of the active backend.
    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    /// Number of stored settings.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store holds no settings.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Store a new setting and return a confirmation message.
    ///
    /// This never returns an error: a failed encode yields an
    /// explanatory message and leaves the store untouched, because the
    /// caller is a conversational surface that should keep running.
    pub async fn add_setting(&mut self, setting_type: &str, content: &str) -> String {
        match self.try_add(setting_type, content).await {
            Ok(total) => {
                info!(setting_type, total, "Setting stored");
                format!("Setting stored (type: {}, total: {})", setting_type, total)
            }
            Err(e) => {
                warn!(setting_type, "Failed to store setting: {}", e);
                format!("Failed to store setting: {}", e)
            }
        }
    }

    async fn try_add(&mut self, setting_type: &str, content: &str) -> AppResult<usize> {
        // Guard the index/backend dimension invariant before encoding.
        if self.index.dimension() != self.backend.dimension() {
            self.rebuild_index().await?;
        }

        let vectors = self.backend.encode(&[content.to_string()]).await?;

        // Commit point: everything below is infallible appends.
        self.index.add(&vectors)?;
        self.documents.push(content.to_string());
        self.metadatas.push(SettingMetadata::new(setting_type));

        self.persist();
        Ok(self.documents.len())
    }

    /// Return up to `top_k` stored documents most relevant to `query`,
    /// nearest first.
    ///
    /// An empty store short-circuits before any encoding; search
    /// failures degrade to an empty result.
    pub async fn search_relevant_settings(&self, query: &str, top_k: usize) -> Vec<String> {
        if self.documents.is_empty() || top_k == 0 {
            return Vec::new();
        }

        match self.try_search(query, top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Setting search failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_search(&self, query: &str, top_k: usize) -> AppResult<Vec<String>> {
        let vectors = self.backend.encode(&[query.to_string()]).await?;
        let query_vector = vectors
            .first()
            .ok_or_else(|| AppError::Embedding("Backend returned no query vector".to_string()))?;

        let hits = self.index.search(query_vector, top_k)?;

        Ok(hits
            .into_iter()
            .filter_map(|(position, _)| self.documents.get(position).cloned())
            .collect())
    }

    /// Delete the setting at `position`. Returns whether anything was
    /// deleted; out-of-range positions and re-encode failures leave the
    /// store unchanged and return false.
    pub async fn delete_setting(&mut self, position: usize) -> bool {
        if position >= self.documents.len() {
            return false;
        }

        // The flat index has no in-place removal; build a replacement
        // from the survivors before touching anything.
        let survivors: Vec<String> = self
            .documents
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != position)
            .map(|(_, doc)| doc.clone())
            .collect();

        let mut rebuilt = FlatIndex::new(self.backend.dimension());
        if !survivors.is_empty() {
            let vectors = match self.backend.encode(&survivors).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    warn!(position, "Failed to re-encode after delete: {}", e);
                    return false;
                }
            };
            if let Err(e) = rebuilt.add(&vectors) {
                warn!(position, "Failed to rebuild index after delete: {}", e);
                return false;
            }
        }

        self.documents.remove(position);
        self.metadatas.remove(position);
        self.index = rebuilt;

        self.persist();
        info!(position, remaining = self.documents.len(), "Setting deleted");
        true
    }

    /// Drop every stored setting, reset the index and replace the
    /// snapshot with a fresh empty one. Returns a confirmation message.
    pub fn clear_all_settings(&mut self) -> String {
        let removed = self.documents.len();

        self.documents.clear();
        self.metadatas.clear();
        self.index = FlatIndex::new(self.backend.dimension());
        self.snapshot.delete();
        self.persist();

        info!(removed, "All settings cleared");
        format!("All settings cleared ({} removed)", removed)
    }

    /// Every stored setting as `(document, metadata)` pairs in
    /// insertion order; positions line up with `delete_setting`.
    pub fn get_all_settings(&self) -> Vec<(String, SettingMetadata)> {
        self.documents
            .iter()
            .zip(self.metadatas.iter())
            .map(|(document, metadata)| (document.clone(), metadata.clone()))
            .collect()
    }

    /// Replace the embedding backend, re-encoding every stored document
    /// under the new backend so the index dimension matches again.
    ///
    /// All fallible work runs against the incoming backend before any
    /// commit; on failure the previous backend and index stay active
    /// and every subsequent search still sees a reconciled index.
    pub async fn swap_backend(&mut self, backend: EmbeddingBackend) -> AppResult<()> {
        if backend.dimension() == 0 {
            return Err(AppError::Config(format!(
                "Embedding backend '{}' declares dimension 0",
                backend.name()
            )));
        }

        let mut rebuilt = FlatIndex::new(backend.dimension());
        if !self.documents.is_empty() {
            let vectors = backend.encode(&self.documents).await?;
            rebuilt.add(&vectors)?;
        }

        let previous = self.backend.name();
        self.backend = backend;
        self.index = rebuilt;
        self.persist();

        info!(
            from = previous,
            to = self.backend.name(),
            dimension = self.backend.dimension(),
            "Embedding backend swapped"
        );
        Ok(())
    }

    /// Re-encode all documents and rebuild the index at the backend's
    /// dimension. Validate-then-commit: the live index is only replaced
    /// once the rebuilt one is complete.
    async fn rebuild_index(&mut self) -> AppResult<()> {
        let mut rebuilt = FlatIndex::new(self.backend.dimension());

        if !self.documents.is_empty() {
            let vectors = self.backend.encode(&self.documents).await?;
            rebuilt.add(&vectors)?;
        }

        self.index = rebuilt;
        Ok(())
    }

    fn persist(&self) {
        self.snapshot.save(
            &self.documents,
            &self.metadatas,
            Some(&self.index),
            self.backend.dimension(),
        );
    }
}
