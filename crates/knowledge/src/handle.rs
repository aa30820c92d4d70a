//! Shared handle for concurrent access to a single knowledge base.

use loreweaver_core::AppResult;
use loreweaver_embeddings::EmbeddingBackend;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::store::KnowledgeBase;
use crate::types::SettingMetadata;

/// Cloneable handle around one [`KnowledgeBase`].
///
/// All operations funnel through a single async mutex, so writers are
/// serialized and each mutation's persist completes before the next
/// operation observes the state. Clones share the same underlying
/// store.
#[derive(Debug, Clone)]
pub struct SharedKnowledgeBase {
    inner: Arc<Mutex<KnowledgeBase>>,
}

impl SharedKnowledgeBase {
    /// Open the shared knowledge base; see [`KnowledgeBase::open`].
    pub async fn open(
        backend: EmbeddingBackend,
        snapshot_path: impl Into<PathBuf>,
    ) -> AppResult<Self> {
        let kb = KnowledgeBase::open(backend, snapshot_path).await?;
        Ok(Self {
            inner: Arc::new(Mutex::new(kb)),
        })
    }

    /// Wrap an already-open knowledge base.
    pub fn from_store(kb: KnowledgeBase) -> Self {
        Self {
            inner: Arc::new(Mutex::new(kb)),
        }
    }

    /// Store a new setting; returns a confirmation message.
    pub async fn add_setting(&self, setting_type: &str, content: &str) -> String {
        self.inner.lock().await.add_setting(setting_type, content).await
    }

    /// Up to `top_k` documents most relevant to `query`, nearest first.
    pub async fn search_relevant_settings(&self, query: &str, top_k: usize) -> Vec<String> {
        self.inner.lock().await.search_relevant_settings(query, top_k).await
    }

    /// Delete the setting at `position`; returns whether it existed.
    pub async fn delete_setting(&self, position: usize) -> bool {
        self.inner.lock().await.delete_setting(position).await
    }

    /// Drop all settings and the snapshot file.
    pub async fn clear_all_settings(&self) -> String {
        self.inner.lock().await.clear_all_settings()
    }

    /// All settings as `(document, metadata)` pairs in insertion order.
    pub async fn get_all_settings(&self) -> Vec<(String, SettingMetadata)> {
        self.inner.lock().await.get_all_settings()
    }

    /// Replace the embedding backend, re-encoding the stored documents.
    pub async fn swap_backend(&self, backend: EmbeddingBackend) -> AppResult<()> {
        self.inner.lock().await.swap_backend(backend).await
    }

    /// Number of stored settings.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the store holds no settings.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loreweaver_embeddings::TrigramEncoder;
    use tempfile::TempDir;

    async fn open_shared(temp: &TempDir) -> SharedKnowledgeBase {
        SharedKnowledgeBase::open(
            EmbeddingBackend::Trigram(TrigramEncoder::new(64)),
            temp.path().join("snapshot.json"),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let temp = TempDir::new().unwrap();
        let handle = open_shared(&temp).await;
        let other = handle.clone();

        handle.add_setting("character", "shared fact").await;
        assert_eq!(other.len().await, 1);
        assert_eq!(
            other.get_all_settings().await,
            vec![("shared fact".to_string(), SettingMetadata::character())]
        );
    }

    #[tokio::test]
    async fn test_concurrent_adds_all_land() {
        let temp = TempDir::new().unwrap();
        let handle = open_shared(&temp).await;

        let mut tasks = Vec::new();
        for i in 0..8 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .add_setting("character", &format!("concurrent fact {}", i))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(handle.len().await, 8);
    }
}
