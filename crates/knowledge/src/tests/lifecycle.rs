//! End-to-end lifecycle tests across the full knowledge base stack.

use crate::handle::SharedKnowledgeBase;
use crate::store::KnowledgeBase;
use crate::types::SettingMetadata;
use loreweaver_embeddings::{EmbeddingBackend, TrigramEncoder};
use tempfile::TempDir;

fn trigram_backend(dimension: usize) -> EmbeddingBackend {
    EmbeddingBackend::Trigram(TrigramEncoder::new(dimension))
}

#[tokio::test]
async fn test_setting_lifecycle() {
    let temp = TempDir::new().unwrap();
    let mut kb = KnowledgeBase::open(trigram_backend(256), temp.path().join("snapshot.json"))
        .await
        .unwrap();

    let message = kb.add_setting("character", "Elena wields fire magic").await;
    assert_eq!(message, "Setting stored (type: character, total: 1)");

    let all = kb.get_all_settings();
    assert_eq!(
        all,
        vec![(
            "Elena wields fire magic".to_string(),
            SettingMetadata::character()
        )]
    );

    let hits = kb.search_relevant_settings("fire", 3).await;
    assert_eq!(hits, vec!["Elena wields fire magic".to_string()]);

    assert!(kb.delete_setting(0).await);
    assert!(kb.get_all_settings().is_empty());
    assert!(kb.search_relevant_settings("fire", 3).await.is_empty());
}

#[tokio::test]
async fn test_dimension_stays_consistent_across_mutations() {
    let temp = TempDir::new().unwrap();
    let mut kb = KnowledgeBase::open(trigram_backend(64), temp.path().join("snapshot.json"))
        .await
        .unwrap();

    kb.add_setting("character", "a").await;
    kb.add_setting("world-rule", "b").await;
    assert_eq!(kb.dimension(), 64);

    kb.delete_setting(0).await;
    assert_eq!(kb.dimension(), 64);

    kb.swap_backend(trigram_backend(128)).await.unwrap();
    assert_eq!(kb.dimension(), 128);

    kb.add_setting("plot-outline", "c").await;
    assert_eq!(kb.dimension(), 128);
    assert_eq!(kb.len(), 2);
}

#[tokio::test]
async fn test_restart_preserves_search_results() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("snapshot.json");

    let before = {
        let mut kb = KnowledgeBase::open(trigram_backend(128), path.clone())
            .await
            .unwrap();
        kb.add_setting("character", "Elena wields fire magic").await;
        kb.add_setting("world-rule", "Iron repels spirits").await;
        kb.add_setting("plot-outline", "The siege begins at dawn").await;
        kb.search_relevant_settings("fire magic", 3).await
    };

    let kb = KnowledgeBase::open(trigram_backend(128), path).await.unwrap();
    let after = kb.search_relevant_settings("fire magic", 3).await;

    assert_eq!(before, after);
    assert_eq!(kb.len(), 3);
}

#[tokio::test]
async fn test_delete_preserves_order_of_survivors() {
    let temp = TempDir::new().unwrap();
    let mut kb = KnowledgeBase::open(trigram_backend(64), temp.path().join("snapshot.json"))
        .await
        .unwrap();

    for doc in ["first", "second", "third", "fourth"] {
        kb.add_setting("character", doc).await;
    }

    assert!(kb.delete_setting(1).await);
    assert!(kb.delete_setting(1).await);

    let docs: Vec<String> = kb
        .get_all_settings()
        .into_iter()
        .map(|(doc, _)| doc)
        .collect();
    assert_eq!(docs, vec!["first".to_string(), "fourth".to_string()]);
}

#[tokio::test]
async fn test_shared_handle_full_lifecycle() {
    let temp = TempDir::new().unwrap();
    let handle = SharedKnowledgeBase::open(
        trigram_backend(256),
        temp.path().join("snapshot.json"),
    )
    .await
    .unwrap();

    handle.add_setting("character", "Elena wields fire magic").await;
    handle.add_setting("world-rule", "The moon never sets in winter").await;

    let hits = handle.search_relevant_settings("fire", 1).await;
    assert_eq!(hits, vec!["Elena wields fire magic".to_string()]);

    handle.swap_backend(trigram_backend(512)).await.unwrap();
    let hits = handle.search_relevant_settings("fire", 1).await;
    assert_eq!(hits, vec!["Elena wields fire magic".to_string()]);

    let message = handle.clear_all_settings().await;
    assert_eq!(message, "All settings cleared (2 removed)");
    assert!(handle.is_empty().await);
}
