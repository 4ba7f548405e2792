//! Document storage on disk

use rankfuse::config::Config;
use rankfuse::embedding::VectorIndex;
use rankfuse::retrieval::{DocumentId, DocumentStore, StoredDocument};
use rankfuse::storage::StorageManager;
use tempfile::TempDir;

#[tokio::test]
async fn test_documents_survive_reopen() {
    let temp = TempDir::new().unwrap();

    {
        let storage = StorageManager::new(temp.path().to_path_buf()).unwrap();
        storage
            .database
            .upsert_document(
                &StoredDocument::new("notes-1", "Meeting notes", "notes/1.md"),
                Some(&[0.6, 0.8][..]),
            )
            .unwrap();
    }

    let storage = StorageManager::new(temp.path().to_path_buf()).unwrap();
    let store = storage.document_store();

    let document = store.fetch(&DocumentId::new("notes-1")).await.unwrap().unwrap();
    assert_eq!(document.summary, "Meeting notes");
    assert_eq!(document.source_path, "notes/1.md");

    assert!(store
        .fetch(&DocumentId::new("notes-2"))
        .await
        .unwrap()
        .is_none());

    let stats = storage.stats().unwrap();
    assert_eq!(stats.db.document_count, 1);
    assert_eq!(stats.db.embedded_count, 1);
}

#[tokio::test]
async fn test_concurrent_fetches() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::new(temp.path().to_path_buf()).unwrap();

    for i in 0..20 {
        storage
            .database
            .upsert_document(
                &StoredDocument::new(format!("doc-{}", i), format!("Doc {}", i), "bulk"),
                None,
            )
            .unwrap();
    }

    let store = storage.document_store();
    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .fetch(&DocumentId::new(format!("doc-{}", i)))
                .await
                .unwrap()
                .map(|d| d.summary)
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), Some(format!("Doc {}", i)));
    }
}

#[test]
fn test_vector_index_rebuilt_from_stored_embeddings() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::new(temp.path().to_path_buf()).unwrap();

    let vectors: [(&str, [f32; 3]); 3] = [
        ("east", [1.0, 0.0, 0.0]),
        ("north", [0.0, 1.0, 0.0]),
        ("up", [0.0, 0.0, 1.0]),
    ];
    for (id, vector) in &vectors {
        storage
            .database
            .upsert_document(&StoredDocument::new(*id, *id, "compass"), Some(&vector[..]))
            .unwrap();
    }

    let index = VectorIndex::from_embeddings(
        3,
        &Config::default().indexing,
        storage.database.embeddings().unwrap(),
    )
    .unwrap();

    assert_eq!(index.len(), 3);
    let nearest = index.search(&[0.1, 0.9, 0.0], 1).unwrap();
    assert_eq!(nearest[0].id.as_str(), "north");
}
