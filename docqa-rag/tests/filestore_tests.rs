//! Persistence tests for the file-backed vector store.

use std::collections::HashMap;

use docqa_rag::{Chunk, FileVectorStore, RagError, SCHEMA_VERSION, VectorStore};
use tempfile::TempDir;

fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        embedding,
        metadata: HashMap::from([("chunk_index".to_string(), "0".to_string())]),
        document_id: "report".to_string(),
        start: 0,
        end: text.chars().count(),
        overlap: 0,
    }
}

#[tokio::test]
async fn collections_survive_reopening() {
    let dir = TempDir::new().unwrap();
    {
        let store = FileVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("financial_db", 2).await.unwrap();
        store
            .add(
                "financial_db",
                &[chunk("a", "Revenue Q1", vec![1.0, 0.0]), chunk("b", "Revenue Q2", vec![0.0, 1.0])],
            )
            .await
            .unwrap();
    }

    let reopened = FileVectorStore::open(dir.path()).await.unwrap();
    assert_eq!(reopened.list_collections().await.unwrap(), vec!["financial_db"]);
    assert_eq!(reopened.count("financial_db").await.unwrap(), 2);

    let results = reopened.search("financial_db", &[0.0, 1.0], 1).await.unwrap();
    assert_eq!(results[0].chunk.id, "b");
    assert_eq!(results[0].chunk.metadata["chunk_index"], "0");
    assert!((results[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn file_layout_is_versioned() {
    let dir = TempDir::new().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.create_collection("docs", 2).await.unwrap();
    store.add("docs", &[chunk("a", "text", vec![1.0, 0.0])]).await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join("docs.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["schema_version"], SCHEMA_VERSION);
    assert_eq!(json["name"], "docs");
    assert_eq!(json["dimensions"], 2);
    assert_eq!(json["records"][0]["id"], "a");
}

#[tokio::test]
async fn unsupported_schema_version_is_skipped_and_preserved() {
    let dir = TempDir::new().unwrap();
    let body = serde_json::json!({
        "schema_version": 99,
        "name": "old",
        "dimensions": 2,
        "records": []
    })
    .to_string();
    std::fs::write(dir.path().join("old.json"), &body).unwrap();

    let store = FileVectorStore::open(dir.path()).await.unwrap();
    assert!(store.list_collections().await.unwrap().is_empty());
    assert_eq!(store.unreadable_collections().await, vec!["old"]);

    let err = store.create_collection("old", 2).await.unwrap_err();
    assert!(matches!(err, RagError::UnreadableCollection(ref name) if name == "old"));
    assert_eq!(std::fs::read_to_string(dir.path().join("old.json")).unwrap(), body);
}

#[tokio::test]
async fn corrupt_file_does_not_block_the_rest_of_the_store() {
    let dir = TempDir::new().unwrap();
    {
        let store = FileVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("good", 2).await.unwrap();
        store.add("good", &[chunk("a", "Revenue Q1", vec![1.0, 0.0])]).await.unwrap();
    }
    std::fs::write(dir.path().join("broken.json"), b"{\"schema_version\": 1, \"records\": [").unwrap();

    let store = FileVectorStore::open(dir.path()).await.unwrap();
    assert_eq!(store.list_collections().await.unwrap(), vec!["good"]);
    assert_eq!(store.count("good").await.unwrap(), 1);
    assert!(!store.collection_exists("broken").await.unwrap());

    store.delete_collection("broken").await.unwrap();
    assert!(!dir.path().join("broken.json").exists());
    assert!(store.unreadable_collections().await.is_empty());

    store.create_collection("broken", 2).await.unwrap();
    assert_eq!(store.count("broken").await.unwrap(), 0);
}

#[tokio::test]
async fn no_temporary_files_are_left_behind() {
    let dir = TempDir::new().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.create_collection("docs", 2).await.unwrap();
    store.add("docs", &[chunk("a", "text", vec![1.0, 0.0])]).await.unwrap();
    store.delete("docs", &["a"]).await.unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["docs.json"]);
}

#[tokio::test]
async fn rejected_batch_changes_nothing_on_disk() {
    let dir = TempDir::new().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.create_collection("docs", 2).await.unwrap();
    store.add("docs", &[chunk("a", "original", vec![1.0, 0.0])]).await.unwrap();
    let before = std::fs::read(dir.path().join("docs.json")).unwrap();

    let conflicting = [chunk("c", "new", vec![0.0, 1.0]), chunk("a", "different", vec![1.0, 0.0])];
    assert!(store.add("docs", &conflicting).await.is_err());

    assert_eq!(std::fs::read(dir.path().join("docs.json")).unwrap(), before);
    assert_eq!(store.count("docs").await.unwrap(), 1);
}

#[tokio::test]
async fn deleting_a_collection_removes_its_file() {
    let dir = TempDir::new().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.create_collection("docs", 2).await.unwrap();
    store.delete_collection("docs").await.unwrap();
    store.delete_collection("docs").await.unwrap();

    assert!(!dir.path().join("docs.json").exists());
    assert!(FileVectorStore::open(dir.path()).await.unwrap().list_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_names_never_touch_the_filesystem() {
    let dir = TempDir::new().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    let err = store.create_collection("../escape", 2).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidCollectionName(_)));
}
