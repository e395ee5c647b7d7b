//! Integration tests for partition storage, build/load and the catalog.

mod common;

use common::mocks::{MapSource, MockEmbedder};
use common::{annual_reports, build_catalog, index_builder, keys, COLLECTION};
use partition_rag::partition::{IndexBuilder, IndexConfig, PartitionKey, PartitionStore};
use partition_rag::types::{AppError, Document};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_exists_only_after_build() {
    let dir = TempDir::new().unwrap();
    let store = PartitionStore::new(dir.path(), COLLECTION);
    let key = PartitionKey::from("2021");
    let docs = vec![Document::new("a", "Revenue grew in 2021.")];

    assert!(!store.exists(&key).await.unwrap());
    index_builder()
        .build(&key, docs.clone(), store.open(&key).await.unwrap())
        .await
        .unwrap();
    assert!(store.exists(&key).await.unwrap());

    // Rebuilding over a committed partition is rejected.
    let err = index_builder()
        .build(&key, docs.clone(), store.open(&key).await.unwrap())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::IndexBuild { ref key, .. } if key == "2021"));

    // Purging makes room for a fresh build.
    store.purge(&key).await.unwrap();
    assert!(!store.exists(&key).await.unwrap());
    index_builder()
        .build(&key, docs, store.open(&key).await.unwrap())
        .await
        .unwrap();
    assert!(store.exists(&key).await.unwrap());
}

#[tokio::test]
async fn test_build_then_load_same_top_source() {
    let dir = TempDir::new().unwrap();
    let store = PartitionStore::new(dir.path(), COLLECTION);
    let key = PartitionKey::from("2022");
    let docs = vec![
        Document::new("bookings", "Gross bookings increased for mobility and delivery."),
        Document::new("risk", "Regulation of driver classification remains a risk.")
            .with_metadata("source", "UBER_2022.html"),
    ];
    let question = "what are the regulation risks for driver classification";

    let built = index_builder()
        .build(&key, docs, store.open(&key).await.unwrap())
        .await
        .unwrap();
    let before = built.retrieve(question, 1).await.unwrap();
    drop(built);

    let loaded = index_builder()
        .load(store.open(&key).await.unwrap())
        .await
        .unwrap();
    let after = loaded.retrieve(question, 1).await.unwrap();

    assert_eq!(before.len(), 1);
    assert_eq!(before[0].chunk_id, after[0].chunk_id);
    assert_eq!(before[0].text, after[0].text);
    assert!(after[0].text.contains("driver classification"));
    assert_eq!(after[0].metadata["year"], "2022");
    assert_eq!(after[0].metadata["source"], "UBER_2022.html");
    assert_eq!(loaded.manifest().embedding_model, "mock-embedder");
    assert_eq!(loaded.manifest().dimensions, MockEmbedder::DIMS);
}

#[tokio::test]
async fn test_load_without_build_fails() {
    let dir = TempDir::new().unwrap();
    let store = PartitionStore::new(dir.path(), COLLECTION);
    let key = PartitionKey::from("2019");

    let err = index_builder()
        .load(store.open(&key).await.unwrap())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::IndexLoad { .. }));
}

#[tokio::test]
async fn test_load_rejects_truncated_collection() {
    let dir = TempDir::new().unwrap();
    let store = PartitionStore::new(dir.path(), COLLECTION);
    let key = PartitionKey::from("2020");
    index_builder()
        .build(
            &key,
            vec![Document::new("a", "text")],
            store.open(&key).await.unwrap(),
        )
        .await
        .unwrap();

    // Truncate the committed vectors: the collection no longer matches its manifest.
    let vectors = store.location(&key).join(COLLECTION).join("vectors.json");
    tokio::fs::write(&vectors, b"[]").await.unwrap();

    let err = index_builder()
        .load(store.open(&key).await.unwrap())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::IndexLoad { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_uncommitted_build_is_replaced() {
    let dir = TempDir::new().unwrap();
    let store = PartitionStore::new(dir.path(), COLLECTION);
    let key = PartitionKey::from("2021");
    index_builder()
        .build(
            &key,
            vec![Document::new("old", "stale text from an interrupted run")],
            store.open(&key).await.unwrap(),
        )
        .await
        .unwrap();
    // Simulate a crash before the manifest was committed.
    tokio::fs::remove_file(store.manifest_path(&key)).await.unwrap();
    assert!(!store.exists(&key).await.unwrap());

    let rebuilt = index_builder()
        .build(
            &key,
            vec![Document::new("new", "fresh text")],
            store.open(&key).await.unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rebuilt.len(), 1);
    let hits = rebuilt.retrieve("fresh text", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "fresh text");
}

#[tokio::test]
async fn test_catalog_reports_corrupt_partition() {
    let dir = TempDir::new().unwrap();
    let years = ["2022", "2021", "2020", "2019"];
    let all = keys(&years);

    let first = build_catalog(dir.path(), annual_reports(&years), &all).await;
    assert_eq!(first.len(), 4);
    assert!(first.failures().is_empty());
    drop(first);

    let store = PartitionStore::new(dir.path(), COLLECTION);
    let corrupt = PartitionKey::from("2020");
    tokio::fs::write(
        store.location(&corrupt).join(COLLECTION).join("vectors.json"),
        b"{ not json",
    )
    .await
    .unwrap();

    // Nothing is rebuilt on the second run, so an empty source is fine.
    let second = build_catalog(dir.path(), MapSource::default(), &all).await;
    assert_eq!(second.keys().map(|k| k.as_str()).collect::<Vec<_>>(), ["2022", "2021", "2019"]);
    assert_eq!(second.failures().len(), 1);
    assert_eq!(second.failures()[0].key, corrupt);
    assert!(matches!(second.failures()[0].error, AppError::IndexLoad { .. }));
}

#[tokio::test]
async fn test_storage_unavailable_is_reported_per_partition() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("storage");
    std::fs::write(&blocker, b"a file, not a directory").unwrap();

    // An uninspectable location is an error, never "not built yet".
    let store = PartitionStore::new(&blocker, COLLECTION);
    assert!(matches!(
        store.exists(&PartitionKey::from("2021")).await,
        Err(AppError::StorageUnavailable { ref key, .. }) if key == "2021"
    ));

    let catalog = build_catalog(&blocker, annual_reports(&["2021"]), &keys(&["2021"])).await;
    assert!(catalog.is_empty());
    assert!(matches!(
        catalog.failures()[0].error,
        AppError::StorageUnavailable { .. }
    ));
}

#[tokio::test]
async fn test_duplicate_document_ids_rejected() {
    let dir = TempDir::new().unwrap();
    let store = PartitionStore::new(dir.path(), COLLECTION);
    let key = PartitionKey::from("2021");
    let docs = vec![
        Document::new("report", "Revenue grew in 2021."),
        Document::new("report", "Revenue grew in 2021."),
    ];

    let err = index_builder()
        .build(&key, docs, store.open(&key).await.unwrap())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, AppError::IndexBuild { ref reason, .. } if reason.contains("report")));
    assert!(!store.exists(&key).await.unwrap());

    // Distinct ids with identical text build and load cleanly.
    let docs = vec![
        Document::new("report", "Revenue grew in 2021."),
        Document::new("report-copy", "Revenue grew in 2021."),
    ];
    index_builder()
        .build(&key, docs, store.open(&key).await.unwrap())
        .await
        .unwrap();
    let loaded = index_builder()
        .load(store.open(&key).await.unwrap())
        .await
        .unwrap();
    assert_eq!(loaded.len(), 2);
}

#[tokio::test]
async fn test_builder_rejects_bad_chunking() {
    let config = IndexConfig {
        chunk_size: 100,
        chunk_overlap: 150,
        ..IndexConfig::default()
    };
    assert!(matches!(
        IndexBuilder::new(Arc::new(MockEmbedder::new()), config),
        Err(AppError::Configuration(_))
    ));
}
