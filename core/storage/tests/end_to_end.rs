//! End-to-end tests for the provider → client → container → file chain.

use std::sync::Arc;

use axiomstore_common::Error;
use axiomstore_crypto::EncryptionKey;
use axiomstore_storage::prelude::*;
use axiomstore_storage::{
    byte_stream, collect_stream, create_default_registry, BlobContainer, BlobProvider,
    ConnectionDescriptor, CreateFileOptions, LocalTransport, MemoryTransport, ProviderConfig,
};
use tempfile::TempDir;

const URL_BASE: &str = "https://acct.blob.example.net";

fn key(len: usize) -> String {
    EncryptionKey::from_bytes((0..len as u8).collect()).unwrap().to_base64()
}

fn memory_provider(key: Option<&str>) -> (MemoryTransport, BlobProvider) {
    let transport = MemoryTransport::new();
    transport.create_container("docs").unwrap();
    let provider = BlobProvider::with_transport(
        Arc::new(transport.clone()),
        ConnectionDescriptor::memory("end-to-end"),
        URL_BASE,
        key,
    )
    .unwrap();
    (transport, provider)
}

async fn docs(provider: &BlobProvider) -> BlobContainer {
    provider.client().container("docs").await.unwrap().unwrap()
}

#[test]
fn test_key_lengths_gate_construction() {
    for len in [16, 24, 32, 48, 64] {
        let encoded = key(len);
        let provider = BlobProvider::new(ConnectionDescriptor::memory("lengths"), URL_BASE, Some(&encoded));
        assert!(provider.is_ok(), "length {} rejected", len);
    }

    use base64::Engine;
    for len in [0, 1, 15, 17, 31, 33, 63, 65, 128] {
        let encoded = base64::engine::general_purpose::STANDARD.encode(vec![0u8; len]);
        let provider = BlobProvider::new(ConnectionDescriptor::memory("lengths"), URL_BASE, Some(&encoded));
        assert!(
            matches!(provider, Err(Error::InvalidConfiguration(_))),
            "length {} accepted",
            len
        );
    }
}

#[test]
fn test_write_options_require_key_for_encryption() {
    let (_, plain) = memory_provider(None);
    assert!(matches!(
        plain.write_options(true),
        Err(Error::EncryptionNotConfigured)
    ));

    let (_, keyed) = memory_provider(Some(&key(32)));
    let options = keyed.write_options(true).unwrap();
    assert!(options.encryption().is_some());
}

#[tokio::test]
async fn test_scenario_docs_container() {
    let (_, provider) = memory_provider(Some(&key(32)));
    let container = docs(&provider).await;
    let payload = b"The quick brown fox jumps over the lazy dog".to_vec();

    let file = container
        .create_file(
            "a.txt",
            "text/plain",
            Some(byte_stream(payload.clone())),
            CreateFileOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(file.content_type(), "text/plain");
    assert_eq!(file.name(), "a.txt");
    assert_eq!(file.uri().as_str(), "https://acct.blob.example.net/docs/a.txt");

    let mut out = Vec::new();
    file.download_to(&mut out).await.unwrap();
    assert_eq!(out, payload);
}

#[tokio::test]
async fn test_encrypted_upload_roundtrip() {
    let (transport, provider) = memory_provider(Some(&key(64)));
    let container = docs(&provider).await;
    let mut file = container
        .create_file("secret.bin", "application/octet-stream", None, CreateFileOptions::default())
        .await
        .unwrap();

    let data: Vec<u8> = (0..300_000u32).map(|i| (i * 7 % 256) as u8).collect();
    file.upload_from(byte_stream(data.clone()), true).await.unwrap();

    assert_ne!(transport.raw_bytes(file.object()).unwrap(), data);

    let read = collect_stream(file.open_read().await.unwrap()).await.unwrap();
    assert_eq!(read, data);

    let mut out = Vec::new();
    file.download_to(&mut out).await.unwrap();
    assert_eq!(out, data);

    // a second provider with the same key reads it too
    let again = BlobProvider::with_transport(
        Arc::new(transport),
        ConnectionDescriptor::memory("end-to-end"),
        URL_BASE,
        Some(&key(64)),
    )
    .unwrap();
    let file = docs(&again).await.file("secret.bin").await.unwrap().unwrap();
    let read = collect_stream(file.open_read().await.unwrap()).await.unwrap();
    assert_eq!(read, data);
}

#[tokio::test]
async fn test_delete_twice() {
    let (_, provider) = memory_provider(None);
    let container = docs(&provider).await;
    container
        .create_file("a.txt", "text/plain", Some(byte_stream("x")), CreateFileOptions::default())
        .await
        .unwrap();

    assert!(container.delete_file("a.txt").await.unwrap());
    assert!(!container.delete_file("a.txt").await.unwrap());
}

#[tokio::test]
async fn test_missing_lookups_return_none() {
    let (_, provider) = memory_provider(None);
    let client = provider.client();

    assert!(client.container("missing").await.unwrap().is_none());

    let container = docs(&provider).await;
    assert!(container.file("missing").await.unwrap().is_none());
    assert!(!container.file_exists("missing").await.unwrap());
}

#[tokio::test]
async fn test_overwrite_protection() {
    let (_, provider) = memory_provider(None);
    let container = docs(&provider).await;
    let strict = CreateFileOptions::default().no_overwrite();

    container
        .create_file("new.txt", "text/plain", Some(byte_stream("v1")), strict)
        .await
        .unwrap();
    assert!(container.file_exists("new.txt").await.unwrap());

    let err = container
        .create_file("new.txt", "text/plain", Some(byte_stream("v2")), strict)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FileAlreadyExists(_)));

    let file = container.file("new.txt").await.unwrap().unwrap();
    let data = collect_stream(file.open_read().await.unwrap()).await.unwrap();
    assert_eq!(data, b"v1");
}

#[tokio::test]
async fn test_metadata_roundtrip() {
    let (_, provider) = memory_provider(None);
    let container = docs(&provider).await;
    let mut file = container
        .create_file("m.txt", "text/plain", Some(byte_stream("body")), CreateFileOptions::default())
        .await
        .unwrap();

    {
        let metadata = file.metadata().await.unwrap();
        metadata.insert("author".to_string(), "ada".to_string());
        metadata.insert("revision".to_string(), "3".to_string());
    }
    file.save_metadata().await.unwrap();

    let mut fresh = container.file("m.txt").await.unwrap().unwrap();
    let metadata = fresh.metadata().await.unwrap();
    assert_eq!(metadata.len(), 2);
    assert_eq!(metadata.get("author").map(String::as_str), Some("ada"));
    assert_eq!(metadata.get("revision").map(String::as_str), Some("3"));
}

#[tokio::test]
async fn test_local_backend_through_config() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("store");
    LocalTransport::new(&root)
        .unwrap()
        .create_container("docs")
        .await
        .unwrap();

    let config = ProviderConfig::new(ConnectionDescriptor::local(&root), URL_BASE)
        .with_encryption_key(key(16));
    let config_path = dir.path().join("config.json");
    config.save(&config_path).unwrap();

    let loaded = ProviderConfig::load(&config_path).unwrap();
    let provider = BlobProvider::from_config(&loaded, &create_default_registry()).unwrap();
    let container = docs(&provider).await;

    let mut file = container
        .create_file(
            "reports/2024 q1.csv",
            "text/csv",
            Some(byte_stream("a,b\n1,2\n")),
            CreateFileOptions::default().encrypted(),
        )
        .await
        .unwrap();
    assert_eq!(file.content_type(), "text/csv");
    assert!(file.is_encrypted());

    file.metadata()
        .await
        .unwrap()
        .insert("source".to_string(), "ledger".to_string());
    file.save_metadata().await.unwrap();

    // a fresh provider over the same directory sees everything
    let reopened = BlobProvider::from_config(&loaded, &create_default_registry()).unwrap();
    let mut file = docs(&reopened)
        .await
        .file("reports/2024 q1.csv")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(file.content_type(), "text/csv");
    assert_eq!(
        file.metadata().await.unwrap().get("source").map(String::as_str),
        Some("ledger")
    );
    let data = collect_stream(file.open_read().await.unwrap()).await.unwrap();
    assert_eq!(data, b"a,b\n1,2\n");
}

#[tokio::test]
async fn test_file_lookup_arrives_with_attributes() {
    let (_, provider) = memory_provider(None);
    let container = docs(&provider).await;
    let mut created = container
        .create_file("notes.md", "text/markdown", Some(byte_stream("# notes")), CreateFileOptions::default())
        .await
        .unwrap();
    created
        .metadata()
        .await
        .unwrap()
        .insert("owner".to_string(), "ops".to_string());
    created.save_metadata().await.unwrap();
    created.refresh().await.unwrap();

    // no refresh or metadata() call on the looked-up handle
    let file = container.file("notes.md").await.unwrap().unwrap();
    assert_eq!(file.content_type(), "text/markdown");
    assert_eq!(
        file.properties().metadata.get("owner").map(String::as_str),
        Some("ops")
    );
    assert_eq!(file.last_modified(), created.last_modified());
    assert_eq!(file.size(), 7);
}
