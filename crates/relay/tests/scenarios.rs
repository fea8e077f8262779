//! End-to-end transfer scenarios over the in-memory log.

use std::path::{Path, PathBuf};

use chunkrelay_relay::{
    Downloader, RelayConfig, RelayError, UploadOptions, Uploader, Verification,
};
use chunkrelay_stream::{Fault, MemoryLog, MemoryMetaStore, MetaStore};
use chunkrelay_transfer::{DigestAlgorithm, digest_file};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn config(part_size: u64) -> RelayConfig {
    RelayConfig {
        part_size,
        read_timeout_ms: 100,
        max_idle_ms: 500,
        ..RelayConfig::default()
    }
}

fn write_source(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

#[tokio::test]
async fn scenario_a_three_parts_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let data = b"abcdefghijklmnopqrstuvwxy".to_vec();
    let source = write_source(tmp.path(), "letters.txt", &data);
    let log = MemoryLog::new();
    let store = MemoryMetaStore::new();
    let config = config(10);

    let upload = Uploader::new(&log, &store, &config, CancellationToken::new())
        .upload(&source, &UploadOptions::default())
        .await
        .unwrap();
    assert_eq!(upload.meta.parts, 3);
    assert_eq!(upload.meta.part_size, 10);
    assert_eq!(upload.meta.last_part_size, 5);

    let out_dir = tmp.path().join("out");
    let (path, report) = Downloader::new(&log, &store, &config, CancellationToken::new())
        .download_to_dir(&upload.meta.id, &out_dir)
        .await
        .unwrap();
    assert_eq!(report.verification, Verification::Verified);
    assert_eq!(std::fs::read(&path).unwrap(), data);
    assert_eq!(
        digest_file(&path, DigestAlgorithm::Sha256).unwrap(),
        digest_file(&source, DigestAlgorithm::Sha256).unwrap()
    );
}

#[tokio::test]
async fn scenario_b_corrupt_part_recovers() {
    let tmp = TempDir::new().unwrap();
    let data = b"abcdefghijklmnopqrstuvwxy".to_vec();
    let source = write_source(tmp.path(), "letters.txt", &data);
    let log = MemoryLog::new();
    let store = MemoryMetaStore::new();
    let config = config(10);

    let upload = Uploader::new(&log, &store, &config, CancellationToken::new())
        .upload(&source, &UploadOptions::default())
        .await
        .unwrap();
    log.inject_fault(2, Fault::Corrupt, 1).await;

    let mut out = Vec::new();
    let report = Downloader::new(&log, &store, &config, CancellationToken::new())
        .download(&upload.meta.id, &mut out)
        .await
        .unwrap();
    assert_eq!(out, data);
    assert_eq!(report.recoveries, 1);
    assert_eq!(report.verification, Verification::Verified);
    assert_eq!(log.terms().await, vec![2]);
    assert_eq!(log.acks().await, vec![1, 2, 3]);
}

#[tokio::test]
async fn scenario_c_budget_exhausted() {
    let tmp = TempDir::new().unwrap();
    let data: Vec<u8> = (0..50u8).collect();
    let source = write_source(tmp.path(), "numbers.bin", &data);
    let log = MemoryLog::new();
    let store = MemoryMetaStore::new();
    let config = RelayConfig {
        retry_budget: 1,
        ..config(10)
    };

    let upload = Uploader::new(&log, &store, &config, CancellationToken::new())
        .upload(&source, &UploadOptions::default())
        .await
        .unwrap();
    log.inject_fault(2, Fault::Corrupt, 1).await;
    log.inject_fault(3, Fault::Corrupt, 1).await;

    let mut out = Vec::new();
    let err = Downloader::new(&log, &store, &config, CancellationToken::new())
        .download(&upload.meta.id, &mut out)
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("too many mismatches"));
    let RelayError::TooManyMismatches { bytes_written, .. } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*bytes_written, out.len() as u64);
    assert_eq!(out, &data[..20]);
}

#[tokio::test]
async fn scenario_d_empty_file_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let source = write_source(tmp.path(), "empty.bin", b"");
    let log = MemoryLog::new();
    let store = MemoryMetaStore::new();
    let config = config(10);

    let err = Uploader::new(&log, &store, &config, CancellationToken::new())
        .upload(&source, &UploadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::EmptySource(_)));
    assert!(store.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn large_compressed_file_with_sha512() {
    let tmp = TempDir::new().unwrap();
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 97) as u8).collect();
    let source = write_source(tmp.path(), "big.bin", &data);
    let log = MemoryLog::new();
    let store = MemoryMetaStore::new();
    let config = RelayConfig {
        compression: Some(chunkrelay_protocol::ContentEncoding::Zstd),
        digest_algorithm: "SHA-512".into(),
        ..config(16 * 1024)
    };

    let upload = Uploader::new(&log, &store, &config, CancellationToken::new())
        .upload(&source, &UploadOptions::default())
        .await
        .unwrap();
    assert_eq!(upload.meta.digest_algorithm.as_deref(), Some("SHA-512"));
    assert_eq!(upload.meta.parts, 13);

    let mut out = Vec::new();
    let report = Downloader::new(&log, &store, &config, CancellationToken::new())
        .download(&upload.meta.id, &mut out)
        .await
        .unwrap();
    assert!(report.verification.is_verified());
    assert_eq!(out, data);
}
