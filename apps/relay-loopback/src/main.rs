//! Loopback transfer: upload a file to an in-memory log, then download it
//! back into a directory and verify it.
//!
//! Usage: `chunkrelay-loopback <file> [out-dir]`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chunkrelay_relay::{Downloader, RelayConfig, TransferEvent, UploadOptions, Uploader};
use chunkrelay_stream::{MemoryLog, MemoryLogOptions, MemoryMetaStore};
use chunkrelay_transfer::digest_file;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const FLOW_CONTROL_EVERY: u64 = 16;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chunkrelay=debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let source = PathBuf::from(
        args.next()
            .context("usage: chunkrelay-loopback <file> [out-dir]")?,
    );
    let out_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("chunkrelay"));

    let config = RelayConfig::load()?;
    config.validate()?;

    let log = MemoryLog::with_options(MemoryLogOptions {
        flow_control_every: Some(FLOW_CONTROL_EVERY),
        idle_heartbeat: Some(Duration::from_millis(config.read_timeout_ms / 2 + 1)),
    });
    let store = MemoryMetaStore::new();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    let (events_tx, mut events_rx) = mpsc::channel(64);
    let reporter = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            log_event(&event);
        }
    });

    let upload = Uploader::new(&log, &store, &config, cancel.clone())
        .with_events(events_tx.clone())
        .upload(&source, &UploadOptions::default())
        .await
        .with_context(|| format!("uploading {}", source.display()))?;

    let (path, report) = Downloader::new(&log, &store, &config, cancel)
        .with_events(events_tx)
        .download_to_dir(&upload.meta.id, &out_dir)
        .await
        .with_context(|| format!("downloading {}", upload.meta.id))?;
    let _ = reporter.await;

    let algorithm = config.digest()?;
    let written = digest_file(&path, algorithm)?;
    tracing::info!(
        file_id = %report.file_id,
        path = %path.display(),
        parts = report.parts_written,
        bytes = report.bytes_written,
        recoveries = report.recoveries,
        flow_control = report.flow_control_acks,
        verification = ?report.verification,
        digest = %written,
        "loopback finished"
    );

    if !report.verification.is_verified() {
        anyhow::bail!("verification failed: {:?}", report.verification);
    }
    Ok(())
}

fn log_event(event: &TransferEvent) {
    match event {
        TransferEvent::PartPublished {
            part_number,
            parts,
            bytes_per_second,
            ..
        } => tracing::debug!(part = part_number, parts, rate = bytes_per_second, "published"),
        TransferEvent::PartAccepted {
            part_number,
            parts,
            bytes_per_second,
            ..
        } => tracing::debug!(part = part_number, parts, rate = bytes_per_second, "accepted"),
        TransferEvent::FlowControlAcknowledged { .. } => {}
        TransferEvent::Recovering {
            reason,
            resume_sequence,
            retries_left,
            ..
        } => tracing::info!(%reason, resume = resume_sequence, retries_left, "recovering"),
        TransferEvent::Completed { file_id, bytes } => {
            tracing::info!(file_id = %file_id, bytes, "transfer completed")
        }
        TransferEvent::Failed { file_id, error } => {
            tracing::warn!(file_id = %file_id, %error, "transfer failed")
        }
    }
}
