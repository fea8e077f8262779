//! Verified download with ordered delivery and bounded self-recovery.

use std::path::{Path, PathBuf};

use chunkrelay_protocol::{DigestEntry, FileMeta, PartMeta, meta_key, part_subject};
use chunkrelay_stream::{DeliverFrom, LogMessage, MessageLog, MetaStore, Subscription};
use chunkrelay_transfer::{
    DigestAlgorithm, Digester, ThroughputMeter, decode_payload, digest_bytes, validate_output_name,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{AckPolicy, RelayConfig};
use crate::error::RelayError;
use crate::session::{Anomaly, TransferSession};
use crate::types::{DownloadReport, TransferEvent, Verification};

/// Rebuilds files from a message log.
pub struct Downloader<'a> {
    log: &'a dyn MessageLog,
    store: &'a dyn MetaStore,
    config: &'a RelayConfig,
    cancel: CancellationToken,
    events: Option<mpsc::Sender<TransferEvent>>,
}

impl<'a> Downloader<'a> {
    pub fn new(
        log: &'a dyn MessageLog,
        store: &'a dyn MetaStore,
        config: &'a RelayConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            log,
            store,
            config,
            cancel,
            events: None,
        }
    }

    /// Sends progress events to `tx`. The receiver must be drained.
    pub fn with_events(mut self, tx: mpsc::Sender<TransferEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Fetches a complete file record.
    pub async fn fetch_meta(&self, file_id: &str) -> Result<FileMeta, RelayError> {
        let data = self
            .store
            .get(&meta_key(file_id))
            .await?
            .ok_or_else(|| RelayError::FileNotFound(file_id.to_string()))?;
        let meta = FileMeta::from_json(&data)?;
        if !meta.is_complete() {
            return Err(RelayError::UploadIncomplete(file_id.to_string()));
        }
        Ok(meta)
    }

    /// Finds the most recent complete record named `name`.
    pub async fn locate(&self, name: &str) -> Result<FileMeta, RelayError> {
        let mut best: Option<FileMeta> = None;
        for key in self.store.keys().await? {
            let Some(data) = self.store.get(&key).await? else {
                continue;
            };
            let meta = match FileMeta::from_json(&data) {
                Ok(meta) => meta,
                Err(e) => {
                    debug!(key = %key, error = %e, "skipping unreadable record");
                    continue;
                }
            };
            if meta.name != name || !meta.is_complete() {
                continue;
            }
            if best.as_ref().is_none_or(|b| meta.file_date > b.file_date) {
                best = Some(meta);
            }
        }
        best.ok_or_else(|| RelayError::FileNotFound(name.to_string()))
    }

    /// Downloads file `file_id` into `sink`.
    pub async fn download<W>(&self, file_id: &str, sink: &mut W) -> Result<DownloadReport, RelayError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let meta = self.fetch_meta(file_id).await?;
        self.download_meta(&meta, sink).await
    }

    /// Downloads file `file_id` into `dir`, named after its record.
    pub async fn download_to_dir(
        &self,
        file_id: &str,
        dir: &Path,
    ) -> Result<(PathBuf, DownloadReport), RelayError> {
        let meta = self.fetch_meta(file_id).await?;
        validate_output_name(&meta.name)?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&meta.name);
        let mut file = tokio::fs::File::create(&path).await?;
        let report = self.download_meta(&meta, &mut file).await?;
        file.sync_all().await?;
        Ok((path, report))
    }

    /// Downloads the file described by `meta` into `sink`.
    ///
    /// Parts are written strictly in order. Output already written is never
    /// rolled back: on failure the error reports how much was written, and
    /// a whole-file digest mismatch is reported in the returned
    /// [`Verification`].
    pub async fn download_meta<W>(
        &self,
        meta: &FileMeta,
        sink: &mut W,
    ) -> Result<DownloadReport, RelayError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        match self.run(meta, sink).await {
            Ok(report) => Ok(report),
            Err(e) => {
                let _ = sink.flush().await;
                self.emit(TransferEvent::Failed {
                    file_id: meta.id.clone(),
                    error: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    async fn run<W>(&self, meta: &FileMeta, sink: &mut W) -> Result<DownloadReport, RelayError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        self.config.validate()?;
        let expected = meta
            .digest()
            .ok_or_else(|| RelayError::UploadIncomplete(meta.id.clone()))?;
        let algorithm: DigestAlgorithm = expected.algorithm.parse()?;
        let subject = part_subject(&self.config.part_prefix, &meta.id);
        let read_timeout = self.config.read_timeout();
        let max_idle = self.config.max_idle();

        let mut whole = Digester::with_algorithm(algorithm);
        let mut meter = ThroughputMeter::default();
        let origin = meta
            .first_sequence
            .map_or(DeliverFrom::All, DeliverFrom::Sequence);
        let mut session = TransferSession::new(self.config.retry_budget).with_origin(origin);
        let mut flow_control_acks = 0u64;

        info!(
            file_id = %meta.id,
            name = %meta.name,
            parts = meta.parts,
            length = meta.length,
            from = ?origin,
            "download starting"
        );
        let mut sub = self.log.subscribe(&subject, origin).await?;
        session.start_reading();
        let mut last_activity = Instant::now();

        while !session.is_complete(meta.parts) {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                r = sub.next_message(read_timeout) => Some(r),
            };
            let msg = match next {
                None => {
                    close(&mut *sub).await;
                    session.fail();
                    return Err(RelayError::Cancelled);
                }
                Some(Ok(msg)) if msg.is_heartbeat() => None,
                Some(Ok(msg)) => Some(msg),
                Some(Err(e)) if e.is_timeout() => None,
                Some(Err(e)) => {
                    close(&mut *sub).await;
                    session.fail();
                    return Err(e.into());
                }
            };
            // Heartbeats and read timeouts both count as idle time.
            let Some(msg) = msg else {
                if last_activity.elapsed() >= max_idle {
                    info!(
                        file_id = %meta.id,
                        received = session.parts_written(),
                        parts = meta.parts,
                        "stream idle, ending download"
                    );
                    break;
                }
                continue;
            };
            last_activity = Instant::now();

            if msg.is_flow_control() {
                if let Some(reply_to) = &msg.reply_to {
                    if let Err(e) = self.log.reply(reply_to, Vec::new()).await {
                        close(&mut *sub).await;
                        session.fail();
                        return Err(e.into());
                    }
                    flow_control_acks += 1;
                    debug!(file_id = %meta.id, "flow control acknowledged");
                    self.emit(TransferEvent::FlowControlAcknowledged {
                        file_id: meta.id.clone(),
                    })
                    .await;
                }
                continue;
            }

            match check_part(&session, meta, &msg) {
                Ok(data) => {
                    if let Err(e) = sink.write_all(&data).await {
                        close(&mut *sub).await;
                        session.fail();
                        return Err(e.into());
                    }
                    whole.update(&data);
                    session.accept(msg.stream_sequence, data.len() as u64);
                    meter.record(data.len() as u64);
                    if self.config.ack_policy == AckPolicy::Explicit
                        && let Err(e) = sub.ack(&msg).await
                    {
                        warn!(seq = msg.stream_sequence, error = %e, "ack failed");
                    }
                    debug!(
                        file_id = %meta.id,
                        part = session.parts_written(),
                        seq = msg.stream_sequence,
                        "part accepted"
                    );
                    self.emit(TransferEvent::PartAccepted {
                        file_id: meta.id.clone(),
                        part_number: session.parts_written(),
                        parts: meta.parts,
                        bytes_written: session.bytes_written(),
                        bytes_per_second: meter.bytes_per_second(),
                    })
                    .await;
                }
                Err(anomaly) => {
                    warn!(
                        file_id = %meta.id,
                        seq = msg.stream_sequence,
                        delivery = msg.consumer_sequence,
                        %anomaly,
                        "anomaly, recovering"
                    );
                    if let Err(e) = sub.term(&msg).await {
                        warn!(seq = msg.stream_sequence, error = %e, "term failed");
                    }
                    close(&mut *sub).await;

                    let Some(from) = session.recover() else {
                        error!(
                            file_id = %meta.id,
                            recoveries = session.recoveries(),
                            parts_written = session.parts_written(),
                            "retry budget exhausted"
                        );
                        sink.flush().await?;
                        return Err(RelayError::TooManyMismatches {
                            attempts: session.recoveries(),
                            parts_written: session.parts_written(),
                            bytes_written: session.bytes_written(),
                        });
                    };

                    let resume_sequence = match from {
                        DeliverFrom::Sequence(seq) => seq,
                        DeliverFrom::All => 1,
                    };
                    info!(
                        file_id = %meta.id,
                        resume = resume_sequence,
                        next_part = session.expected_part(),
                        retries_left = session.retries_left(),
                        "resubscribing"
                    );
                    self.emit(TransferEvent::Recovering {
                        file_id: meta.id.clone(),
                        reason: anomaly.to_string(),
                        resume_sequence,
                        retries_left: session.retries_left(),
                    })
                    .await;
                    sub = self.log.subscribe(&subject, from).await?;
                    session.start_reading();
                }
            }
        }

        close(&mut *sub).await;
        sink.flush().await?;

        let actual = whole.value();
        let verification = if !session.is_complete(meta.parts) {
            Verification::Incomplete {
                expected_parts: meta.parts,
                received_parts: session.parts_written(),
            }
        } else if DigestEntry::new(algorithm.name(), actual.clone()).matches(&expected) {
            Verification::Verified
        } else {
            warn!(
                file_id = %meta.id,
                expected = %expected.value,
                actual = %actual,
                "whole-file digest mismatch"
            );
            Verification::DigestMismatch {
                expected: expected.value.clone(),
                actual: actual.clone(),
            }
        };
        session.finish();

        info!(
            file_id = %meta.id,
            parts = session.parts_written(),
            bytes = session.bytes_written(),
            recoveries = session.recoveries(),
            verified = verification.is_verified(),
            "download finished"
        );
        self.emit(TransferEvent::Completed {
            file_id: meta.id.clone(),
            bytes: session.bytes_written(),
        })
        .await;

        Ok(DownloadReport {
            file_id: meta.id.clone(),
            name: meta.name.clone(),
            parts_written: session.parts_written(),
            bytes_written: session.bytes_written(),
            first_sequence: session.first_sequence(),
            last_sequence: session.last_sequence(),
            recoveries: session.recoveries(),
            flow_control_acks,
            digest: format!("{}={actual}", algorithm.name()),
            verification,
        })
    }

    async fn emit(&self, event: TransferEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}

/// Runs the order, layout, and digest checks on one data message and
/// returns the decoded bytes.
fn check_part(
    session: &TransferSession,
    meta: &FileMeta,
    msg: &LogMessage,
) -> Result<Vec<u8>, Anomaly> {
    let part =
        PartMeta::from_headers(&msg.headers).map_err(|e| Anomaly::Malformed(e.to_string()))?;
    if part.file_id != meta.id {
        return Err(Anomaly::Malformed(format!(
            "part belongs to file {}",
            part.file_id
        )));
    }

    session.check_order(msg.consumer_sequence, part.part_number)?;

    let (Some(expected_length), Some(expected_start)) = (
        meta.part_length(part.part_number),
        meta.part_start(part.part_number),
    ) else {
        return Err(Anomaly::Malformed(format!(
            "part {} beyond the {} parts on record",
            part.part_number, meta.parts
        )));
    };
    if part.start != expected_start {
        return Err(Anomaly::Offset {
            part: part.part_number,
            expected: expected_start,
            actual: part.start,
        });
    }
    if part.length != expected_length {
        return Err(Anomaly::Length {
            part: part.part_number,
            expected: expected_length,
            actual: part.length,
        });
    }
    let payload_length = msg.payload.len() as u64;
    if part.payload_length() != payload_length {
        return Err(Anomaly::Payload {
            part: part.part_number,
            expected: part.payload_length(),
            actual: payload_length,
        });
    }

    let data = decode_payload(part.content_encoding, &msg.payload, expected_length as usize)
        .map_err(|e| Anomaly::Decode {
            part: part.part_number,
            reason: e.to_string(),
        })?;
    if data.len() as u64 != expected_length {
        return Err(Anomaly::Length {
            part: part.part_number,
            expected: expected_length,
            actual: data.len() as u64,
        });
    }

    let algorithm = part
        .digest
        .algorithm
        .parse::<DigestAlgorithm>()
        .map_err(|e| Anomaly::Malformed(e.to_string()))?;
    let actual = DigestEntry::new(algorithm.name(), digest_bytes(algorithm, &data));
    if !actual.matches(&part.digest) {
        return Err(Anomaly::Digest {
            part: part.part_number,
        });
    }
    Ok(data)
}

async fn close(sub: &mut dyn Subscription) {
    if let Err(e) = sub.unsubscribe().await {
        warn!(error = %e, "unsubscribe failed");
    }
}
