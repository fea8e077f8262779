//! Chunked upload: read, digest, optionally compress, publish parts, then
//! store the file record.

use std::path::Path;

use chunkrelay_protocol::{DEFAULT_CONTENT_TYPE, DigestEntry, FileMeta, PartMeta, meta_key, part_subject};
use chunkrelay_stream::{MessageLog, MetaStore};
use chunkrelay_transfer::{ChunkReader, Digester, ThroughputMeter, digest_bytes};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::source::{detect_content_type, inspect_source};
use crate::types::{TransferEvent, UploadOptions, UploadReport};

/// Publishes one file at a time to a message log and metadata store.
pub struct Uploader<'a> {
    log: &'a dyn MessageLog,
    store: &'a dyn MetaStore,
    config: &'a RelayConfig,
    cancel: CancellationToken,
    events: Option<mpsc::Sender<TransferEvent>>,
}

impl<'a> Uploader<'a> {
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

    /// Uploads `path`.
    ///
    /// Parts are published in order starting at 1. The file record, with
    /// the whole-file digest, is written only after every part was
    /// published and the byte count matched the file length. Any failure
    /// leaves no record behind.
    pub async fn upload(
        &self,
        path: &Path,
        options: &UploadOptions,
    ) -> Result<UploadReport, RelayError> {
        match self.run(path, options).await {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "upload failed");
                self.emit(TransferEvent::Failed {
                    file_id: String::new(),
                    error: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    async fn run(&self, path: &Path, options: &UploadOptions) -> Result<UploadReport, RelayError> {
        self.config.validate()?;
        self.check_cancelled()?;

        let source = inspect_source(path)?;
        let algorithm = self.config.digest()?;
        let codec = self.config.codec();

        let name = options.name.clone().unwrap_or_else(|| source.name.clone());
        let content_type = options
            .content_type
            .clone()
            .or_else(|| detect_content_type(path).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let mut meta = FileMeta::new(
            name,
            content_type,
            source.length,
            self.config.part_size,
            source.modified,
        )?;
        if let Some(description) = &options.description {
            meta = meta.with_description(description.clone());
        }
        let subject = part_subject(&self.config.part_prefix, &meta.id);

        info!(
            file_id = %meta.id,
            name = %meta.name,
            length = meta.length,
            parts = meta.parts,
            compression = ?codec.map(|c| c.encoding()),
            "upload starting"
        );

        let part_size = self.config.part_size as usize;
        let mut reader = tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            move || ChunkReader::new(&path, part_size)
        })
        .await
        .map_err(|e| RelayError::Task(format!("task join error: {e}")))??;

        let mut whole = Digester::with_algorithm(algorithm);
        let mut meter = ThroughputMeter::default();
        let mut bytes_published = 0u64;
        let mut first_sequence = None;
        let mut last_sequence = 0u64;

        loop {
            self.check_cancelled()?;

            let (r, chunk) = tokio::task::spawn_blocking(move || {
                let chunk = reader.next_chunk();
                (reader, chunk)
            })
            .await
            .map_err(|e| RelayError::Task(format!("task join error: {e}")))?;
            reader = r;

            let Some(chunk) = chunk? else {
                break;
            };

            whole.update(&chunk.data);
            let digest = DigestEntry::new(algorithm.name(), digest_bytes(algorithm, &chunk.data));
            let mut part = PartMeta::new(
                &meta.id,
                chunk.part_number,
                chunk.start,
                chunk.len() as u64,
                digest,
            );
            let payload = match codec {
                Some(codec) => {
                    let encoded = codec.encode(&chunk.data)?;
                    part = part.with_encoding(codec.encoding(), encoded.len() as u64);
                    encoded
                }
                None => chunk.data,
            };
            let payload_len = payload.len() as u64;

            let ack = self
                .log
                .publish(&subject, part.to_headers(), payload)
                .await?;
            first_sequence.get_or_insert(ack.stream_sequence);
            last_sequence = ack.stream_sequence;
            bytes_published += payload_len;
            meter.record(part.length);

            debug!(
                file_id = %meta.id,
                part = part.part_number,
                seq = ack.stream_sequence,
                length = part.length,
                payload = payload_len,
                "part published"
            );
            self.emit(TransferEvent::PartPublished {
                file_id: meta.id.clone(),
                part_number: part.part_number,
                parts: meta.parts,
                stream_sequence: ack.stream_sequence,
                bytes_per_second: meter.bytes_per_second(),
            })
            .await;
        }

        if reader.offset() != meta.length || reader.parts_read() != meta.parts {
            return Err(RelayError::ShortRead {
                expected: meta.length,
                actual: reader.offset(),
            });
        }

        meta.set_digest(whole.entry());
        meta.first_sequence = first_sequence;
        let revision = self.store.put(&meta_key(&meta.id), meta.to_json()?).await?;

        info!(
            file_id = %meta.id,
            parts = meta.parts,
            bytes = meta.length,
            published = bytes_published,
            revision,
            "upload complete"
        );
        self.emit(TransferEvent::Completed {
            file_id: meta.id.clone(),
            bytes: meta.length,
        })
        .await;

        Ok(UploadReport {
            bytes_read: reader.offset(),
            bytes_published,
            first_sequence: first_sequence.unwrap_or_default(),
            last_sequence,
            revision,
            subject,
            meta,
        })
    }

    fn check_cancelled(&self) -> Result<(), RelayError> {
        if self.cancel.is_cancelled() {
            Err(RelayError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn emit(&self, event: TransferEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}
