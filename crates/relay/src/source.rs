//! Upload source inspection.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::RelayError;

/// What the uploader needs to know about a source file before reading it.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub path: PathBuf,
    /// Final path component.
    pub name: String,
    pub length: u64,
    pub modified: DateTime<Utc>,
}

/// Checks that `path` is a readable, non-empty regular file.
pub fn inspect_source(path: &Path) -> Result<SourceInfo, RelayError> {
    let display = path.display().to_string();
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RelayError::SourceNotFound(display));
        }
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_file() {
        return Err(RelayError::SourceNotFile(display));
    }
    if metadata.len() == 0 {
        return Err(RelayError::EmptySource(display));
    }
    // Fail on permissions now rather than after the record is built.
    std::fs::File::open(path)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| RelayError::SourceNotFile(display.clone()))?;
    let modified = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Ok(SourceInfo {
        path: path.to_path_buf(),
        name,
        length: metadata.len(),
        modified,
    })
}

/// Guesses a MIME type from the file extension.
pub fn detect_content_type(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("txt" | "log") => Some("text/plain"),
        Some("csv") => Some("text/csv"),
        Some("html" | "htm") => Some("text/html"),
        Some("json") => Some("application/json"),
        Some("xml") => Some("application/xml"),
        Some("pdf") => Some("application/pdf"),
        Some("zip") => Some("application/zip"),
        Some("gz") => Some("application/gzip"),
        Some("tar") => Some("application/x-tar"),
        Some("zst") => Some("application/zstd"),
        Some("png") => Some("image/png"),
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("webp") => Some("image/webp"),
        Some("gif") => Some("image/gif"),
        Some("ico") => Some("image/x-icon"),
        Some("mp3") => Some("audio/mpeg"),
        Some("mp4") => Some("video/mp4"),
        _ => None,
    }
}
