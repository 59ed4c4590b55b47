//! Input resolution: turn a path, URL, or byte buffer into a typed source.
//!
//! The file type is decided from the leading bytes, never from the file
//! name: `%PDF` means PDF, any magic number the `image` crate recognises
//! means image, everything else is rejected before a run can start.

use crate::error::OcrStudioError;
use crate::output::SourceKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// A source document held in memory.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File name (or last URL segment) used in messages.
    pub name: String,
    pub kind: SourceKind,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// Classify in-memory bytes as PDF or image.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, OcrStudioError> {
        let name = name.into();
        let kind = detect_kind(&name, &bytes)?;
        Ok(Self { name, kind, bytes })
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self.kind, SourceKind::Pdf)
    }
}

/// Sniff the document type from its magic bytes.
pub fn detect_kind(name: &str, bytes: &[u8]) -> Result<SourceKind, OcrStudioError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(SourceKind::Pdf);
    }
    match image::guess_format(bytes) {
        Ok(format) => Ok(SourceKind::Image {
            mime_type: format.to_mime_type().to_string(),
        }),
        Err(_) => Err(OcrStudioError::UnsupportedFileType {
            name: name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        }),
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory source document.
///
/// If the input is a URL, download it. If it is a local file, read it.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceDocument, OcrStudioError> {
    if input.trim().is_empty() {
        return Err(OcrStudioError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input).await
    }
}

/// Read a local file and classify it.
async fn resolve_local(path_str: &str) -> Result<SourceDocument, OcrStudioError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(OcrStudioError::PermissionDenied { path });
        }
        Err(_) => return Err(OcrStudioError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local file: {} ({} bytes)", path.display(), bytes.len());
    SourceDocument::from_bytes(name, bytes)
}

/// Download a URL into memory and classify it.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, OcrStudioError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| OcrStudioError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            OcrStudioError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            OcrStudioError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(OcrStudioError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| OcrStudioError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    SourceDocument::from_bytes(filename_from_url(url), bytes.to_vec())
}

/// Extract a reasonable file name from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "download".to_string()
}
