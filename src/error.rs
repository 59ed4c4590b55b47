//! Error types for the edgequake-ocr2json library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`OcrStudioError`]: **fatal**, the run cannot start or cannot finish
//!   preparing pages (unsupported file, too many pages, pdfium failure,
//!   another run already active). Returned as `Err(OcrStudioError)`.
//!
//! * [`PageError`]: **non-fatal**, OCR of a single page failed. Stored
//!   inside [`crate::output::PageResult`]; the run moves on to the next page.
//!
//! * [`ConversionError`]: the single JSON conversion call failed. Stored in
//!   [`crate::output::RunOutput`] and copied onto every page's output; the
//!   run ends in [`crate::output::RunState::Failed`] but still returns `Ok`.
//!
//! External model calls never produce an `Err` past the run boundary: their
//! failures are turned into one of the two data-carrying types above.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-ocr2json library.
#[derive(Debug, Error)]
pub enum OcrStudioError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input is neither a PDF nor a decodable image format.
    #[error("Please choose a PDF or image file. '{name}' looks like neither (first bytes: {magic:?})")]
    UnsupportedFileType { name: String, magic: Vec<u8> },

    /// The PDF has more pages than `max_pages` allows.
    #[error("PDF has {pages} pages. Limit is {limit}.")]
    TooManyPages { pages: usize, limit: usize },

    /// The document yielded no pages at all.
    #[error("Document '{name}' has no pages")]
    EmptyDocument { name: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// A rendered page could not be encoded as PNG.
    #[error("Image encoding failed for page {page}: {detail}")]
    EncodingFailed { page: usize, detail: String },

    // ── Run errors ────────────────────────────────────────────────────────
    /// `start` was called while another run on the same studio is active.
    #[error("A run is already in progress; wait for it to finish")]
    RunInProgress,

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider could not be created (unknown name, missing key).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Place libpdfium next to the binary, install it system-wide, or set\n\
PDFIUM_LIB_PATH=/path/to/dir-containing-libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrStudioError {
    /// Whether this error rejects the input before any run starts.
    pub fn is_input_rejection(&self) -> bool {
        matches!(
            self,
            OcrStudioError::FileNotFound { .. }
                | OcrStudioError::PermissionDenied { .. }
                | OcrStudioError::InvalidInput { .. }
                | OcrStudioError::DownloadFailed { .. }
                | OcrStudioError::DownloadTimeout { .. }
                | OcrStudioError::UnsupportedFileType { .. }
                | OcrStudioError::TooManyPages { .. }
                | OcrStudioError::EmptyDocument { .. }
                | OcrStudioError::CorruptPdf { .. }
                | OcrStudioError::PasswordRequired { .. }
                | OcrStudioError::WrongPassword { .. }
        )
    }
}

/// A non-fatal OCR failure for a single page.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The OCR model returned an error or the transport failed.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// The OCR call did not answer within the configured timeout.
    #[error("Page {page}: OCR timed out after {ms}ms")]
    Timeout { page: usize, ms: u64 },
}

impl PageError {
    /// The detail string shown as the page's output.
    pub fn detail(&self) -> String {
        match self {
            PageError::OcrFailed { detail, .. } => detail.clone(),
            PageError::Timeout { .. } => self.to_string(),
        }
    }
}

/// Failure of the document-level JSON conversion call.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ConversionError {
    /// The conversion model returned an error or the transport failed.
    #[error("JSON conversion failed: {detail}")]
    Failed { detail: String },

    /// The conversion call did not answer within the configured timeout.
    #[error("JSON conversion timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// No page produced OCR text, so there is nothing to convert.
    #[error("JSON conversion failed: text is required")]
    EmptyText,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_pages_display() {
        let e = OcrStudioError::TooManyPages {
            pages: 30,
            limit: 25,
        };
        assert_eq!(e.to_string(), "PDF has 30 pages. Limit is 25.");
        assert!(e.is_input_rejection());
    }

    #[test]
    fn unsupported_file_display() {
        let e = OcrStudioError::UnsupportedFileType {
            name: "notes.txt".into(),
            magic: b"hell".to_vec(),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("Please choose a PDF or image file."), "got: {msg}");
        assert!(msg.contains("notes.txt"));
    }

    #[test]
    fn run_in_progress_is_not_input_rejection() {
        assert!(!OcrStudioError::RunInProgress.is_input_rejection());
        assert!(!OcrStudioError::RasterisationFailed {
            page: 1,
            detail: "boom".into()
        }
        .is_input_rejection());
    }

    #[test]
    fn page_error_detail_is_raw_for_failures() {
        let e = PageError::OcrFailed {
            page: 2,
            detail: "model not found".into(),
        };
        assert_eq!(e.detail(), "model not found");
        assert!(e.to_string().contains("Page 2"));
    }

    #[test]
    fn page_timeout_display() {
        let e = PageError::Timeout { page: 3, ms: 60000 };
        assert!(e.detail().contains("60000ms"));
        assert!(e.detail().contains("Page 3"));
    }

    #[test]
    fn conversion_empty_text_display() {
        assert!(ConversionError::EmptyText
            .to_string()
            .contains("text is required"));
    }
}
