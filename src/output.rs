//! Result types produced by a run.
//!
//! Everything here is `Serialize` so `ocr2json --json` can print a run
//! verbatim, and so callers can persist or diff results.

use crate::error::PageError;
use crate::pipeline::encode;
use crate::prompts::page_block;
use serde::{Deserialize, Serialize};

/// An encoded page image: the bytes sent to the OCR model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Base64 payload for transport.
    pub fn to_base64(&self) -> String {
        encode::base64(&self.bytes)
    }

    /// `data:` URL for display.
    pub fn to_data_url(&self) -> String {
        encode::data_url(&self.mime_type, &self.bytes)
    }
}

/// One prepared page, numbered from 1.
#[derive(Debug, Clone)]
pub struct Page {
    pub page_num: usize,
    /// Pixel width, when known.
    pub width: Option<u32>,
    /// Pixel height, when known.
    pub height: Option<u32>,
    pub image: EncodedImage,
}

/// Where a page stands in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    OcrFailed,
    OcrComplete,
    ConversionFailed,
    Complete,
}

/// Result for a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// OCR text. Empty when OCR failed or the model returned nothing.
    pub text: String,
    /// Final displayed output: the document JSON after a successful
    /// conversion, the failure detail after a failed conversion or OCR call,
    /// otherwise empty.
    pub output: String,
    pub status: PageStatus,
    /// Set when this page's OCR call failed.
    pub error: Option<PageError>,
    /// Wall-clock time of the OCR call.
    pub duration_ms: u64,
}

impl PageResult {
    pub fn ocr_succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Lifecycle of a run.
///
/// ```text
/// Idle ─▶ Preparing ─▶ OcrInProgress{1..N} ─▶ [ConversionInProgress] ─▶ Done | Failed
/// ```
///
/// A finished [`RunOutput`] always carries `Done` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Preparing,
    OcrInProgress { page: usize, total: usize },
    ConversionInProgress,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// Timing and counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_pages: usize,
    pub ocr_succeeded: usize,
    pub ocr_failed: usize,
    pub prepare_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub conversion_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The complete result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Per-page results in ascending page order.
    pub pages: Vec<PageResult>,
    /// Output of the JSON conversion, when it ran and succeeded.
    pub combined_output: Option<String>,
    /// Failure detail of the JSON conversion, when it ran and failed.
    pub conversion_error: Option<String>,
    pub state: RunState,
    pub stats: RunStats,
}

impl RunOutput {
    /// Combined OCR text of the successful pages, delimited by page.
    ///
    /// This is exactly the text handed to the conversion model.
    pub fn document_text(&self) -> String {
        combine_page_texts(&self.pages)
    }

    /// What `ocr2json -o` writes: the conversion output when there is one,
    /// otherwise the combined OCR text.
    pub fn document_output(&self) -> String {
        match &self.combined_output {
            Some(content) => content.clone(),
            None => self.document_text(),
        }
    }
}

/// Join the successful pages' text blocks with a blank line.
pub(crate) fn combine_page_texts(pages: &[PageResult]) -> String {
    pages
        .iter()
        .filter(|p| p.ocr_succeeded())
        .map(|p| page_block(p.page_num, &p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// What kind of source a document is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    Pdf,
    Image { mime_type: String },
}

/// Document facts gathered without running any model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub name: String,
    pub kind: SourceKind,
    pub byte_len: usize,
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub pdf_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize, text: &str, failed: bool) -> PageResult {
        PageResult {
            page_num: n,
            text: text.to_string(),
            output: String::new(),
            status: if failed {
                PageStatus::OcrFailed
            } else {
                PageStatus::Complete
            },
            error: failed.then(|| PageError::OcrFailed {
                page: n,
                detail: "500".into(),
            }),
            duration_ms: 0,
        }
    }

    #[test]
    fn combined_text_skips_failed_pages() {
        let pages = vec![page(1, "Hello", false), page(2, "", true), page(3, "World", false)];
        assert_eq!(
            combine_page_texts(&pages),
            "--- Page 1 ---\nHello\n\n--- Page 3 ---\nWorld"
        );
    }

    #[test]
    fn document_output_prefers_conversion() {
        let mut out = RunOutput {
            pages: vec![page(1, "Hi", false)],
            combined_output: None,
            conversion_error: None,
            state: RunState::Done,
            stats: RunStats::default(),
        };
        assert_eq!(out.document_output(), "--- Page 1 ---\nHi");
        out.combined_output = Some("{\"a\":1}".into());
        assert_eq!(out.document_output(), "{\"a\":1}");
    }

    #[test]
    fn run_output_serialises() {
        let out = RunOutput {
            pages: vec![page(1, "Hi", false)],
            combined_output: None,
            conversion_error: None,
            state: RunState::Done,
            stats: RunStats::default(),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["state"], "done");
        assert_eq!(json["pages"][0]["status"], "complete");
    }

    #[test]
    fn only_done_and_failed_are_terminal() {
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::Preparing.is_terminal());
        assert!(!RunState::OcrInProgress { page: 1, total: 2 }.is_terminal());
        assert!(!RunState::ConversionInProgress.is_terminal());
        assert!(RunState::Done.is_terminal());
        assert!(RunState::Failed.is_terminal());
    }

    #[test]
    fn encoded_image_views() {
        let img = EncodedImage::new("image/png", vec![1, 2, 3]);
        assert_eq!(img.to_base64(), "AQID");
        assert_eq!(img.to_data_url(), "data:image/png;base64,AQID");
    }
}
