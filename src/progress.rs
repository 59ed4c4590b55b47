//! Progress-callback trait and the user-visible status line.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::RunConfigBuilder::progress_callback`] to receive events
//! as the run renders pages, OCRs them one by one, and converts the result.
//!
//! Every event fires before the next page begins: rendering and OCR are
//! strictly sequential, so callbacks never run concurrently.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocr2json::{RunConfig, RunProgressCallback, RunStatus};
//! use std::sync::Arc;
//!
//! struct PrintStatus;
//!
//! impl RunProgressCallback for PrintStatus {
//!     fn on_status(&self, status: &RunStatus) {
//!         eprintln!("{status}");
//!     }
//! }
//!
//! let config = RunConfig::builder()
//!     .progress_callback(Arc::new(PrintStatus))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// The run's current stage, rendered as a one-line status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// PDF rasterisation has started.
    Rendering,
    /// `rendered` of `total` pages are rasterised.
    Rendered { rendered: usize, total: usize },
    /// OCR is running; `completed` counts pages whose OCR succeeded so far.
    RunningOcr { completed: usize, total: usize },
    /// The single JSON conversion call is in flight.
    Converting,
    /// The run finished.
    Done,
    /// The run failed; the message is shown as-is.
    Failed(String),
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Rendering => f.write_str("Rendering pages..."),
            RunStatus::Rendered { rendered, total } => {
                write!(f, "Rendered {}/{} pages...", rendered, total)
            }
            RunStatus::RunningOcr { completed, total } => {
                write!(f, "Running OCR... {}/{}", completed, total)
            }
            RunStatus::Converting => f.write_str("Converting document to JSON..."),
            RunStatus::Done => f.write_str("Done."),
            RunStatus::Failed(msg) => f.write_str(msg),
        }
    }
}

/// Called by the pipeline as a run progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait RunProgressCallback: Send + Sync {
    /// Called whenever the status line changes.
    fn on_status(&self, status: &RunStatus) {
        let _ = status;
    }

    /// Called once a page is rasterised and encoded, before the next one starts.
    fn on_page_rendered(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called once before the first OCR request.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the OCR request for a page is sent.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page's OCR succeeded.
    ///
    /// `text_len` is the byte length of the recognised text (may be 0).
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page's OCR failed; the run continues.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the conversion call returns.
    fn on_conversion_complete(&self, result: Result<usize, &str>) {
        let _ = result;
    }

    /// Called once when the run reaches a terminal state.
    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RunConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        statuses: Mutex<Vec<String>>,
    }

    impl RunProgressCallback for Recorder {
        fn on_status(&self, status: &RunStatus) {
            self.statuses.lock().unwrap().push(status.to_string());
        }
    }

    #[test]
    fn status_strings() {
        assert_eq!(RunStatus::Rendering.to_string(), "Rendering pages...");
        assert_eq!(
            RunStatus::Rendered { rendered: 2, total: 5 }.to_string(),
            "Rendered 2/5 pages..."
        );
        assert_eq!(
            RunStatus::RunningOcr { completed: 1, total: 3 }.to_string(),
            "Running OCR... 1/3"
        );
        assert_eq!(
            RunStatus::Converting.to_string(),
            "Converting document to JSON..."
        );
        assert_eq!(RunStatus::Done.to_string(), "Done.");
        assert_eq!(RunStatus::Failed("boom".into()).to_string(), "boom");
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_status(&RunStatus::Rendering);
        cb.on_page_rendered(1, 2);
        cb.on_run_start(2);
        cb.on_page_start(1, 2);
        cb.on_page_complete(1, 2, 10);
        cb.on_page_error(2, 2, "timeout");
        cb.on_conversion_complete(Err("bad gateway"));
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn arc_dyn_callback_records_statuses() {
        let rec = Arc::new(Recorder::default());
        let cb: ProgressCallback = rec.clone();
        cb.on_status(&RunStatus::Rendering);
        cb.on_status(&RunStatus::Done);
        assert_eq!(
            *rec.statuses.lock().unwrap(),
            vec!["Rendering pages...".to_string(), "Done.".to_string()]
        );
    }
}
