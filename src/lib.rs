//! # edgequake-ocr2json
//!
//! OCR scanned PDFs and images with a local vision model, then optionally
//! turn the recognised text into structured JSON with a second model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Load     resolve path or URL, sniff type, enforce the page limit
//!  ├─ 2. Render   rasterise PDF pages via pdfium (spawn_blocking)
//!  ├─ 3. Enhance  greyscale contrast stretch or binarisation
//!  ├─ 4. Encode   PNG
//!  ├─ 5. OCR      one vision-model call per page, strictly sequential
//!  └─ 6. Convert  one text-model call over "--- Page n ---" blocks (optional)
//! ```
//!
//! A failed OCR call is recorded on its page and the run carries on. A
//! failed conversion marks every page with the failure detail and ends the
//! run in [`RunState::Failed`]. Neither is returned as `Err`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocr2json::{run, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Ollama at OLLAMA_HOST (default http://localhost:11434)
//!     let config = RunConfig::builder()
//!         .system_prompt("You output strict JSON.")
//!         .user_prompt("Extract every line item:\n{{text}}")
//!         .build()?;
//!     let output = run("receipt.pdf", &config).await?;
//!     println!("{}", output.document_output());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2json` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ocr2json = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod driver;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConfigSummary, ConversionPrompts, EnhanceConfig, EnhanceMode, RunConfig, RunConfigBuilder,
};
pub use driver::{
    inspect, load_document, load_document_bytes, run, run_from_bytes, run_pages, run_sync,
    run_to_file, Document, OcrStudio,
};
pub use error::{ConversionError, OcrStudioError, PageError};
pub use output::{
    DocumentInfo, EncodedImage, Page, PageResult, PageStatus, RunOutput, RunState, RunStats,
    SourceKind,
};
pub use pipeline::ocr::{OcrEngine, VisionOcr};
pub use pipeline::structure::{ChatConverter, ConversionRequest, JsonConverter};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback, RunStatus};
pub use stream::{ocr_stream, PageStream};
