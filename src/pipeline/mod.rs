//! Pipeline stages for page-image OCR.
//!
//! Each submodule implements one step. The model-facing stages sit behind
//! small traits ([`render::RasterSource`], [`ocr::OcrEngine`],
//! [`structure::JsonConverter`]) so the driver can be exercised without
//! pdfium or a model server.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ enhance ──▶ encode ──▶ ocr ──▶ structure
//! (path/URL) (pdfium)  (pixels)    (PNG)     (VLM)   (text LLM, optional)
//! ```
//!
//! 1. [`input`]   sniff the file type from its magic bytes, download URLs
//! 2. [`render`]  rasterise PDF pages; pdfium is CPU-bound, so this runs in
//!    `spawn_blocking`
//! 3. [`enhance`] greyscale contrast stretch or binarisation
//! 4. [`encode`]  PNG encoding plus base64 / `data:` views
//! 5. [`prepare`] ties 2–4 together into ordered [`crate::output::Page`]s
//! 6. [`ocr`]     one vision-model call per page, no retries
//! 7. [`structure`] one text-model call per run over the combined OCR text

pub mod encode;
pub mod enhance;
pub mod input;
pub mod ocr;
pub mod prepare;
pub mod render;
pub mod structure;
