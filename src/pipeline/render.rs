//! PDF rasterisation via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which is CPU-bound
//! and not async-aware. Callers of this module run it inside
//! `tokio::task::spawn_blocking` so Tokio worker threads never stall while a
//! page is being rendered.
//!
//! ## Page size
//!
//! A page of `w × h` points rendered at `scale` becomes a
//! `trunc(w·scale) × trunc(h·scale)` pixel bitmap; at the default scale of
//! 2.5 that is 180 DPI.

use crate::error::OcrStudioError;
use crate::output::{DocumentInfo, SourceKind};
use crate::pipeline::input::SourceDocument;
use image::RgbaImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Something that can hand out rasterised pages, numbered from 1.
///
/// Production code uses [`PdfiumDocument`]; tests substitute an in-memory
/// source.
pub trait RasterSource {
    /// Total number of pages.
    fn page_count(&self) -> usize;

    /// Render page `page_num` (1-indexed) at `scale` to an RGBA8 bitmap.
    fn render_page(&mut self, page_num: usize, scale: f32) -> Result<RgbaImage, OcrStudioError>;
}

/// Bind to the pdfium shared library.
///
/// Search order: `PDFIUM_LIB_PATH` (a directory), the working directory,
/// then the system library path.
pub fn bind_pdfium() -> Result<Pdfium, OcrStudioError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(dir) if !dir.is_empty() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| OcrStudioError::PdfiumBindingFailed(e.to_string()))?;

    Ok(Pdfium::new(bindings))
}

/// Open a PDF held in memory, mapping pdfium's load errors.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    source: &'a SourceDocument,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, OcrStudioError> {
    pdfium
        .load_pdf_from_byte_slice(&source.bytes, password)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    OcrStudioError::WrongPassword {
                        name: source.name.clone(),
                    }
                } else {
                    OcrStudioError::PasswordRequired {
                        name: source.name.clone(),
                    }
                }
            } else {
                OcrStudioError::CorruptPdf {
                    name: source.name.clone(),
                    detail: err_str,
                }
            }
        })
}

/// [`RasterSource`] over an open pdfium document.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumDocument<'a> {
    pub fn new(document: PdfDocument<'a>) -> Self {
        Self { document }
    }
}

impl RasterSource for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&mut self, page_num: usize, scale: f32) -> Result<RgbaImage, OcrStudioError> {
        let rasterisation_failed = |detail: String| OcrStudioError::RasterisationFailed {
            page: page_num,
            detail,
        };

        let index = page_num
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or_else(|| rasterisation_failed("page number out of range".into()))?;

        let page = self
            .document
            .pages()
            .get(index)
            .map_err(|e| rasterisation_failed(format!("{:?}", e)))?;

        let width = (page.width().value * scale) as i32;
        let height = (page.height().value * scale) as i32;
        if width <= 0 || height <= 0 {
            return Err(rasterisation_failed(format!(
                "page renders to an empty {}x{} bitmap",
                width, height
            )));
        }

        let render_config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_target_height(height);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| rasterisation_failed(format!("{:?}", e)))?;

        let image = bitmap.as_image().to_rgba8();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );

        Ok(image)
    }
}

/// Count the pages of a PDF without rendering anything.
pub async fn page_count(
    source: &SourceDocument,
    password: Option<&str>,
) -> Result<usize, OcrStudioError> {
    Ok(inspect_source(source, password).await?.page_count)
}

/// Gather [`DocumentInfo`] for a source document.
///
/// Images always count as one page and need no pdfium binding.
pub async fn inspect_source(
    source: &SourceDocument,
    password: Option<&str>,
) -> Result<DocumentInfo, OcrStudioError> {
    if !source.is_pdf() {
        return Ok(DocumentInfo {
            name: source.name.clone(),
            kind: source.kind.clone(),
            byte_len: source.bytes.len(),
            page_count: 1,
            title: None,
            author: None,
            pdf_version: None,
        });
    }

    let source = source.clone();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || inspect_pdf_blocking(&source, pwd.as_deref()))
        .await
        .map_err(|e| OcrStudioError::Internal(format!("Inspect task panicked: {}", e)))?
}

/// Blocking implementation of PDF inspection.
fn inspect_pdf_blocking(
    source: &SourceDocument,
    password: Option<&str>,
) -> Result<DocumentInfo, OcrStudioError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, source, password)?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    let page_count = document.pages().len() as usize;
    info!("PDF '{}' loaded: {} pages", source.name, page_count);

    Ok(DocumentInfo {
        name: source.name.clone(),
        kind: SourceKind::Pdf,
        byte_len: source.bytes.len(),
        page_count,
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        pdf_version: Some(format!("{:?}", document.version())),
    })
}
