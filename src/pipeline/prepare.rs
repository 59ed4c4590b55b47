//! Page preparation: source document → ordered, encoded [`Page`]s.
//!
//! PDFs are rendered page by page, enhanced if configured, and PNG-encoded;
//! each finished page is reported before the next one starts. An image
//! becomes exactly one page carrying its original bytes, untouched.

use crate::config::RunConfig;
use crate::error::OcrStudioError;
use crate::output::{EncodedImage, Page, SourceKind};
use crate::pipeline::input::SourceDocument;
use crate::pipeline::render::{self, PdfiumDocument, RasterSource};
use crate::pipeline::{encode, enhance};
use crate::progress::RunStatus;
use tracing::{debug, info};

/// Reject PDFs above the page limit.
pub fn check_page_limit(page_count: usize, max_pages: usize) -> Result<(), OcrStudioError> {
    if page_count > max_pages {
        return Err(OcrStudioError::TooManyPages {
            pages: page_count,
            limit: max_pages,
        });
    }
    Ok(())
}

/// Render every page of `source` in order.
///
/// The page limit is checked before the first page is touched, so an
/// oversized document produces no pages at all.
pub fn prepare_pdf_pages(
    source: &mut impl RasterSource,
    config: &RunConfig,
) -> Result<Vec<Page>, OcrStudioError> {
    let total = source.page_count();
    check_page_limit(total, config.max_pages)?;

    let progress = config.progress_callback.as_ref();
    if let Some(cb) = progress {
        cb.on_status(&RunStatus::Rendering);
    }

    let mut pages = Vec::with_capacity(total);
    for page_num in 1..=total {
        let mut bitmap = source.render_page(page_num, config.render_scale)?;
        if config.enhance.enabled {
            enhance::enhance_image(&mut bitmap, &config.enhance);
        }

        let (width, height) = bitmap.dimensions();
        let image = encode::encode_png(bitmap).map_err(|e| OcrStudioError::EncodingFailed {
            page: page_num,
            detail: e.to_string(),
        })?;

        debug!("Prepared page {}/{} ({}x{})", page_num, total, width, height);
        pages.push(Page {
            page_num,
            width: Some(width),
            height: Some(height),
            image,
        });

        if let Some(cb) = progress {
            cb.on_page_rendered(page_num, total);
            cb.on_status(&RunStatus::Rendered {
                rendered: page_num,
                total,
            });
        }
    }

    Ok(pages)
}

/// Wrap an uploaded image as page 1.
pub fn prepare_image_page(source: &SourceDocument) -> Result<Page, OcrStudioError> {
    let SourceKind::Image { mime_type } = &source.kind else {
        return Err(OcrStudioError::Internal(format!(
            "'{}' is not an image",
            source.name
        )));
    };

    let dimensions = image::ImageReader::new(std::io::Cursor::new(&source.bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());

    Ok(Page {
        page_num: 1,
        width: dimensions.map(|(w, _)| w),
        height: dimensions.map(|(_, h)| h),
        image: EncodedImage::new(mime_type.clone(), source.bytes.clone()),
    })
}

/// Prepare pages for any source, rendering PDFs on the blocking pool.
pub async fn prepare_pages(
    source: &SourceDocument,
    config: &RunConfig,
) -> Result<Vec<Page>, OcrStudioError> {
    let pages = match source.kind {
        SourceKind::Image { .. } => {
            let page = prepare_image_page(source)?;
            if let Some(cb) = config.progress_callback.as_ref() {
                cb.on_page_rendered(1, 1);
            }
            vec![page]
        }
        SourceKind::Pdf => {
            let source = source.clone();
            let config = config.clone();
            tokio::task::spawn_blocking(move || {
                let pdfium = render::bind_pdfium()?;
                let document = render::open_document(&pdfium, &source, config.password.as_deref())?;
                // Bound to a local so the document drops before `pdfium`.
                let mut raster = PdfiumDocument::new(document);
                prepare_pdf_pages(&mut raster, &config)
            })
            .await
            .map_err(|e| OcrStudioError::Internal(format!("Render task panicked: {}", e)))??
        }
    };

    info!("Prepared {} page(s) from '{}'", pages.len(), source.name);
    Ok(pages)
}
