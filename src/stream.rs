//! Streaming OCR: emit each page's result as soon as its OCR call returns.
//!
//! Pages are OCR'd strictly one at a time, in page order. The next request
//! is not sent until the consumer polls again, so a caller that writes each
//! page out as it arrives never has more than one call in flight.
//!
//! [`crate::driver::run_pages`] is built on this stream; use it directly
//! when you want per-page text without the conversion step.

use crate::config::RunConfig;
use crate::output::{Page, PageResult};
use crate::pipeline::ocr::{recognize_page, OcrEngine};
use crate::progress::RunStatus;
use futures::stream::{self, Stream};
use std::pin::Pin;

/// A boxed stream of page results, in page order.
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = PageResult> + Send + 'a>>;

struct Cursor<'a, O> {
    pages: &'a [Page],
    engine: &'a O,
    config: &'a RunConfig,
    next: usize,
    completed: usize,
}

/// OCR `pages` sequentially, yielding one [`PageResult`] per page.
///
/// Progress events fire on `config.progress_callback`: `on_page_start` and
/// a `Running OCR... i/N` status before each call, then `on_page_complete`
/// or `on_page_error` once it returns. `i` counts successful pages only.
///
/// # Example
/// ```rust,no_run
/// use edgequake_ocr2json::{ocr_stream, Page, RunConfig};
/// use edgequake_ocr2json::pipeline::ocr::VisionOcr;
/// use futures::StreamExt;
///
/// # async fn demo(pages: Vec<Page>, engine: VisionOcr) {
/// let config = RunConfig::default();
/// let mut stream = ocr_stream(&pages, &engine, &config);
/// while let Some(page) = stream.next().await {
///     println!("--- Page {} ---\n{}", page.page_num, page.text);
/// }
/// # }
/// ```
pub fn ocr_stream<'a, O: OcrEngine>(
    pages: &'a [Page],
    engine: &'a O,
    config: &'a RunConfig,
) -> PageStream<'a> {
    let cursor = Cursor {
        pages,
        engine,
        config,
        next: 0,
        completed: 0,
    };

    Box::pin(stream::unfold(cursor, |mut cursor| async move {
        let page = cursor.pages.get(cursor.next)?;
        let total = cursor.pages.len();
        let progress = cursor.config.progress_callback.as_ref();

        if let Some(cb) = progress {
            cb.on_page_start(page.page_num, total);
            cb.on_status(&RunStatus::RunningOcr {
                completed: cursor.completed,
                total,
            });
        }

        let result = recognize_page(cursor.engine, page).await;

        match &result.error {
            None => {
                cursor.completed += 1;
                if let Some(cb) = progress {
                    cb.on_page_complete(page.page_num, total, result.text.len());
                    cb.on_status(&RunStatus::RunningOcr {
                        completed: cursor.completed,
                        total,
                    });
                }
            }
            Some(e) => {
                if let Some(cb) = progress {
                    cb.on_page_error(page.page_num, total, &e.detail());
                }
            }
        }

        cursor.next += 1;
        Some((result, cursor))
    }))
}
