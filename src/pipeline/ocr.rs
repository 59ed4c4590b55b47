//! OCR: send one page image to the vision model, get plain text back.
//!
//! The driver only sees the narrow [`OcrEngine`] trait. [`VisionOcr`] is the
//! production engine: one user turn carrying the OCR prompt and the page
//! image, sent through an edgequake-llm provider (Ollama by default).
//!
//! No retries here. A failed or timed-out call becomes a [`PageError`] and
//! the run moves on to the next page.

use crate::config::RunConfig;
use crate::error::PageError;
use crate::output::{EncodedImage, Page, PageResult, PageStatus};
use edgequake_llm::{ChatMessage, ImageData, LLMProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Extracts plain text from a single page image.
pub trait OcrEngine: Send + Sync {
    /// Recognise the text on `image`, page `page_num` (1-indexed).
    ///
    /// An empty string is a valid, successful result.
    fn recognize(
        &self,
        page_num: usize,
        image: &EncodedImage,
    ) -> impl Future<Output = Result<String, PageError>> + Send;
}

/// OCR through a vision-capable chat model.
#[derive(Clone)]
pub struct VisionOcr {
    provider: Arc<dyn LLMProvider>,
    prompt: String,
    timeout: Duration,
}

impl VisionOcr {
    pub fn new(provider: Arc<dyn LLMProvider>, prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            prompt: prompt.into(),
            timeout,
        }
    }

    /// Build from the run configuration's OCR prompt and timeout.
    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &RunConfig) -> Self {
        Self::new(provider, config.ocr_prompt.clone(), config.ocr_timeout())
    }
}

impl OcrEngine for VisionOcr {
    async fn recognize(&self, page_num: usize, image: &EncodedImage) -> Result<String, PageError> {
        let image_data = ImageData::new(image.to_base64(), image.mime_type.clone());
        let messages = vec![ChatMessage::user_with_images(
            self.prompt.as_str(),
            vec![image_data],
        )];

        debug!(
            "Page {}: OCR request, image {} bytes",
            page_num,
            image.bytes.len()
        );

        let call = async {
            self.provider
                .chat(&messages, None)
                .await
                .map(|response| response.content)
        };
        bounded_ocr_call(page_num, self.timeout, call).await
    }
}

/// Await one OCR call for at most `limit`.
///
/// A transport error and an elapsed timeout both become a [`PageError`].
pub async fn bounded_ocr_call<F, E>(
    page_num: usize,
    limit: Duration,
    call: F,
) -> Result<String, PageError>
where
    F: Future<Output = Result<String, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(PageError::OcrFailed {
            page: page_num,
            detail: e.to_string(),
        }),
        Err(_) => Err(PageError::Timeout {
            page: page_num,
            ms: limit.as_millis() as u64,
        }),
    }
}

/// OCR one page and wrap the outcome as a [`PageResult`].
///
/// Never fails: an engine error is recorded on the result with empty text
/// and the failure detail as the page's output.
pub async fn recognize_page<O: OcrEngine>(engine: &O, page: &Page) -> PageResult {
    let start = Instant::now();
    let outcome = engine.recognize(page.page_num, &page.image).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(text) => {
            debug!(
                "Page {}: OCR ok, {} chars in {}ms",
                page.page_num,
                text.len(),
                duration_ms
            );
            PageResult {
                page_num: page.page_num,
                text,
                output: String::new(),
                status: PageStatus::OcrComplete,
                error: None,
                duration_ms,
            }
        }
        Err(e) => {
            warn!("{}", e);
            PageResult {
                page_num: page.page_num,
                text: String::new(),
                output: e.detail(),
                status: PageStatus::OcrFailed,
                error: Some(e),
                duration_ms,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<String, PageError>);

    impl OcrEngine for Fixed {
        async fn recognize(&self, _page_num: usize, _image: &EncodedImage) -> Result<String, PageError> {
            self.0.clone()
        }
    }

    fn page(n: usize) -> Page {
        Page {
            page_num: n,
            width: None,
            height: None,
            image: EncodedImage::new("image/png", vec![1, 2, 3]),
        }
    }

    #[tokio::test]
    async fn success_records_text() {
        let r = recognize_page(&Fixed(Ok("Hello".into())), &page(1)).await;
        assert_eq!(r.text, "Hello");
        assert_eq!(r.status, PageStatus::OcrComplete);
        assert!(r.error.is_none());
        assert!(r.output.is_empty());
    }

    #[tokio::test]
    async fn empty_text_is_still_success() {
        let r = recognize_page(&Fixed(Ok(String::new())), &page(1)).await;
        assert!(r.ocr_succeeded());
        assert_eq!(r.text, "");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let call = async {
            tokio::time::sleep(Duration::from_secs(90)).await;
            Ok::<_, String>("too late".to_string())
        };
        let err = bounded_ocr_call(2, Duration::from_millis(60_000), call)
            .await
            .unwrap_err();
        assert_eq!(err, PageError::Timeout { page: 2, ms: 60_000 });
    }

    #[tokio::test(start_paused = true)]
    async fn call_within_limit_returns_text() {
        let call = async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, String>("Invoice 42".to_string())
        };
        let text = bounded_ocr_call(1, Duration::from_secs(1), call).await;
        assert_eq!(text, Ok("Invoice 42".to_string()));
    }

    #[tokio::test]
    async fn transport_error_keeps_its_detail() {
        let call = async { Err::<String, _>("connection refused") };
        let err = bounded_ocr_call(3, Duration::from_secs(1), call)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PageError::OcrFailed {
                page: 3,
                detail: "connection refused".into()
            }
        );
    }

    #[tokio::test]
    async fn failure_records_detail_and_empty_text() {
        let err = PageError::OcrFailed {
            page: 4,
            detail: "model 'deepseek-ocr' not found".into(),
        };
        let r = recognize_page(&Fixed(Err(err.clone())), &page(4)).await;
        assert_eq!(r.text, "");
        assert_eq!(r.output, "model 'deepseek-ocr' not found");
        assert_eq!(r.status, PageStatus::OcrFailed);
        assert_eq!(r.error, Some(err));
    }
}
