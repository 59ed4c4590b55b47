//! Pipeline driver: load a document, prepare its pages, OCR them one by
//! one, then run the optional JSON conversion.
//!
//! [`run_pages`] is the orchestration core over already-prepared pages. It
//! is generic over its two model collaborators so tests drive it with
//! in-memory fakes. [`OcrStudio`] wraps it with document loading, page
//! preparation and the one-run-at-a-time guard; the free functions
//! ([`run`], [`run_to_file`], [`inspect`], ...) are one-shot conveniences.
//!
//! Model failures never surface as `Err` here. A failed OCR call is recorded
//! on its page; a failed conversion marks every page and ends the run in
//! [`RunState::Failed`]. `Err` is reserved for input rejection, page
//! preparation failures, and a second `start` while a run is active.

use crate::config::RunConfig;
use crate::error::{ConversionError, OcrStudioError};
use crate::output::{
    combine_page_texts, DocumentInfo, Page, PageResult, PageStatus, RunOutput, RunState, RunStats,
};
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::ocr::{OcrEngine, VisionOcr};
use crate::pipeline::prepare::{self, check_page_limit};
use crate::pipeline::render;
use crate::pipeline::structure::{ChatConverter, ConversionRequest, JsonConverter};
use crate::progress::RunStatus;
use crate::stream::ocr_stream;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::StreamExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

// ── Documents ────────────────────────────────────────────────────────────

/// A loaded source document that passed type and page-limit checks.
#[derive(Debug, Clone)]
pub struct Document {
    pub source: SourceDocument,
    /// Number of pages a run will produce (1 for images).
    pub page_count: usize,
}

impl Document {
    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn is_pdf(&self) -> bool {
        self.source.is_pdf()
    }
}

/// Classify and count a source, rejecting it if it cannot be run.
async fn admit(source: SourceDocument, config: &RunConfig) -> Result<Document, OcrStudioError> {
    let page_count = if source.is_pdf() {
        let count = render::page_count(&source, config.password.as_deref()).await?;
        check_page_limit(count, config.max_pages)?;
        count
    } else {
        1
    };

    if page_count == 0 {
        return Err(OcrStudioError::EmptyDocument { name: source.name });
    }

    info!("Loaded '{}': {} page(s)", source.name, page_count);
    Ok(Document { source, page_count })
}

/// Resolve a path or URL and admit it as a [`Document`].
pub async fn load_document(input: &str, config: &RunConfig) -> Result<Document, OcrStudioError> {
    let source = input::resolve_input(input, config.download_timeout_secs).await?;
    admit(source, config).await
}

/// Admit in-memory bytes as a [`Document`].
pub async fn load_document_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    config: &RunConfig,
) -> Result<Document, OcrStudioError> {
    let source = SourceDocument::from_bytes(name, bytes)?;
    admit(source, config).await
}

// ── Run state ────────────────────────────────────────────────────────────

/// Current [`RunState`], shared between a run and its observers.
#[derive(Debug, Default)]
pub(crate) struct StateCell(Mutex<RunState>);

impl StateCell {
    pub(crate) fn get(&self) -> RunState {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, state: RunState) {
        debug!("Run state → {:?}", state);
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Holds the studio's busy flag for the duration of one run.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, OcrStudioError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| BusyGuard(flag))
            .map_err(|_| OcrStudioError::RunInProgress)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ── Orchestration ────────────────────────────────────────────────────────

/// OCR every page in order, then convert the combined text if prompts are
/// configured.
///
/// Always returns a terminal [`RunOutput`]: `Done`, or `Failed` when the
/// conversion call failed.
pub async fn run_pages<O, C>(pages: &[Page], ocr: &O, converter: &C, config: &RunConfig) -> RunOutput
where
    O: OcrEngine,
    C: JsonConverter,
{
    drive(pages, ocr, converter, config, &StateCell::default()).await
}

pub(crate) async fn drive<O, C>(
    pages: &[Page],
    ocr: &O,
    converter: &C,
    config: &RunConfig,
    state: &StateCell,
) -> RunOutput
where
    O: OcrEngine,
    C: JsonConverter,
{
    let total = pages.len();
    let progress = config.progress_callback.as_ref();
    if let Some(cb) = progress {
        cb.on_run_start(total);
    }

    // ── OCR, one page at a time ──────────────────────────────────────────
    let ocr_start = Instant::now();
    let mut results: Vec<PageResult> = Vec::with_capacity(total);
    let mut stream = ocr_stream(pages, ocr, config);
    for page in pages {
        state.set(RunState::OcrInProgress {
            page: page.page_num,
            total,
        });
        match stream.next().await {
            Some(result) => results.push(result),
            None => break,
        }
    }
    drop(stream);
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

    let ocr_succeeded = results.iter().filter(|r| r.ocr_succeeded()).count();
    info!(
        "OCR finished: {}/{} page(s) ok in {}ms",
        ocr_succeeded, total, ocr_duration_ms
    );

    // ── Optional conversion ──────────────────────────────────────────────
    let conversion_start = Instant::now();
    let mut combined_output = None;
    let mut conversion_error = None;

    let final_state = if config.prompts.is_configured() {
        state.set(RunState::ConversionInProgress);
        if let Some(cb) = progress {
            cb.on_status(&RunStatus::Converting);
        }

        let text = combine_page_texts(&results);
        let outcome = if text.is_empty() {
            Err(ConversionError::EmptyText)
        } else {
            let request = ConversionRequest::new(text, &config.prompts);
            converter.convert(&request).await
        };

        match outcome {
            Ok(content) => {
                for r in &mut results {
                    r.output = content.clone();
                    r.status = PageStatus::Complete;
                }
                if let Some(cb) = progress {
                    cb.on_conversion_complete(Ok(content.len()));
                }
                combined_output = Some(content);
                RunState::Done
            }
            Err(e) => {
                let detail = e.to_string();
                warn!("{}", detail);
                for r in &mut results {
                    r.output = detail.clone();
                    r.status = PageStatus::ConversionFailed;
                }
                if let Some(cb) = progress {
                    cb.on_conversion_complete(Err(&detail));
                }
                conversion_error = Some(detail);
                RunState::Failed
            }
        }
    } else {
        for r in results.iter_mut().filter(|r| r.ocr_succeeded()) {
            r.status = PageStatus::Complete;
        }
        RunState::Done
    };
    let conversion_duration_ms = if config.prompts.is_configured() {
        conversion_start.elapsed().as_millis() as u64
    } else {
        0
    };

    debug_assert!(final_state.is_terminal());
    state.set(final_state);
    if let Some(cb) = progress {
        match &conversion_error {
            Some(detail) => cb.on_status(&RunStatus::Failed(detail.clone())),
            None => cb.on_status(&RunStatus::Done),
        }
        cb.on_run_complete(total, ocr_succeeded);
    }

    RunOutput {
        stats: RunStats {
            total_pages: total,
            ocr_succeeded,
            ocr_failed: total - ocr_succeeded,
            prepare_duration_ms: 0,
            ocr_duration_ms,
            conversion_duration_ms,
            total_duration_ms: ocr_duration_ms + conversion_duration_ms,
        },
        pages: results,
        combined_output,
        conversion_error,
        state: final_state,
    }
}

// ── Studio ───────────────────────────────────────────────────────────────

/// Loads documents and runs them, one run at a time.
///
/// The default engines talk to models through edgequake-llm; supply your own
/// with [`OcrStudio::with_engines`].
///
/// # Example
/// ```rust,no_run
/// use edgequake_ocr2json::{OcrStudio, RunConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RunConfig::builder()
///     .user_prompt("Return the invoice fields as JSON:\n{{text}}")
///     .build()?;
/// let studio = OcrStudio::new(config)?;
/// let document = studio.load("invoice.pdf").await?;
/// let output = studio.start(&document).await?;
/// println!("{}", output.document_output());
/// # Ok(())
/// # }
/// ```
pub struct OcrStudio<O = VisionOcr, C = ChatConverter> {
    config: RunConfig,
    ocr: O,
    converter: C,
    busy: AtomicBool,
    state: StateCell,
}

impl OcrStudio {
    /// Build a studio whose engines come from the configured providers.
    ///
    /// Pre-built providers on the config win; otherwise both are created
    /// with [`ProviderFactory::create_llm_provider`] from `provider_name`
    /// and the respective model name.
    pub fn new(config: RunConfig) -> Result<Self, OcrStudioError> {
        let ocr_provider = match &config.ocr_provider {
            Some(p) => Arc::clone(p),
            None => create_provider(&config.provider_name, &config.ocr_model)?,
        };
        let json_provider = match &config.json_provider {
            Some(p) => Arc::clone(p),
            None => create_provider(&config.provider_name, &config.json_model)?,
        };

        let ocr = VisionOcr::from_config(ocr_provider, &config);
        let converter = ChatConverter::new(json_provider, config.json_timeout());
        Ok(Self::with_engines(config, ocr, converter))
    }
}

impl<O: OcrEngine, C: JsonConverter> OcrStudio<O, C> {
    pub fn with_engines(config: RunConfig, ocr: O, converter: C) -> Self {
        Self {
            config,
            ocr,
            converter,
            busy: AtomicBool::new(false),
            state: StateCell::default(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The current or last run's state.
    pub fn state(&self) -> RunState {
        self.state.get()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Resolve a path or URL, rejecting unsupported or oversized input.
    pub async fn load(&self, input: &str) -> Result<Document, OcrStudioError> {
        load_document(input, &self.config).await
    }

    /// Admit in-memory bytes, rejecting unsupported or oversized input.
    pub async fn load_bytes(
        &self,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Document, OcrStudioError> {
        load_document_bytes(name, bytes, &self.config).await
    }

    /// Prepare and run `document`.
    ///
    /// Fails immediately with [`OcrStudioError::RunInProgress`] if another
    /// run on this studio has not finished. Preparation failures end the
    /// run in [`RunState::Failed`] and are returned as `Err`.
    pub async fn start(&self, document: &Document) -> Result<RunOutput, OcrStudioError> {
        let _busy = BusyGuard::acquire(&self.busy)?;
        let config = &self.config;
        let started = Instant::now();
        info!(
            "Starting run on '{}' ({} page(s))",
            document.name(),
            document.page_count
        );

        self.state.set(RunState::Preparing);
        let pages = match prepare::prepare_pages(&document.source, config).await {
            Ok(pages) if pages.is_empty() => Err(OcrStudioError::EmptyDocument {
                name: document.name().to_string(),
            }),
            other => other,
        };
        let pages = match pages {
            Ok(pages) => pages,
            Err(e) => {
                warn!("Run failed while preparing pages: {}", e);
                self.state.set(RunState::Failed);
                if let Some(cb) = config.progress_callback.as_ref() {
                    cb.on_status(&RunStatus::Failed(e.to_string()));
                }
                return Err(e);
            }
        };
        let prepare_duration_ms = started.elapsed().as_millis() as u64;

        let mut output = drive(&pages, &self.ocr, &self.converter, config, &self.state).await;
        output.stats.prepare_duration_ms = prepare_duration_ms;
        output.stats.total_duration_ms = started.elapsed().as_millis() as u64;

        info!(
            "Run finished: {:?}, {}/{} page(s) OCR'd, {}ms total",
            output.state, output.stats.ocr_succeeded, output.stats.total_pages, output.stats.total_duration_ms
        );
        Ok(output)
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, OcrStudioError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        OcrStudioError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

// ── One-shot entry points ────────────────────────────────────────────────

/// Load `input` (path or URL) and run it with the configured providers.
///
/// The input is checked before any provider is created, so an unsupported
/// file is rejected even when no model is reachable.
pub async fn run(input: impl AsRef<str>, config: &RunConfig) -> Result<RunOutput, OcrStudioError> {
    let document = load_document(input.as_ref(), config).await?;
    let studio = OcrStudio::new(config.clone())?;
    studio.start(&document).await
}

/// Run a document held in memory.
pub async fn run_from_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    config: &RunConfig,
) -> Result<RunOutput, OcrStudioError> {
    let document = load_document_bytes(name, bytes, config).await?;
    let studio = OcrStudio::new(config.clone())?;
    studio.start(&document).await
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(input: impl AsRef<str>, config: &RunConfig) -> Result<RunOutput, OcrStudioError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrStudioError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(input, config))
}

/// Run `input` and write the document output to `output_path`.
///
/// The file receives the conversion output when there is one, otherwise the
/// combined OCR text. Uses atomic write (temp file + rename) so a reader
/// never sees a partial file.
pub async fn run_to_file(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &RunConfig,
) -> Result<RunOutput, OcrStudioError> {
    let output = run(input, config).await?;
    write_atomic(output_path.as_ref(), &output.document_output()).await?;
    Ok(output)
}

/// Write `contents` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), OcrStudioError> {
    let write_failed = |source| OcrStudioError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Describe a document without running any model.
///
/// Does not require a provider or a reachable model server.
pub async fn inspect(input: impl AsRef<str>, config: &RunConfig) -> Result<DocumentInfo, OcrStudioError> {
    let source = input::resolve_input(input.as_ref(), config.download_timeout_secs).await?;
    render::inspect_source(&source, config.password.as_deref()).await
}
