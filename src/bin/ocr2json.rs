//! CLI binary for edgequake-ocr2json.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `RunConfig`, drives one run, and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ocr2json::driver::write_atomic;
use edgequake_ocr2json::{
    inspect, load_document, OcrStudio, ProgressCallback, RunConfig, RunOutput,
    RunProgressCallback, RunState, RunStatus, SourceKind,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner while pages render, a bar while they are
/// OCR'd, and one log line per finished page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the page currently being OCR'd.
    page_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("OCR");
        self.bar.reset_eta();
    }

    fn page_elapsed_secs(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_status(&self, status: &RunStatus) {
        match status {
            RunStatus::Converting => {
                self.bar.set_prefix("Converting");
                self.bar.set_message("waiting for the JSON model…");
            }
            RunStatus::Rendered { .. } | RunStatus::Rendering => {
                self.bar.set_message(status.to_string());
            }
            _ => {}
        }
    }

    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Running OCR on {total_pages} page(s)…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let secs = self.page_elapsed_secs();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.page_elapsed_secs();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep one line per page.
        let msg: String = if error.chars().count() > 80 {
            let mut short: String = error.chars().take(79).collect();
            short.push('\u{2026}');
            short
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, result: Result<usize, &str>) {
        match result {
            Ok(len) => self
                .bar
                .println(format!("  {} JSON  {}", green("✓"), dim(&format!("{len} chars")))),
            Err(detail) => self.bar.println(format!("  {} JSON  {}", red("✗"), red(detail))),
        }
    }

    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);

        if failed == 0 {
            eprintln!(
                "{} {} page(s) recognised",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} page(s) recognised  ({} failed)",
                if success_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR only: print the page texts
  ocr2json scan.pdf

  # OCR, then convert to JSON with a prompt
  ocr2json invoice.pdf --user-prompt 'Return the invoice as JSON: {{text}}' -o invoice.json

  # Prompts from files, binarised pages
  ocr2json receipt.png --system-prompt-file sys.txt --user-prompt-file user.txt \
      --enhance-mode binarize --threshold 180

  # Full per-page result as JSON
  ocr2json --json scan.pdf > run.json

  # Document facts only (no model needed)
  ocr2json --inspect-only scan.pdf

  # Effective configuration
  ocr2json --show-config

ENVIRONMENT VARIABLES:
  OLLAMA_BASE_URL         Ollama server URL (default http://localhost:11434)
  OLLAMA_HOST             Read by the Ollama provider when OLLAMA_BASE_URL is unset
  EDGEQUAKE_LLM_PROVIDER  Provider for both models (default ollama)
  OCR_MODEL               Vision model for OCR (default deepseek-ocr)
  JSON_MODEL              Text model for conversion (default gpt-oss:120b-cloud)
  MAX_PAGES               Maximum PDF pages (default 25)
  OCR_TIMEOUT_MS          Per-page OCR timeout (default REQUEST_TIMEOUT_MS)
  REQUEST_TIMEOUT_MS      Fallback OCR timeout (default 60000)
  JSON_TIMEOUT_MS         Conversion timeout (default 120000)
  PDF_RENDER_SCALE        Page scale factor (default 2.5)
  PDF_ENHANCE             "true" (any case) enables enhancement (default true)
  PDF_ENHANCE_MODE        contrast | binarize (default contrast)
  PDF_ENHANCE_CONTRAST    Contrast factor (default 1.15)
  PDF_ENHANCE_THRESHOLD   Binarisation threshold (default 200)
  PDFIUM_LIB_PATH         Directory containing libpdfium

  A .env file in the working directory is loaded first.
"#;

/// OCR PDFs and images with a local vision model, then convert the text to JSON.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2json",
    version,
    about = "OCR PDFs and images with a local vision model, then convert the text to JSON",
    long_about = "Rasterise each PDF page (or take a single image), OCR it with a vision model \
served by Ollama, and optionally send the combined text to a second model that turns it into \
JSON according to your prompts.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/image path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "show_config")]
    input: Option<String>,

    /// Write the document output to this file instead of stdout.
    #[arg(short, long, env = "OCR2JSON_OUTPUT")]
    output: Option<PathBuf>,

    /// Output the full run (every page's text, status and output) as JSON.
    #[arg(long, env = "OCR2JSON_JSON")]
    json: bool,

    /// System prompt for the JSON conversion.
    #[arg(long, conflicts_with = "system_prompt_file")]
    system_prompt: Option<String>,

    /// User prompt for the JSON conversion; `{{text}}` is replaced by the OCR text.
    #[arg(long, conflicts_with = "user_prompt_file")]
    user_prompt: Option<String>,

    /// Read the system prompt from a file.
    #[arg(long)]
    system_prompt_file: Option<PathBuf>,

    /// Read the user prompt from a file.
    #[arg(long)]
    user_prompt_file: Option<PathBuf>,

    /// Ollama server URL; overrides OLLAMA_HOST.
    #[arg(long, env = "OLLAMA_BASE_URL")]
    ollama_url: Option<String>,

    /// LLM provider for both models (ollama, openai, anthropic, gemini, …).
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER", default_value = "ollama")]
    provider: String,

    /// Vision model used for OCR.
    #[arg(long, env = "OCR_MODEL", default_value = "deepseek-ocr")]
    ocr_model: String,

    /// Text model used for the JSON conversion.
    #[arg(long, env = "JSON_MODEL", default_value = "gpt-oss:120b-cloud")]
    json_model: String,

    /// Maximum number of PDF pages accepted.
    #[arg(long, env = "MAX_PAGES", default_value_t = 25)]
    max_pages: usize,

    /// Scale factor applied to the PDF page size when rasterising.
    #[arg(long, env = "PDF_RENDER_SCALE", default_value_t = 2.5)]
    scale: f32,

    /// Enhance rendered PDF pages ("true" in any case enables it).
    #[arg(long, env = "PDF_ENHANCE", default_value = "true",
          value_parser = parse_enhance, action = clap::ArgAction::Set)]
    enhance: bool,

    /// Enhancement mode: contrast or binarize. Other values leave pages untouched.
    #[arg(long, env = "PDF_ENHANCE_MODE", default_value = "contrast")]
    enhance_mode: String,

    /// Contrast factor applied around mid-grey.
    #[arg(long, env = "PDF_ENHANCE_CONTRAST", default_value_t = 1.15)]
    contrast: f64,

    /// Binarisation threshold (0–255).
    #[arg(long, env = "PDF_ENHANCE_THRESHOLD", default_value_t = 200)]
    threshold: u8,

    /// Per-page OCR call timeout in milliseconds [default: --request-timeout-ms].
    #[arg(long, env = "OCR_TIMEOUT_MS")]
    ocr_timeout_ms: Option<u64>,

    /// OCR timeout used when --ocr-timeout-ms is not given.
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 60_000)]
    request_timeout_ms: u64,

    /// JSON conversion call timeout in milliseconds.
    #[arg(long, env = "JSON_TIMEOUT_MS", default_value_t = 120_000)]
    json_timeout_ms: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "OCR2JSON_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "OCR2JSON_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print document facts only, no OCR.
    #[arg(long)]
    inspect_only: bool,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    show_config: bool,

    /// Disable the progress bar.
    #[arg(long, env = "OCR2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2JSON_QUIET")]
    quiet: bool,
}

/// Enhancement is on only for "true", in any letter case.
impl Cli {
    /// `OCR_TIMEOUT_MS`, then `REQUEST_TIMEOUT_MS`, then 60 s.
    fn effective_ocr_timeout_ms(&self) -> u64 {
        self.ocr_timeout_ms.unwrap_or(self.request_timeout_ms)
    }
}

fn parse_enhance(s: &str) -> Result<bool, String> {
    Ok(s.eq_ignore_ascii_case("true"))
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // The edgequake-llm Ollama provider reads its address from OLLAMA_HOST.
    // Set it before the runtime starts any threads.
    if let Some(url) = cli.ollama_url.as_deref() {
        std::env::set_var("OLLAMA_HOST", url);
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?
        .block_on(run_cli(cli))
}

async fn run_cli(cli: Cli) -> Result<()> {

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.show_config;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress && !cli.inspect_only {
        Some(CliProgressCallback::new() as Arc<dyn RunProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Show-config mode ─────────────────────────────────────────────────
    if cli.show_config {
        println!(
            "{}",
            serde_json::to_string_pretty(&config.summary())
                .context("Failed to serialise configuration")?
        );
        return Ok(());
    }

    let input = cli.input.as_deref().context("No input given")?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(input, &config)
            .await
            .context("Failed to inspect document")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialise document info")?
            );
        } else {
            println!("File:         {}", info.name);
            match &info.kind {
                SourceKind::Pdf => println!("Type:         PDF"),
                SourceKind::Image { mime_type } => println!("Type:         {}", mime_type),
            }
            println!("Size:         {} bytes", info.byte_len);
            println!("Pages:        {}", info.page_count);
            if let Some(ref t) = info.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = info.author {
                println!("Author:       {}", a);
            }
            if let Some(ref v) = info.pdf_version {
                println!("PDF Version:  {}", v);
            }
        }
        return Ok(());
    }

    // ── Run ──────────────────────────────────────────────────────────────
    // Load before creating providers so bad input is rejected first.
    let document = load_document(input, &config)
        .await
        .context("Failed to load input")?;
    let studio = OcrStudio::new(config).context("Failed to set up models")?;
    let output = studio.start(&document).await.context("Run failed")?;

    let rendered = if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    } else {
        output.document_output()
    };

    if let Some(ref path) = cli.output {
        write_atomic(path, &rendered)
            .await
            .context("Failed to write output")?;
        if !cli.quiet {
            eprintln!(
                "{}  {}/{} pages  {}ms  →  {}",
                if output.state == RunState::Done { green("✔") } else { red("✘") },
                output.stats.ocr_succeeded,
                output.stats.total_pages,
                output.stats.total_duration_ms,
                bold(&path.display().to_string()),
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }

        if !cli.quiet && !show_progress {
            print_summary(&output);
        }
    }

    if output.state == RunState::Failed {
        anyhow::bail!(
            "{}",
            output
                .conversion_error
                .as_deref()
                .unwrap_or("JSON conversion failed")
        );
    }

    Ok(())
}

fn print_summary(output: &RunOutput) {
    eprintln!(
        "Recognised {}/{} pages in {}ms",
        output.stats.ocr_succeeded, output.stats.total_pages, output.stats.total_duration_ms
    );
    if output.stats.ocr_failed > 0 {
        eprintln!("  {} pages failed", output.stats.ocr_failed);
    }
}

/// Map CLI args to `RunConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RunConfig> {
    let system_prompt = prompt_arg(&cli.system_prompt, &cli.system_prompt_file).await?;
    let user_prompt = prompt_arg(&cli.user_prompt, &cli.user_prompt_file).await?;

    let mut builder = RunConfig::builder()
        .max_pages(cli.max_pages)
        .render_scale(cli.scale)
        .enhance_enabled(cli.enhance)
        .enhance_mode(cli.enhance_mode.as_str().into())
        .contrast(cli.contrast)
        .threshold(cli.threshold)
        .provider_name(cli.provider.clone())
        .ocr_model(cli.ocr_model.clone())
        .json_model(cli.json_model.clone())
        .ocr_timeout_ms(cli.effective_ocr_timeout_ms())
        .json_timeout_ms(cli.json_timeout_ms)
        .download_timeout_secs(cli.download_timeout)
        .system_prompt(system_prompt)
        .user_prompt(user_prompt);

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// A prompt given inline or as a file; empty when neither is set.
async fn prompt_arg(inline: &Option<String>, file: &Option<PathBuf>) -> Result<String> {
    if let Some(text) = inline {
        return Ok(text.clone());
    }
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path)),
        None => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ocr2json").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn enhance_is_true_only_for_true() {
        for on in ["true", "TRUE", "True"] {
            assert_eq!(parse_enhance(on), Ok(true), "{on}");
        }
        for off in ["false", "FALSE", "False", "0", "no", "off", ""] {
            assert_eq!(parse_enhance(off), Ok(false), "{off:?}");
        }
    }

    #[test]
    fn enhance_flag_accepts_any_case() {
        assert!(!parse(&["--enhance", "False", "scan.pdf"]).enhance);
        assert!(parse(&["--enhance", "TRUE", "scan.pdf"]).enhance);
    }

    #[test]
    fn ocr_timeout_falls_back_to_request_timeout() {
        let cli = parse(&["--request-timeout-ms", "5000", "scan.pdf"]);
        assert_eq!(cli.effective_ocr_timeout_ms(), 5000);

        let cli = parse(&["--request-timeout-ms", "5000", "--ocr-timeout-ms", "900", "scan.pdf"]);
        assert_eq!(cli.effective_ocr_timeout_ms(), 900);
    }

    #[test]
    fn ollama_url_flag_is_parsed() {
        let cli = parse(&["--ollama-url", "http://gpu-box:11434", "scan.pdf"]);
        assert_eq!(cli.ollama_url.as_deref(), Some("http://gpu-box:11434"));
    }
}
