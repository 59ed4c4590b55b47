//! Configuration types for an OCR run.
//!
//! All run behaviour is controlled through [`RunConfig`], built via its
//! [`RunConfigBuilder`]. The configuration is read once when a run starts;
//! changing it afterwards only affects later runs.

use crate::error::OcrStudioError;
use crate::progress::ProgressCallback;
use crate::prompts::DEFAULT_OCR_PROMPT;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one OCR (and optional JSON conversion) run.
///
/// Built via [`RunConfig::builder()`] or using [`RunConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_ocr2json::{EnhanceMode, RunConfig};
///
/// let config = RunConfig::builder()
///     .max_pages(10)
///     .render_scale(2.0)
///     .enhance_mode(EnhanceMode::Binarize)
///     .user_prompt("Extract the invoice as JSON:\n{{text}}")
///     .build()
///     .unwrap();
/// assert!(config.prompts.is_configured());
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// Maximum number of PDF pages accepted. Default: 25.
    ///
    /// Documents above the limit are rejected when loaded, before any page
    /// is rendered.
    pub max_pages: usize,

    /// Scale factor applied to the PDF page size (in points) when
    /// rasterising. Default: 2.5, i.e. 180 DPI.
    pub render_scale: f32,

    /// Pixel enhancement applied to every rendered PDF page.
    pub enhance: EnhanceConfig,

    /// LLM provider name passed to `ProviderFactory`. Default: `"ollama"`.
    pub provider_name: String,

    /// Vision model used for OCR. Default: `"deepseek-ocr"`.
    pub ocr_model: String,

    /// Text model used for the JSON conversion. Default: `"gpt-oss:120b-cloud"`.
    pub json_model: String,

    /// Pre-constructed OCR provider. Takes precedence over `provider_name`.
    pub ocr_provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed conversion provider. Takes precedence over `provider_name`.
    pub json_provider: Option<Arc<dyn LLMProvider>>,

    /// User-turn text sent with each page image. Default: `"Free OCR."`.
    pub ocr_prompt: String,

    /// Per-page OCR call timeout in milliseconds. Default: 60 000.
    pub ocr_timeout_ms: u64,

    /// JSON conversion call timeout in milliseconds. Default: 120 000.
    pub json_timeout_ms: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Prompts for the optional JSON conversion step.
    pub prompts: ConversionPrompts,

    /// Receives status and per-page events while a run progresses.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_pages: 25,
            render_scale: 2.5,
            enhance: EnhanceConfig::default(),
            provider_name: "ollama".to_string(),
            ocr_model: "deepseek-ocr".to_string(),
            json_model: "gpt-oss:120b-cloud".to_string(),
            ocr_provider: None,
            json_provider: None,
            ocr_prompt: DEFAULT_OCR_PROMPT.to_string(),
            ocr_timeout_ms: 60_000,
            json_timeout_ms: 120_000,
            download_timeout_secs: 120,
            password: None,
            prompts: ConversionPrompts::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("max_pages", &self.max_pages)
            .field("render_scale", &self.render_scale)
            .field("enhance", &self.enhance)
            .field("provider_name", &self.provider_name)
            .field("ocr_model", &self.ocr_model)
            .field("json_model", &self.json_model)
            .field("ocr_provider", &self.ocr_provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("json_provider", &self.json_provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("ocr_timeout_ms", &self.ocr_timeout_ms)
            .field("json_timeout_ms", &self.json_timeout_ms)
            .field("prompts", &self.prompts)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RunProgressCallback>"),
            )
            .finish()
    }
}

impl RunConfig {
    /// Create a new builder for `RunConfig`.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_millis(self.ocr_timeout_ms)
    }

    pub fn json_timeout(&self) -> Duration {
        Duration::from_millis(self.json_timeout_ms)
    }

    /// Public view of the effective settings, safe to print or serialise.
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            provider: self.provider_name.clone(),
            ocr_model: self.ocr_model.clone(),
            json_model: self.json_model.clone(),
            max_pages: self.max_pages,
            pdf_render_scale: self.render_scale,
            pdf_enhance: self.enhance.enabled,
            pdf_enhance_mode: self.enhance.mode.to_string(),
            pdf_enhance_contrast: self.enhance.contrast,
            pdf_enhance_threshold: self.enhance.threshold,
            ocr_timeout_ms: self.ocr_timeout_ms,
            json_timeout_ms: self.json_timeout_ms,
            conversion_configured: self.prompts.is_configured(),
        }
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn enhance(mut self, enhance: EnhanceConfig) -> Self {
        self.config.enhance = enhance;
        self
    }

    pub fn enhance_enabled(mut self, enabled: bool) -> Self {
        self.config.enhance.enabled = enabled;
        self
    }

    pub fn enhance_mode(mut self, mode: EnhanceMode) -> Self {
        self.config.enhance.mode = mode;
        self
    }

    pub fn contrast(mut self, factor: f64) -> Self {
        self.config.enhance.contrast = factor;
        self
    }

    pub fn threshold(mut self, threshold: u8) -> Self {
        self.config.enhance.threshold = threshold;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = model.into();
        self
    }

    pub fn json_model(mut self, model: impl Into<String>) -> Self {
        self.config.json_model = model.into();
        self
    }

    pub fn ocr_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.ocr_provider = Some(provider);
        self
    }

    pub fn json_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.json_provider = Some(provider);
        self
    }

    pub fn ocr_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.ocr_prompt = prompt.into();
        self
    }

    pub fn ocr_timeout_ms(mut self, ms: u64) -> Self {
        self.config.ocr_timeout_ms = ms;
        self
    }

    pub fn json_timeout_ms(mut self, ms: u64) -> Self {
        self.config.json_timeout_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn prompts(mut self, prompts: ConversionPrompts) -> Self {
        self.config.prompts = prompts;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompts.system_prompt = prompt.into();
        self
    }

    pub fn user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompts.user_prompt = prompt.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RunConfig, OcrStudioError> {
        let c = &self.config;
        if c.max_pages == 0 {
            return Err(OcrStudioError::InvalidConfig(
                "max pages must be ≥ 1".into(),
            ));
        }
        if !(c.render_scale.is_finite() && c.render_scale > 0.0) {
            return Err(OcrStudioError::InvalidConfig(format!(
                "render scale must be a positive number, got {}",
                c.render_scale
            )));
        }
        if !(c.enhance.contrast.is_finite() && c.enhance.contrast > 0.0) {
            return Err(OcrStudioError::InvalidConfig(format!(
                "contrast factor must be a positive number, got {}",
                c.enhance.contrast
            )));
        }
        if c.ocr_timeout_ms == 0 || c.json_timeout_ms == 0 {
            return Err(OcrStudioError::InvalidConfig(
                "timeouts must be ≥ 1ms".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enhancement ──────────────────────────────────────────────────────────

/// Pixel enhancement applied to rendered PDF pages before OCR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhanceConfig {
    /// Apply the enhancement at all. Default: true.
    pub enabled: bool,
    /// Which transform to apply. Default: [`EnhanceMode::Contrast`].
    pub mode: EnhanceMode,
    /// Contrast factor applied around mid-grey. Default: 1.15.
    pub contrast: f64,
    /// Binarisation cut-off on the adjusted luminance. Default: 200.
    pub threshold: u8,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: EnhanceMode::Contrast,
            contrast: 1.15,
            threshold: 200,
        }
    }
}

/// Enhancement mode.
///
/// Parsing never fails: any string other than `"contrast"` or `"binarize"`
/// becomes [`EnhanceMode::Other`], which leaves pixels untouched. A new
/// transform only takes effect once it has its own variant here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnhanceMode {
    /// Greyscale with contrast stretched around 128. (default)
    #[default]
    Contrast,
    /// Greyscale, then black/white by threshold.
    Binarize,
    /// Unrecognised mode; a no-op.
    Other(String),
}

impl From<&str> for EnhanceMode {
    fn from(s: &str) -> Self {
        match s {
            "contrast" => EnhanceMode::Contrast,
            "binarize" => EnhanceMode::Binarize,
            other => EnhanceMode::Other(other.to_string()),
        }
    }
}

impl From<String> for EnhanceMode {
    fn from(s: String) -> Self {
        EnhanceMode::from(s.as_str())
    }
}

impl From<EnhanceMode> for String {
    fn from(mode: EnhanceMode) -> Self {
        mode.to_string()
    }
}

impl FromStr for EnhanceMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EnhanceMode::from(s))
    }
}

impl fmt::Display for EnhanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnhanceMode::Contrast => f.write_str("contrast"),
            EnhanceMode::Binarize => f.write_str("binarize"),
            EnhanceMode::Other(s) => f.write_str(s),
        }
    }
}

// ── Conversion prompts ───────────────────────────────────────────────────

/// Prompts for the JSON conversion step.
///
/// Conversion runs only when at least one of the two is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionPrompts {
    /// Sent as a separate system turn when non-empty.
    #[serde(default)]
    pub system_prompt: String,
    /// User turn template; `{{text}}` is replaced by the combined OCR text.
    #[serde(default)]
    pub user_prompt: String,
}

impl ConversionPrompts {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.system_prompt.is_empty() || !self.user_prompt.is_empty()
    }
}

/// Effective settings as printed by `ocr2json --show-config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub provider: String,
    pub ocr_model: String,
    pub json_model: String,
    pub max_pages: usize,
    pub pdf_render_scale: f32,
    pub pdf_enhance: bool,
    pub pdf_enhance_mode: String,
    pub pdf_enhance_contrast: f64,
    pub pdf_enhance_threshold: u8,
    pub ocr_timeout_ms: u64,
    pub json_timeout_ms: u64,
    pub conversion_configured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = RunConfig::default();
        assert_eq!(c.max_pages, 25);
        assert_eq!(c.render_scale, 2.5);
        assert!(c.enhance.enabled);
        assert_eq!(c.enhance.mode, EnhanceMode::Contrast);
        assert_eq!(c.enhance.contrast, 1.15);
        assert_eq!(c.enhance.threshold, 200);
        assert_eq!(c.ocr_timeout(), Duration::from_secs(60));
        assert_eq!(c.json_timeout(), Duration::from_secs(120));
        assert_eq!(c.ocr_prompt, "Free OCR.");
        assert!(!c.prompts.is_configured());
    }

    #[test]
    fn builder_rejects_zero_max_pages() {
        let err = RunConfig::builder().max_pages(0).build().unwrap_err();
        assert!(matches!(err, OcrStudioError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_non_positive_contrast() {
        assert!(RunConfig::builder().contrast(0.0).build().is_err());
        assert!(RunConfig::builder().contrast(-1.0).build().is_err());
        assert!(RunConfig::builder().contrast(f64::NAN).build().is_err());
        assert!(RunConfig::builder().contrast(0.5).build().is_ok());
    }

    #[test]
    fn builder_rejects_bad_scale() {
        assert!(RunConfig::builder().render_scale(0.0).build().is_err());
        assert!(RunConfig::builder().render_scale(f32::INFINITY).build().is_err());
    }

    #[test]
    fn enhance_mode_parsing_is_permissive() {
        assert_eq!("contrast".parse::<EnhanceMode>().unwrap(), EnhanceMode::Contrast);
        assert_eq!("binarize".parse::<EnhanceMode>().unwrap(), EnhanceMode::Binarize);
        assert_eq!(
            "sharpen".parse::<EnhanceMode>().unwrap(),
            EnhanceMode::Other("sharpen".into())
        );
        // Case matters, exactly like the string comparison it mirrors.
        assert_eq!(
            EnhanceMode::from("Binarize"),
            EnhanceMode::Other("Binarize".into())
        );
    }

    #[test]
    fn enhance_mode_serde_is_a_plain_string() {
        let json = serde_json::to_string(&EnhanceMode::Binarize).unwrap();
        assert_eq!(json, "\"binarize\"");
        let back: EnhanceMode = serde_json::from_str("\"posterize\"").unwrap();
        assert_eq!(back, EnhanceMode::Other("posterize".into()));
    }

    #[test]
    fn prompts_configured_when_either_is_set() {
        assert!(ConversionPrompts::new("be terse", "").is_configured());
        assert!(ConversionPrompts::new("", "{{text}}").is_configured());
        assert!(!ConversionPrompts::new("", "").is_configured());
    }

    #[test]
    fn prompts_deserialise_from_settings_json() {
        let p: ConversionPrompts =
            serde_json::from_str(r#"{"systemPrompt":"You output JSON.","userPrompt":""}"#).unwrap();
        assert_eq!(p.system_prompt, "You output JSON.");
        assert!(p.user_prompt.is_empty());
    }

    #[test]
    fn summary_reflects_settings() {
        let c = RunConfig::builder()
            .enhance_mode(EnhanceMode::Binarize)
            .threshold(180)
            .build()
            .unwrap();
        let s = c.summary();
        assert_eq!(s.pdf_enhance_mode, "binarize");
        assert_eq!(s.pdf_enhance_threshold, 180);
        assert_eq!(s.ocr_model, "deepseek-ocr");
        assert!(!s.conversion_configured);
    }
}
