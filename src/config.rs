//! Configuration types for extraction and model calls.
//!
//! Two structs, because the two halves of the system have independent
//! lifecycles: an [`ExtractionConfig`] is needed for every upload and never
//! touches the network, while a [`ModelConfig`] is consumed once to build the
//! long-lived [`crate::model::LlmService`] handle.
//!
//! Both are built through validating builders so callers set only what they
//! care about and rely on documented defaults for the rest.

use crate::error::ContractError;
use crate::progress::ExtractionObserver;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default model when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Upper bound on [`ModelConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Configuration for the extraction pipeline.
///
/// # Example
/// ```rust
/// use contract_reader::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .ocr_dpi(300)
///     .ocr_language("eng+fra")
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr_dpi, 300);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rasterisation resolution for the OCR fallback. Range: 72–600. Default: 200.
    ///
    /// Tesseract is tuned for roughly 300 DPI text; 200 keeps body text of a
    /// typical contract legible while rendering an A4 page to ~1650 × 2340 px.
    pub ocr_dpi: u32,

    /// Longest-edge cap on rendered pages, in pixels. Default: 4000.
    ///
    /// Independent of DPI so an oversized page (A0 drawings appended to a
    /// contract) cannot exhaust memory.
    pub max_rendered_pixels: u32,

    /// Tesseract language pack(s), e.g. `"eng"` or `"eng+deu"`. Default: `"eng"`.
    pub ocr_language: String,

    /// Tesseract executable name or path. Default: `"tesseract"`.
    pub tesseract_path: PathBuf,

    /// pdfium shared library, or the directory containing it.
    /// If None, `PDFIUM_LIB_PATH` is consulted, then the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// Directory for staging uploads on disk. If None, the OS temp dir.
    pub staging_dir: Option<PathBuf>,

    /// Optional progress observer.
    pub observer: Option<Arc<dyn ExtractionObserver>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_dpi: 200,
            max_rendered_pixels: 4000,
            ocr_language: "eng".to_string(),
            tesseract_path: PathBuf::from("tesseract"),
            pdfium_library_path: None,
            staging_dir: None,
            observer: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("ocr_dpi", &self.ocr_dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_path", &self.tesseract_path)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("staging_dir", &self.staging_dir)
            .field(
                "observer",
                &self.observer.as_ref().map(|_| "<dyn ExtractionObserver>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn ocr_dpi(mut self, dpi: u32) -> Self {
        self.config.ocr_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ExtractionObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ContractError> {
        let c = &self.config;
        if c.ocr_dpi < 72 || c.ocr_dpi > 600 {
            return Err(ContractError::InvalidConfig(format!(
                "OCR DPI must be 72–600, got {}",
                c.ocr_dpi
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(ContractError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.tesseract_path.as_os_str().is_empty() {
            return Err(ContractError::InvalidConfig(
                "tesseract path must not be empty".into(),
            ));
        }
        if let Some(ref dir) = c.staging_dir {
            if !dir.is_dir() {
                return Err(ContractError::InvalidConfig(format!(
                    "staging directory '{}' does not exist",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}

/// Configuration for the language-model service.
#[derive(Clone)]
pub struct ModelConfig {
    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Model identifier. If None, [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Sampling temperature. Default: 0.2.
    ///
    /// Risk analysis must stay close to the contract wording; a low
    /// temperature keeps the model from inventing clauses.
    pub temperature: f32,

    /// Maximum tokens generated per reply. Default: 4096.
    pub max_tokens: usize,

    /// Retries on rate-limit or other transient failures. Default: 2,
    /// at most [`MAX_RETRIES`].
    ///
    /// Credential errors (401/403) are never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: None,
            provider_name: None,
            model: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ModelConfig {
    pub fn builder() -> ModelConfigBuilder {
        ModelConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model identifier actually sent to the provider.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`ModelConfig`].
#[derive(Debug)]
pub struct ModelConfigBuilder {
    config: ModelConfig,
}

impl ModelConfigBuilder {
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ModelConfig, ContractError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(ContractError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ContractError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(ref name) = c.provider_name {
            if name.trim().is_empty() {
                return Err(ContractError::InvalidConfig(
                    "provider name must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_defaults() {
        let c = ExtractionConfig::default();
        assert_eq!(c.ocr_dpi, 200);
        assert_eq!(c.ocr_language, "eng");
        assert_eq!(c.tesseract_path, PathBuf::from("tesseract"));
        assert!(c.staging_dir.is_none());
    }

    #[test]
    fn dpi_is_clamped() {
        let c = ExtractionConfig::builder().ocr_dpi(10).build().unwrap();
        assert_eq!(c.ocr_dpi, 72);
        let c = ExtractionConfig::builder().ocr_dpi(5000).build().unwrap();
        assert_eq!(c.ocr_dpi, 600);
    }

    #[test]
    fn empty_language_rejected() {
        let err = ExtractionConfig::builder()
            .ocr_language("  ")
            .build()
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidConfig(_)));
    }

    #[test]
    fn missing_staging_dir_rejected() {
        let err = ExtractionConfig::builder()
            .staging_dir("/definitely/not/a/real/dir")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("staging directory"));
    }

    #[test]
    fn existing_staging_dir_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let c = ExtractionConfig::builder()
            .staging_dir(dir.path())
            .build()
            .unwrap();
        assert_eq!(c.staging_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn model_defaults() {
        let c = ModelConfig::default();
        assert_eq!(c.model_or_default(), DEFAULT_MODEL);
        assert_eq!(c.max_retries, 2);
        assert!((c.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn model_builder_validates() {
        assert!(ModelConfig::builder().max_tokens(0).build().is_err());
        assert!(ModelConfig::builder().api_timeout_secs(0).build().is_err());
        assert!(ModelConfig::builder().provider_name("").build().is_err());

        let c = ModelConfig::builder()
            .provider_name("openai")
            .model("gpt-4.1-mini")
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.model_or_default(), "gpt-4.1-mini");
        assert!((c.temperature - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn retry_count_is_clamped() {
        let c = ModelConfig::builder().max_retries(100).build().unwrap();
        assert_eq!(c.max_retries, MAX_RETRIES);
        let c = ModelConfig::builder().max_retries(0).build().unwrap();
        assert_eq!(c.max_retries, 0);
    }
}
