//! Language-model boundary: prompt in, reply text out.
//!
//! The rest of the crate talks to a model only through the [`LanguageModel`]
//! trait. [`LlmService`] is the production implementation over
//! `edgequake-llm`; tests substitute a scripted fake.
//!
//! ## Lifecycle
//!
//! [`LlmService::from_config`] is the single initialisation point. There is
//! no process-global client: callers build one service, share it as
//! `Arc<dyn LanguageModel>`, and dropping the last handle tears it down.
//!
//! ## Retry Strategy
//!
//! Rate-limit and other transient failures are retried with exponential
//! backoff (`retry_backoff_ms * 2^(attempt-1)`): with 500 ms base and 2
//! retries the waits are 500 ms → 1 s. Credential failures (401/403) are
//! returned immediately because waiting cannot fix them.

use crate::config::ModelConfig;
use crate::error::ContractError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Opaque text-in/text-out model service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short provider label used in error messages (e.g. `"gemini"`).
    fn label(&self) -> &str;

    /// Send one prompt and return the reply text.
    async fn generate(&self, prompt: &str) -> Result<String, ContractError>;
}

// ── Error classification ─────────────────────────────────────────────────────

static RE_RATE_LIMITED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b429\b|quota|rate[\s_-]?limit").unwrap());
static RE_UNAUTHORIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b401\b|unauthori[sz]ed").unwrap());
static RE_FORBIDDEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b403\b|forbidden").unwrap());

/// Map a provider error message onto a model error sub-kind.
///
/// Checked in order: rate limit/quota, then 401, then 403, else other.
pub fn classify_model_error(provider: &str, message: &str) -> ContractError {
    let provider = provider.to_string();
    let detail = message.to_string();
    if RE_RATE_LIMITED.is_match(message) {
        ContractError::ModelRateLimited { provider, detail }
    } else if RE_UNAUTHORIZED.is_match(message) {
        ContractError::ModelUnauthorized { provider, detail }
    } else if RE_FORBIDDEN.is_match(message) {
        ContractError::ModelForbidden { provider, detail }
    } else {
        ContractError::ModelOther { provider, detail }
    }
}

// ── edgequake-llm service ────────────────────────────────────────────────────

/// [`LanguageModel`] backed by an `edgequake-llm` provider.
pub struct LlmService {
    provider: Arc<dyn LLMProvider>,
    label: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService")
            .field("label", &self.label)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl LlmService {
    /// Resolve a provider from `config` (see [`resolve_provider`]) and wrap it.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ContractError> {
        let (provider, label) = resolve_provider(config)?;
        info!(
            "Model service ready: provider={} model={}",
            label,
            config.model_or_default()
        );
        Ok(Self::new(provider, label, config))
    }

    /// Wrap an already-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &ModelConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            model: config.model_or_default().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LanguageModel for LlmService {
    fn label(&self) -> &str {
        &self.label
    }

    async fn generate(&self, prompt: &str) -> Result<String, ContractError> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = self.options();
        let start = Instant::now();

        let provider = &self.provider;
        let messages = &messages;
        let options = &options;

        let reply = call_with_retries(
            &self.label,
            self.max_retries,
            self.retry_backoff_ms,
            self.api_timeout,
            || async move {
                provider
                    .chat(messages, Some(options))
                    .await
                    .map(|response| {
                        debug!(
                            "{} input tokens, {} output tokens",
                            response.prompt_tokens, response.completion_tokens
                        );
                        response.content
                    })
                    .map_err(|e| format!("{}", e))
            },
        )
        .await?;

        debug!(
            "Model reply: {} chars in {}ms",
            reply.chars().count(),
            start.elapsed().as_millis()
        );
        Ok(reply)
    }
}

/// Delay before retry `attempt` (1-based): `base_ms` doubled per attempt.
/// Saturates instead of overflowing.
fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor)
}

/// Drive `call` with a per-attempt timeout, classifying and retrying failures.
///
/// Only transient kinds ([`crate::error::ErrorKind::is_transient`]) are retried.
pub(crate) async fn call_with_retries<F, Fut>(
    label: &str,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
    mut call: F,
) -> Result<String, ContractError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, String>>,
{
    let mut last_err: Option<ContractError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = backoff_delay_ms(retry_backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label, attempt, max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let err = match timeout(api_timeout, call()).await {
            Ok(Ok(reply)) => return Ok(reply),
            Ok(Err(message)) => classify_model_error(label, &message),
            Err(_) => ContractError::ModelOther {
                provider: label.to_string(),
                detail: format!("no reply within {}s", api_timeout.as_secs()),
            },
        };

        warn!("{}: attempt {} failed ({})", label, attempt + 1, err.kind());
        if !err.kind().is_transient() {
            return Err(err);
        }
        last_err = Some(err);
    }

    Err(last_err.unwrap_or_else(|| ContractError::ModelOther {
        provider: label.to_string(),
        detail: "Unknown error".to_string(),
    }))
}

// ── Provider resolution ──────────────────────────────────────────────────────

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ContractError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        ContractError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`): used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or
///    the default model; the factory reads the matching API key.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured only when both are non-empty.
/// 4. **Gemini key** (`GEMINI_API_KEY`): the product's home provider.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Returns the provider with the label used in error messages.
pub fn resolve_provider(
    config: &ModelConfig,
) -> Result<(Arc<dyn LLMProvider>, String), ContractError> {
    if let Some(ref provider) = config.provider {
        return Ok((Arc::clone(provider), "custom".to_string()));
    }

    let model = config.model_or_default();

    if let Some(ref name) = config.provider_name {
        return Ok((create_provider(name, model)?, name.clone()));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return Ok((create_provider(&prov, &env_model)?, prov));
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return Ok((create_provider("gemini", model)?, "gemini".to_string()));
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ContractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or name a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok((llm_provider, "auto".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn classification_precedence() {
        let k = |m: &str| classify_model_error("gemini", m).kind();
        assert_eq!(k("HTTP 429 Too Many Requests"), ErrorKind::ModelRateLimited);
        assert_eq!(k("Resource has been exhausted (e.g. check quota)."), ErrorKind::ModelRateLimited);
        assert_eq!(k("Rate limit reached"), ErrorKind::ModelRateLimited);
        assert_eq!(k("401 Unauthorized"), ErrorKind::ModelUnauthorized);
        assert_eq!(k("request was UNAUTHORIZED"), ErrorKind::ModelUnauthorized);
        assert_eq!(k("403: Forbidden"), ErrorKind::ModelForbidden);
        assert_eq!(k("connection reset by peer"), ErrorKind::ModelOther);
        // Rate limit wins when several markers appear.
        assert_eq!(k("403 quota exceeded"), ErrorKind::ModelRateLimited);
        assert_eq!(k("401 then 403"), ErrorKind::ModelUnauthorized);
    }

    #[test]
    fn status_codes_inside_other_numbers_do_not_match() {
        let e = classify_model_error("openai", "request id 84290 failed");
        assert_eq!(e.kind(), ErrorKind::ModelOther);
    }

    #[test]
    fn classified_error_keeps_provider_and_detail() {
        let e = classify_model_error("gemini", "401 bad key");
        assert!(e.to_string().contains("gemini"));
        assert!(e.to_string().contains("401 bad key"));
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_delay_ms(500, 1), 500);
        assert_eq!(backoff_delay_ms(500, 2), 1000);
        assert_eq!(backoff_delay_ms(500, 4), 4000);
        assert_eq!(backoff_delay_ms(500, 65), u64::MAX);
        assert_eq!(backoff_delay_ms(500, u32::MAX), u64::MAX);
        assert_eq!(backoff_delay_ms(0, 100), 0);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let reply = call_with_retries("test", 2, 1, Duration::from_secs(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("503 upstream overloaded".to_string())
                } else {
                    Ok("fine".to_string())
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(reply, "fine");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn credential_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = call_with_retries("test", 3, 1, Duration::from_secs(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<String, _>("401 Unauthorized".to_string()) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelUnauthorized);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        let calls = AtomicU32::new(0);
        let err = call_with_retries("test", 1, 1, Duration::from_secs(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<String, _>("429 slow down".to_string()) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelRateLimited);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn timeout_is_model_other() {
        let err = call_with_retries("test", 0, 1, Duration::from_millis(10), || async {
            sleep(Duration::from_secs(5)).await;
            Ok::<_, String>("late".to_string())
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelOther);
        assert!(err.to_string().contains("no reply within"));
    }
}
