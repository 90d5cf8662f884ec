//! Error types for the contract-reader library.
//!
//! Every failure the library can surface is a [`ContractError`]. Callers
//! rarely care about the exact variant; they care about the *category*,
//! because each category calls for a different reaction:
//!
//! | Kind | Caller reaction |
//! |------|-----------------|
//! | [`ErrorKind::UnsupportedFormat`] | ask for a `.pdf` or `.docx` file |
//! | [`ErrorKind::ParseFailure`] | the file is damaged; ask for another copy |
//! | [`ErrorKind::OcrUnavailable`] | install / fix tesseract or pdfium |
//! | [`ErrorKind::InvalidRequest`] | fix the request (blank text or question) |
//! | [`ErrorKind::ModelRateLimited`] | back off and retry later |
//! | [`ErrorKind::ModelUnauthorized`] / [`ErrorKind::ModelForbidden`] | reconfigure credentials |
//! | [`ErrorKind::ModelOther`] | transient upstream failure |
//!
//! [`ContractError::report`] flattens an error into an [`ErrorReport`]: a
//! stable machine-checkable code, a status signal and a human-readable
//! detail string. That is the only shape front-ends should expose.
//!
//! Two outcomes are deliberately *not* errors: a PDF whose OCR pass finds no
//! text (returned as empty [`crate::document::ExtractedText`]) and a model
//! reply that is not JSON (returned as [`crate::normalize::AnalysisResult::Raw`]).

use crate::document::DocumentFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// All errors returned by the contract-reader library.
#[derive(Debug, Error)]
pub enum ContractError {
    // ── Extraction errors ─────────────────────────────────────────────────
    /// The filename suffix is neither `.pdf` nor `.docx`.
    #[error("Unsupported file type for '{filename}'\nOnly .pdf and .docx documents are accepted.")]
    UnsupportedFormat { filename: String },

    /// The document library could not parse the file.
    #[error("Could not parse {format} document: {detail}")]
    ParseFailure {
        format: DocumentFormat,
        detail: String,
    },

    /// Rasterisation or text recognition failed, or the tooling is missing.
    #[error(
        "OCR processing failed: {detail}\n\
Make sure tesseract is installed and libpdfium can be loaded \
(set PDFIUM_LIB_PATH to the directory containing it)."
    )]
    OcrUnavailable { detail: String },

    // ── Request errors ────────────────────────────────────────────────────
    /// The caller supplied an unusable request (blank text, blank question).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider could not be initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model API rejected the call because of rate limits or quota.
    #[error("Rate limit exceeded for provider '{provider}': {detail}\nWait a few minutes before trying again.")]
    ModelRateLimited { provider: String, detail: String },

    /// The model API rejected the credentials (401).
    #[error("Authentication error from provider '{provider}': {detail}\nCheck that the API key is valid.")]
    ModelUnauthorized { provider: String, detail: String },

    /// The credentials are valid but lack permission (403).
    #[error("Access denied by provider '{provider}': {detail}")]
    ModelForbidden { provider: String, detail: String },

    /// Any other model failure: timeouts, 5xx, malformed responses.
    #[error("LLM error from provider '{provider}': {detail}")]
    ModelOther { provider: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (staging I/O, panicked worker task).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable error category, one per distinct caller reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    ParseFailure,
    OcrUnavailable,
    InvalidRequest,
    ModelRateLimited,
    ModelUnauthorized,
    ModelForbidden,
    ModelOther,
    InvalidConfig,
    Internal,
}

impl ErrorKind {
    /// Machine-checkable code; never changes between releases.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::ParseFailure => "parse_failure",
            ErrorKind::OcrUnavailable => "ocr_unavailable",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::ModelRateLimited => "model_rate_limited",
            ErrorKind::ModelUnauthorized => "model_unauthorized",
            ErrorKind::ModelForbidden => "model_forbidden",
            ErrorKind::ModelOther => "model_other",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::Internal => "internal",
        }
    }

    /// HTTP-style status signal for front-ends that speak HTTP.
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::UnsupportedFormat => 415,
            ErrorKind::ParseFailure => 422,
            ErrorKind::OcrUnavailable => 503,
            ErrorKind::InvalidRequest => 400,
            ErrorKind::ModelRateLimited => 429,
            ErrorKind::ModelUnauthorized => 401,
            ErrorKind::ModelForbidden => 403,
            ErrorKind::ModelOther => 502,
            ErrorKind::InvalidConfig => 400,
            ErrorKind::Internal => 500,
        }
    }

    /// Whether retrying the same call later can succeed without any change
    /// on the caller's side.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::ModelRateLimited | ErrorKind::ModelOther)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl ContractError {
    /// The stable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContractError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            ContractError::ParseFailure { .. } => ErrorKind::ParseFailure,
            ContractError::OcrUnavailable { .. } => ErrorKind::OcrUnavailable,
            ContractError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            // A missing key needs the same fix as a rejected one.
            ContractError::ProviderNotConfigured { .. } => ErrorKind::ModelUnauthorized,
            ContractError::ModelRateLimited { .. } => ErrorKind::ModelRateLimited,
            ContractError::ModelUnauthorized { .. } => ErrorKind::ModelUnauthorized,
            ContractError::ModelForbidden { .. } => ErrorKind::ModelForbidden,
            ContractError::ModelOther { .. } => ErrorKind::ModelOther,
            ContractError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ContractError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Flatten into the structured shape exposed to end users.
    pub fn report(&self) -> ErrorReport {
        let kind = self.kind();
        ErrorReport {
            kind,
            code: kind.code().to_string(),
            status: kind.status(),
            detail: self.to_string(),
        }
    }
}

/// Structured, serialisable error: what front-ends send back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub code: String,
    pub status: u16,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = ContractError::UnsupportedFormat {
            filename: "notes.txt".into(),
        };
        assert!(e.to_string().contains("notes.txt"), "got: {e}");
    }

    #[test]
    fn parse_failure_names_format() {
        let e = ContractError::ParseFailure {
            format: DocumentFormat::Docx,
            detail: "invalid Zip archive".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("DOCX"), "got: {msg}");
        assert!(msg.contains("invalid Zip archive"), "got: {msg}");
    }

    #[test]
    fn model_kinds_have_distinct_statuses() {
        let kinds = [
            ErrorKind::ModelRateLimited,
            ErrorKind::ModelUnauthorized,
            ErrorKind::ModelForbidden,
            ErrorKind::ModelOther,
        ];
        let mut statuses: Vec<u16> = kinds.iter().map(|k| k.status()).collect();
        statuses.sort_unstable();
        statuses.dedup();
        assert_eq!(statuses.len(), kinds.len());
    }

    #[test]
    fn input_and_tooling_kinds_are_distinguishable() {
        assert_ne!(
            ErrorKind::UnsupportedFormat.status(),
            ErrorKind::InvalidRequest.status()
        );
        assert_ne!(
            ErrorKind::OcrUnavailable.status(),
            ErrorKind::ModelOther.status()
        );
    }

    #[test]
    fn provider_not_configured_reports_as_unauthorized() {
        let e = ContractError::ProviderNotConfigured {
            provider: "auto".into(),
            hint: "set GEMINI_API_KEY".into(),
        };
        assert_eq!(e.kind(), ErrorKind::ModelUnauthorized);
    }

    #[test]
    fn report_carries_code_status_and_detail() {
        let e = ContractError::OcrUnavailable {
            detail: "tesseract not found".into(),
        };
        let report = e.report();
        assert_eq!(report.code, "ocr_unavailable");
        assert_eq!(report.status, 503);
        assert!(report.detail.contains("tesseract not found"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "ocr_unavailable");
    }

    #[test]
    fn transient_kinds() {
        assert!(ErrorKind::ModelRateLimited.is_transient());
        assert!(ErrorKind::ModelOther.is_transient());
        assert!(!ErrorKind::ModelUnauthorized.is_transient());
        assert!(!ErrorKind::ParseFailure.is_transient());
    }
}
