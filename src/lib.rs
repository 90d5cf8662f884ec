//! # contract-reader
//!
//! Extract the text of contract documents (PDF, DOCX) and hand it to a
//! language model for question answering or structured risk analysis.
//!
//! ## Why a fallback chain?
//!
//! Most contracts arrive as born-digital PDFs or Word files whose text can
//! be read directly and exactly. Signed copies, however, are often scans
//! with no text layer at all. The extraction pipeline reads the text layer
//! first and only rasterises and OCRs the pages when that layer is blank,
//! so the slow path runs only when it is the only path.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (filename, bytes)
//!  │
//!  ├─ 1. Detect   suffix → PDF | DOCX | unsupported (no bytes read)
//!  ├─ 2. Stage    scoped temp file, removed on every exit path
//!  ├─ 3. Direct   PDF text layer (lopdf) / DOCX paragraphs (zip + quick-xml)
//!  ├─ 4. OCR      blank PDF only: pdfium raster → tesseract, page by page
//!  └─ 5. Text     ExtractedText, reading order preserved
//!           │
//!           ├─ chat prompt  ─▶ model ─▶ answer
//!           └─ risk prompt  ─▶ model ─▶ normalise ─▶ JSON | {raw_analysis}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use contract_reader::{
//!     ContractAnalyzer, ExtractionConfig, ExtractionPipeline, LlmService, ModelConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = ExtractionPipeline::new(ExtractionConfig::default());
//!     let bytes = std::fs::read("supply-agreement.pdf")?;
//!     let text = pipeline.extract_async("supply-agreement.pdf", bytes).await?;
//!
//!     // Provider from GEMINI_API_KEY / EDGEQUAKE_LLM_PROVIDER / any known key
//!     let model = LlmService::from_config(&ModelConfig::default())?;
//!     let analyzer = ContractAnalyzer::new(Arc::new(model));
//!
//!     let report = analyzer.analyze_risks(text.as_str()).await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `contract-reader` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! contract-reader = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime Tooling
//!
//! Direct extraction is pure Rust. The OCR fallback needs `tesseract` on
//! `PATH` (or [`ExtractionConfig::tesseract_path`]) and a loadable libpdfium
//! ([`ExtractionConfig::pdfium_library_path`] or `PDFIUM_LIB_PATH`). When
//! either is missing, only scanned PDFs fail, with
//! [`ErrorKind::OcrUnavailable`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::ContractAnalyzer;
pub use config::{ExtractionConfig, ExtractionConfigBuilder, ModelConfig, ModelConfigBuilder};
pub use document::{DocumentFormat, DocumentInfo, ExtractedText, ExtractionMethod, UploadedDocument};
pub use error::{ContractError, ErrorKind, ErrorReport};
pub use extract::{ExtractionOutcome, ExtractionPipeline};
pub use model::{LanguageModel, LlmService};
pub use normalize::{normalize_response, AnalysisResult, RiskCategory, RiskReport};
pub use pipeline::detect::detect_format;
pub use pipeline::ocr::{OcrEngine, OcrFallbackExtractor, PageRasterizer, PdfiumRasterizer, TesseractCli};
pub use progress::{ExtractionObserver, NoopObserver};
pub use prompts::{chat_prompt, risk_analysis_prompt};
pub use table::{Delimiter, TextTable};
