//! Extraction entry points: bytes in, text out.
//!
//! [`ExtractionPipeline`] runs one upload through a fixed state machine:
//!
//! ```text
//! Detecting ──▶ DirectExtracting ──┬──▶ Done
//!     │               │            │
//!     ▼               ▼            └─ blank PDF ──▶ OcrExtracting ──▶ Done
//!  Failed(Unsupported) Failed(Parse)                      │
//!                                                         ▼
//!                                              Failed(OcrUnavailable)
//! ```
//!
//! Exactly one terminal state is reached per call and nothing is retried;
//! retry policy belongs to the caller. The staged copy of the upload lives
//! in a [`StagedDocument`] guard, so it is released on every exit path.
//!
//! ## Why synchronous?
//!
//! Every step is CPU-bound or blocking file I/O (lopdf, zip, pdfium,
//! tesseract). The core is a plain blocking call that any thread can run;
//! [`ExtractionPipeline::extract_async`] moves it onto tokio's blocking pool
//! for async hosts.

use crate::config::ExtractionConfig;
use crate::document::{
    DocumentFormat, DocumentInfo, ExtractedText, ExtractionMethod, UploadedDocument,
};
use crate::error::ContractError;
use crate::pipeline::direct;
use crate::pipeline::ocr::OcrFallbackExtractor;
use crate::pipeline::staging::StagedDocument;
use crate::progress::{ExtractionObserver, NoopObserver};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Result of one extraction call: text, or a categorised failure.
pub type ExtractionOutcome = Result<ExtractedText, ContractError>;

/// Detect → direct extraction → conditional OCR → text.
///
/// Cheap to clone; clones share the OCR backends and the observer.
///
/// # Example
///
/// ```rust,no_run
/// use contract_reader::{ExtractionConfig, ExtractionPipeline};
///
/// let pipeline = ExtractionPipeline::new(ExtractionConfig::default());
/// let bytes = std::fs::read("lease.docx").unwrap();
/// let text = pipeline.extract("lease.docx", &bytes).unwrap();
/// println!("{}", text);
/// ```
#[derive(Clone)]
pub struct ExtractionPipeline {
    config: ExtractionConfig,
    ocr: OcrFallbackExtractor,
}

impl ExtractionPipeline {
    /// Pipeline with the pdfium + tesseract OCR fallback.
    pub fn new(config: ExtractionConfig) -> Self {
        let ocr = OcrFallbackExtractor::from_config(&config);
        Self { config, ocr }
    }

    /// Pipeline with a caller-supplied OCR fallback.
    pub fn with_ocr(config: ExtractionConfig, ocr: OcrFallbackExtractor) -> Self {
        Self { config, ocr }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    fn observer(&self) -> Arc<dyn ExtractionObserver> {
        self.config
            .observer
            .clone()
            .unwrap_or_else(|| Arc::new(NoopObserver))
    }

    /// Extract the text of one upload.
    ///
    /// # Errors
    /// * [`ContractError::UnsupportedFormat`]: suffix is not `.pdf`/`.docx`;
    ///   returned before any byte is read
    /// * [`ContractError::ParseFailure`]: the document cannot be parsed
    /// * [`ContractError::OcrUnavailable`]: the PDF needed OCR and
    ///   rasterisation or recognition failed
    ///
    /// A PDF whose OCR pass recognises nothing returns empty text, not an error.
    pub fn extract(&self, filename: &str, content: &[u8]) -> ExtractionOutcome {
        self.extract_document(UploadedDocument::new(filename, content))
    }

    /// [`Self::extract`] for an already-constructed [`UploadedDocument`].
    pub fn extract_document(&self, doc: UploadedDocument<'_>) -> ExtractionOutcome {
        let start = Instant::now();
        let observer = self.observer();

        // ── Detecting ────────────────────────────────────────────────────
        if !doc.format.is_supported() {
            info!("Rejected '{}': unsupported format", doc.filename);
            return Err(ContractError::UnsupportedFormat {
                filename: doc.filename.to_string(),
            });
        }
        info!(
            "Extracting '{}' ({}, {} bytes)",
            doc.filename,
            doc.format,
            doc.content.len()
        );
        observer.on_extraction_start(doc.filename, doc.format);

        let staged = StagedDocument::stage(
            doc.content,
            doc.format,
            self.config.staging_dir.as_deref(),
        )?;

        // ── DirectExtracting ─────────────────────────────────────────────
        let text = direct::extract_direct(staged.path(), staged.format())?;
        let direct_chars = text.chars().count();
        debug!("Direct extraction produced {} chars", direct_chars);
        observer.on_direct_complete(doc.format, direct_chars);

        let result = match doc.format {
            DocumentFormat::Pdf if text.trim().is_empty() => {
                // ── OcrExtracting ────────────────────────────────────────
                info!("No text layer found; falling back to OCR");
                let ocr_text = self.ocr.extract(staged.path(), observer.as_ref())?;
                ExtractedText::new(ocr_text, doc.format, ExtractionMethod::Ocr)
            }
            _ => ExtractedText::new(text, doc.format, ExtractionMethod::Direct),
        };

        // ── Done ─────────────────────────────────────────────────────────
        info!(
            "Extracted {} chars via {} in {}ms",
            result.char_count(),
            result.method(),
            start.elapsed().as_millis()
        );
        observer.on_extraction_complete(result.method(), result.char_count());
        Ok(result)
    }

    /// Run [`Self::extract`] on tokio's blocking pool.
    ///
    /// Takes ownership of the upload because the work may outlive the
    /// caller's borrow. If the returned future is dropped, the blocking task
    /// still runs to completion and releases its staged file.
    pub async fn extract_async(
        &self,
        filename: impl Into<String>,
        content: Vec<u8>,
    ) -> ExtractionOutcome {
        let pipeline = self.clone();
        let filename = filename.into();

        tokio::task::spawn_blocking(move || pipeline.extract(&filename, &content))
            .await
            .map_err(|e| ContractError::Internal(format!("Extraction task panicked: {}", e)))?
    }

    /// Structural facts about an upload, without OCR.
    ///
    /// Detection, staging and cleanup follow the same rules as [`Self::extract`].
    pub fn inspect(&self, filename: &str, content: &[u8]) -> Result<DocumentInfo, ContractError> {
        let doc = UploadedDocument::new(filename, content);
        if !doc.format.is_supported() {
            return Err(ContractError::UnsupportedFormat {
                filename: filename.to_string(),
            });
        }

        let staged = StagedDocument::stage(content, doc.format, self.config.staging_dir.as_deref())?;

        let (pages, paragraphs, has_text_layer) = match doc.format {
            DocumentFormat::Pdf => {
                let texts = direct::pdf_page_texts(staged.path())?;
                let any_text = texts.iter().any(|t| !t.trim().is_empty());
                (Some(texts.len()), None, any_text)
            }
            _ => {
                let paras = direct::docx_paragraphs(staged.path())?;
                let any_text = paras.iter().any(|p| !p.trim().is_empty());
                (None, Some(paras.len()), any_text)
            }
        };

        debug!(
            "Inspected '{}': pages={:?} paragraphs={:?} text_layer={}",
            filename, pages, paragraphs, has_text_layer
        );

        Ok(DocumentInfo {
            filename: filename.to_string(),
            format: doc.format,
            size_bytes: content.len(),
            pages,
            paragraphs,
            has_text_layer,
        })
    }
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ocr::{OcrEngine, PageRasterizer, PageSink};
    use image::{DynamicImage, RgbImage};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NeverRasterizer(AtomicUsize);

    impl PageRasterizer for NeverRasterizer {
        fn render_pages(&self, _pdf: &Path, _sink: &mut PageSink<'_>) -> Result<usize, ContractError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ContractError::OcrUnavailable {
                detail: "should not be called".into(),
            })
        }
    }

    struct OnePage;

    impl PageRasterizer for OnePage {
        fn render_pages(&self, _pdf: &Path, sink: &mut PageSink<'_>) -> Result<usize, ContractError> {
            sink(0, 1, DynamicImage::ImageRgb8(RgbImage::new(2, 2)))?;
            Ok(1)
        }
    }

    struct Blank;

    impl OcrEngine for Blank {
        fn recognize(&self, _image: &RgbImage) -> Result<String, ContractError> {
            Ok("  \n".into())
        }
    }

    fn pipeline_with(rasterizer: Arc<dyn PageRasterizer>) -> ExtractionPipeline {
        ExtractionPipeline::with_ocr(
            ExtractionConfig::default(),
            OcrFallbackExtractor::new(rasterizer, Arc::new(Blank)),
        )
    }

    #[test]
    fn unsupported_format_is_rejected_before_staging() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExtractionConfig::builder()
            .staging_dir(dir.path())
            .build()
            .unwrap();
        let pipeline = ExtractionPipeline::new(config);

        let err = pipeline.extract("notes.txt", b"whatever").unwrap_err();
        assert!(matches!(err, ContractError::UnsupportedFormat { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn corrupt_pdf_is_parse_failure_and_skips_ocr() {
        let rasterizer = Arc::new(NeverRasterizer(AtomicUsize::new(0)));
        let pipeline = pipeline_with(rasterizer.clone());

        let err = pipeline.extract("broken.pdf", b"not a pdf at all").unwrap_err();
        assert!(matches!(err, ContractError::ParseFailure { .. }));
        assert_eq!(rasterizer.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn blank_ocr_output_is_returned_as_is() {
        let text = OcrFallbackExtractor::new(Arc::new(OnePage), Arc::new(Blank))
            .extract(Path::new("scan.pdf"), &NoopObserver)
            .unwrap();
        assert_eq!(text, "  \n");
    }

    #[test]
    fn inspect_rejects_unsupported() {
        let err = ExtractionPipeline::default()
            .inspect("image.png", b"\x89PNG")
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedFormat);
    }

    #[tokio::test]
    async fn extract_async_propagates_errors() {
        let err = ExtractionPipeline::default()
            .extract_async("archive.zip", b"PK".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::UnsupportedFormat { .. }));
    }
}
