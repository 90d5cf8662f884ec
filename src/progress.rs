//! Observer trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionObserver>`] via
//! [`crate::config::ExtractionConfigBuilder::observer`] to learn which path
//! an upload took and to follow the OCR fallback page by page.
//!
//! # Why an observer instead of return values?
//!
//! OCR over a long scanned contract can take minutes. The observer lets a
//! terminal progress bar (or a web socket) report each recognised page as
//! it finishes, while [`crate::extract::ExtractionPipeline::extract`] keeps
//! its simple "bytes in, text out" signature.
//!
//! Observers receive sizes and counts only, never document text.
//!
//! # Example
//!
//! ```rust
//! use contract_reader::{ExtractionConfig, ExtractionObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter(AtomicUsize);
//!
//! impl ExtractionObserver for PageCounter {
//!     fn on_ocr_page(&self, _page: usize, _total: usize, _chars: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .observer(Arc::new(PageCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::document::{DocumentFormat, ExtractionMethod};
use std::sync::Arc;

/// Called by the extraction pipeline as it moves through its states.
///
/// All methods default to no-ops so implementations override only what
/// they need. Events for one upload arrive in order on the thread running
/// the extraction; implementations shared between uploads must synchronise
/// their own state.
pub trait ExtractionObserver: Send + Sync {
    /// The format has been detected and the upload is about to be staged.
    fn on_extraction_start(&self, filename: &str, format: DocumentFormat) {
        let _ = (filename, format);
    }

    /// Direct extraction finished with `chars` characters (possibly zero).
    fn on_direct_complete(&self, format: DocumentFormat, chars: usize) {
        let _ = (format, chars);
    }

    /// The text layer was blank; `total_pages` pages will be recognised.
    fn on_ocr_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// One page has been recognised.
    ///
    /// * `page`: 1-indexed page number
    /// * `total`: total pages
    /// * `chars`: characters recognised on this page
    fn on_ocr_page(&self, page: usize, total: usize, chars: usize) {
        let _ = (page, total, chars);
    }

    /// Extraction succeeded.
    fn on_extraction_complete(&self, method: ExtractionMethod, chars: usize) {
        let _ = (method, chars);
    }
}

/// Observer that ignores every event. Used when none is configured.
pub struct NoopObserver;

impl ExtractionObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type Observer = Arc<dyn ExtractionObserver>;
