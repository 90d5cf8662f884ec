//! Extraction stages, one transformation per submodule.
//!
//! ## Data Flow
//!
//! ```text
//! detect ──▶ staging ──▶ direct ──┬──▶ text
//! (suffix)   (tempfile)  (lopdf,  │
//!                         zip)    └─ blank PDF? ──▶ ocr ──▶ text
//!                                                 (pdfium + tesseract)
//! ```
//!
//! 1. [`detect`]: classify the upload by filename suffix; no I/O
//! 2. [`staging`]: write the bytes to a scoped temporary file the parsing
//!    libraries can open; removed when the guard drops
//! 3. [`direct`]: read the PDF text layer or the DOCX body paragraphs
//! 4. [`ocr`]: rasterise every page and recognise it; only reached for
//!    a PDF whose text layer is blank
//!
//! The state machine tying these together lives in [`crate::extract`].

pub mod detect;
pub mod direct;
pub mod ocr;
pub mod staging;
