//! OCR fallback: rasterise every PDF page and recognise its text.
//!
//! Two seams keep this testable without native tooling:
//!
//! * [`PageRasterizer`] turns a PDF into page images. The production
//!   implementation, [`PdfiumRasterizer`], drives pdfium.
//! * [`OcrEngine`] turns one RGB image into text. The production
//!   implementation, [`TesseractCli`], shells out to the `tesseract` binary.
//!
//! ## All or nothing
//!
//! A failure on any page fails the whole pass with
//! [`ContractError::OcrUnavailable`]. Partial OCR output would be
//! indistinguishable from a complete but sparse scan, so it is never
//! returned.
//!
//! ## Why cap pixels as well as DPI?
//!
//! A contract with an A0 site plan appended would render at 200 DPI to
//! roughly 6,600 × 9,300 px. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded.

use crate::config::ExtractionConfig;
use crate::error::ContractError;
use crate::progress::ExtractionObserver;
use image::{DynamicImage, ImageFormat, RgbImage};
use pdfium_render::prelude::*;
use std::io::{Cursor, ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info};

/// Receives each rendered page: `(page_index_0based, total_pages, image)`.
pub type PageSink<'a> = dyn FnMut(usize, usize, DynamicImage) -> Result<(), ContractError> + 'a;

/// Renders PDF pages to raster images, in page order.
pub trait PageRasterizer: Send + Sync {
    /// Render every page of `pdf`, handing each image to `sink` as soon as
    /// it is ready. Returns the number of pages rendered.
    ///
    /// An error from `sink` aborts rendering and is returned unchanged.
    fn render_pages(&self, pdf: &Path, sink: &mut PageSink<'_>) -> Result<usize, ContractError>;
}

/// Recognises text in a single page image.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &RgbImage) -> Result<String, ContractError>;
}

// ── Orchestration ────────────────────────────────────────────────────────────

/// Recovers text from image-only PDFs.
#[derive(Clone)]
pub struct OcrFallbackExtractor {
    rasterizer: Arc<dyn PageRasterizer>,
    engine: Arc<dyn OcrEngine>,
}

impl OcrFallbackExtractor {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, engine: Arc<dyn OcrEngine>) -> Self {
        Self { rasterizer, engine }
    }

    /// pdfium rasteriser and tesseract engine, both taken from `config`.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            Arc::new(PdfiumRasterizer::from_config(config)),
            Arc::new(TesseractCli::from_config(config)),
        )
    }

    /// Recognise every page and concatenate the results with no separators.
    ///
    /// An empty result is a success: the scan simply carried no readable text.
    pub fn extract(
        &self,
        pdf: &Path,
        observer: &dyn ExtractionObserver,
    ) -> Result<String, ContractError> {
        let mut text = String::new();
        let mut started = false;

        let pages = self.rasterizer.render_pages(pdf, &mut |idx, total, image| {
            if !started {
                observer.on_ocr_start(total);
                started = true;
            }

            let rgb = to_rgb(image);
            let page_text = self.engine.recognize(&rgb)?;
            let chars = page_text.chars().count();
            debug!("OCR page {}/{} → {} chars", idx + 1, total, chars);

            text.push_str(&page_text);
            observer.on_ocr_page(idx + 1, total, chars);
            Ok(())
        })?;

        if !started {
            observer.on_ocr_start(0);
        }
        info!("OCR recognised {} pages", pages);
        Ok(text)
    }
}

/// Three-channel colour, converting only when the image is not already RGB8.
fn to_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

// ── pdfium ───────────────────────────────────────────────────────────────────

/// [`PageRasterizer`] backed by pdfium-render.
///
/// The library is bound on each call rather than held, so a missing
/// libpdfium surfaces as [`ContractError::OcrUnavailable`] only when a scan
/// actually needs OCR.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: u32,
    max_pixels: u32,
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            dpi: config.ocr_dpi,
            max_pixels: config.max_rendered_pixels,
            library_path: config.pdfium_library_path.clone(),
        }
    }

    /// Configured path, then `PDFIUM_LIB_PATH`, then the system library.
    fn bind(&self) -> Result<Pdfium, ContractError> {
        let configured = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match configured {
            Some(path) => {
                // Either the library file itself or its directory.
                let lib = if path.is_dir() {
                    Pdfium::pdfium_platform_library_name_at_path(&path)
                } else {
                    path
                };
                debug!("Binding pdfium at {}", lib.display());
                Pdfium::bind_to_library(&lib)
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ContractError::OcrUnavailable {
            detail: format!("could not load pdfium: {}", e),
        })?;

        Ok(Pdfium::new(bindings))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn render_pages(&self, pdf: &Path, sink: &mut PageSink<'_>) -> Result<usize, ContractError> {
        let pdfium = self.bind()?;

        let document =
            pdfium
                .load_pdf_from_file(pdf, None)
                .map_err(|e| ContractError::OcrUnavailable {
                    detail: format!("pdfium could not open the document: {:?}", e),
                })?;

        let pages = document.pages();
        let total = pages.len() as usize;
        info!("Rasterising {} pages at {} DPI", total, self.dpi);

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                ContractError::OcrUnavailable {
                    detail: format!("rendering page {} failed: {:?}", idx + 1, e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            sink(idx, total, image)?;
        }

        Ok(total)
    }
}

// ── tesseract ────────────────────────────────────────────────────────────────

/// [`OcrEngine`] that runs the `tesseract` command-line tool.
///
/// Each page is written as a lossless PNG to a scoped temporary file and
/// recognised with `tesseract <png> stdout -l <lang>`. Page files go to the
/// staging directory when one is configured, else the OS temp dir.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
    scratch_dir: Option<PathBuf>,
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            scratch_dir: None,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        let mut engine = Self::new(config.tesseract_path.clone(), config.ocr_language.clone());
        engine.scratch_dir = config.staging_dir.clone();
        engine
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Whether the binary can be launched at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn unavailable(&self, detail: impl std::fmt::Display) -> ContractError {
        ContractError::OcrUnavailable {
            detail: format!("{}: {}", self.binary.display(), detail),
        }
    }
}

/// Lossless PNG keeps glyph edges crisp for recognition.
fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &RgbImage) -> Result<String, ContractError> {
        let png = encode_png(image).map_err(|e| self.unavailable(format!("PNG encoding failed: {}", e)))?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("contract-reader-page-").suffix(".png");
        let created = match self.scratch_dir {
            Some(ref dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut input =
            created.map_err(|e| self.unavailable(format!("could not create page image file: {}", e)))?;
        input
            .write_all(&png)
            .and_then(|_| input.flush())
            .map_err(|e| self.unavailable(format!("could not write page image file: {}", e)))?;

        let output = Command::new(&self.binary)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|e| match e.kind() {
                IoErrorKind::NotFound => self.unavailable("not found on PATH"),
                _ => self.unavailable(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.unavailable(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopObserver;
    use image::{GrayImage, Luma, Rgb};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Hands out `pages` grayscale images without touching the file.
    struct FakeRasterizer {
        pages: usize,
    }

    impl PageRasterizer for FakeRasterizer {
        fn render_pages(&self, _pdf: &Path, sink: &mut PageSink<'_>) -> Result<usize, ContractError> {
            for idx in 0..self.pages {
                let img = GrayImage::from_pixel(4, 4, Luma([idx as u8]));
                sink(idx, self.pages, DynamicImage::ImageLuma8(img))?;
            }
            Ok(self.pages)
        }
    }

    /// Returns "p<n>|" for each call and remembers the pixel layout it saw.
    #[derive(Default)]
    struct ScriptedEngine {
        calls: AtomicUsize,
        fail_on: Option<usize>,
        seen_rgb: Mutex<Vec<Rgb<u8>>>,
    }

    impl OcrEngine for ScriptedEngine {
        fn recognize(&self, image: &RgbImage) -> Result<String, ContractError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen_rgb.lock().unwrap().push(*image.get_pixel(0, 0));
            if self.fail_on == Some(n) {
                return Err(ContractError::OcrUnavailable {
                    detail: "tesseract crashed".into(),
                });
            }
            Ok(format!("p{n}|"))
        }
    }

    #[test]
    fn pages_are_concatenated_in_order_without_separators() {
        let engine = Arc::new(ScriptedEngine::default());
        let ocr = OcrFallbackExtractor::new(Arc::new(FakeRasterizer { pages: 3 }), engine.clone());

        let text = ocr.extract(Path::new("scan.pdf"), &NoopObserver).unwrap();
        assert_eq!(text, "p1|p2|p3|");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn grayscale_pages_are_converted_to_rgb() {
        let engine = Arc::new(ScriptedEngine::default());
        let ocr = OcrFallbackExtractor::new(Arc::new(FakeRasterizer { pages: 2 }), engine.clone());
        ocr.extract(Path::new("scan.pdf"), &NoopObserver).unwrap();

        let seen = engine.seen_rgb.lock().unwrap();
        assert_eq!(seen[0], Rgb([0, 0, 0]));
        assert_eq!(seen[1], Rgb([1, 1, 1]));
    }

    #[test]
    fn one_failing_page_fails_the_whole_pass() {
        let engine = Arc::new(ScriptedEngine {
            fail_on: Some(2),
            ..Default::default()
        });
        let ocr = OcrFallbackExtractor::new(Arc::new(FakeRasterizer { pages: 3 }), engine.clone());

        let err = ocr.extract(Path::new("scan.pdf"), &NoopObserver).unwrap_err();
        assert!(matches!(err, ContractError::OcrUnavailable { .. }));
        // Page 3 is never attempted.
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_pages_is_empty_success() {
        let ocr = OcrFallbackExtractor::new(
            Arc::new(FakeRasterizer { pages: 0 }),
            Arc::new(ScriptedEngine::default()),
        );
        assert_eq!(ocr.extract(Path::new("empty.pdf"), &NoopObserver).unwrap(), "");
    }

    #[test]
    fn rgb_images_pass_through_unchanged() {
        let img = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
        let out = to_rgb(DynamicImage::ImageRgb8(img.clone()));
        assert_eq!(out, img);
    }

    #[test]
    fn png_encoding_produces_png_magic() {
        let png = encode_png(&RgbImage::from_pixel(3, 3, Rgb([255, 255, 255]))).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }

    #[test]
    fn missing_tesseract_is_ocr_unavailable() {
        let engine = TesseractCli::new("/nonexistent/bin/tesseract-xyz", "eng");
        assert!(!engine.is_available());
        let err = engine
            .recognize(&RgbImage::from_pixel(2, 2, Rgb([0, 0, 0])))
            .unwrap_err();
        match err {
            ContractError::OcrUnavailable { detail } => {
                assert!(detail.contains("tesseract-xyz"), "got: {detail}")
            }
            other => panic!("expected OcrUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn unwritable_page_file_is_ocr_unavailable() {
        let engine = TesseractCli::new("/nonexistent/bin/tesseract-xyz", "eng")
            .with_scratch_dir("/no/such/scratch/dir");
        let err = engine
            .recognize(&RgbImage::from_pixel(2, 2, Rgb([0, 0, 0])))
            .unwrap_err();
        match err {
            ContractError::OcrUnavailable { detail } => {
                assert!(detail.contains("page image file"), "got: {detail}")
            }
            other => panic!("expected OcrUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn unbindable_pdfium_is_ocr_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExtractionConfig::builder()
            .pdfium_library_path(dir.path())
            .build()
            .unwrap();
        let rasterizer = PdfiumRasterizer::from_config(&config);
        let err = rasterizer
            .render_pages(Path::new("scan.pdf"), &mut |_, _, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, ContractError::OcrUnavailable { .. }));
    }
}
