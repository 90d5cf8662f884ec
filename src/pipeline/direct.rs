//! Direct text extraction: the PDF text layer and DOCX body paragraphs.
//!
//! Nothing here renders pixels or shells out. The PDF side reads content
//! streams with `lopdf`; the DOCX side opens the zip container and walks
//! `word/document.xml` with `quick-xml`.
//!
//! ## Page and paragraph policy
//!
//! * PDF: pages are read in file order and their text concatenated with no
//!   added separators. A page whose text layer cannot be decoded contributes
//!   an empty string; only a document that fails to load is a parse failure.
//! * DOCX: only paragraphs directly under `w:body` count, in document order,
//!   joined with exactly one `\n` between neighbours. Empty paragraphs are
//!   kept, so `["A", "", "B"]` becomes `"A\n\nB"`. Table cells, headers and
//!   text boxes are not body paragraphs and are skipped.

use crate::document::DocumentFormat;
use crate::error::ContractError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

const DOCUMENT_XML: &str = "word/document.xml";

/// Extract the text of a staged document without OCR.
///
/// An empty return value is a valid document with no embedded text, not a
/// failure.
pub fn extract_direct(path: &Path, format: DocumentFormat) -> Result<String, ContractError> {
    match format {
        DocumentFormat::Pdf => Ok(pdf_page_texts(path)?.concat()),
        DocumentFormat::Docx => Ok(docx_paragraphs(path)?.join("\n")),
        DocumentFormat::Unsupported => Err(ContractError::Internal(
            "direct extraction called for an unsupported document".into(),
        )),
    }
}

// ── PDF ──────────────────────────────────────────────────────────────────────

/// Text layer of every page, one entry per page in file order.
pub fn pdf_page_texts(path: &Path) -> Result<Vec<String>, ContractError> {
    let document = lopdf::Document::load(path).map_err(|e| ContractError::ParseFailure {
        format: DocumentFormat::Pdf,
        detail: e.to_string(),
    })?;

    let pages = document.get_pages();
    debug!("PDF loaded: {} pages", pages.len());

    let texts = pages
        .keys()
        .map(|&page_no| match document.extract_text(&[page_no]) {
            Ok(text) => text,
            Err(e) => {
                warn!("Page {}: no readable text layer ({})", page_no, e);
                String::new()
            }
        })
        .collect();

    Ok(texts)
}

// ── DOCX ─────────────────────────────────────────────────────────────────────

fn docx_error(detail: impl ToString) -> ContractError {
    ContractError::ParseFailure {
        format: DocumentFormat::Docx,
        detail: detail.to_string(),
    }
}

/// Upper bound on the uncompressed size of `word/document.xml`.
const MAX_DOCUMENT_XML: u64 = 64 * 1024 * 1024;

/// WordprocessingML namespaces (transitional and strict).
const WML_NAMESPACES: [&[u8]; 2] = [
    b"http://schemas.openxmlformats.org/wordprocessingml/2006/main",
    b"http://purl.oclc.org/ooxml/wordprocessingml/main",
];

/// Text of every body paragraph, in document order.
pub fn docx_paragraphs(path: &Path) -> Result<Vec<String>, ContractError> {
    let file = File::open(path)
        .map_err(|e| ContractError::Internal(format!("Failed to open staged document: {}", e)))?;

    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(docx_error)?;
    let entry = archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| docx_error(format!("{}: {}", DOCUMENT_XML, e)))?;

    // The declared size comes from the upload and is only a hint.
    let declared = entry.size();
    if declared > MAX_DOCUMENT_XML {
        return Err(docx_error(format!(
            "{} declares {} bytes, limit is {}",
            DOCUMENT_XML, declared, MAX_DOCUMENT_XML
        )));
    }

    let mut xml = Vec::with_capacity(declared as usize);
    entry
        .take(MAX_DOCUMENT_XML + 1)
        .read_to_end(&mut xml)
        .map_err(docx_error)?;
    if xml.len() as u64 > MAX_DOCUMENT_XML {
        return Err(docx_error(format!(
            "{} exceeds {} bytes",
            DOCUMENT_XML, MAX_DOCUMENT_XML
        )));
    }

    let paragraphs = parse_body_paragraphs(&xml)?;
    debug!("DOCX loaded: {} paragraphs", paragraphs.len());
    Ok(paragraphs)
}

fn is_wml(ns: &ResolveResult<'_>) -> bool {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => WML_NAMESPACES.iter().any(|known| known == uri),
        _ => false,
    }
}

/// Walk WordprocessingML and collect the text of each `body/p`.
///
/// Elements are matched by namespace URI and local name, so any prefix
/// (or a default namespace) bound to WordprocessingML is accepted.
fn parse_body_paragraphs(xml: &[u8]) -> Result<Vec<String>, ContractError> {
    let mut reader = NsReader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(4096);
    let mut paragraphs = Vec::new();

    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;
    let mut current: Option<String> = None;
    let mut run_depth = 0usize;
    let mut textbox_depth = 0usize;
    let mut in_text = false;

    loop {
        buf.clear();
        let (ns, event) = reader.read_resolved_event_into(&mut buf).map_err(docx_error)?;
        let wml = is_wml(&ns);

        match event {
            Event::Start(ref e) => {
                depth += 1;
                if wml {
                    match e.local_name().as_ref() {
                        b"body" if body_depth.is_none() => body_depth = Some(depth),
                        b"p" if body_depth.map(|d| d + 1) == Some(depth) => {
                            current = Some(String::new());
                        }
                        b"txbxContent" => textbox_depth += 1,
                        b"r" => run_depth += 1,
                        b"t" => in_text = true,
                        _ => {}
                    }
                }
            }

            Event::Empty(ref e) => {
                if !wml {
                    continue;
                }
                if e.local_name().as_ref() == b"p" && body_depth == Some(depth) {
                    paragraphs.push(String::new());
                } else if let Some(ref mut para) = current {
                    if run_depth > 0 && textbox_depth == 0 {
                        push_run_marker(para, e);
                    }
                }
            }

            Event::Text(ref e) => {
                if in_text && run_depth > 0 && textbox_depth == 0 {
                    if let Some(ref mut para) = current {
                        para.push_str(&e.unescape().map_err(docx_error)?);
                    }
                }
            }

            Event::CData(ref e) => {
                if in_text && run_depth > 0 && textbox_depth == 0 {
                    if let Some(ref mut para) = current {
                        para.push_str(&String::from_utf8_lossy(e));
                    }
                }
            }

            Event::End(ref e) => {
                if wml {
                    match e.local_name().as_ref() {
                        b"p" if body_depth.map(|d| d + 1) == Some(depth) => {
                            if let Some(para) = current.take() {
                                paragraphs.push(para);
                            }
                        }
                        b"body" if body_depth == Some(depth) => body_depth = None,
                        b"txbxContent" => textbox_depth = textbox_depth.saturating_sub(1),
                        b"r" => run_depth = run_depth.saturating_sub(1),
                        b"t" => in_text = false,
                        _ => {}
                    }
                }
                depth = depth.saturating_sub(1);
            }

            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// Self-closing run children that stand for characters.
fn push_run_marker(para: &mut String, e: &BytesStart<'_>) {
    match e.local_name().as_ref() {
        b"tab" | b"ptab" => para.push('\t'),
        b"cr" => para.push('\n'),
        b"noBreakHyphen" => para.push('-'),
        b"br" => {
            // Page and column breaks carry no text.
            let typed = e
                .attributes()
                .flatten()
                .find(|a| a.key.local_name().as_ref() == b"type")
                .map(|a| a.value.into_owned());
            match typed.as_deref() {
                None | Some(b"textWrapping") => para.push('\n'),
                _ => {}
            }
        }
        _ => {}
    }
}
