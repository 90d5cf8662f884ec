//! Format detection from the declared filename.
//!
//! Only the extension is consulted, compared case-insensitively. Content is
//! never sniffed, so an unsupported upload is rejected before a single byte
//! is read.

use crate::document::DocumentFormat;

/// Classify a filename as PDF, DOCX or unsupported.
///
/// The extension is whatever follows the last dot of the final path
/// component, ignoring leading dots. A dotfile such as `.pdf` therefore has
/// no extension. Whitespace is significant.
pub fn detect_format(filename: &str) -> DocumentFormat {
    match extension(filename) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => DocumentFormat::Pdf,
        Some(ext) if ext.eq_ignore_ascii_case("docx") => DocumentFormat::Docx,
        _ => DocumentFormat::Unsupported,
    }
}

fn extension(filename: &str) -> Option<&str> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem_and_ext = base.trim_start_matches('.');
    stem_and_ext.rsplit_once('.').map(|(_, ext)| ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_supported_suffixes() {
        assert_eq!(detect_format("contract.pdf"), DocumentFormat::Pdf);
        assert_eq!(detect_format("CONTRACT.PDF"), DocumentFormat::Pdf);
        assert_eq!(detect_format("Lease Agreement.Docx"), DocumentFormat::Docx);
        assert_eq!(detect_format("dir/sub/nda.docx"), DocumentFormat::Docx);
    }

    #[test]
    fn rejects_everything_else() {
        for name in [
            "",
            "pdf",
            "contract.doc",
            "contract.txt",
            "contract.pdf.zip",
            "contract.docx.bak",
            "scan.png",
            ".pdfx",
        ] {
            assert_eq!(
                detect_format(name),
                DocumentFormat::Unsupported,
                "{name:?} should be unsupported"
            );
        }
    }

    #[test]
    fn dotfiles_have_no_extension() {
        for name in [".pdf", "..pdf", "dir/.docx", "dir\\.pdf"] {
            assert_eq!(detect_format(name), DocumentFormat::Unsupported, "{name:?}");
        }
        assert_eq!(detect_format(".hidden.pdf"), DocumentFormat::Pdf);
    }

    #[test]
    fn surrounding_whitespace_is_not_trimmed() {
        assert_eq!(detect_format("a.pdf "), DocumentFormat::Unsupported);
        assert_eq!(detect_format("a.docx\n"), DocumentFormat::Unsupported);
        assert_eq!(detect_format(" a.pdf"), DocumentFormat::Pdf);
    }

    #[test]
    fn only_the_final_path_component_counts() {
        assert_eq!(detect_format("archive.pdf/notes"), DocumentFormat::Unsupported);
        assert_eq!(detect_format("C:\\deals\\lease.DOCX"), DocumentFormat::Docx);
    }
}
