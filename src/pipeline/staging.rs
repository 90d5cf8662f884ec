//! Scoped staging of uploaded bytes on disk.
//!
//! ## Why stage at all?
//!
//! pdfium opens documents by path, and both parsers give better error
//! messages for a real file than for a half-read stream. The upload is
//! written once to a [`tempfile::NamedTempFile`] and every stage reads
//! from that path.
//!
//! ## Cleanup
//!
//! [`StagedDocument`] owns the temporary file. Dropping it deletes the file,
//! so release is tied to scope exit: success, error return, panic unwind or
//! a cancelled `spawn_blocking` task all end with the file gone.

use crate::document::DocumentFormat;
use crate::error::ContractError;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// An upload written to a private temporary file.
#[derive(Debug)]
pub struct StagedDocument {
    file: NamedTempFile,
    format: DocumentFormat,
}

impl StagedDocument {
    /// Write `content` to a new temporary file carrying the format's suffix.
    ///
    /// `dir` overrides the OS temp directory.
    pub fn stage(
        content: &[u8],
        format: DocumentFormat,
        dir: Option<&Path>,
    ) -> Result<Self, ContractError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("contract-reader-").suffix(format.suffix());

        let mut file = match dir {
            Some(d) => builder.tempfile_in(d),
            None => builder.tempfile(),
        }
        .map_err(|e| ContractError::Internal(format!("Failed to create staging file: {}", e)))?;

        file.write_all(content)
            .and_then(|_| file.flush())
            .map_err(|e| ContractError::Internal(format!("Failed to write staging file: {}", e)))?;

        debug!(
            "Staged {} bytes of {} at {}",
            content.len(),
            format,
            file.path().display()
        );

        Ok(Self { file, format })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_file_holds_bytes_and_suffix() {
        let staged = StagedDocument::stage(b"%PDF-1.5 body", DocumentFormat::Pdf, None).unwrap();
        assert!(staged.path().to_string_lossy().ends_with(".pdf"));
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"%PDF-1.5 body");
        assert_eq!(staged.format(), DocumentFormat::Pdf);
    }

    #[test]
    fn drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let staged =
                StagedDocument::stage(b"PK", DocumentFormat::Docx, Some(dir.path())).unwrap();
            assert!(staged.path().exists());
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_dir_is_internal_error() {
        let err = StagedDocument::stage(
            b"x",
            DocumentFormat::Pdf,
            Some(Path::new("/no/such/staging/dir")),
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::Internal(_)));
    }
}
