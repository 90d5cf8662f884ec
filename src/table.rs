//! Tabulation of extracted text.
//!
//! Schedules, fee tables and party lists often survive extraction as
//! delimiter-separated lines. [`TextTable::from_text`] splits them into a
//! header and rows so front-ends can display them as a grid or export CSV.
//!
//! Lines are trimmed and blank lines dropped before the header is chosen.
//! Every non-header line, including those above the header, becomes a row.

use crate::error::ContractError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How a line is split into cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Tab,
    Comma,
    Semicolon,
    Pipe,
    /// Runs of whitespace.
    Whitespace,
}

impl Delimiter {
    fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Delimiter::Tab => line.split('\t').collect(),
            Delimiter::Comma => line.split(',').collect(),
            Delimiter::Semicolon => line.split(';').collect(),
            Delimiter::Pipe => line.split('|').collect(),
            Delimiter::Whitespace => line.split_whitespace().collect(),
        }
    }
}

impl FromStr for Delimiter {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tab" | "\\t" => Ok(Delimiter::Tab),
            "comma" | "," => Ok(Delimiter::Comma),
            "semicolon" | ";" => Ok(Delimiter::Semicolon),
            "pipe" | "|" => Ok(Delimiter::Pipe),
            "whitespace" | "space" | "auto" => Ok(Delimiter::Whitespace),
            other => Err(ContractError::InvalidRequest(format!(
                "unknown delimiter '{other}' (expected tab, comma, semicolon, pipe or whitespace)"
            ))),
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Delimiter::Tab => "tab",
            Delimiter::Comma => "comma",
            Delimiter::Semicolon => "semicolon",
            Delimiter::Pipe => "pipe",
            Delimiter::Whitespace => "whitespace",
        };
        f.write_str(s)
    }
}

/// A header row plus data rows, all rows as wide as the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TextTable {
    /// Build a table from `text`, using the `header_line`-th (1-based)
    /// non-blank line as the header.
    ///
    /// Text with no non-blank lines yields an empty table. Rows shorter than
    /// the header are padded with empty cells; a longer row is an error
    /// naming the offending line.
    pub fn from_text(
        text: &str,
        header_line: usize,
        delimiter: Delimiter,
    ) -> Result<Self, ContractError> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        if lines.is_empty() {
            return Ok(Self::default());
        }
        if header_line == 0 || header_line > lines.len() {
            return Err(ContractError::InvalidRequest(format!(
                "header line must be between 1 and {}, got {}",
                lines.len(),
                header_line
            )));
        }

        let header_idx = header_line - 1;
        let cells = |line: &str| -> Vec<String> {
            delimiter
                .split(line)
                .into_iter()
                .map(|c| c.trim().to_string())
                .collect()
        };

        let columns = cells(lines[header_idx]);
        let width = columns.len();

        let mut rows = Vec::with_capacity(lines.len() - 1);
        for (i, line) in lines.iter().enumerate() {
            if i == header_idx {
                continue;
            }
            let mut row = cells(line);
            if row.len() > width {
                return Err(ContractError::InvalidRequest(format!(
                    "line {} has {} cells but the header has {}",
                    i + 1,
                    row.len(),
                    width
                )));
            }
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    /// Render as CSV: header first, one record per row, `\n` line endings.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        if self.is_empty() {
            return out;
        }
        for record in std::iter::once(&self.columns).chain(self.rows.iter()) {
            let line = record
                .iter()
                .map(|cell| csv_field(cell))
                .collect::<Vec<_>>()
                .join(",");
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Quote a field when it contains a comma, quote or line break.
fn csv_field(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULE: &str = "Fee Schedule\n\n\
        Item | Amount | Due\n\
        Setup | 1,000 | Signing\n\
        Licence | 250\n";

    #[test]
    fn header_chosen_after_blank_lines_are_dropped() {
        let t = TextTable::from_text(SCHEDULE, 2, Delimiter::Pipe).unwrap();
        assert_eq!(t.columns, vec!["Item", "Amount", "Due"]);
        assert_eq!(
            t.rows,
            vec![
                vec!["Fee Schedule", "", ""],
                vec!["Setup", "1,000", "Signing"],
                vec!["Licence", "250", ""],
            ]
        );
    }

    #[test]
    fn whitespace_runs_split_cells() {
        let t = TextTable::from_text("a   b\tc\n1 2  3", 1, Delimiter::Whitespace).unwrap();
        assert_eq!(t.columns, vec!["a", "b", "c"]);
        assert_eq!(t.rows, vec![vec!["1", "2", "3"]]);
    }

    #[test]
    fn too_wide_row_is_rejected() {
        let err = TextTable::from_text("a,b\n1,2,3", 1, Delimiter::Comma).unwrap_err();
        assert!(matches!(err, ContractError::InvalidRequest(_)));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn header_out_of_range() {
        assert!(TextTable::from_text("a\nb", 0, Delimiter::Tab).is_err());
        assert!(TextTable::from_text("a\nb", 3, Delimiter::Tab).is_err());
    }

    #[test]
    fn blank_text_is_empty_table() {
        let t = TextTable::from_text(" \n\n", 5, Delimiter::Comma).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.to_csv(), "");
    }

    #[test]
    fn csv_quotes_only_when_needed() {
        let t = TextTable::from_text(SCHEDULE, 2, Delimiter::Pipe).unwrap();
        let csv = t.to_csv();
        assert_eq!(
            csv,
            "Item,Amount,Due\nFee Schedule,,\nSetup,\"1,000\",Signing\nLicence,250,\n"
        );
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn delimiter_parsing() {
        assert_eq!("Pipe".parse::<Delimiter>().unwrap(), Delimiter::Pipe);
        assert_eq!(";".parse::<Delimiter>().unwrap(), Delimiter::Semicolon);
        assert_eq!("auto".parse::<Delimiter>().unwrap(), Delimiter::Whitespace);
        assert!("colon".parse::<Delimiter>().is_err());
        assert_eq!(Delimiter::Comma.to_string(), "comma");
    }
}
