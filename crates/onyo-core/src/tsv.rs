//! Tab-separated batch input for `new` and `tsv-to-yaml`.
//!
//! The first line names the keys; every following non-empty line is one
//! asset. The `directory` and `template` columns are instructions to the
//! command, not document content — callers split them off via
//! [`TsvRecord`]. Empty cells leave the key unset.

use crate::error::{OnyoError, Result};

/// Column name selecting the target directory of a row.
pub const COLUMN_DIRECTORY: &str = "directory";

/// Column name selecting a per-row template.
pub const COLUMN_TEMPLATE: &str = "template";

/// One parsed TSV row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TsvRecord {
    /// Key/value pairs in column order (empty cells dropped).
    pub keys: Vec<(String, String)>,
    /// Value of the `directory` column, if present and non-empty.
    pub directory: Option<String>,
    /// Value of the `template` column, if present and non-empty.
    pub template: Option<String>,
}

/// Parse a whole TSV document.
///
/// # Errors
/// [`OnyoError::InvalidOperation`] on a missing header, duplicate or empty
/// column names, or a row with more cells than the header.
pub fn parse(text: &str) -> Result<Vec<TsvRecord>> {
    let mut lines = text.lines();
    let header_line = lines.next().ok_or_else(|| OnyoError::InvalidOperation {
        reason: "TSV input is empty".to_owned(),
    })?;

    let header: Vec<&str> = header_line.split('\t').map(str::trim).collect();
    if header.iter().any(|h| h.is_empty()) {
        return Err(OnyoError::InvalidOperation {
            reason: "TSV header has an empty column name".to_owned(),
        });
    }
    for (i, column) in header.iter().enumerate() {
        if header[..i].contains(column) {
            return Err(OnyoError::InvalidOperation {
                reason: format!("TSV header repeats column '{column}'"),
            });
        }
    }

    let mut records = vec![];
    for (lineno, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split('\t').map(str::trim).collect();
        if cells.len() > header.len() {
            return Err(OnyoError::InvalidOperation {
                reason: format!(
                    "TSV line {} has {} cells but the header names {} columns",
                    lineno + 2,
                    cells.len(),
                    header.len()
                ),
            });
        }

        let mut record = TsvRecord::default();
        for (column, cell) in header.iter().zip(cells.iter()) {
            if cell.is_empty() {
                continue;
            }
            match *column {
                COLUMN_DIRECTORY => record.directory = Some((*cell).to_owned()),
                COLUMN_TEMPLATE => record.template = Some((*cell).to_owned()),
                key => record.keys.push((key.to_owned(), (*cell).to_owned())),
            }
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_with_directory_column() {
        let text = "type\tmake\tmodel\tserial\tdirectory\n\
                    laptop\tapple\tmbp\t1\tshelf\n\
                    laptop\tdell\txps\t2\tdepot\n";
        let records = parse(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].directory.as_deref(), Some("shelf"));
        assert_eq!(
            records[0].keys,
            [
                ("type".to_owned(), "laptop".to_owned()),
                ("make".to_owned(), "apple".to_owned()),
                ("model".to_owned(), "mbp".to_owned()),
                ("serial".to_owned(), "1".to_owned()),
            ]
        );
    }

    #[test]
    fn empty_cells_leave_keys_unset() {
        let text = "type\tserial\ncable\t\n";
        let records = parse(text).unwrap();
        assert_eq!(records[0].keys, [("type".to_owned(), "cable".to_owned())]);
    }

    #[test]
    fn template_column_is_split_off() {
        let text = "type\ttemplate\nlaptop\tlaptop.example\n";
        let records = parse(text).unwrap();
        assert_eq!(records[0].template.as_deref(), Some("laptop.example"));
        assert_eq!(records[0].keys, [("type".to_owned(), "laptop".to_owned())]);
    }

    #[test]
    fn oversized_row_is_rejected() {
        let text = "type\nlaptop\textra\n";
        assert!(parse(text).is_err());
    }

    #[test]
    fn duplicate_column_is_rejected() {
        assert!(parse("type\ttype\nx\ty\n").is_err());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let records = parse("type\n\nlaptop\n\n").unwrap();
        assert_eq!(records.len(), 1);
    }
}
