//! Upload history ledger.
//!
//! One record per line, `url;thumbnailUrl;deletionUrl;filename`. Fields
//! that need it are double-quoted with `""` as the escaped quote, which is
//! what `csv` writes by default.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use thiserror::Error;

const DELIMITER: u8 = b';';
const FIELDS: usize = 4;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("io error: `{0}`")]
    Io(#[from] std::io::Error),
    #[error("csv error: `{0}`")]
    Csv(#[from] csv::Error),
    #[error("record {record} has {found} fields, expected 4")]
    InvalidRecord { record: usize, found: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryRecord {
    pub url: String,
    pub thumbnail_url: String,
    pub deletion_url: String,
    pub filename: String,
}

impl HistoryRecord {
    fn fields(&self) -> [&str; FIELDS] {
        [
            &self.url,
            &self.thumbnail_url,
            &self.deletion_url,
            &self.filename,
        ]
    }
}

/// Parse ledger text into records. Blank lines are skipped.
pub fn parse_history(data: &str) -> Result<Vec<HistoryRecord>, HistoryError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_bytes());

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row?;
        if row.len() != FIELDS {
            return Err(HistoryError::InvalidRecord {
                record: i + 1,
                found: row.len(),
            });
        }
        records.push(HistoryRecord {
            url: row[0].to_string(),
            thumbnail_url: row[1].to_string(),
            deletion_url: row[2].to_string(),
            filename: row[3].to_string(),
        });
    }
    Ok(records)
}

/// Serialize records back into ledger text.
pub fn format_history(records: &[HistoryRecord]) -> Result<String, HistoryError> {
    let mut writer = WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .from_writer(Vec::new());
    for record in records {
        writer.write_record(record.fields())?;
    }
    let data = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// The history file of one storage directory.
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    path: PathBuf,
}

impl HistoryLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records. A missing file is an empty history.
    pub async fn read_all(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => parse_history(&data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append one record. The whole ledger is read and rewritten.
    pub async fn append(&self, record: HistoryRecord) -> Result<(), HistoryError> {
        let mut records = self.read_all().await?;
        records.push(record);
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, format_history(&records)?).await?;
        debug!(
            "Appended to history {}, {} records",
            self.path.display(),
            records.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(i: usize) -> HistoryRecord {
        HistoryRecord {
            url: format!("https://x/{i}"),
            thumbnail_url: String::new(),
            deletion_url: format!("https://x/delete/{i}"),
            filename: format!("file{i}.png"),
        }
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = HistoryLedger::new(dir.path().join("sharenix.csv"));
        assert!(ledger.read_all().await.unwrap().is_empty());

        for i in 0..5 {
            ledger.append(record(i)).await.unwrap();
        }

        let records = ledger.read_all().await.unwrap();
        assert_eq!(records.len(), 5);
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r, &record(i));
        }
        let raw = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(raw.lines().next().unwrap(), "https://x/0;;https://x/delete/0;file0.png");
    }

    #[test]
    fn test_quoted_fields() {
        let tricky = HistoryRecord {
            url: "https://x/a;b".to_string(),
            thumbnail_url: "say \"hi\"".to_string(),
            deletion_url: "line\nbreak".to_string(),
            filename: " padded".to_string(),
        };
        let text = format_history(&[tricky.clone(), record(1)]).unwrap();
        assert!(text.starts_with("\"https://x/a;b\";\"say \"\"hi\"\"\";\"line\nbreak\";"));
        assert_eq!(parse_history(&text).unwrap(), vec![tricky, record(1)]);
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let text = "a;b;c;d\r\n\r\n\ne;f;g;h";
        let records = parse_history(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].filename, "h");
    }

    #[test]
    fn test_wrong_field_count() {
        assert!(matches!(
            parse_history("a;b;c;d\na;b\n"),
            Err(HistoryError::InvalidRecord { record: 2, found: 2 })
        ));
        // An unterminated quote swallows the rest of the file into one field.
        assert!(matches!(
            parse_history("\"a;b;c;d\n"),
            Err(HistoryError::InvalidRecord { record: 1, found: 1 })
        ));
    }
}
