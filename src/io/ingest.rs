//! Delimited-text ingest.
//!
//! Capture files are flat: numbers separated by a single-character delimiter,
//! wrapped onto lines in no particular way. Ingest turns a file into one flat
//! token stream and hands it to the de-interleaver.
//!
//! Rules:
//! - **Strict tokens**: every piece between delimiters must be a finite number
//!   (surrounding whitespace is ignored). Empty pieces, blank lines included,
//!   are parse errors.
//! - **No recovery**: the first bad token aborts the run, with its location.
//! - **Separation of concerns**: no channel or fitting logic here.

use std::path::Path;

use crate::domain::{ChannelSet, DatasetConfig};
use crate::error::{LabError, Result};
use crate::io::layout::{RecordLayout, deinterleave};

/// Ingest output: channels plus counters for the run summary.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub channels: ChannelSet,
    pub tokens_read: usize,
    pub records: usize,
    /// Trailing tokens that did not fill a whole record.
    pub dropped_tokens: usize,
}

/// Read `path` and tokenize it.
pub fn tokenize(path: &Path, delimiter: char) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LabError::NotFound {
            path: path.to_path_buf(),
        },
        _ => LabError::io(format!("failed to read '{}'", path.display()), e),
    })?;
    tokenize_str(&text, delimiter, &path.display().to_string())
}

/// Tokenize in-memory text. `source_name` only labels errors.
pub fn tokenize_str(text: &str, delimiter: char, source_name: &str) -> Result<Vec<f64>> {
    let mut tokens = Vec::new();

    // `lines()` strips `\n` / `\r\n` and yields nothing for a final terminator.
    for (line_idx, line) in text.lines().enumerate() {
        for (field_idx, piece) in line.split(delimiter).enumerate() {
            let value = parse_token(piece).ok_or_else(|| LabError::Parse {
                source_name: source_name.to_string(),
                line: line_idx + 1,
                field: field_idx + 1,
                token: piece.to_string(),
            })?;
            tokens.push(value);
        }
    }

    Ok(tokens)
}

fn parse_token(piece: &str) -> Option<f64> {
    piece.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Tokenize the dataset's input file and split it into channels.
pub fn ingest_dataset(config: &DatasetConfig) -> Result<IngestedData> {
    let layout = RecordLayout::from_config(config)?;
    let tokens = tokenize(&config.input, config.delimiter)?;
    let channels = deinterleave(&tokens, &layout)?;

    let records = channels.len();
    let dropped_tokens = tokens.len() - records * layout.width();
    log::info!(
        "{}: {} token(s) → {} record(s) × {} channel(s)",
        config.input.display(),
        tokens.len(),
        records,
        channels.channel_count()
    );

    Ok(IngestedData {
        channels,
        tokens_read: tokens.len(),
        records,
        dropped_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn splits_on_delimiter_across_lines() {
        let tokens = tokenize_str("1;2;3\n4;5\n", ';', "t").unwrap();
        assert_eq!(tokens, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn tolerates_crlf_and_surrounding_whitespace() {
        let tokens = tokenize_str("1.5 ;-2e3\r\n 7;0.25\r\n", ';', "t").unwrap();
        assert_eq!(tokens, vec![1.5, -2000.0, 7.0, 0.25]);
    }

    #[test]
    fn space_delimited_capture() {
        let tokens = tokenize_str("0 30.1 29.8 0\n1 30.0 29.9 0", ' ', "t").unwrap();
        assert_eq!(tokens.len(), 8);
        assert_eq!(tokens[5], 30.0);
    }

    #[test]
    fn empty_text_yields_no_tokens() {
        assert!(tokenize_str("", ';', "t").unwrap().is_empty());
    }

    #[test]
    fn reports_location_of_bad_token() {
        let err = tokenize_str("1;2\n3;abc;5\n", ';', "m.txt").unwrap_err();
        match err {
            LabError::Parse {
                source_name,
                line,
                field,
                token,
            } => {
                assert_eq!(source_name, "m.txt");
                assert_eq!(line, 2);
                assert_eq!(field, 2);
                assert_eq!(token, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn trailing_delimiter_is_an_empty_token() {
        let err = tokenize_str("1;2;\n", ';', "t").unwrap_err();
        assert!(matches!(err, LabError::Parse { line: 1, field: 3, .. }));
    }

    #[test]
    fn blank_line_is_rejected() {
        let err = tokenize_str("1;2\n\n3;4\n", ';', "t").unwrap_err();
        assert!(matches!(err, LabError::Parse { line: 2, field: 1, .. }));
    }

    #[test]
    fn non_finite_literals_are_rejected() {
        assert!(tokenize_str("1;NaN", ';', "t").is_err());
        assert!(tokenize_str("inf;1", ';', "t").is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = tokenize(&dir.path().join("absent.txt"), ';').unwrap_err();
        assert!(matches!(err, LabError::NotFound { .. }));
    }

    #[test]
    fn ingests_dataset_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "1;2;3;4;5\n6;7;8;9;10\n11;12\n").unwrap();

        let config = DatasetConfig {
            name: "lab3".to_string(),
            input: file.path().to_path_buf(),
            snapshot: "unused.json".into(),
            delimiter: ';',
            record_width: 5,
            columns: vec![
                crate::domain::ColumnBinding::new(0, "meas_time"),
                crate::domain::ColumnBinding::new(4, "pt100"),
            ],
        };
        let data = ingest_dataset(&config).unwrap();
        assert_eq!(data.tokens_read, 12);
        assert_eq!(data.records, 2);
        assert_eq!(data.dropped_tokens, 2);
        assert_eq!(data.channels.get("pt100"), Some(&[5.0, 10.0][..]));
    }
}
