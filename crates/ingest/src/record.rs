//! Streaming reader for newline-delimited JSON exports.
//!
//! Each non-empty line is one document in the export format:
//! `{"_id": "...", "_source": {"title": "...", "body": "..."}}`.

use docingest_core::{AppError, AppResult};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One source document parsed from a single input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Source-assigned identifier (`_id`), stringified
    pub id: Option<String>,

    /// Document title (`_source.title`)
    pub title: Option<String>,

    /// Text to chunk (`_source.body`)
    pub body: String,

    /// 1-based line number in the input file
    pub line: usize,
}

#[derive(Debug, Deserialize)]
struct RawLine {
    #[serde(rename = "_id")]
    id: Option<Value>,
    #[serde(rename = "_source")]
    source: Option<RawSource>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    body: Option<Value>,
    title: Option<Value>,
}

impl Record {
    /// Parse one input line.
    pub fn parse(line: &str, line_number: usize) -> AppResult<Self> {
        let malformed = |reason: String| AppError::MalformedInput {
            line: line_number,
            reason,
        };

        let raw: RawLine = serde_json::from_str(line)
            .map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

        let source = raw
            .source
            .ok_or_else(|| malformed("missing _source".to_string()))?;

        let body = match source.body {
            Some(Value::String(body)) => body,
            Some(other) => {
                return Err(malformed(format!(
                    "_source.body must be a string, got {}",
                    json_type(&other)
                )))
            }
            None => return Err(malformed("missing _source.body".to_string())),
        };

        let title = match source.title {
            None | Some(Value::Null) => None,
            Some(Value::String(title)) => Some(title),
            Some(other) => {
                return Err(malformed(format!(
                    "_source.title must be a string, got {}",
                    json_type(&other)
                )))
            }
        };

        let id = match raw.id {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id),
            Some(Value::Number(id)) => Some(id.to_string()),
            Some(other) => {
                return Err(malformed(format!(
                    "_id must be a string or number, got {}",
                    json_type(&other)
                )))
            }
        };

        Ok(Self {
            id,
            title,
            body,
            line: line_number,
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Lazy, single-pass iterator of records from an ndjson file.
///
/// The file stays open while the reader is alive and is closed when it is
/// dropped. Malformed lines, including lines that are not valid UTF-8, are
/// yielded as errors without ending iteration; after an I/O error the reader
/// yields `None`.
pub struct RecordReader<R = BufReader<File>> {
    reader: R,
    buf: Vec<u8>,
    line_number: usize,
    done: bool,
}

impl RecordReader {
    /// Open an ndjson file for reading.
    pub fn open(path: &Path) -> AppResult<Self> {
        let file = File::open(path).map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open {:?}: {}", path, e),
            ))
        })?;

        tracing::debug!("Opened input file {:?}", path);
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> RecordReader<R> {
    /// Read records from any buffered reader.
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_number: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = AppResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(AppError::Io(e)));
                }
            }
            self.line_number += 1;

            let bytes = self.buf.strip_suffix(b"\n").unwrap_or(&self.buf[..]);
            let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
            let line = match std::str::from_utf8(bytes) {
                Ok(line) => line,
                Err(e) => {
                    return Some(Err(AppError::MalformedInput {
                        line: self.line_number,
                        reason: format!("invalid UTF-8: {}", e),
                    }))
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            return Some(Record::parse(line, self.line_number));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn read_all(input: &str) -> Vec<AppResult<Record>> {
        RecordReader::from_reader(Cursor::new(input.to_string())).collect()
    }

    #[test]
    fn test_parse_full_record() {
        let record =
            Record::parse(r#"{"_source":{"body":"hi","title":"T"},"_id":"42"}"#, 1).unwrap();

        assert_eq!(record.body, "hi");
        assert_eq!(record.title.as_deref(), Some("T"));
        assert_eq!(record.id.as_deref(), Some("42"));
        assert_eq!(record.line, 1);
    }

    #[test]
    fn test_parse_numeric_id_and_missing_title() {
        let record = Record::parse(r#"{"_id": 1234, "_source": {"body": "text"}}"#, 7).unwrap();

        assert_eq!(record.id.as_deref(), Some("1234"));
        assert!(record.title.is_none());
    }

    #[test]
    fn test_parse_missing_body() {
        let err = Record::parse(r#"{"_id":"1","_source":{"title":"T"}}"#, 5).unwrap_err();
        match err {
            AppError::MalformedInput { line, reason } => {
                assert_eq!(line, 5);
                assert!(reason.contains("_source.body"));
            }
            other => panic!("Expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_missing_source() {
        let err = Record::parse(r#"{"_id":"1"}"#, 2).unwrap_err();
        assert!(matches!(err, AppError::MalformedInput { line: 2, .. }));
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = Record::parse("{not json", 9).unwrap_err();
        match err {
            AppError::MalformedInput { line, reason } => {
                assert_eq!(line, 9);
                assert!(reason.starts_with("invalid JSON"));
            }
            other => panic!("Expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_non_string_body() {
        let err = Record::parse(r#"{"_source":{"body":12}}"#, 1).unwrap_err();
        assert!(err.to_string().contains("must be a string, got number"));
    }

    #[test]
    fn test_reader_skips_blank_lines_and_counts_lines() {
        let input = concat!(
            r#"{"_id":"a","_source":{"body":"first"}}"#,
            "\n\n   \n",
            r#"{"_id":"b","_source":{"body":"second"}}"#,
            "\r\n",
        );

        let records: Vec<Record> = read_all(input).into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].body, "first");
        assert_eq!(records[0].line, 1);
        assert_eq!(records[1].body, "second");
        assert_eq!(records[1].line, 4);
    }

    #[test]
    fn test_reader_empty_input() {
        assert!(read_all("").is_empty());
    }

    #[test]
    fn test_reader_reports_bad_line_number() {
        let input = concat!(
            r#"{"_source":{"body":"ok"}}"#,
            "\n",
            r#"{"_source":{}}"#,
            "\n",
        );

        let results = read_all(input);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(AppError::MalformedInput { line: 2, .. })
        ));
    }

    #[test]
    fn test_reader_continues_after_malformed_line() {
        let input = concat!(
            "garbage\n",
            r#"{"_source":{"body":"after"}}"#,
            "\n",
        );

        let mut reader = RecordReader::from_reader(Cursor::new(input));
        assert!(reader.next().unwrap().is_err());
        assert_eq!(reader.next().unwrap().unwrap().body, "after");
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_reader_reports_invalid_utf8_line() {
        let mut input = br#"{"_source":{"body":"ok"}}"#.to_vec();
        input.extend_from_slice(b"\n{\"_source\":{\"body\":\"\xff\xfe\"}}\n");
        input.extend_from_slice(br#"{"_source":{"body":"after"}}"#);
        input.push(b'\n');

        let results: Vec<AppResult<Record>> =
            RecordReader::from_reader(Cursor::new(input)).collect();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().body, "ok");
        match &results[1] {
            Err(AppError::MalformedInput { line, reason }) => {
                assert_eq!(*line, 2);
                assert!(reason.starts_with("invalid UTF-8"));
            }
            other => panic!("Expected MalformedInput, got {:?}", other),
        }
        let last = results[2].as_ref().unwrap();
        assert_eq!(last.body, "after");
        assert_eq!(last.line, 3);
    }

    #[test]
    fn test_reader_last_line_without_newline() {
        let records: Vec<Record> = read_all("\n{\"_source\":{\"body\":\"tail\"}}")
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].line, 2);
    }

    #[test]
    fn test_open_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"_id":"42","_source":{{"body":"hi","title":"T"}}}}"#).unwrap();

        let records: Vec<Record> = RecordReader::open(file.path())
            .unwrap()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_deref(), Some("42"));
    }

    #[test]
    fn test_open_missing_file() {
        let result = RecordReader::open(Path::new("/no/such/export.ndjson"));
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
