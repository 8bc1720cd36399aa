//! JSON I/O handling for CLI
//!
//! - Data: JSON-lines, one record per line, blank lines are empty slots
//! - Input: criteria as a single JSON object (argument or stdin)
//! - Output: single JSON object via stdout
//! - UTF-8 only

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::storage::MemoryRecords;

use super::errors::{CliError, CliResult};

/// Loads a JSON-lines file; line `n` (from 0) becomes position `n`
pub fn load_records(path: &Path) -> CliResult<MemoryRecords> {
    let file = File::open(path)?;
    let records = read_records(BufReader::new(file), &path.display().to_string())?;
    debug!(
        path = %path.display(),
        positions = records.live_count(),
        "loaded records"
    );
    Ok(records)
}

fn read_records<R: BufRead>(reader: R, name: &str) -> CliResult<MemoryRecords> {
    let mut records = MemoryRecords::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            records.push_empty();
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|e| CliError::Data {
            path: name.to_string(),
            line: i + 1,
            reason: e.to_string(),
        })?;
        records.push(value);
    }
    Ok(records)
}

/// Parses criteria given inline, or reads them from stdin
pub fn read_criteria(inline: Option<&str>) -> CliResult<Value> {
    let text = match inline {
        Some(text) => text.to_string(),
        None => {
            let mut buf = String::new();
            io::stdin().lock().read_to_string(&mut buf)?;
            buf
        }
    };
    if text.trim().is_empty() {
        return Err(CliError::EmptyInput);
    }
    serde_json::from_str(&text).map_err(CliError::CriteriaJson)
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });
    write_value(&response)
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });
    write_value(&response)
}

fn write_value(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RecordResolver, RecordSource};
    use std::io::Cursor;

    #[test]
    fn test_blank_lines_are_empty_slots() {
        let data = "{\"a\": 1}\n\n{\"a\": 3}\n";
        let records = read_records(Cursor::new(data), "mem").unwrap();
        assert_eq!(records.total_positions(), 3);
        assert!(records.record_at(1).is_none());
        assert_eq!(records.record_at(2).unwrap()["a"], 3);
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let data = "{\"a\": 1}\n{oops\n";
        let err = read_records(Cursor::new(data), "mem").unwrap_err();
        match err {
            CliError::Data { line, .. } => assert_eq!(line, 2),
            other => panic!("expected data error, got {other:?}"),
        }
    }

    #[test]
    fn test_inline_criteria() {
        assert_eq!(read_criteria(Some(r#"{"a": 1}"#)).unwrap()["a"], 1);
        assert!(matches!(read_criteria(Some("  ")), Err(CliError::EmptyInput)));
        assert!(matches!(
            read_criteria(Some("{")),
            Err(CliError::CriteriaJson(_))
        ));
    }

    #[test]
    fn test_load_records_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(&path, "{\"id\": 1}\n{\"id\": 2}\n").unwrap();
        let records = load_records(&path).unwrap();
        assert_eq!(records.live_count(), 2);
    }
}
