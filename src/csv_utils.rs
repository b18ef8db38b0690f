// src/csv_utils.rs
use csv::{ReaderBuilder, StringRecord, Trim};
use std::{
    fs::File,
    io::{BufReader, Cursor, Read},
    path::Path,
    str::FromStr,
};

use crate::error::{ControlError, ControlResult};

/// One parsed CSV row together with its 1-based line number in the source.
#[derive(Debug, Clone)]
pub struct Row {
    pub line: u64,
    pub fields: StringRecord,
}

impl Row {
    /// Parse field `idx` as `T`, naming `column` in the error if it fails.
    pub fn parse<T: FromStr>(&self, idx: usize, column: &str, source_name: &str) -> ControlResult<T> {
        let raw = self.fields.get(idx).unwrap_or("");
        raw.parse::<T>().map_err(|_| ControlError::InvalidNumber {
            source_name: source_name.to_string(),
            line: self.line,
            column: column.to_string(),
            value: raw.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Read every row (header included) from `reader`.
///
/// Rows may have differing field counts; callers decide whether that is
/// tolerated. Fields are trimmed and blank lines are skipped.
pub fn read_rows<R: Read>(reader: R, source_name: &str) -> ControlResult<Vec<Row>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let fields = result.map_err(|e| ControlError::csv(source_name, e))?;
        let line = fields
            .position()
            .map(|p| p.line())
            .unwrap_or(idx as u64 + 1);
        rows.push(Row { line, fields });
    }
    Ok(rows)
}

/// Read rows from in-memory lines, as if they had been joined with newlines.
pub fn read_rows_from_lines<S: AsRef<str>>(lines: &[S], source_name: &str) -> ControlResult<Vec<Row>> {
    let capacity = lines.iter().map(|l| l.as_ref().len() + 1).sum();
    let mut text = String::with_capacity(capacity);
    for line in lines {
        text.push_str(line.as_ref());
        text.push('\n');
    }
    read_rows(Cursor::new(text.into_bytes()), source_name)
}

/// Read rows from a file on disk.
pub fn read_rows_from_path(path: &Path) -> ControlResult<Vec<Row>> {
    let file = File::open(path).map_err(|e| ControlError::io(path, e))?;
    read_rows(BufReader::new(file), &path.display().to_string())
}

/// Split off the header row, failing if the input was empty.
pub fn split_header(mut rows: Vec<Row>, source_name: &str) -> ControlResult<(Row, Vec<Row>)> {
    if rows.is_empty() {
        return Err(ControlError::MissingHeader {
            source_name: source_name.to_string(),
        });
    }
    let data = rows.split_off(1);
    let header = rows.remove(0);
    Ok((header, data))
}
