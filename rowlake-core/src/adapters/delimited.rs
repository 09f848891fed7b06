//! Delimited text (CSV, TSV, ...) through the `csv` crate.

use crate::adapters::{AdapterOptions, DELIMITED_TEXT, ExternalHandle, FormatAdapter};
use crate::data::record::Record;
use crate::error::LakeError;
use crate::sql::convert::union_columns;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?$").expect("valid number regex")
});

/// Reads and writes delimiter-separated text with a header row.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedTextAdapter;

fn delimiter_byte(delimiter: char) -> Result<u8, LakeError> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| LakeError::invalid_input(format!("Delimiter must be a single ASCII character, got '{delimiter}'")))
}

/// Turn a raw cell into a typed value: empty cells become null, `true` and
/// `false` become booleans, numeric text becomes a number.
pub fn coerce_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if NUMBER_PATTERN.is_match(raw) {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::from(n);
        }
        if let Some(n) = raw.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

/// Text written for one cell. Nested values are written as JSON.
fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn column_name(header: &[String], index: usize) -> String {
    match header.get(index) {
        Some(name) if !name.is_empty() => name.clone(),
        _ => format!("column_{}", index + 1),
    }
}

/// Parse delimited bytes into rows.
pub fn parse_delimited(label: &str, data: &[u8], options: &AdapterOptions) -> Result<Vec<Record>, LakeError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte(options.delimiter)?)
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut header: Vec<String> = Vec::new();
    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let fields = result.map_err(|e| LakeError::adapter(label, format!("record {}: {e}", line + 1)))?;
        if line == 0 && options.has_header {
            header = fields.iter().map(|f| f.trim().to_string()).collect();
            continue;
        }
        let mut row = Record::new();
        for (i, raw) in fields.iter().enumerate() {
            let value = if options.infer_types {
                coerce_cell(raw)
            } else {
                Value::String(raw.to_string())
            };
            row.insert(column_name(&header, i), value);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Render rows as delimited text. Columns are the union of all row keys in
/// first-seen order.
pub fn render_delimited(rows: &[Record], options: &AdapterOptions) -> Result<Vec<u8>, LakeError> {
    let columns = union_columns(rows);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_byte(options.delimiter)?)
        .from_writer(Vec::new());

    let write_err = |e: csv::Error| LakeError::adapter("output", e.to_string());
    if options.has_header && !columns.is_empty() {
        writer.write_record(&columns).map_err(write_err)?;
    }
    for row in rows {
        writer
            .write_record(columns.iter().map(|c| render_cell(row.get(c))))
            .map_err(write_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| LakeError::adapter("output", e.to_string()))
}

#[async_trait]
impl FormatAdapter for DelimitedTextAdapter {
    fn tag(&self) -> &'static str {
        DELIMITED_TEXT
    }

    async fn read(&self, handle: &ExternalHandle, options: &AdapterOptions) -> Result<Vec<Record>, LakeError> {
        let data = handle.read_bytes().await?;
        let rows = parse_delimited(&handle.label(), &data, options)?;
        tracing::debug!(input = %handle.label(), rows = rows.len(), "Parsed delimited text");
        Ok(rows)
    }

    async fn write(&self, rows: &[Record], options: &AdapterOptions) -> Result<Vec<u8>, LakeError> {
        render_delimited(rows, options)
    }
}
