//! Structured text: a JSON document or JSON Lines.

use crate::adapters::{AdapterOptions, ExternalHandle, FormatAdapter, STRUCTURED_TEXT};
use crate::data::record::Record;
use crate::error::LakeError;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredTextAdapter;

/// Non-object items become single-column rows under `value`.
fn into_row(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => {
            let mut row = Record::new();
            row.insert("value".into(), other);
            row
        }
    }
}

pub fn parse_structured(label: &str, data: &[u8], options: &AdapterOptions) -> Result<Vec<Record>, LakeError> {
    let text = std::str::from_utf8(data).map_err(|e| LakeError::adapter(label, e.to_string()))?;

    if options.json_lines {
        let mut rows = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)
                .map_err(|e| LakeError::adapter(label, format!("line {}: {e}", i + 1)))?;
            rows.push(into_row(value));
        }
        return Ok(rows);
    }

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: Value = serde_json::from_str(text).map_err(|e| LakeError::adapter(label, e.to_string()))?;
    Ok(match document {
        Value::Array(items) => items.into_iter().map(into_row).collect(),
        other => vec![into_row(other)],
    })
}

pub fn render_structured(rows: &[Record], options: &AdapterOptions) -> Result<Vec<u8>, LakeError> {
    if options.json_lines {
        let mut out = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut out, row)?;
            out.push(b'\n');
        }
        return Ok(out);
    }
    let bytes = if options.pretty {
        serde_json::to_vec_pretty(rows)?
    } else {
        serde_json::to_vec(rows)?
    };
    Ok(bytes)
}

#[async_trait]
impl FormatAdapter for StructuredTextAdapter {
    fn tag(&self) -> &'static str {
        STRUCTURED_TEXT
    }

    async fn read(&self, handle: &ExternalHandle, options: &AdapterOptions) -> Result<Vec<Record>, LakeError> {
        let data = handle.read_bytes().await?;
        let rows = parse_structured(&handle.label(), &data, options)?;
        tracing::debug!(input = %handle.label(), rows = rows.len(), "Parsed structured text");
        Ok(rows)
    }

    async fn write(&self, rows: &[Record], options: &AdapterOptions) -> Result<Vec<u8>, LakeError> {
        render_structured(rows, options)
    }
}
