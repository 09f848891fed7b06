//! Plain-text table rendering for terminal output.

use rowlake_core::{Record, Schema};
use rowlake_core::data::record::stringify_value;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const MAX_CELL_WIDTH: usize = 40;

/// Render rows under a header, padding by display width so wide glyphs
/// line up.
pub fn render(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.width().min(MAX_CELL_WIDTH));
            }
        }
    }

    let mut out = String::new();
    push_line(&mut out, headers, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule, &widths);
    for row in rows {
        push_line(&mut out, row, &widths);
    }
    out
}

/// Render records using the given column order. Missing fields print empty.
pub fn render_records(columns: &[String], records: &[Record]) -> String {
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|c| record.get(c).map(stringify_value).unwrap_or_default())
                .collect()
        })
        .collect();
    render(columns, &rows)
}

/// Column order for a batch of records: first appearance wins.
pub fn columns_of(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for key in records.iter().flat_map(|r| r.keys()) {
        if !columns.contains(key) {
            columns.push(key.clone());
        }
    }
    columns
}

/// Schema columns first, then any fields only the records carry.
pub fn columns_for(schema: &Schema, records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = schema.column_names().into_iter().map(str::to_string).collect();
    for key in columns_of(records) {
        if !columns.contains(&key) {
            columns.push(key);
        }
    }
    columns
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, w)| pad(&truncate(cells.get(i).map(String::as_str).unwrap_or(""), *w), *w))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

fn truncate(text: &str, max: usize) -> String {
    let text = text.replace(['\n', '\r', '\t'], " ");
    if text.width() <= max {
        return text;
    }
    let mut used = 0;
    let mut cut = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        used += w;
        cut.push(ch);
    }
    cut.push('…');
    cut
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(fill))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rowlake_core::record;
    use serde_json::json;

    #[test]
    fn test_render_aligns_columns() {
        let out = render(
            &["name".into(), "age".into()],
            &[vec!["Alice".into(), "25".into()], vec!["Bo".into(), "3".into()]],
        );
        assert_eq!(out, "name   age\n-----  ---\nAlice  25\nBo     3\n");
    }

    #[test]
    fn test_wide_characters_use_display_width() {
        let out = render(&["k".into()], &[vec!["日本".into()], vec!["ab".into()]]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "----");
        assert_eq!(lines[2], "日本");
    }

    #[test]
    fn test_long_cells_are_truncated() {
        let long = "x".repeat(100);
        let out = render(&["v".into()], &[vec![long]]);
        let last = out.lines().last().unwrap();
        assert_eq!(last.width(), MAX_CELL_WIDTH);
        assert!(last.ends_with('…'));
    }

    #[test]
    fn test_records_with_missing_fields() {
        let records = vec![
            record([("a", json!(1))]),
            record([("b", json!("x")), ("a", json!(null))]),
        ];
        let columns = columns_of(&records);
        assert_eq!(columns, vec!["a", "b"]);
        let out = render_records(&columns, &records);
        assert_eq!(out, "a     b\n----  -\n1\nnull  x\n");
    }
}
