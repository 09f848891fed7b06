//! Embedded SQL: rows from an SQLite database, rows to an SQL script.
//!
//! Reading accepts either a database file (opened read-only) or an SQL
//! script (a `.sql` path or in-memory bytes), which is replayed into a
//! scratch in-memory database first. Writing produces a script of
//! `CREATE TABLE` plus `INSERT` statements, so a written export can be read
//! straight back.

use crate::adapters::{AdapterOptions, EMBEDDED_SQL, ExternalHandle, FormatAdapter};
use crate::data::record::Record;
use crate::error::LakeError;
use crate::sql::SqliteEngine;
use crate::sql::convert::{column_affinity, quote_ident, to_sql_literal, union_columns};
use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags};
use std::fmt::Write as _;
use std::path::PathBuf;

const DEFAULT_TABLE: &str = "data";

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedSqlAdapter;

enum SqlSource {
    Database(PathBuf),
    Script(String),
}

fn first_table(conn: &Connection) -> Result<Option<String>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid LIMIT 1")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

fn read_rows(label: &str, source: SqlSource, options: &AdapterOptions) -> Result<Vec<Record>, LakeError> {
    let sql_err = |e: rusqlite::Error| LakeError::adapter(label, e.to_string());
    let conn = match source {
        SqlSource::Database(path) => {
            Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(sql_err)?
        }
        SqlSource::Script(script) => {
            let conn = Connection::open_in_memory().map_err(sql_err)?;
            conn.execute_batch(&script).map_err(sql_err)?;
            conn
        }
    };

    let query = match (&options.query, &options.table) {
        (Some(query), _) => query.clone(),
        (None, Some(table)) => format!("SELECT * FROM {}", quote_ident(table)),
        (None, None) => match first_table(&conn).map_err(sql_err)? {
            Some(table) => format!("SELECT * FROM {}", quote_ident(&table)),
            None => return Ok(Vec::new()),
        },
    };

    let mut stmt = conn.prepare(&query).map_err(sql_err)?;
    SqliteEngine::collect_rows(&mut stmt).map_err(|e| LakeError::adapter(label, e.to_string()))
}

/// Render rows as a replayable SQL script.
pub fn render_script(rows: &[Record], table: &str) -> String {
    let columns = union_columns(rows);
    let table_ident = quote_ident(table);
    let mut out = String::from("BEGIN;\n");

    if columns.is_empty() {
        let _ = writeln!(out, "CREATE TABLE {table_ident} (\"_empty\" TEXT);");
    } else {
        let defs: Vec<String> = columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(c), column_affinity(rows, c)).trim_end().to_string())
            .collect();
        let _ = writeln!(out, "CREATE TABLE {table_ident} ({});", defs.join(", "));

        let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let column_list = column_list.join(", ");
        for row in rows {
            let values: Vec<String> = columns.iter().map(|c| to_sql_literal(row.get(c))).collect();
            let _ = writeln!(out, "INSERT INTO {table_ident} ({column_list}) VALUES ({});", values.join(", "));
        }
    }
    out.push_str("COMMIT;\n");
    out
}

#[async_trait]
impl FormatAdapter for EmbeddedSqlAdapter {
    fn tag(&self) -> &'static str {
        EMBEDDED_SQL
    }

    async fn read(&self, handle: &ExternalHandle, options: &AdapterOptions) -> Result<Vec<Record>, LakeError> {
        let label = handle.label();
        let source = match handle {
            ExternalHandle::Path(path) if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("sql")) => {
                SqlSource::Script(tokio::fs::read_to_string(path).await.map_err(|e| LakeError::adapter(&label, e.to_string()))?)
            }
            ExternalHandle::Path(path) => SqlSource::Database(path.clone()),
            ExternalHandle::Bytes { data, .. } => SqlSource::Script(
                String::from_utf8(data.clone()).map_err(|e| LakeError::adapter(&label, e.to_string()))?,
            ),
        };

        let options = options.clone();
        let task_label = label.clone();
        let rows = tokio::task::spawn_blocking(move || read_rows(&task_label, source, &options))
            .await
            .map_err(|e| LakeError::adapter(&label, format!("reader task failed: {e}")))??;
        tracing::debug!(input = %label, rows = rows.len(), "Read embedded SQL rows");
        Ok(rows)
    }

    async fn write(&self, rows: &[Record], options: &AdapterOptions) -> Result<Vec<u8>, LakeError> {
        let table = options.table.as_deref().unwrap_or(DEFAULT_TABLE);
        Ok(render_script(rows, table).into_bytes())
    }
}
