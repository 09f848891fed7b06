//! Embedded SQL engine collaborator.
//!
//! Rows are materialized as tables and arbitrary read queries run against
//! them. Query semantics (joins, grouping, ordering) belong entirely to the
//! engine.

pub mod convert;

use crate::data::record::Record;
use crate::error::LakeError;
use convert::{column_affinity, from_value_ref, quote_ident, to_sql_value, union_columns};
use rusqlite::Connection;

/// An engine that can hold row tables and answer read queries over them.
pub trait SqlEngine: Send {
    /// Materialize `rows` as table `name`, replacing any previous table.
    fn register_table(&mut self, name: &str, rows: &[Record]) -> Result<(), LakeError>;

    /// Drop a table if it exists.
    fn drop_table(&mut self, name: &str) -> Result<(), LakeError>;

    /// Run a read-only query.
    fn query(&self, sql: &str) -> Result<Vec<Record>, LakeError>;
}

/// [`SqlEngine`] backed by an in-memory SQLite database.
pub struct SqliteEngine {
    conn: Connection,
}

impl std::fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEngine").finish_non_exhaustive()
    }
}

impl SqliteEngine {
    pub fn in_memory() -> Result<Self, LakeError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Read every row produced by `stmt` into records.
    pub(crate) fn collect_rows(stmt: &mut rusqlite::Statement<'_>) -> Result<Vec<Record>, LakeError> {
        let column_count = stmt.column_count();
        let columns: Vec<String> = (0..column_count)
            .map(|i| stmt.column_name(i).unwrap_or("?").to_string())
            .collect();

        let mut out = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (i, name) in columns.iter().enumerate() {
                let value = row.get_ref(i).map(from_value_ref).unwrap_or_default();
                record.insert(name.clone(), value);
            }
            out.push(record);
        }
        Ok(out)
    }
}

impl SqlEngine for SqliteEngine {
    fn register_table(&mut self, name: &str, rows: &[Record]) -> Result<(), LakeError> {
        let columns = union_columns(rows);
        let table = quote_ident(name);
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))?;

        if columns.is_empty() {
            // SQLite has no zero-column tables.
            tx.execute_batch(&format!("CREATE TABLE {table} (\"_empty\" TEXT);"))?;
            tx.commit()?;
            return Ok(());
        }

        let defs: Vec<String> = columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(c), column_affinity(rows, c)).trim_end().to_string())
            .collect();
        tx.execute_batch(&format!("CREATE TABLE {table} ({});", defs.join(", ")))?;

        {
            let placeholders = vec!["?"; columns.len()].join(", ");
            let mut stmt = tx.prepare(&format!("INSERT INTO {table} VALUES ({placeholders})"))?;
            for row in rows {
                let values = columns.iter().map(|c| to_sql_value(row.get(c)));
                stmt.execute(rusqlite::params_from_iter(values))?;
            }
        }
        tx.commit()?;
        tracing::debug!(table = name, rows = rows.len(), "Registered SQL table");
        Ok(())
    }

    fn drop_table(&mut self, name: &str) -> Result<(), LakeError> {
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(name)))?;
        Ok(())
    }

    fn query(&self, sql: &str) -> Result<Vec<Record>, LakeError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| LakeError::query(e.to_string()))?;
        if !stmt.readonly() {
            return Err(LakeError::query("only read-only queries are accepted"));
        }
        Self::collect_rows(&mut stmt).map_err(|e| match e {
            LakeError::Sqlite(inner) => LakeError::query(inner.to_string()),
            other => other,
        })
    }
}
