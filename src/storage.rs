use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

use crate::constants::{RAW_COLUMNS, RAW_HOSPITALS};
use crate::error::{PipelineError, Result};
use crate::types::RawHospitalRecord;

/// How a model's SELECT is persisted in the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    /// Recomputed on every query
    View,
    /// Stored, rebuilt on every run
    Table,
}

impl Materialization {
    fn keyword(&self) -> &'static str {
        match self {
            Materialization::View => "VIEW",
            Materialization::Table => "TABLE",
        }
    }
}

/// The local analytical store: one SQLite file holding the raw, staging and mart relations.
pub struct Warehouse {
    conn: Connection,
}

impl Warehouse {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::WarehouseOpen {
                path: db_path.display().to_string(),
                message: e.to_string(),
            })?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        debug!("Opened warehouse at {}", db_path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Drop and reload the raw relation with `records`, verbatim, in one transaction.
    pub fn replace_raw_hospitals(&self, records: &[RawHospitalRecord]) -> Result<usize> {
        let columns: Vec<String> = RAW_COLUMNS.iter().map(|c| quote_ident(c)).collect();
        let create = format!(
            "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({cols});",
            table = RAW_HOSPITALS,
            cols = columns.iter().map(|c| format!("{c} TEXT")).collect::<Vec<_>>().join(", "),
        );
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            RAW_HOSPITALS,
            columns.join(", "),
            (1..=columns.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", "),
        );

        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&create)?;
        {
            let mut stmt = tx.prepare(&insert)?;
            for record in records {
                stmt.execute(params_from_iter(record.values()))?;
            }
        }
        tx.commit()?;

        Ok(records.len())
    }

    /// Replace relation `name` with the result of `select_sql`, atomically.
    pub fn materialize(&self, name: &str, materialization: Materialization, select_sql: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        if let Some(existing) = relation_kind(&tx, name)? {
            tx.execute_batch(&format!("DROP {} {}", existing.to_uppercase(), name))?;
        }
        tx.execute_batch(&format!(
            "CREATE {} {} AS {}",
            materialization.keyword(),
            name,
            select_sql
        ))?;
        tx.commit()?;
        debug!("Materialized {} as {:?}", name, materialization);
        Ok(())
    }

    /// "table", "view", or `None` when the relation does not exist.
    pub fn relation_kind(&self, name: &str) -> Result<Option<String>> {
        relation_kind(&self.conn, name)
    }

    pub fn relation_exists(&self, name: &str) -> Result<bool> {
        Ok(self.relation_kind(name)?.is_some())
    }

    pub fn row_count(&self, relation: &str) -> Result<i64> {
        self.scalar_count(&format!("SELECT COUNT(*) FROM {relation}"))
    }

    /// Run a query returning a single integer.
    pub fn scalar_count(&self, sql: &str) -> Result<i64> {
        Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
    }

    /// Run `sql` and map every row with `f`.
    pub fn query_rows<T, F>(&self, sql: &str, mut f: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| f(row))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Column names of a relation, in declaration order.
    pub fn columns(&self, relation: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({relation})"))?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        let mut out = Vec::new();
        for name in names {
            out.push(name?);
        }
        Ok(out)
    }

    /// SHA-256 over every row of `relation` in `order_by` order, values tagged by type.
    pub fn fingerprint(&self, relation: &str, order_by: &str) -> Result<String> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {relation} ORDER BY {order_by}"))?;
        let column_count = stmt.column_count();
        let mut hasher = Sha256::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for i in 0..column_count {
                match row.get_ref(i)? {
                    ValueRef::Null => hasher.update(b"N|"),
                    ValueRef::Integer(v) => hasher.update(format!("I{v}|").as_bytes()),
                    ValueRef::Real(v) => hasher.update(format!("R{v:?}|").as_bytes()),
                    ValueRef::Text(t) => {
                        hasher.update(b"T");
                        hasher.update(t);
                        hasher.update(b"|");
                    }
                    ValueRef::Blob(b) => {
                        hasher.update(b"B");
                        hasher.update(b);
                        hasher.update(b"|");
                    }
                }
            }
            hasher.update(b"\n");
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

fn relation_kind(conn: &Connection, name: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT type FROM sqlite_master WHERE name = ?1 AND type IN ('table', 'view')",
            [name],
            |row| row.get(0),
        )
        .optional()?)
}

/// Double-quote an identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
