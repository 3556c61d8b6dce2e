//! DuckDB connection wrapper with table registration and query execution.
//!
//! Tables come from one of three places:
//! - already present in an attached database file
//! - registered explicitly from NDJSON or parquet files
//! - lazily downloaded from the remote export through the [`ExportCache`]

use crate::cache::ExportCache;
use crate::error::{Result, TimelineError};
use chrono::NaiveDate;
use duckdb::{types::ValueRef, Connection as DuckDbConnection};
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const UNIX_EPOCH_CE_DAYS: i32 = 719_163;

/// Wraps a DuckDB connection and tracks which observation tables are usable.
pub struct Connection {
    conn: DuckDbConnection,
    /// The export cache used to download/locate remote table exports.
    pub cache: RefCell<ExportCache>,
    registered_views: RefCell<HashSet<String>>,
}

impl Connection {
    /// Create a connection over an in-memory DuckDB database.
    pub fn new(cache: ExportCache) -> Result<Self> {
        let conn = DuckDbConnection::open_in_memory()?;
        Ok(Self {
            conn,
            cache: RefCell::new(cache),
            registered_views: RefCell::new(HashSet::new()),
        })
    }

    /// Create a connection over a DuckDB database file.
    ///
    /// Tables that already exist in the file are picked up on first use.
    pub fn open<P: AsRef<Path>>(path: P, cache: ExportCache) -> Result<Self> {
        let conn = DuckDbConnection::open(path)?;
        Ok(Self {
            conn,
            cache: RefCell::new(cache),
            registered_views: RefCell::new(HashSet::new()),
        })
    }

    /// Ensure one or more tables are queryable, downloading exports if needed.
    ///
    /// Remote exports are re-checked for staleness on every call so a view
    /// never reads a file older than the TTL.
    pub fn ensure_views(&self, views: &[&str]) -> Result<()> {
        for name in views {
            self.ensure_view(name)?;
        }
        Ok(())
    }

    /// Like [`ensure_views`](Self::ensure_views) for a single optional table.
    ///
    /// Returns `false` instead of failing when the table has no source or
    /// its export cannot be downloaded.
    pub fn try_ensure_view(&self, name: &str) -> Result<bool> {
        match self.ensure_view(name) {
            Ok(()) => Ok(true),
            Err(TimelineError::NotFound(_)) => Ok(false),
            Err(TimelineError::DataUnavailable(msg)) => {
                warn!(table = name, %msg, "optional table unavailable");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Execute SQL and return results as a `Vec` of `HashMap`s.
    ///
    /// Each row is represented as a `HashMap<String, serde_json::Value>`.
    /// Automatically converts DuckDB types to `serde_json::Value`.
    pub fn execute(
        &self,
        sql: &str,
        params: &[String],
    ) -> Result<Vec<HashMap<String, serde_json::Value>>> {
        let mut stmt = self.conn.prepare(sql)?;

        let param_values: Vec<&dyn duckdb::ToSql> = params
            .iter()
            .map(|p| p as &dyn duckdb::ToSql)
            .collect();

        let mut rows_result = stmt.query(param_values.as_slice())?;

        // Column metadata is only available after the query has executed
        let stmt_ref = rows_result.as_ref().ok_or_else(|| {
            TimelineError::InvalidArgument("query produced no statement".into())
        })?;
        let column_names: Vec<String> = stmt_ref
            .column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let column_count = stmt_ref.column_count();

        let mut out: Vec<HashMap<String, serde_json::Value>> = Vec::new();

        while let Some(row) = rows_result.next()? {
            let mut map = HashMap::new();
            for (i, col_name) in column_names.iter().enumerate().take(column_count) {
                let value = convert_value_ref(row.get_ref(i)?);
                map.insert(col_name.clone(), value);
            }
            out.push(map);
        }

        Ok(out)
    }

    /// Execute SQL and deserialize each row into type `T`.
    pub fn execute_into<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[String],
    ) -> Result<Vec<T>> {
        let rows = self.execute(sql, params)?;
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let value = serde_json::Value::Object(
                row.into_iter().collect::<serde_json::Map<String, serde_json::Value>>(),
            );
            let item: T = serde_json::from_value(value)?;
            results.push(item);
        }
        Ok(results)
    }

    /// Execute SQL and return the first column of the first row.
    ///
    /// Returns `None` if the result set is empty.
    pub fn execute_scalar(
        &self,
        sql: &str,
        params: &[String],
    ) -> Result<Option<serde_json::Value>> {
        let mut stmt = self.conn.prepare(sql)?;
        let param_values: Vec<&dyn duckdb::ToSql> = params
            .iter()
            .map(|p| p as &dyn duckdb::ToSql)
            .collect();

        let mut rows = stmt.query(param_values.as_slice())?;

        if let Some(row) = rows.next()? {
            Ok(Some(convert_value_ref(row.get_ref(0)?)))
        } else {
            Ok(None)
        }
    }

    /// Create a DuckDB table from a newline-delimited JSON file.
    ///
    /// Data is streamed from disk by DuckDB; `.gz` files are decompressed
    /// transparently.
    pub fn register_table_from_ndjson(&self, table_name: &str, ndjson_path: &str) -> Result<()> {
        let path_fwd = ndjson_path.replace('\\', "/");
        self.conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {}; \
             CREATE TABLE {} AS SELECT * FROM read_json_auto('{}', format='newline_delimited')",
            table_name, table_name, path_fwd
        ))?;
        self.registered_views.borrow_mut().insert(table_name.to_string());
        debug!(table = table_name, path = %path_fwd, "registered NDJSON table");
        Ok(())
    }

    /// Register a parquet file as a DuckDB view.
    pub fn register_view_from_parquet(&self, view_name: &str, parquet_path: &str) -> Result<()> {
        let path_fwd = parquet_path.replace('\\', "/");
        self.conn.execute_batch(&format!(
            "CREATE OR REPLACE VIEW {} AS SELECT * FROM read_parquet('{}')",
            view_name, path_fwd
        ))?;
        self.registered_views.borrow_mut().insert(view_name.to_string());
        debug!(view = view_name, path = %path_fwd, "registered parquet view");
        Ok(())
    }

    /// Check whether a table has been registered.
    pub fn has_view(&self, name: &str) -> bool {
        self.registered_views.borrow().contains(name)
    }

    /// Return a list of all registered table names.
    pub fn views(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registered_views.borrow().iter().cloned().collect();
        names.sort();
        names
    }

    /// Forget registrations so remote views are re-created on next access.
    ///
    /// Tables registered from local files stay in DuckDB and are re-detected.
    pub fn reset_views(&self) {
        self.registered_views.borrow_mut().clear();
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let count = self.execute_scalar(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            &[name.to_string()],
        )?;
        Ok(count.and_then(|v| v.as_i64()).unwrap_or(0) > 0)
    }

    fn ensure_view(&self, name: &str) -> Result<()> {
        let has_remote = self.cache.borrow().has_remote();

        if self.has_view(name) && !has_remote {
            return Ok(());
        }

        if !has_remote && self.table_exists(name)? {
            self.registered_views.borrow_mut().insert(name.to_string());
            return Ok(());
        }

        // Downloads happen at most once per TTL; the view itself is cheap to re-point
        let path = self.cache.borrow_mut().ensure_export(name)?;
        if !self.has_view(name) {
            let path_str = path.to_string_lossy().to_string();
            self.register_view_from_parquet(name, &path_str)?;
        }
        Ok(())
    }
}

/// Convert a DuckDB `ValueRef` to a `serde_json::Value`.
fn convert_value_ref(val: ValueRef<'_>) -> serde_json::Value {
    match val {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Boolean(b) => serde_json::Value::Bool(b),
        ValueRef::TinyInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::SmallInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::Int(n) => serde_json::Value::Number(n.into()),
        ValueRef::BigInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::UTinyInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::USmallInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::UInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::UBigInt(n) => serde_json::Value::Number(n.into()),
        ValueRef::HugeInt(n) => {
            // HugeInt may not fit in i64; fall back to string
            if let Ok(i) = i64::try_from(n) {
                serde_json::Value::Number(i.into())
            } else {
                serde_json::Value::String(n.to_string())
            }
        }
        ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Double(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => serde_json::Value::String(String::from_utf8_lossy(bytes).to_string()),
        ValueRef::Date32(days) => days
            .checked_add(UNIX_EPOCH_CE_DAYS)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(|d| serde_json::Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(serde_json::Value::Null),
        // Queries cast everything else (timestamps, decimals, lists) explicitly
        _ => serde_json::Value::Null,
    }
}
