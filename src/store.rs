//! SQLite store for the consolidated GTFS tables.
//!
//! Each destination table holds the union of every column ever loaded into it
//! plus `release_name`. Columns that arrive after a table was created are
//! `TEXT NOT NULL DEFAULT ''`, so rows loaded earlier read them back as the
//! empty string rather than `NULL`.

use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::table::{ColumnType, ParsedTable};

/// Column added to every destination table to record the source release.
pub const RELEASE_COLUMN: &str = "release_name";

pub const TIMEPOINT_TABLE: &str = "stop_times";
pub const TIMEPOINT_COLUMN: &str = "timepoint";

/// What a single [`GtfsStore::load`] did to its destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub created: bool,
    pub added_columns: Vec<String>,
    pub rows: usize,
}

/// Result of [`GtfsStore::ensure_column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOutcome {
    Added,
    AlreadyPresent,
    TableMissing,
}

/// Owns the run's database connection. Dropping it closes the connection.
pub struct GtfsStore {
    conn: Connection,
}

impl GtfsStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Merges `table` into `destination`, tagging every row with `release`.
    ///
    /// A missing destination is created from the file's columns. An existing
    /// one gains any new columns, and incoming rows get `''` for the columns
    /// they lack. Schema changes and inserts share one transaction.
    ///
    /// Table names match case-insensitively, so `Stops.txt` lands in an
    /// existing `stops` table.
    #[tracing::instrument(skip(self, table), fields(rows = table.rows.len()))]
    pub fn load(
        &mut self,
        mut table: ParsedTable,
        destination: &str,
        release: &str,
    ) -> Result<LoadReport, StoreError> {
        table.remove_column(RELEASE_COLUMN);

        let tx = self.conn.transaction()?;
        let target = resolve_table(&tx, destination)?.unwrap_or_else(|| destination.to_string());

        let (created, added_columns) = match columns_of(&tx, &target)? {
            None => {
                create_table(&tx, &target, &table)?;
                (true, Vec::new())
            }
            Some(existing) => {
                for column in &existing {
                    if table.column_index(column).is_none()
                        && !column.eq_ignore_ascii_case(RELEASE_COLUMN)
                    {
                        table.push_constant_column(column, "");
                    }
                }

                let mut added = Vec::new();
                for column in &table.columns {
                    if !contains_column(&existing, column) {
                        add_text_column(&tx, &target, column)?;
                        added.push(column.clone());
                    }
                }
                (false, added)
            }
        };

        table.push_constant_column(RELEASE_COLUMN, release);
        let rows = insert_rows(&tx, &target, &table)?;
        tx.commit()?;

        if !added_columns.is_empty() {
            info!(table = %target, columns = ?added_columns, "Added columns");
        }
        debug!(table = %target, created, rows, "Loaded rows");

        Ok(LoadReport {
            table: target,
            created,
            added_columns,
            rows,
        })
    }

    /// Adds `column` to `table` as `TEXT` unless it is already there.
    /// Missing tables are left alone.
    pub fn ensure_column(&self, table: &str, column: &str) -> Result<PatchOutcome, StoreError> {
        let Some(existing) = columns_of(&self.conn, table)? else {
            debug!(table, "Table absent, nothing to patch");
            return Ok(PatchOutcome::TableMissing);
        };
        if contains_column(&existing, column) {
            return Ok(PatchOutcome::AlreadyPresent);
        }

        add_text_column(&self.conn, table, column)?;
        info!(table, column, "Added missing column");
        Ok(PatchOutcome::Added)
    }

    /// Makes sure `stop_times` carries a `timepoint` column for downstream
    /// consumers, whether or not any release provided one.
    pub fn patch_timepoint(&self) -> Result<PatchOutcome, StoreError> {
        self.ensure_column(TIMEPOINT_TABLE, TIMEPOINT_COLUMN)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        Ok(table_exists(&self.conn, table)?)
    }

    /// Column names in declaration order, or `None` if the table is missing.
    pub fn column_names(&self, table: &str) -> Result<Option<Vec<String>>, StoreError> {
        columns_of(&self.conn, table)
    }

    pub fn row_count(&self, table: &str) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn table_names(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

/// Double-quotes an SQL identifier, doubling any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn contains_column(columns: &[String], name: &str) -> bool {
    columns.iter().any(|c| c.eq_ignore_ascii_case(name))
}

/// Stored name of the table matching `table` ignoring ASCII case, if any.
fn resolve_table(conn: &Connection, table: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
        params![table],
        |row| row.get(0),
    )
    .optional()
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    resolve_table(conn, table).map(|found| found.is_some())
}

fn columns_of(conn: &Connection, table: &str) -> Result<Option<Vec<String>>, StoreError> {
    if !table_exists(conn, table)? {
        return Ok(None);
    }

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(columns))
}

fn create_table(tx: &Transaction<'_>, table: &str, parsed: &ParsedTable) -> Result<(), StoreError> {
    let mut definitions: Vec<String> = parsed
        .columns
        .iter()
        .zip(&parsed.types)
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql_name()))
        .collect();
    definitions.push(format!("{} TEXT", quote_ident(RELEASE_COLUMN)));

    let sql = format!(
        "CREATE TABLE {} ({})",
        quote_ident(table),
        definitions.join(", ")
    );
    tx.execute(&sql, []).map_err(|source| StoreError::Schema {
        table: table.to_string(),
        source,
    })?;

    info!(table, columns = parsed.columns.len(), "Created table");
    Ok(())
}

fn add_text_column(conn: &Connection, table: &str, column: &str) -> Result<(), StoreError> {
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {} TEXT NOT NULL DEFAULT ''",
        quote_ident(table),
        quote_ident(column)
    );
    conn.execute(&sql, []).map_err(|source| StoreError::Schema {
        table: table.to_string(),
        source,
    })?;
    Ok(())
}

fn insert_rows(tx: &Transaction<'_>, table: &str, parsed: &ParsedTable) -> Result<usize, StoreError> {
    let columns = parsed
        .columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=parsed.columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut stmt = tx.prepare(&format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        quote_ident(table)
    ))?;

    for row in &parsed.rows {
        let values = row
            .iter()
            .zip(&parsed.types)
            .map(|(value, ty)| to_sql_value(value, *ty));
        stmt.execute(params_from_iter(values))?;
    }

    Ok(parsed.rows.len())
}

/// Empty cells stay `''` whatever the column type.
fn to_sql_value(value: &str, ty: ColumnType) -> Value {
    if value.is_empty() {
        return Value::Text(String::new());
    }
    match ty {
        ColumnType::Integer => value
            .parse()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(value.to_string())),
        ColumnType::Real => value
            .parse()
            .map(Value::Real)
            .unwrap_or_else(|_| Value::Text(value.to_string())),
        ColumnType::Text => Value::Text(value.to_string()),
    }
}
