use crate::error::{EtlError, Result};
use crate::metrics;
use crate::types::{CaseRecord, Table, VaccinationRecord};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OpenFlags, ToSql};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const SCHEMA_SQL: &str = include_str!("../migrations/001_create_tables.sql");

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Rows returned by a query together with their column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A record that belongs to exactly one known table
pub trait TableRecord {
    const TABLE: Table;

    /// Values in the order of `Self::TABLE.columns()`
    fn sql_values(&self) -> Vec<Value>;
}

fn optional_integer(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

impl TableRecord for CaseRecord {
    const TABLE: Table = Table::DailyCases;

    fn sql_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.report_date.format(DATE_FORMAT).to_string()),
            Value::Text(self.country_name.clone()),
            Value::Integer(self.total_cases),
            optional_integer(self.new_cases),
            optional_integer(self.total_deaths),
            optional_integer(self.new_deaths),
            Value::Text(self.etl_timestamp.format(TIMESTAMP_FORMAT).to_string()),
        ]
    }
}

impl TableRecord for VaccinationRecord {
    const TABLE: Table = Table::VaccinationData;

    fn sql_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.report_date.format(DATE_FORMAT).to_string()),
            Value::Text(self.country_name.clone()),
            Value::Integer(self.total_vaccinations),
            optional_integer(self.people_vaccinated),
            optional_integer(self.people_fully_vaccinated),
            Value::Text(self.etl_timestamp.format(TIMESTAMP_FORMAT).to_string()),
        ]
    }
}

/// Render a cell for console or CSV output
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// Owns the SQLite connection holding `daily_cases` and `vaccination_data`.
pub struct DatabaseManager {
    conn: Option<Connection>,
    location: PathBuf,
}

impl DatabaseManager {
    /// Open (creating if needed) the database file at `path`.
    ///
    /// A failure here is fatal for the caller; there is no retry.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| {
            error!("Failed to connect to database at {}: {}", path.display(), e);
            e
        })?;
        info!("Database connection established at {}", path.display());
        Ok(Self {
            conn: Some(conn),
            location: path.to_path_buf(),
        })
    }

    /// Open an existing database file read-only. Nothing is created on disk.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            error!("Failed to open database at {}: {}", path.display(), e);
            e
        })?;
        debug!("Read-only database connection established at {}", path.display());
        Ok(Self {
            conn: Some(conn),
            location: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        debug!("In-memory database connection established");
        Ok(Self {
            conn: Some(conn),
            location: PathBuf::from(":memory:"),
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(EtlError::ConnectionClosed)
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(EtlError::ConnectionClosed)
    }

    /// Create both tables from the bundled schema if they do not exist
    pub fn create_tables(&self) -> Result<()> {
        self.conn()?.execute_batch(SCHEMA_SQL)?;
        info!("Tables created (if missing)");
        Ok(())
    }

    /// Execute arbitrary SQL and return all rows. Errors propagate.
    pub fn run_query(&self, sql: &str) -> Result<Vec<Vec<Value>>> {
        Ok(self.run_query_with_columns(sql)?.rows)
    }

    /// Execute arbitrary SQL and return rows plus column names. Errors propagate.
    pub fn run_query_with_columns(&self, sql: &str) -> Result<QueryRows> {
        info!("Executing SQL query: {}", sql);
        self.query_with_params(sql, &[]).map_err(|e| {
            error!("Error running query: {}", e);
            e
        })
    }

    /// Execute a query with bound parameters
    pub fn query_with_params(&self, sql: &str, params: &[&dyn ToSql]) -> Result<QueryRows> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(normalize_statement(sql))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();

        let mut rows = stmt.query(params)?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(row.get::<_, Value>(i)?);
            }
            result.push(values);
        }

        debug!("Query executed. Columns: {:?}, Rows: {}", columns, result.len());
        Ok(QueryRows {
            columns,
            rows: result,
        })
    }

    /// Bulk insert into one of the known tables, ignoring rows that collide
    /// on (report_date, country_name). Returns the number of rows stored.
    pub fn insert_data<R: TableRecord>(&mut self, table_name: &str, records: &[R]) -> Result<usize> {
        let table: Table = table_name.parse()?;
        if table != R::TABLE {
            return Err(EtlError::RecordTableMismatch {
                expected: R::TABLE.name().to_string(),
                actual: table.name().to_string(),
            });
        }

        if records.is_empty() {
            warn!("No records to insert into `{}`.", table);
            return Ok(0);
        }

        let columns = table.columns();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            table.name(),
            columns.join(", "),
            placeholders
        );

        info!("Inserting {} records into `{}`...", records.len(), table);
        let conn = self.conn_mut()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                inserted += stmt.execute(params_from_iter(record.sql_values()))?;
            }
        }
        tx.commit()?;

        info!("Inserted {} rows into `{}`.", inserted, table);
        metrics::record_inserted(table.name(), inserted);
        Ok(inserted)
    }

    /// User tables currently present, sorted by name
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self.query_with_params(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            &[],
        )?;
        Ok(rows
            .rows
            .iter()
            .filter_map(|row| row.first().map(display_value))
            .collect())
    }

    /// Drop both known tables
    pub fn drop_tables(&self) -> Result<()> {
        let conn = self.conn()?;
        for table in Table::ALL {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", table.name()))?;
            info!("Dropped table `{}`", table);
        }
        Ok(())
    }

    pub fn count_rows(&self, table: Table) -> Result<i64> {
        let count = self.conn()?.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Release the connection. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            if let Err((conn, e)) = conn.close() {
                self.conn = Some(conn);
                return Err(e.into());
            }
            info!("Database connection closed.");
        }
        Ok(())
    }
}

/// Strip surrounding whitespace and trailing semicolons so a single statement
/// typed on the command line prepares cleanly.
fn normalize_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}
