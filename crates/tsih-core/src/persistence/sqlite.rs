//! SQLite-backed row store.

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use crate::error::{ErrorCode, TsihError, TsihResult};
use crate::persistence::{RowStore, StoredRow};

/// Row store keeping every map's entries in one `tsih_entries` table.
pub struct SqliteRowStore {
    conn: Mutex<Connection>,
}

impl SqliteRowStore {
    /// Open (or create) a store at the given path.
    ///
    /// `:memory:` opens a private in-memory database.
    pub fn new(path: impl AsRef<Path>) -> TsihResult<Self> {
        let path = path.as_ref();
        if path.to_str() == Some(":memory:") {
            return Self::in_memory();
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        debug!(path = %path.display(), "Opening SQLite row store");
        let conn = Connection::open(path)
            .map_err(|e| TsihError::from(e).with_persistence_code(ErrorCode::PerConnectionFailed))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> TsihResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TsihError::from(e).with_persistence_code(ErrorCode::PerConnectionFailed))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> TsihResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store
            .init_schema()
            .map_err(|e| e.with_persistence_code(ErrorCode::PerConnectionFailed))?;
        Ok(store)
    }

    fn init_schema(&self) -> TsihResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tsih_entries (
                identifier TEXT NOT NULL,
                key TEXT NOT NULL,
                version INTEGER NOT NULL,
                value TEXT NOT NULL,
                UNIQUE(identifier, key, version)
            );
        "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> TsihResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TsihError::persistence(ErrorCode::Internal, e.to_string()))
    }

    /// Distinct identifiers that have at least one row.
    pub fn identifiers(&self) -> TsihResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT identifier FROM tsih_entries ORDER BY identifier")?;
        let names = stmt.query_map([], |row| row.get(0))?;
        names.collect::<Result<Vec<String>, _>>().map_err(Into::into)
    }

    /// Number of rows stored under `identifier`.
    pub fn count_rows(&self, identifier: &str) -> TsihResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tsih_entries WHERE identifier = ?1",
            params![identifier],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl RowStore for SqliteRowStore {
    fn upsert_row(&self, identifier: &str, row: &StoredRow) -> TsihResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"INSERT INTO tsih_entries (identifier, key, version, value)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(identifier, key, version) DO UPDATE SET value = excluded.value"#,
            params![identifier, row.key, row.version, row.value],
        )?;
        Ok(())
    }

    fn scan_rows(&self, identifier: &str) -> TsihResult<Vec<StoredRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"SELECT key, version, value
               FROM tsih_entries
               WHERE identifier = ?1
               ORDER BY key ASC, version ASC"#,
        )?;

        let rows = stmt.query_map(params![identifier], |row| {
            Ok(StoredRow {
                key: row.get(0)?,
                version: row.get(1)?,
                value: row.get(2)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn close(self: Box<Self>) -> TsihResult<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|e| TsihError::persistence(ErrorCode::Internal, e.to_string()))?;
        conn.close().map_err(|(_, e)| e.into())
    }
}
