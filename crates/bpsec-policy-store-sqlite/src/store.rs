// crates/bpsec-policy-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Policy Store
// Description: Durable PolicyStore backed by SQLite.
// Purpose: Persist rule and event set records across restarts.
// Dependencies: bpsec-policy-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`PolicyStore`] using `SQLite`. Every
//! record lives in one table keyed by an autoincrement id, tagged with the
//! list it belongs to and the byte length it was written with. Iteration
//! order is id order, which is append order. Transactions map onto
//! `BEGIN IMMEDIATE` / `COMMIT` / `ROLLBACK` on a single connection.
//!
//! The store never interprets record bytes; declared lengths are returned as
//! written so the engine's codec can detect truncated or padded records.

// ============================================================================//
// SECTION: Imports
// ============================================================================//

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use bpsec_policy_core::PolicyStore;
use bpsec_policy_core::RecordId;
use bpsec_policy_core::RecordList;
use bpsec_policy_core::StoreError;
use bpsec_policy_core::StoredRecord;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================//
// SECTION: Constants
// ============================================================================//

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum record size accepted by the store.
pub const MAX_RECORD_BYTES: usize = 16 * 1024 * 1024;
/// Declared length reported for rows that cannot be decoded.
const UNSATISFIABLE_LENGTH: usize = usize::MAX;

// ============================================================================//
// SECTION: Config
// ============================================================================//

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` policy store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================//
// SECTION: Errors
// ============================================================================//

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store request or data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Record exceeded the size limit.
    #[error("sqlite store record too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual record size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "record exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps a `rusqlite` error into a store error.
fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================//
// SECTION: Store
// ============================================================================//

/// `SQLite`-backed policy record store.
#[derive(Clone)]
pub struct SqlitePolicyStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqlitePolicyStore {
    /// Opens an `SQLite`-backed policy store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Path of the backing database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Acquires the connection lock.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Acquires the connection lock, requiring an open transaction.
    fn lock_in_transaction(
        &self,
        operation: &str,
    ) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        let guard = self.lock()?;
        if guard.is_autocommit() {
            return Err(SqliteStoreError::Invalid(format!("{operation} outside transaction")));
        }
        Ok(guard)
    }

    /// Starts an immediate write transaction.
    fn begin_transaction(&self) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        if !guard.is_autocommit() {
            return Err(SqliteStoreError::Invalid("transaction already open".to_string()));
        }
        guard.execute_batch("BEGIN IMMEDIATE;").map_err(|err| db_error(&err))
    }

    /// Commits the open transaction.
    fn commit_transaction(&self) -> Result<(), SqliteStoreError> {
        let guard = self.lock_in_transaction("commit")?;
        guard.execute_batch("COMMIT;").map_err(|err| db_error(&err))
    }

    /// Rolls back the open transaction, if any.
    fn cancel_transaction(&self) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        if guard.is_autocommit() {
            return Ok(());
        }
        guard.execute_batch("ROLLBACK;").map_err(|err| db_error(&err))
    }

    /// Appends a record to a list.
    fn append_record(&self, list: RecordList, bytes: &[u8]) -> Result<RecordId, SqliteStoreError> {
        if bytes.len() > MAX_RECORD_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_RECORD_BYTES,
                actual_bytes: bytes.len(),
            });
        }
        let declared = i64::try_from(bytes.len())
            .map_err(|_| SqliteStoreError::Invalid("record length overflow".to_string()))?;
        let guard = self.lock_in_transaction("append")?;
        guard
            .execute(
                "INSERT INTO policy_records (list, declared_len, bytes) VALUES (?1, ?2, ?3)",
                params![list.as_str(), declared, bytes],
            )
            .map_err(|err| db_error(&err))?;
        let id = guard.last_insert_rowid();
        drop(guard);
        Ok(record_id(id))
    }

    /// Removes a record from a list.
    fn remove_record(&self, list: RecordList, id: RecordId) -> Result<(), SqliteStoreError> {
        let id = row_id(id);
        let guard = self.lock_in_transaction("remove")?;
        guard
            .execute(
                "DELETE FROM policy_records WHERE list = ?1 AND id = ?2",
                params![list.as_str(), id],
            )
            .map_err(|err| db_error(&err))?;
        Ok(())
    }

    /// Loads every committed record of a list in append order.
    ///
    /// Rows with a negative declared length or an oversized blob are still
    /// returned, with a declared length no decoder can satisfy and, for
    /// oversized rows, without their bytes, so restore skips them one by one.
    fn load_records(&self, list: RecordList) -> Result<Vec<StoredRecord>, SqliteStoreError> {
        let max_bytes = i64::try_from(MAX_RECORD_BYTES).unwrap_or(i64::MAX);
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT id, declared_len, length(bytes), CASE WHEN length(bytes) > ?2 THEN \
                 x'' ELSE bytes END FROM policy_records WHERE list = ?1 ORDER BY id",
            )
            .map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(params![list.as_str(), max_bytes], |row| {
                let id: i64 = row.get(0)?;
                let declared: i64 = row.get(1)?;
                let length: i64 = row.get(2)?;
                let bytes: Vec<u8> = row.get(3)?;
                Ok((id, declared, length, bytes))
            })
            .map_err(|err| db_error(&err))?;
        let mut records = Vec::new();
        for row in rows {
            let (id, declared, length, bytes) = row.map_err(|err| db_error(&err))?;
            let declared_len = match usize::try_from(declared) {
                Ok(declared) if length <= max_bytes => declared,
                _ => UNSATISFIABLE_LENGTH,
            };
            records.push(StoredRecord {
                id: record_id(id),
                declared_len,
                bytes,
            });
        }
        Ok(records)
    }
}

impl PolicyStore for SqlitePolicyStore {
    fn begin(&self) -> Result<(), StoreError> {
        self.begin_transaction().map_err(StoreError::from)
    }

    fn commit(&self) -> Result<(), StoreError> {
        self.commit_transaction().map_err(StoreError::from)
    }

    fn cancel(&self) -> Result<(), StoreError> {
        self.cancel_transaction().map_err(StoreError::from)
    }

    fn append(&self, list: RecordList, bytes: &[u8]) -> Result<RecordId, StoreError> {
        self.append_record(list, bytes).map_err(StoreError::from)
    }

    fn remove(&self, list: RecordList, id: RecordId) -> Result<(), StoreError> {
        self.remove_record(list, id).map_err(StoreError::from)
    }

    fn records(&self, list: RecordList) -> Result<Vec<StoredRecord>, StoreError> {
        self.load_records(list).map_err(StoreError::from)
    }
}

// ============================================================================//
// SECTION: Helpers
// ============================================================================//

/// Maps a `SQLite` rowid onto a record id, preserving every bit.
const fn record_id(rowid: i64) -> RecordId {
    RecordId::new(u64::from_be_bytes(rowid.to_be_bytes()))
}

/// Maps a record id back onto its `SQLite` rowid.
const fn row_id(id: RecordId) -> i64 {
    i64::from_be_bytes(id.get().to_be_bytes())
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS policy_records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    list TEXT NOT NULL,
                    declared_len INTEGER NOT NULL,
                    bytes BLOB NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_policy_records_list
                    ON policy_records (list, id);",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))?;
    Ok(())
}
