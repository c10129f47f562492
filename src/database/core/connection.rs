//! Database connection management
//!
//! This module provides the connection wrapper every other part of the driver
//! borrows. It owns the SQLite handle, the on-disk location, and the resolved
//! driver options.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, Params, Row};
use tracing::{info, warn};

use crate::database::core::locator::DriverConfig;
use crate::error::{DriverError, QueryError};

/// Placeholder replaced with the quoted bookkeeping table name in internal statements
pub const MIGRATIONS_TABLE_PLACEHOLDER: &str = "${MIGRATIONS_TABLE}";

const SIDECAR_SUFFIXES: &[&str] = &["-journal", "-wal", "-shm"];

/// Core database connection wrapper
///
/// `DatabaseConn` is a thin wrapper around a SQLite connection. Statements the
/// driver generates itself go through [`DatabaseConn::exec`] and
/// [`DatabaseConn::query_row`], which substitute the configured table name and
/// attach the statement text to any failure. Migration scripts go through
/// [`DatabaseConn::exec_script`] untouched.
pub struct DatabaseConn {
    conn: Connection,
    path: Option<PathBuf>,
    config: DriverConfig,
}

impl DatabaseConn {
    /// Open the database file at `path`, creating it if it does not exist
    ///
    /// Fails with a connection error if the file cannot be opened or the
    /// liveness probe fails.
    pub fn open(path: &Path, config: DriverConfig) -> Result<Self, DriverError> {
        let connection_error = |source| DriverError::Connection {
            path: path.display().to_string(),
            source,
        };

        let conn = Connection::open(path).map_err(connection_error)?;
        conn.busy_timeout(config.busy_timeout)
            .map_err(connection_error)?;

        let db = DatabaseConn {
            conn,
            path: Some(path.to_path_buf()),
            config,
        };
        db.ping().map_err(|e| connection_error(e.source))?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn open_in_memory(config: DriverConfig) -> Result<Self, DriverError> {
        let connection_error = |source| DriverError::Connection {
            path: ":memory:".to_string(),
            source,
        };

        let conn = Connection::open_in_memory().map_err(connection_error)?;
        let db = DatabaseConn {
            conn,
            path: None,
            config,
        };
        db.ping().map_err(|e| connection_error(e.source))?;
        Ok(db)
    }

    /// Verify the engine answers queries
    pub fn ping(&self) -> Result<(), QueryError> {
        let query = "SELECT 1";
        self.conn
            .query_row(query, [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| QueryError::new(query, e))
    }

    /// Resolved driver options
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Substitute the bookkeeping table placeholder
    pub fn render(&self, sql: &str) -> String {
        sql.replace(MIGRATIONS_TABLE_PLACEHOLDER, &self.config.quoted_table())
    }

    /// Execute one internal statement with parameters
    pub fn exec<P: Params>(&self, sql: &str, params: P) -> Result<usize, QueryError> {
        let sql = self.render(sql);
        self.conn
            .execute(&sql, params)
            .map_err(|e| QueryError::new(sql, e))
    }

    /// Query a single row with an internal statement
    ///
    /// An empty result set yields `Ok(None)`.
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>, QueryError>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let sql = self.render(sql);
        self.conn
            .query_row(&sql, params, f)
            .optional()
            .map_err(|e| QueryError::new(sql, e))
    }

    /// Execute caller-supplied statement text as one batch, without substitution
    pub fn exec_script(&self, script: &str) -> Result<(), QueryError> {
        self.conn
            .execute_batch(script)
            .map_err(|e| QueryError::new(script, e))
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool, QueryError> {
        let count: Option<i64> = self.query_row(
            "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count.unwrap_or(0) > 0)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64, QueryError> {
        let sql = format!(
            "SELECT COUNT(*) FROM \"{}\"",
            table_name.replace('"', "\"\"")
        );
        let count: Option<u64> = self.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.unwrap_or(0))
    }

    /// Whether the connection is in autocommit mode (no open transaction)
    pub fn is_autocommit(&self) -> bool {
        self.conn.is_autocommit()
    }

    /// Irreversibly delete the database file
    ///
    /// Journal and WAL sidecar files are removed too when present. The
    /// connection itself stays open; callers are expected to close it next.
    pub fn drop_database(&self) -> Result<(), DriverError> {
        let path = self.path.as_deref().ok_or_else(|| DriverError::Drop {
            path: ":memory:".to_string(),
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                "in-memory database has no file",
            ),
        })?;

        fs::remove_file(path).map_err(|source| DriverError::Drop {
            path: path.display().to_string(),
            source,
        })?;

        for suffix in SIDECAR_SUFFIXES {
            let mut sidecar = path.as_os_str().to_owned();
            sidecar.push(suffix);
            let sidecar = PathBuf::from(sidecar);
            if sidecar.exists() {
                if let Err(e) = fs::remove_file(&sidecar) {
                    warn!("Failed to remove {}: {}", sidecar.display(), e);
                }
            }
        }

        info!("Dropped database {}", path.display());
        Ok(())
    }

    /// Close the connection
    pub fn close(self) -> Result<(), DriverError> {
        self.conn.close().map_err(|(_, e)| DriverError::Close(e))
    }
}
