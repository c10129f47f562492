//! Bookkeeping table management
//!
//! The bookkeeping table holds at most one row: the highest applied (or
//! currently applying) migration version and whether that migration is dirty.
//! An empty table means no migration has ever been applied.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::database::core::connection::DatabaseConn;
use crate::database::core::savepoint::{transactionally, SavepointSeq};
use crate::error::{DriverError, Result};

/// Version reported when no migration has been applied
pub const NIL_VERSION: i64 = -1;

/// The single durable fact tracked by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub version: i64,
    pub dirty: bool,
}

impl VersionRecord {
    pub const NIL: VersionRecord = VersionRecord {
        version: NIL_VERSION,
        dirty: false,
    };

    pub fn new(version: i64, dirty: bool) -> Self {
        Self { version, dirty }
    }

    /// Whether any migration has been recorded
    pub fn is_nil(&self) -> bool {
        self.version < 0
    }
}

impl Default for VersionRecord {
    fn default() -> Self {
        Self::NIL
    }
}

/// Statements used on the bookkeeping table
///
/// `${MIGRATIONS_TABLE}` is replaced with the configured table name before
/// execution.
pub struct VersionTableDefinitions;

impl VersionTableDefinitions {
    pub const EXISTS: &'static str =
        "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?1";

    pub const CREATE: &'static str = r#"
        CREATE TABLE ${MIGRATIONS_TABLE} (
            version INTEGER NOT NULL PRIMARY KEY,
            dirty BOOLEAN NOT NULL
        )
    "#;

    pub const SELECT: &'static str = "SELECT version, dirty FROM ${MIGRATIONS_TABLE} LIMIT 1";

    pub const DELETE: &'static str = "DELETE FROM ${MIGRATIONS_TABLE}";

    pub const INSERT: &'static str =
        "INSERT INTO ${MIGRATIONS_TABLE} (version, dirty) VALUES (?1, ?2)";
}

/// Version table manager
///
/// Borrows the connection for the duration of each operation.
pub struct VersionTable<'a> {
    db: &'a DatabaseConn,
}

impl<'a> VersionTable<'a> {
    /// Create a new version table manager for the given connection
    pub fn new(db: &'a DatabaseConn) -> Self {
        Self { db }
    }

    /// Make sure the bookkeeping table exists
    ///
    /// The catalog check gates creation, so this is safe to call on every open.
    pub fn ensure(&self) -> Result<()> {
        let table = &self.db.config().migrations_table;

        let count: Option<i64> = self
            .db
            .query_row(VersionTableDefinitions::EXISTS, [table], |row| row.get(0))
            .map_err(DriverError::Bootstrap)?;
        if count.unwrap_or(0) > 0 {
            return Ok(());
        }

        self.db
            .exec(VersionTableDefinitions::CREATE, [])
            .map_err(DriverError::Bootstrap)?;
        info!("Created migrations table {}", table);
        Ok(())
    }

    /// Read the current version record
    ///
    /// An empty table is not an error: it reads as [`VersionRecord::NIL`].
    pub fn read(&self) -> Result<VersionRecord> {
        let record = self
            .db
            .query_row(VersionTableDefinitions::SELECT, [], |row| {
                Ok(VersionRecord {
                    version: row.get(0)?,
                    dirty: row.get(1)?,
                })
            })
            .map_err(DriverError::Read)?
            .unwrap_or(VersionRecord::NIL);

        if record.dirty {
            warn!(
                "Database is dirty at version {}; manual intervention required",
                record.version
            );
        }
        Ok(record)
    }

    /// Atomically replace the version record
    ///
    /// All rows are deleted, then one row is inserted only if `version >= 0`.
    /// A negative version leaves the table empty. Both steps share one
    /// savepoint, so a failure partway restores the previous row.
    pub fn write(&self, seq: &SavepointSeq, version: i64, dirty: bool) -> Result<()> {
        transactionally(self.db, seq, |db| {
            db.exec(VersionTableDefinitions::DELETE, [])?;
            if version >= 0 {
                db.exec(
                    VersionTableDefinitions::INSERT,
                    rusqlite::params![version, dirty],
                )?;
            }
            Ok(())
        })
        .map_err(DriverError::Write)?;

        debug!("Set migration version {} (dirty: {})", version, dirty);
        Ok(())
    }

    /// Number of rows currently in the bookkeeping table
    pub fn row_count(&self) -> Result<u64> {
        self.db
            .table_count(&self.db.config().migrations_table)
            .map_err(DriverError::Read)
    }
}
