//! Database module
//!
//! This module provides the migration driver and the pieces it is built from:
//!
//! - **core**: connection management, locator parsing, the bookkeeping table,
//!   the migration lock and savepoint-guarded execution
//! - **driver**: the [`Driver`] contract and its SQLite implementation
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/            # Foundation
//! │   ├── connection   # SQLite DatabaseConn wrapper, file drop
//! │   ├── locator      # sqlite3:// locator and DriverConfig
//! │   ├── schema       # version/dirty bookkeeping table
//! │   ├── lock         # exclusive run-wide migration lock
//! │   └── savepoint    # transactionally(): nested rollback boundary
//! │
//! └── driver           # Driver trait + SqliteDriver
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use litemig::database::{Driver, SqliteDriver};
//!
//! let mut driver = SqliteDriver::open("sqlite3:///tmp/app.db?x-migrations-table=versions")?;
//! driver.lock()?;
//! if driver.version()?.dirty {
//!     // a previous run did not finish; leave it to the operator
//! }
//! driver.unlock()?;
//! ```

pub mod core;
mod driver;

pub use self::core::{
    DatabaseConn, DriverConfig, Locator, LockState, MigrationLock, SavepointSeq, VersionRecord,
    VersionTable, DEFAULT_BUSY_TIMEOUT, DEFAULT_MIGRATIONS_TABLE, NIL_VERSION,
};
pub use driver::{Driver, SqliteDriver};
