//! Core database infrastructure
//!
//! This module provides the building blocks the driver composes:
//! - `DatabaseConn`: SQLite connection wrapper and table-name substitution
//! - `Locator` / `DriverConfig`: connection locator parsing and driver options
//! - `VersionTable`: the single-row version/dirty bookkeeping table
//! - `MigrationLock`: the exclusive run-wide migration lock
//! - `transactionally`: savepoint-guarded units of work

mod connection;
mod locator;
mod lock;
mod savepoint;
mod schema;

pub use connection::{DatabaseConn, MIGRATIONS_TABLE_PLACEHOLDER};
pub use locator::{
    DriverConfig, Locator, DEFAULT_BUSY_TIMEOUT, DEFAULT_MIGRATIONS_TABLE, OPT_BUSY_TIMEOUT,
    OPT_MIGRATIONS_TABLE, OPT_NO_TX_WRAP,
};
pub use lock::{LockState, MigrationLock};
pub use savepoint::{transactionally, SavepointSeq};
pub use schema::{VersionRecord, VersionTable, VersionTableDefinitions, NIL_VERSION};
