#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Litemig - a SQLite schema-migration driver
//!
//! Litemig lets a migration orchestrator apply raw SQL migration scripts to a
//! file-backed SQLite database one at a time, while durably tracking a single
//! fact: the current migration version and whether it is dirty (a migration
//! started but did not provably finish).
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Driver library | `rusqlite`, `url`, `tracing` |
//! | `cli` | `litemig` operator binary | `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # Library only
//! litemig = { version = "0.1", default-features = false }
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: the driver and its building blocks
//!   - `core`: connection, locator, bookkeeping table, lock, savepoints
//!   - `driver`: the [`Driver`] contract and [`SqliteDriver`]
//! - **[`config`]**: configuration for the operator binary
//! - **[`error`]**: the [`DriverError`] taxonomy
//!
//! # Guarantees
//!
//! - The bookkeeping table never holds more than one row; an empty table
//!   means no migration has been applied ([`NIL_VERSION`]).
//! - A failing script leaves no partial effects: it runs inside a savepoint
//!   that is rolled back on failure.
//! - Everything done between [`Driver::lock`] and [`Driver::unlock`] is one
//!   exclusive transaction. A process that dies before unlocking leaves the
//!   database exactly as it was before the run.
//! - The driver never repairs a dirty state on its own.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use litemig::{Driver, SqliteDriver};
//! use std::fs::File;
//!
//! let mut driver = SqliteDriver::open("sqlite3:///var/lib/app/app.db")?;
//! driver.lock()?;
//!
//! let current = driver.version()?;
//! if current.dirty {
//!     driver.unlock()?;
//!     anyhow::bail!("database is dirty at version {}", current.version);
//! }
//!
//! let next = current.version + 1;
//! driver.set_version(next, true)?;
//! driver.run(&mut File::open("migrations/0001_init.up.sql")?)?;
//! driver.set_version(next, false)?;
//! driver.unlock()?;
//! ```

pub mod config;
pub mod database;
pub mod error;

// =============================================================================
// Configuration
// =============================================================================

pub use config::LitemigConfig;

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

pub use database::{
    DatabaseConn, Driver, DriverConfig, Locator, LockState, SqliteDriver, VersionRecord,
    NIL_VERSION,
};

// =============================================================================
// Errors
// =============================================================================

pub use error::{DriverError, QueryError};
