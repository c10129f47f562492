//! Exclusive migration lock
//!
//! The lock is not an advisory primitive. Acquiring it switches the session to
//! exclusive locking mode and opens one `BEGIN EXCLUSIVE` transaction that
//! stays open for the whole migration run:
//!
//! - SQLite itself keeps every other connection out while it is held
//! - nothing written during the run is durable until [`MigrationLock::release`]
//!   commits, so a process that dies mid-run leaves the database exactly as it
//!   was before the run
//!
//! The in-memory [`LockState`] only guards against re-entrant use of the same
//! driver instance. It knows nothing about other processes.

use tracing::{debug, info, warn};

use crate::database::core::connection::DatabaseConn;
use crate::error::{DriverError, QueryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    Unlocked,
    Locked,
}

/// Two-state migration lock owned by one driver instance
#[derive(Debug, Default)]
pub struct MigrationLock {
    state: LockState,
}

impl MigrationLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == LockState::Locked
    }

    /// Acquire the lock
    ///
    /// Fails with [`DriverError::Locked`] if this instance already holds it.
    /// If either statement fails the lock is not held, the state stays
    /// `Unlocked` and the session is back in normal locking mode.
    pub fn acquire(&mut self, db: &DatabaseConn) -> Result<()> {
        if self.is_locked() {
            return Err(DriverError::Locked);
        }

        set_locking_mode(db, "EXCLUSIVE").map_err(DriverError::Lock)?;
        if let Err(e) = db.exec("BEGIN EXCLUSIVE", []) {
            if let Err(cleanup) = restore_normal_mode(db) {
                debug!("Failed to leave exclusive locking mode: {}", cleanup);
            }
            return Err(DriverError::Lock(e));
        }

        self.state = LockState::Locked;
        info!("Acquired migration lock");
        Ok(())
    }

    /// Release the lock
    ///
    /// Releasing a lock that is not held succeeds without doing anything. When
    /// held, the run-wide transaction is committed, which is the point where
    /// every write of the run becomes durable. If the commit fails the lock is
    /// still held.
    pub fn release(&mut self, db: &DatabaseConn) -> Result<()> {
        if !self.is_locked() {
            return Ok(());
        }

        db.exec("COMMIT", []).map_err(DriverError::Unlock)?;
        self.state = LockState::Unlocked;
        restore_normal_mode(db).map_err(DriverError::Unlock)?;

        info!("Released migration lock");
        Ok(())
    }

    /// Drop a lock whose transaction was ended behind its back
    ///
    /// Returns `true` if the lock was held but the connection is no longer
    /// inside a transaction. The state is reset to `Unlocked` in that case.
    pub fn forfeit_if_lost(&mut self, db: &DatabaseConn) -> bool {
        if !self.is_locked() || !db.is_autocommit() {
            return false;
        }

        self.state = LockState::Unlocked;
        if let Err(e) = restore_normal_mode(db) {
            debug!("Failed to leave exclusive locking mode: {}", e);
        }
        warn!("Migration lock lost: the run-wide transaction was ended by a script");
        true
    }
}

/// Switch back to normal locking mode and give up the file lock
fn restore_normal_mode(db: &DatabaseConn) -> std::result::Result<(), QueryError> {
    set_locking_mode(db, "NORMAL")?;
    // exclusive locking mode holds the file lock until the next access
    // after switching back to normal
    let _: Option<i64> =
        db.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get(0))?;
    Ok(())
}

fn set_locking_mode(db: &DatabaseConn, mode: &str) -> std::result::Result<(), QueryError> {
    // the pragma answers with the new mode, so it has to be read as a row
    let _: Option<String> = db.query_row(
        &format!("PRAGMA locking_mode = {}", mode),
        [],
        |row| row.get(0),
    )?;
    Ok(())
}
