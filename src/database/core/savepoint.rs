//! Savepoint-guarded units of work
//!
//! Every write the driver makes, and every migration script it runs, happens
//! inside a uniquely named savepoint. A savepoint nests inside the run-wide
//! exclusive transaction held by the migration lock, so a failing unit rolls
//! back to exactly where it started without aborting the whole run.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::database::core::connection::DatabaseConn;
use crate::error::QueryError;

/// Per-driver source of savepoint names
///
/// Names are `txn_1`, `txn_2`, ... and never repeat for the life of the
/// instance.
#[derive(Debug, Default)]
pub struct SavepointSeq {
    counter: AtomicU64,
}

impl SavepointSeq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the next savepoint name
    pub fn next_name(&self) -> String {
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("txn_{}", id)
    }
}

/// Open savepoint that rolls back on drop unless released
struct Savepoint<'a> {
    db: &'a DatabaseConn,
    name: String,
    released: bool,
}

impl<'a> Savepoint<'a> {
    fn begin(db: &'a DatabaseConn, name: String) -> Result<Self, QueryError> {
        db.exec(&format!("SAVEPOINT {}", name), [])?;
        debug!("Created savepoint {}", name);
        Ok(Self {
            db,
            name,
            released: false,
        })
    }

    fn release(mut self) -> Result<(), QueryError> {
        self.db.exec(&format!("RELEASE {}", self.name), [])?;
        self.released = true;
        debug!("Released savepoint {}", self.name);
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        // ROLLBACK TO keeps the savepoint on the stack; RELEASE pops it so an
        // implicit transaction opened by SAVEPOINT does not outlive this unit.
        for sql in [
            format!("ROLLBACK TO {}", self.name),
            format!("RELEASE {}", self.name),
        ] {
            if let Err(e) = self.db.exec(&sql, []) {
                debug!("Ignoring savepoint cleanup failure: {}", e);
            }
        }
        debug!("Rolled back savepoint {}", self.name);
    }
}

/// Run `action` inside a fresh savepoint
///
/// On success the savepoint is released, folding its work into the
/// enclosing transaction (or committing it when there is none). On failure,
/// or if `action` panics, everything executed since the savepoint was created
/// is rolled back and the original error is returned. Cleanup failures are
/// swallowed so they never replace the primary error.
pub fn transactionally<T, F>(
    db: &DatabaseConn,
    seq: &SavepointSeq,
    action: F,
) -> Result<T, QueryError>
where
    F: FnOnce(&DatabaseConn) -> Result<T, QueryError>,
{
    let savepoint = Savepoint::begin(db, seq.next_name())?;
    let value = action(db)?;
    savepoint.release()?;
    Ok(value)
}
