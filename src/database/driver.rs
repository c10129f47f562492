//! SQLite migration driver
//!
//! [`SqliteDriver`] composes the core pieces into the primitives a migration
//! orchestrator calls. A typical run looks like:
//!
//! ```rust,ignore
//! use litemig::database::{Driver, SqliteDriver};
//!
//! let mut driver = SqliteDriver::open("sqlite3:///var/lib/app/app.db")?;
//! driver.lock()?;
//! let current = driver.version()?;
//! driver.set_version(current.version + 1, true)?;
//! driver.run(&mut std::fs::File::open("0002_add_users.up.sql")?)?;
//! driver.set_version(current.version + 1, false)?;
//! driver.unlock()?;
//! ```

use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use crate::database::core::{
    transactionally, DatabaseConn, DriverConfig, Locator, LockState, MigrationLock, SavepointSeq,
    VersionRecord, VersionTable,
};
use crate::error::{DriverError, Result};

/// Primitives a migration orchestrator needs from a database driver
///
/// Callers bracket a run with [`Driver::lock`] / [`Driver::unlock`] and mark
/// the version dirty before running a script and clean after it succeeds.
pub trait Driver {
    /// Acquire the exclusive migration lock
    fn lock(&mut self) -> Result<()>;

    /// Release the migration lock, committing everything done under it
    ///
    /// Succeeds without doing anything if the lock is not held.
    fn unlock(&mut self) -> Result<()>;

    /// Apply one migration script
    ///
    /// Under the lock a script must not contain transaction control
    /// statements. A script that ends the lock's transaction fails with
    /// [`DriverError::LockLost`] and leaves the lock released.
    fn run(&mut self, migration: &mut dyn Read) -> Result<()>;

    /// Record the current version and dirty flag
    ///
    /// A negative version clears the record.
    fn set_version(&mut self, version: i64, dirty: bool) -> Result<()>;

    /// Current version and dirty flag
    fn version(&mut self) -> Result<VersionRecord>;

    /// Irreversibly delete the whole database
    fn drop_database(&mut self) -> Result<()>;

    /// Close the driver
    fn close(self: Box<Self>) -> Result<()>;
}

/// Migration driver for a file-backed SQLite database
pub struct SqliteDriver {
    db: DatabaseConn,
    lock: MigrationLock,
    savepoints: SavepointSeq,
}

impl SqliteDriver {
    /// Open the database named by a `sqlite3://` locator
    ///
    /// The bookkeeping table is created if it does not exist yet.
    pub fn open(locator: &str) -> Result<Self> {
        let Locator { path, config } = Locator::parse(locator)?;
        Self::open_path(&path, config)
    }

    /// Open the database at `path` with explicit options
    pub fn open_path(path: &Path, config: DriverConfig) -> Result<Self> {
        let db = DatabaseConn::open(path, config)?;
        info!("Opened migration database {}", path.display());
        Self::with_connection(db)
    }

    /// Build a driver around an already-open connection
    pub fn with_connection(db: DatabaseConn) -> Result<Self> {
        VersionTable::new(&db).ensure()?;
        Ok(Self {
            db,
            lock: MigrationLock::new(),
            savepoints: SavepointSeq::new(),
        })
    }

    /// Current lock state of this instance
    pub fn lock_state(&self) -> LockState {
        self.lock.state()
    }

    /// Borrow the underlying connection
    pub fn connection(&self) -> &DatabaseConn {
        &self.db
    }

    /// Close the driver without boxing it
    pub fn close(self) -> Result<()> {
        self.db.close()
    }
}

impl Driver for SqliteDriver {
    fn lock(&mut self) -> Result<()> {
        self.lock.acquire(&self.db)
    }

    fn unlock(&mut self) -> Result<()> {
        self.lock.release(&self.db)
    }

    fn run(&mut self, migration: &mut dyn Read) -> Result<()> {
        let mut script = String::new();
        migration
            .read_to_string(&mut script)
            .map_err(DriverError::Script)?;

        debug!("Running migration script ({} bytes)", script.len());
        let outcome = if self.db.config().no_tx_wrap {
            self.db.exec_script(&script)
        } else {
            transactionally(&self.db, &self.savepoints, |db| db.exec_script(&script))
        };

        if self.lock.forfeit_if_lost(&self.db) {
            return Err(DriverError::LockLost);
        }
        outcome.map_err(DriverError::Execution)
    }

    fn set_version(&mut self, version: i64, dirty: bool) -> Result<()> {
        VersionTable::new(&self.db).write(&self.savepoints, version, dirty)
    }

    fn version(&mut self) -> Result<VersionRecord> {
        VersionTable::new(&self.db).read()
    }

    fn drop_database(&mut self) -> Result<()> {
        self.db.drop_database()
    }

    fn close(self: Box<Self>) -> Result<()> {
        (*self).close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::NIL_VERSION;
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn setup_test_dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    fn locator(path: &Path) -> String {
        format!("sqlite3://{}", path.display())
    }

    fn db_path(dir: &TempDir) -> PathBuf {
        dir.path().join("migrations.db")
    }

    fn script(sql: &str) -> Cursor<Vec<u8>> {
        Cursor::new(sql.as_bytes().to_vec())
    }

    #[test]
    fn test_open_bootstraps_table() {
        let dir = setup_test_dir();
        let mut driver = SqliteDriver::open(&locator(&db_path(&dir))).unwrap();

        assert!(driver
            .connection()
            .table_exists("schema_migrations")
            .unwrap());
        assert_eq!(driver.version().unwrap(), VersionRecord::NIL);
        driver.close().unwrap();
    }

    #[test]
    fn test_open_with_custom_table() {
        let dir = setup_test_dir();
        let loc = format!(
            "{}?x-migrations-table=app_versions",
            locator(&db_path(&dir))
        );
        let driver = SqliteDriver::open(&loc).unwrap();

        assert!(driver.connection().table_exists("app_versions").unwrap());
        assert!(!driver
            .connection()
            .table_exists("schema_migrations")
            .unwrap());
    }

    #[test]
    fn test_open_errors() {
        assert!(matches!(
            SqliteDriver::open("mysql://localhost/db"),
            Err(DriverError::InvalidLocator { .. })
        ));

        let dir = setup_test_dir();
        let missing = dir.path().join("no-such-dir").join("app.db");
        assert!(matches!(
            SqliteDriver::open(&locator(&missing)),
            Err(DriverError::Connection { .. })
        ));
    }

    #[test]
    fn test_reopen_bootstrap_is_idempotent() {
        let dir = setup_test_dir();
        let path = db_path(&dir);

        let mut driver = SqliteDriver::open(&locator(&path)).unwrap();
        driver.set_version(2, false).unwrap();
        driver.close().unwrap();

        let mut driver = SqliteDriver::open(&locator(&path)).unwrap();
        assert_eq!(driver.version().unwrap(), VersionRecord::new(2, false));
        assert_eq!(
            VersionTable::new(driver.connection()).row_count().unwrap(),
            1
        );
    }

    #[test]
    fn test_set_version_round_trip() {
        let dir = setup_test_dir();
        let mut driver = SqliteDriver::open(&locator(&db_path(&dir))).unwrap();

        driver.set_version(5, false).unwrap();
        assert_eq!(driver.version().unwrap(), VersionRecord::new(5, false));

        driver.set_version(NIL_VERSION, false).unwrap();
        assert_eq!(driver.version().unwrap(), VersionRecord::NIL);
        assert_eq!(
            VersionTable::new(driver.connection()).row_count().unwrap(),
            0
        );
    }

    #[test]
    fn test_run_applies_multi_statement_script() {
        let dir = setup_test_dir();
        let mut driver = SqliteDriver::open(&locator(&db_path(&dir))).unwrap();

        driver
            .run(&mut script(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
                 INSERT INTO users (name) VALUES ('ada'), ('grace');",
            ))
            .unwrap();

        assert_eq!(driver.connection().table_count("users").unwrap(), 2);
    }

    #[test]
    fn test_run_failure_leaves_no_partial_effects() {
        let dir = setup_test_dir();
        let mut driver = SqliteDriver::open(&locator(&db_path(&dir))).unwrap();

        let err = driver
            .run(&mut script(
                "CREATE TABLE first_half (x INTEGER);
                 CREATE TABLE second_half (;",
            ))
            .unwrap_err();

        assert!(matches!(err, DriverError::Execution(_)));
        assert!(err.query().unwrap().contains("second_half"));
        assert!(!driver.connection().table_exists("first_half").unwrap());
        assert!(!driver.connection().table_exists("second_half").unwrap());
    }

    #[test]
    fn test_run_failure_under_lock_keeps_run_transaction() {
        let dir = setup_test_dir();
        let mut driver = SqliteDriver::open(&locator(&db_path(&dir))).unwrap();

        driver.lock().unwrap();
        driver.run(&mut script("CREATE TABLE kept (x INTEGER)")).unwrap();
        assert!(driver
            .run(&mut script(
                "CREATE TABLE dropped (x INTEGER); INSERT INTO nowhere VALUES (1);"
            ))
            .is_err());
        driver.set_version(1, false).unwrap();
        driver.unlock().unwrap();

        assert!(driver.connection().table_exists("kept").unwrap());
        assert!(!driver.connection().table_exists("dropped").unwrap());
        assert_eq!(driver.version().unwrap(), VersionRecord::new(1, false));
    }

    #[test]
    fn test_run_rejects_non_utf8_script() {
        let dir = setup_test_dir();
        let mut driver = SqliteDriver::open(&locator(&db_path(&dir))).unwrap();

        let mut bytes = Cursor::new(vec![0xff, 0xfe, 0xfd]);
        assert!(matches!(
            driver.run(&mut bytes),
            Err(DriverError::Script(_))
        ));
    }

    #[test]
    fn test_run_without_tx_wrap_allows_explicit_transactions() {
        let dir = setup_test_dir();
        let loc = format!("{}?x-no-tx-wrap=true", locator(&db_path(&dir)));
        let mut driver = SqliteDriver::open(&loc).unwrap();

        driver
            .run(&mut script(
                "BEGIN; CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1); COMMIT;",
            ))
            .unwrap();
        assert_eq!(driver.connection().table_count("t").unwrap(), 1);
    }

    #[test]
    fn test_run_commit_under_lock_reports_lost_lock() {
        let dir = setup_test_dir();
        let mut driver = SqliteDriver::open(&locator(&db_path(&dir))).unwrap();

        driver.lock().unwrap();
        assert!(matches!(
            driver.run(&mut script("CREATE TABLE early (x INTEGER); COMMIT;")),
            Err(DriverError::LockLost)
        ));
        assert_eq!(driver.lock_state(), LockState::Unlocked);
        assert!(driver.connection().is_autocommit());

        // the lock can be taken again afterwards
        driver.lock().unwrap();
        driver.unlock().unwrap();
    }

    #[test]
    fn test_run_without_tx_wrap_commit_under_lock_reports_lost_lock() {
        let dir = setup_test_dir();
        let loc = format!("{}?x-no-tx-wrap=true", locator(&db_path(&dir)));
        let mut driver = SqliteDriver::open(&loc).unwrap();

        driver.lock().unwrap();
        assert!(matches!(
            driver.run(&mut script("CREATE TABLE t (x INTEGER); COMMIT;")),
            Err(DriverError::LockLost)
        ));
        assert_eq!(driver.lock_state(), LockState::Unlocked);
    }

    #[test]
    fn test_failed_lock_then_read_does_not_block_holder() {
        let dir = setup_test_dir();
        let loc = format!("{}?x-busy-timeout=0", locator(&db_path(&dir)));

        let mut holder = SqliteDriver::open(&loc).unwrap();
        let mut contender = SqliteDriver::open(&loc).unwrap();

        holder.lock().unwrap();
        assert!(matches!(contender.lock(), Err(DriverError::Lock(_))));
        holder.unlock().unwrap();

        assert_eq!(contender.version().unwrap(), VersionRecord::NIL);
        holder.lock().unwrap();
        holder.set_version(3, false).unwrap();
        holder.unlock().unwrap();
        assert_eq!(contender.version().unwrap(), VersionRecord::new(3, false));
    }

    #[test]
    fn test_open_path_with_space() {
        let dir = setup_test_dir();
        let path = dir.path().join("my app.db");

        let mut driver = SqliteDriver::open(&locator(&path)).unwrap();
        driver.set_version(1, false).unwrap();
        driver.close().unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("my%20app.db").exists());
    }

    #[test]
    fn test_lock_twice_is_locked_error() {
        let dir = setup_test_dir();
        let mut driver = SqliteDriver::open(&locator(&db_path(&dir))).unwrap();

        driver.lock().unwrap();
        assert!(matches!(driver.lock(), Err(DriverError::Locked)));
        assert_eq!(driver.lock_state(), LockState::Locked);
        driver.unlock().unwrap();
        assert_eq!(driver.lock_state(), LockState::Unlocked);
    }

    #[test]
    fn test_unlock_without_lock_is_noop() {
        let dir = setup_test_dir();
        let mut driver = SqliteDriver::open(&locator(&db_path(&dir))).unwrap();

        driver.unlock().unwrap();
        assert_eq!(driver.lock_state(), LockState::Unlocked);
        driver.lock().unwrap();
        driver.unlock().unwrap();
    }

    #[test]
    fn test_second_driver_cannot_lock() {
        let dir = setup_test_dir();
        let loc = format!("{}?x-busy-timeout=0", locator(&db_path(&dir)));

        let mut first = SqliteDriver::open(&loc).unwrap();
        let mut second = SqliteDriver::open(&loc).unwrap();

        first.lock().unwrap();
        first.set_version(1, true).unwrap();
        assert!(matches!(second.lock(), Err(DriverError::Lock(_))));

        first.set_version(1, false).unwrap();
        first.unlock().unwrap();

        second.lock().unwrap();
        assert_eq!(second.version().unwrap(), VersionRecord::new(1, false));
        second.unlock().unwrap();
    }

    #[test]
    fn test_end_to_end_run() {
        let dir = setup_test_dir();
        let path = db_path(&dir);

        let mut driver = SqliteDriver::open(&locator(&path)).unwrap();
        driver.lock().unwrap();
        assert_eq!(driver.version().unwrap(), VersionRecord::NIL);
        driver.run(&mut script("CREATE TABLE t(x int)")).unwrap();
        driver.set_version(1, false).unwrap();
        driver.unlock().unwrap();
        driver.close().unwrap();

        let mut reopened = SqliteDriver::open(&locator(&path)).unwrap();
        assert_eq!(reopened.version().unwrap(), VersionRecord::new(1, false));
        assert!(reopened.connection().table_exists("t").unwrap());
    }

    #[test]
    fn test_crash_before_unlock_discards_run() {
        let dir = setup_test_dir();
        let path = db_path(&dir);

        let mut driver = SqliteDriver::open(&locator(&path)).unwrap();
        driver.set_version(1, false).unwrap();

        driver.lock().unwrap();
        driver.set_version(2, true).unwrap();
        driver
            .run(&mut script("CREATE TABLE half_done (x INTEGER)"))
            .unwrap();
        assert!(driver
            .run(&mut script("THIS IS NOT SQL"))
            .is_err());
        // the process goes away without unlocking
        drop(driver);

        let mut reopened = SqliteDriver::open(&locator(&path)).unwrap();
        assert_eq!(reopened.version().unwrap(), VersionRecord::new(1, false));
        assert!(!reopened.connection().table_exists("half_done").unwrap());
    }

    #[test]
    fn test_drop_database() {
        let dir = setup_test_dir();
        let path = db_path(&dir);

        let mut driver = SqliteDriver::open(&locator(&path)).unwrap();
        driver.set_version(3, false).unwrap();
        assert!(path.exists());

        driver.drop_database().unwrap();
        assert!(!path.exists());
        driver.close().unwrap();
    }

    #[test]
    fn test_driver_as_trait_object() {
        let dir = setup_test_dir();
        let mut driver: Box<dyn Driver> =
            Box::new(SqliteDriver::open(&locator(&db_path(&dir))).unwrap());

        driver.lock().unwrap();
        driver.set_version(4, true).unwrap();
        driver.unlock().unwrap();
        assert_eq!(driver.version().unwrap(), VersionRecord::new(4, true));
        driver.close().unwrap();
    }
}
