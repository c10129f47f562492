pub mod apply;
pub mod config;
pub mod drop;
pub mod force;
pub mod version;

use anyhow::Result;
use litemig::{LitemigConfig, SqliteDriver, VersionRecord};
use tracing::info;

/// Open a driver for the configured (or overridden) database
pub(crate) fn open_driver(
    config: &LitemigConfig,
    database: Option<&str>,
) -> Result<SqliteDriver> {
    let locator = config.resolve_locator(database)?;
    info!("Using database {}", locator);
    Ok(SqliteDriver::open(&locator)?)
}

pub(crate) fn version_to_string(
    record: &VersionRecord,
    json: bool,
) -> Result<String, anyhow::Error> {
    if json {
        Ok(serde_json::to_string(record)?)
    } else if record.is_nil() {
        Ok("no migration applied".to_string())
    } else if record.dirty {
        Ok(format!("{} (dirty)", record.version))
    } else {
        Ok(record.version.to_string())
    }
}
