//! Connection locator parsing
//!
//! A locator looks like `sqlite3:///var/lib/app/data.db?x-migrations-table=migrations`.
//! The path names the database file; query parameters carry driver options.

use std::path::PathBuf;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{DriverError, Result};

/// Default name of the bookkeeping table
pub const DEFAULT_MIGRATIONS_TABLE: &str = "schema_migrations";

/// Default time a connection waits on a locked database
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Locator option naming the bookkeeping table
pub const OPT_MIGRATIONS_TABLE: &str = "x-migrations-table";
/// Locator option for the busy timeout, in milliseconds
pub const OPT_BUSY_TIMEOUT: &str = "x-busy-timeout";
/// Locator option disabling the savepoint around migration scripts
pub const OPT_NO_TX_WRAP: &str = "x-no-tx-wrap";

const SCHEMES: &[&str] = &["sqlite3", "sqlite"];

/// Resolved driver options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Name of the bookkeeping table
    pub migrations_table: String,

    /// How long to wait on a locked database before failing
    pub busy_timeout: Duration,

    /// Run migration scripts without a surrounding savepoint
    pub no_tx_wrap: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            no_tx_wrap: false,
        }
    }
}

impl DriverConfig {
    /// The bookkeeping table name quoted as an SQL identifier
    pub fn quoted_table(&self) -> String {
        format!("\"{}\"", self.migrations_table.replace('"', "\"\""))
    }
}

/// A parsed connection locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub path: PathBuf,
    pub config: DriverConfig,
}

impl Locator {
    /// Parse a `sqlite3://` locator
    pub fn parse(locator: &str) -> Result<Self> {
        let invalid = |reason: String| DriverError::InvalidLocator {
            locator: locator.to_string(),
            reason,
        };

        let url = Url::parse(locator).map_err(|e| invalid(e.to_string()))?;

        if !SCHEMES.contains(&url.scheme()) {
            return Err(invalid(format!(
                "unsupported scheme '{}', expected one of: {}",
                url.scheme(),
                SCHEMES.join(", ")
            )));
        }

        // `sqlite3://rel/path.db` parses "rel" as the host
        let raw = format!("{}{}", url.host_str().unwrap_or(""), url.path());
        let path = percent_decode_str(&raw)
            .decode_utf8()
            .map_err(|e| invalid(format!("database path is not valid UTF-8: {}", e)))?
            .into_owned();
        if path.is_empty() || path == "/" {
            return Err(invalid("missing database path".to_string()));
        }

        let mut config = DriverConfig::default();

        if let Some(table) = option(&url, OPT_MIGRATIONS_TABLE) {
            if table.is_empty() {
                return Err(invalid(format!("{} must not be empty", OPT_MIGRATIONS_TABLE)));
            }
            config.migrations_table = table;
        }

        if let Some(ms) = option(&url, OPT_BUSY_TIMEOUT) {
            let ms: u64 = ms.parse().map_err(|_| {
                invalid(format!(
                    "{} must be a non-negative integer, got '{}'",
                    OPT_BUSY_TIMEOUT, ms
                ))
            })?;
            config.busy_timeout = Duration::from_millis(ms);
        }

        if let Some(flag) = option(&url, OPT_NO_TX_WRAP) {
            config.no_tx_wrap = match flag.to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(invalid(format!(
                        "{} must be true or false, got '{}'",
                        OPT_NO_TX_WRAP, flag
                    )))
                }
            };
        }

        Ok(Self {
            path: PathBuf::from(path),
            config,
        })
    }
}

/// First value of a query option
fn option(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}
