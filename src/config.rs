use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::Path;
use url::Url;

use crate::database::core::{OPT_BUSY_TIMEOUT, OPT_MIGRATIONS_TABLE};

/// Settings for the `litemig` operator binary
///
/// Library users open drivers from a locator directly; this only supplies
/// defaults for the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LitemigConfig {
    /// Default database locator, e.g. `sqlite3:///var/lib/app/app.db`
    pub database_url: Option<String>,

    /// Bookkeeping table name, applied when the locator does not set one
    pub migrations_table: Option<String>,

    /// Busy timeout in milliseconds, applied when the locator does not set one
    pub busy_timeout_ms: Option<u64>,

    /// Configuration file the settings were read from, if it existed
    pub config_file: Option<String>,
}

pub const EMPTY_CONFIG: &str = r#"### litemig configuration file

### database to migrate
# database_url = "sqlite3:///var/lib/app/app.db"

### bookkeeping table name (default: schema_migrations)
# migrations_table = "schema_migrations"

### how long to wait on a locked database, in milliseconds
# busy_timeout_ms = 5000
"#;

impl LitemigConfig {
    /// Load configuration
    ///
    /// Reads the TOML file at `path` (default `$HOME/.litemig/litemig.toml`)
    /// if it exists, then applies `LITEMIG_*` environment variables on top,
    /// e.g. `LITEMIG_DATABASE_URL=sqlite3:///tmp/app.db`.
    pub fn new(path: &Option<String>) -> Result<LitemigConfig> {
        let mut builder = Config::builder();

        let file_path = match path {
            Some(p) => p.clone(),
            None => Self::config_file_path(),
        };

        let config_file = if Path::new(file_path.as_str()).exists() {
            builder = builder.add_source(config::File::with_name(file_path.as_str()));
            Some(file_path)
        } else if path.is_some() {
            return Err(anyhow!("Config file {} does not exist", file_path));
        } else {
            None
        };

        // Add in settings from the environment (with a prefix of LITEMIG)
        builder = builder.add_source(config::Environment::with_prefix("LITEMIG"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let busy_timeout_ms = match config.get("busy_timeout_ms") {
            Some(v) => Some(
                v.parse()
                    .map_err(|e| anyhow!("Invalid busy_timeout_ms '{}': {}", v, e))?,
            ),
            None => None,
        };

        Ok(LitemigConfig {
            database_url: config.get("database_url").cloned(),
            migrations_table: config.get("migrations_table").cloned(),
            busy_timeout_ms,
            config_file,
        })
    }

    /// Get the default config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.litemig/litemig.toml", home_dir)
    }

    /// Build the locator to open
    ///
    /// `database` overrides the configured `database_url`. Configured table
    /// name and busy timeout are added as locator options unless the locator
    /// already carries them.
    pub fn resolve_locator(&self, database: Option<&str>) -> Result<String> {
        let locator = database
            .map(str::to_string)
            .or_else(|| self.database_url.clone())
            .ok_or_else(|| {
                anyhow!("No database given; pass --database or set LITEMIG_DATABASE_URL")
            })?;

        let mut url =
            Url::parse(&locator).map_err(|e| anyhow!("Invalid locator '{}': {}", locator, e))?;
        let present: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();

        let mut extra: Vec<(&str, String)> = Vec::new();
        if let Some(table) = &self.migrations_table {
            if !present.iter().any(|k| k == OPT_MIGRATIONS_TABLE) {
                extra.push((OPT_MIGRATIONS_TABLE, table.clone()));
            }
        }
        if let Some(ms) = self.busy_timeout_ms {
            if !present.iter().any(|k| k == OPT_BUSY_TIMEOUT) {
                extra.push((OPT_BUSY_TIMEOUT, ms.to_string()));
            }
        }

        if !extra.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &extra {
                pairs.append_pair(key, value);
            }
        }

        Ok(url.to_string())
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let unset = || "(not set)".to_string();
        [
            format!(
                "Config File:        {}",
                self.config_file.clone().unwrap_or_else(unset)
            ),
            format!(
                "Database URL:       {}",
                self.database_url.clone().unwrap_or_else(unset)
            ),
            format!(
                "Migrations Table:   {}",
                self.migrations_table.clone().unwrap_or_else(unset)
            ),
            format!(
                "Busy Timeout:       {}",
                self.busy_timeout_ms
                    .map(|ms| format!("{} ms", ms))
                    .unwrap_or_else(unset)
            ),
        ]
        .join("\n")
    }
}
