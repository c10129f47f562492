use std::fs::File;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Args;
use litemig::{Driver, LitemigConfig, SqliteDriver, VersionRecord};
use tracing::{info, warn};

use super::{open_driver, version_to_string};

/// Arguments for the Apply command
#[derive(Args)]
pub struct ApplyArgs {
    /// Migration script to run
    #[clap(name = "FILE")]
    pub file: PathBuf,

    /// Version to record once the script has been applied
    #[clap(short = 't', long)]
    pub target_version: i64,

    /// Output the resulting version as a JSON object
    #[clap(long)]
    pub json: bool,
}

pub fn run(config: &LitemigConfig, database: Option<&str>, args: ApplyArgs) -> Result<()> {
    if args.target_version < 0 {
        bail!("target version must be >= 0, got {}", args.target_version);
    }

    let mut file = File::open(&args.file)
        .map_err(|e| anyhow!("Unable to open {}: {}", args.file.display(), e))?;

    let mut driver = open_driver(config, database)?;
    driver.lock()?;

    let outcome = apply_locked(&mut driver, &mut file, args.target_version);

    // Unlock either way: on failure this commits the dirty mark for the operator
    if let Err(e) = driver.unlock() {
        if outcome.is_ok() {
            return Err(e.into());
        }
        warn!("Failed to release migration lock: {}", e);
    }
    driver.close()?;

    let record = outcome?;
    info!("Applied {} as version {}", args.file.display(), record.version);
    println!("{}", version_to_string(&record, args.json)?);
    Ok(())
}

fn apply_locked(
    driver: &mut SqliteDriver,
    file: &mut File,
    version: i64,
) -> Result<VersionRecord> {
    let current = driver.version()?;
    if current.dirty {
        bail!(
            "Database is dirty at version {}; repair it and run `litemig force <VERSION>`",
            current.version
        );
    }

    driver.set_version(version, true)?;
    driver.run(file)?;
    driver.set_version(version, false)?;

    Ok(VersionRecord::new(version, false))
}
