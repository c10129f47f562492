use anyhow::{bail, Result};
use clap::Args;
use litemig::{Driver, LitemigConfig, VersionRecord, NIL_VERSION};

use super::{open_driver, version_to_string};

/// Arguments for the Force command
#[derive(Args)]
pub struct ForceArgs {
    /// Version to record as clean; -1 clears the record
    #[clap(value_name = "VERSION", allow_hyphen_values = true)]
    pub target: i64,

    /// Output the resulting version as a JSON object
    #[clap(long)]
    pub json: bool,
}

pub fn run(config: &LitemigConfig, database: Option<&str>, args: ForceArgs) -> Result<()> {
    if args.target < NIL_VERSION {
        bail!("version must be >= {}, got {}", NIL_VERSION, args.target);
    }

    let mut driver = open_driver(config, database)?;
    driver.lock()?;
    driver.set_version(args.target, false)?;
    driver.unlock()?;
    driver.close()?;

    let record = if args.target < 0 {
        VersionRecord::NIL
    } else {
        VersionRecord::new(args.target, false)
    };
    println!("{}", version_to_string(&record, args.json)?);
    Ok(())
}
