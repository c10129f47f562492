use anyhow::Result;
use clap::Args;
use litemig::{Driver, LitemigConfig};

use super::{open_driver, version_to_string};

/// Arguments for the Version command
#[derive(Args)]
pub struct VersionArgs {
    /// Output as a JSON object
    #[clap(long)]
    pub json: bool,
}

pub fn run(config: &LitemigConfig, database: Option<&str>, args: VersionArgs) -> Result<()> {
    let mut driver = open_driver(config, database)?;
    let record = driver.version()?;
    driver.close()?;

    println!("{}", version_to_string(&record, args.json)?);
    Ok(())
}
