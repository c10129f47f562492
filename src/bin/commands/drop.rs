use anyhow::Result;
use clap::Args;
use litemig::{Driver, LitemigConfig};

use super::open_driver;

/// Arguments for the Drop command
#[derive(Args)]
pub struct DropArgs {
    /// Skip confirmation prompt
    #[clap(long, short = 'y')]
    pub yes: bool,
}

pub fn run(config: &LitemigConfig, database: Option<&str>, args: DropArgs) -> Result<()> {
    let mut driver = open_driver(config, database)?;

    if !args.yes {
        let target = driver
            .connection()
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        eprintln!("This will permanently delete the database file {}", target);
        eprint!("Are you sure? [y/N] ");

        let mut input = String::new();
        let confirmed = std::io::stdin().read_line(&mut input).is_ok()
            && matches!(input.trim().to_lowercase().as_str(), "y" | "yes");
        if !confirmed {
            eprintln!("Aborted.");
            driver.close()?;
            return Ok(());
        }
    }

    driver.drop_database()?;
    driver.close()?;
    println!("Database dropped");
    Ok(())
}
