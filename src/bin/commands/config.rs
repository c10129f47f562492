use anyhow::Result;
use clap::Args;
use litemig::LitemigConfig;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Print an empty configuration template instead
    #[clap(long)]
    pub template: bool,
}

pub fn run(config: &LitemigConfig, args: ConfigArgs) -> Result<()> {
    if args.template {
        print!("{}", litemig::config::EMPTY_CONFIG);
        return Ok(());
    }

    println!("{}", config.summary());
    if config.config_file.is_none() {
        println!(
            "\nNo config file found; create {} to set defaults.",
            LitemigConfig::config_file_path()
        );
    }
    Ok(())
}
