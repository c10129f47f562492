use clap::{Parser, Subcommand};
use litemig::LitemigConfig;
use tracing::Level;

mod commands;

use commands::apply::ApplyArgs;
use commands::config::ConfigArgs;
use commands::drop::DropArgs;
use commands::force::ForceArgs;
use commands::version::VersionArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.litemig/litemig.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// database locator, e.g. sqlite3:///var/lib/app/app.db (overrides the configured one)
    #[clap(short, long, global = true)]
    database: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current migration version and dirty state.
    Version(VersionArgs),

    /// Apply one migration script under the migration lock and record its version.
    Apply(ApplyArgs),

    /// Record a version as clean without running anything, e.g. after fixing a dirty database.
    Force(ForceArgs),

    /// Permanently delete the database file.
    Drop(DropArgs),

    /// Show the resolved configuration.
    Config(ConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    // pick up LITEMIG_* variables from a local .env file
    dotenvy::dotenv().ok();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level DEBUG or higher.
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = match LitemigConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let database = cli.database.as_deref();
    let result = match cli.command {
        Commands::Version(args) => commands::version::run(&config, database, args),
        Commands::Apply(args) => commands::apply::run(&config, database, args),
        Commands::Force(args) => commands::force::run(&config, database, args),
        Commands::Drop(args) => commands::drop::run(&config, database, args),
        Commands::Config(args) => commands::config::run(&config, args),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
