//! pd-sync - Operator CLI for PagerDuty service mappings
//!
//! - List every PagerDuty service with its catalog mapping status
//! - Check that an account credential resolves
//! - Persist a service mapping and refresh the affected catalog entities

use clap::{Parser, Subcommand};

mod commands;
mod context;
mod error;
mod logging;

use error::CliResult;

/// pd-sync - PagerDuty service mapping management
#[derive(Parser)]
#[command(name = "pd-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the reconciled mapping for every PagerDuty service
    Mappings(commands::mappings::MappingsArgs),

    /// Check that a PagerDuty credential resolves (never prints it)
    Token(commands::token::TokenArgs),

    /// Map a PagerDuty service to a catalog entity
    Map(commands::map::MapArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Mappings(args) => commands::mappings::execute(args).await,
        Commands::Token(args) => commands::token::execute(args).await,
        Commands::Map(args) => commands::map::execute(args).await,
    }
}
