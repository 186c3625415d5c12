//! Medfin financing planner.
//!
//! Prints the amortization schedule a patient would get for a given amount,
//! rate, and installment count.

mod output;
mod quote;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use medfin_shared::{AppConfig, init_tracing};

use crate::quote::QuoteArgs;

/// Simulate installment financing plans
#[derive(Debug, Parser)]
#[command(name = "planner", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, value_enum, default_value = "json", global = true)]
    format: OutputFormat,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the amortization schedule for a financing request
    Quote(QuoteArgs),
}

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Human-readable tables
    Table,
}

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.logging).context("failed to initialise tracing")?;
    debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Quote(args) => {
            let quote = quote::run(&config.financing, &args)?;
            println!("{}", output::render(&quote, cli.format)?);
        }
    }

    Ok(())
}
