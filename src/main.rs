//! Variant search worker main executable

pub mod common;
pub mod err;
pub mod search;

use std::process::{ExitCode, Termination};

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Variant search heavy lifting",
    long_about = "This tool runs variant searches and compound heterozygosity detection"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Search related commands.
    Search(Search),
}

/// Parsing of "search *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Search {
    /// The sub command to run
    #[command(subcommand)]
    command: SearchCommands,
}

/// Enum supporting the parsing of "search *" sub commands.
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Subcommand)]
enum SearchCommands {
    Run(search::cli::RunArgs),
    Lookup(search::cli::LookupArgs),
    GeneLookup(search::cli::GeneLookupArgs),
    KeyLookup(search::cli::KeyLookupArgs),
}

fn main() -> ExitCode {
    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            match err.downcast::<err::SearchError>() {
                Ok(err) => err.report(),
                Err(_) => ExitCode::FAILURE,
            }
        }
    }
}

fn try_main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Search(search) => match &search.command {
                SearchCommands::Run(args) => search::cli::run(&cli.common, args)?,
                SearchCommands::Lookup(args) => search::cli::run_lookup(&cli.common, args)?,
                SearchCommands::GeneLookup(args) => {
                    search::cli::run_gene_lookup(&cli.common, args)?
                }
                SearchCommands::KeyLookup(args) => search::cli::run_key_lookup(&cli.common, args)?,
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
