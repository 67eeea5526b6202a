use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod demo;
mod export;
mod info;

/// mztab-export - Identification Results Exporter
#[derive(Parser)]
#[command(name = "mztab-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a JSON identification model to tab-separated rows
    Export {
        /// Input JSON model path
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output path (defaults to <INPUT>.mztab.tsv)
        #[arg(value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Collapse neighboring ambiguity groups with identical peptide sets
        #[arg(long)]
        collapse_same_set: bool,

        /// Write the machine-readable run report to this path
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Display information about a JSON identification model
    Info {
        /// Input JSON model path
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Generate a small synthetic model and export it
    Demo {
        /// Output path for the exported rows
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
}

/// Dispatch a parsed command line.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Export {
            input,
            output,
            config,
            collapse_same_set,
            report,
        } => export::run(input, output, config, collapse_same_set, report),
        Commands::Info { input } => info::run(input),
        Commands::Demo { output } => demo::run(output),
    }
}
