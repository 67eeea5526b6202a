//! # mztab-export Converter
//!
//! A command-line tool for exporting identification results to mzTab-style
//! tab-separated rows.
//!
//! ## Usage
//!
//! ```bash
//! # Export a JSON identification model
//! mztab-export export experiment.json experiment.mztab.tsv
//!
//! # Inspect a model without exporting
//! mztab-export info experiment.json
//!
//! # Generate demo data and export it
//! mztab-export demo demo.mztab.tsv
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    cli::dispatch(args)
}
