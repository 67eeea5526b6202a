use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::path::PathBuf;

use mztab_export::export::{ExportConfig, ExportDriver};
use mztab_export::model::Dataset;
use mztab_export::sink::TabSinkWriter;

use super::config::Config;

/// Export a JSON identification model to tab-separated rows.
pub fn run(
    input: PathBuf,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    collapse_same_set: bool,
    report_path: Option<PathBuf>,
) -> Result<()> {
    let output = output.unwrap_or_else(|| {
        let mut path = input.clone();
        path.set_extension("mztab.tsv");
        path
    });

    let mut config = match config_path {
        Some(path) => Config::from_file(&path)?.into_export_config(),
        None => ExportConfig::default(),
    };
    // CLI flags override the config file.
    if collapse_same_set {
        config.collapse_same_set_groups = true;
    }

    info!("loading identification model: {}", input.display());
    let dataset = Dataset::from_file(&input)
        .with_context(|| format!("Failed to load model from {}", input.display()))?;
    info!(
        "model loaded: {} protein(s), {} ambiguity group(s)",
        dataset.proteins.len(),
        dataset.groups.len()
    );

    let target = File::create(&output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    let mut sink = TabSinkWriter::new(target);

    let driver = ExportDriver::new(&dataset, config);
    let report = driver.run(&mut sink).context("Export failed")?;

    #[cfg(feature = "colorized_output")]
    println!("{}", report.format_colored());
    #[cfg(not(feature = "colorized_output"))]
    println!("{}", report);

    if let Some(path) = report_path {
        std::fs::write(&path, report.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("run report written to {}", path.display());
    }

    info!("export complete: {}", output.display());
    Ok(())
}
