use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;

use mztab_export::model::{Dataset, SourceModel, ThresholdParam};

/// Display information about a JSON identification model.
pub fn run(input: PathBuf) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("File does not exist: {}", input.display());
    }

    let dataset = Dataset::from_file(&input)
        .with_context(|| format!("Failed to load model from {}", input.display()))?;

    println!("Identification Model Information");
    println!("================================");
    println!("File: {}", input.display());
    println!();

    println!("Entities:");
    println!("  Proteins:         {}", dataset.proteins.len());
    println!("  Ambiguity groups: {}", dataset.groups.len());
    let psm_count: usize = dataset.proteins.iter().map(|p| p.peptides.len()).sum();
    println!("  Peptide matches:  {}", psm_count);
    println!();

    let mut protein_engines: BTreeSet<String> = BTreeSet::new();
    let mut psm_engines: BTreeSet<String> = BTreeSet::new();
    for protein in &dataset.proteins {
        for entry in protein.scores.iter() {
            protein_engines.insert(entry.engine.to_string());
        }
        for peptide in &protein.peptides {
            for entry in peptide.identification.scores.iter() {
                psm_engines.insert(entry.engine.to_string());
            }
        }
    }
    println!("Search engines:");
    println!(
        "  Protein level: {}",
        if protein_engines.is_empty() {
            "(none)".to_string()
        } else {
            protein_engines.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    );
    println!(
        "  PSM level:     {}",
        if psm_engines.is_empty() {
            "(none)".to_string()
        } else {
            psm_engines.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    );
    println!();

    println!("Protocol:");
    match dataset.protocol() {
        None => println!("  (no protocol metadata)"),
        Some(protocol) => {
            println!(
                "  Protein threshold:  {}",
                describe_threshold(protocol.protein_threshold.as_ref())
            );
            println!(
                "  Spectrum threshold: {}",
                describe_threshold(protocol.spectrum_threshold.as_ref())
            );
            if let Some(software_ref) = &protocol.software_ref {
                println!("  Software ref:       {}", software_ref);
            }
        }
    }

    if !dataset.software.is_empty() {
        println!();
        println!("Software:");
        for record in &dataset.software {
            match &record.version {
                Some(version) => println!("  {} ({} {})", record.id, record.name, version),
                None => println!("  {} ({})", record.id, record.name),
            }
        }
    }

    Ok(())
}

fn describe_threshold(param: Option<&ThresholdParam>) -> String {
    match param {
        None => "(absent)".to_string(),
        Some(ThresholdParam::Cv(term)) => format!("{}", term),
        Some(ThresholdParam::UserParam { name, value }) => match value {
            Some(value) => format!("{name} = {value}"),
            None => name.clone(),
        },
    }
}
