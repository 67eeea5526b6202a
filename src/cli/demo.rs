use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::path::PathBuf;

use mztab_export::controlled_vocabulary::CvTerm;
use mztab_export::export::{ExportConfig, ExportDriver};
use mztab_export::model::{
    AmbiguityGroup, Dataset, EngineId, ModificationOccurrence, PeptideEvidence, PeptideMatch,
    ProteinRecord, ProtocolMetadata, ScoreBag, ScoreTypeId, SoftwareRecord,
    SpectrumIdentification, ThresholdParam,
};
use mztab_export::sink::TabSinkWriter;

/// Generate a small synthetic identification model and export it.
pub fn run(output: PathBuf) -> Result<()> {
    info!("mztab-export demo - synthetic identification export");
    info!("====================================================");

    let dataset = build_demo_dataset()?;
    info!(
        "generated {} protein record(s) and {} ambiguity group(s)",
        dataset.proteins.len(),
        dataset.groups.len()
    );

    let target = File::create(&output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    let mut sink = TabSinkWriter::new(target);

    let driver = ExportDriver::new(&dataset, ExportConfig::default());
    let report = driver.run(&mut sink).context("Demo export failed")?;

    info!("export complete!");
    info!("  Output file: {}", output.display());
    info!(
        "  Proteins: {}  PSMs: {}  Skipped: {}",
        report.counters.proteins_exported,
        report.counters.psms_exported,
        report.skipped.len()
    );

    #[cfg(feature = "colorized_output")]
    println!("{}", report.format_colored());
    #[cfg(not(feature = "colorized_output"))]
    println!("{}", report);

    Ok(())
}

fn psm(
    sequence: &str,
    start: u32,
    spectrum: &str,
    rank: u32,
    pass: bool,
    modifications: Vec<ModificationOccurrence>,
) -> PeptideMatch {
    let mut scores = ScoreBag::new();
    scores.insert(
        EngineId::new("Mascot"),
        ScoreTypeId::new("MS:1001172"),
        0.012,
    );
    scores.insert(
        EngineId::new("Sequest"),
        ScoreTypeId::new("MS:1001155"),
        3.4,
    );
    PeptideMatch {
        evidence: PeptideEvidence {
            sequence: sequence.to_string(),
            start,
            end: start + sequence.len() as u32 - 1,
            pre: Some('K'),
            post: Some('G'),
            is_decoy: false,
        },
        identification: SpectrumIdentification {
            id: format!("SII_{spectrum}"),
            spectrum_ref: Some(spectrum.to_string()),
            charge: 2,
            experimental_mz: 651.83,
            calculated_mz: Some(651.82),
            rank,
            pass_threshold: pass,
            scores,
            modifications,
        },
    }
}

fn protein(id: &str, accession: &str, peptides: Vec<PeptideMatch>) -> ProteinRecord {
    let mut scores = ScoreBag::new();
    scores.insert(
        EngineId::new("Mascot"),
        ScoreTypeId::new("MS:1001171"),
        102.3,
    );
    ProteinRecord {
        id: id.to_string(),
        accession: accession.to_string(),
        accession_version: None,
        database: Some("SwissProt".to_string()),
        description: Some("demo protein".to_string()),
        peptides,
        pass_threshold: true,
        scores,
        coverage: Some(0.31),
        quant_unit: Some(CvTerm::new("MS:1002887", "intensity-based absolute quantification")),
    }
}

fn build_demo_dataset() -> Result<Dataset> {
    let phospho = ModificationOccurrence {
        accession: Some("UNIMOD:21".to_string()),
        name: Some("Phospho".to_string()),
        location: 3,
        monoisotopic_delta: Some(79.966331),
        average_delta: None,
    };

    let proteins = vec![
        // An ambiguity group: two indistinguishable isoforms.
        protein(
            "PDH_1",
            "P04637",
            vec![
                psm("SVTCTYSPALNK", 91, "index=101", 1, true, vec![phospho.clone()]),
                psm("LGFLHSGTAK", 114, "index=102", 1, true, Vec::new()),
            ],
        ),
        protein(
            "PDH_2",
            "P04637-2",
            vec![psm("SVTCTYSPALNK", 52, "index=103", 1, true, Vec::new())],
        ),
        // The same accession re-identified by a second sub-run; the merger
        // folds these two rows.
        protein(
            "PDH_3",
            "Q9Y6K9",
            vec![psm("EGIVHQLLK", 7, "index=201", 1, true, Vec::new())],
        ),
        protein(
            "PDH_4",
            "Q9Y6K9",
            vec![
                psm("EGIVHQLLK", 7, "index=301", 1, true, Vec::new()),
                psm("AVDLMAQK", 44, "index=302", 2, false, Vec::new()),
            ],
        ),
    ];

    let groups = vec![AmbiguityGroup {
        id: "PAG_1".to_string(),
        members: vec!["PDH_1".to_string(), "PDH_2".to_string()],
    }];

    let protocol = ProtocolMetadata {
        protein_threshold: Some(ThresholdParam::Cv(CvTerm::new(
            "MS:1001448",
            "pep:FDR threshold",
        ))),
        spectrum_threshold: Some(ThresholdParam::Cv(CvTerm::new(
            "MS:1001448",
            "pep:FDR threshold",
        ))),
        software_ref: Some("AS_mascot".to_string()),
    };

    let software = vec![
        SoftwareRecord {
            id: "AS_mascot".to_string(),
            name: "Mascot".to_string(),
            version: Some("2.7".to_string()),
        },
        SoftwareRecord {
            id: "AS_sequest".to_string(),
            name: "Sequest".to_string(),
            version: None,
        },
    ];

    Ok(Dataset::new(proteins, groups, Some(protocol), software)?)
}
