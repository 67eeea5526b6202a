//! # mztab-export - Identification Results to Tabular Rows
//!
//! `mztab-export` converts an in-memory model of a mass-spectrometry
//! identification experiment (proteins, peptides, peptide-to-protein
//! evidence, per-engine scores, modifications) into normalized mzTab-style
//! tabular rows.
//!
//! ## Key Features
//!
//! - **Global score-column allocation**: every distinct (search engine,
//!   score type) pair gets a stable column index before any row is built, so
//!   score values from different engines never collide.
//!
//! - **Confidence filtering**: threshold-based or rank-1 selection of
//!   proteins and peptide matches, chosen from the source's identification
//!   protocol metadata.
//!
//! - **Ambiguity resolution**: one anchor protein per ambiguity group, with
//!   non-owning member accessions preserved and no silently dropped
//!   evidence.
//!
//! - **Modification propagation**: peptide-level modifications mapped into
//!   protein coordinates, gated by biological significance, deduplicated by
//!   position and type.
//!
//! - **Auditable merging**: duplicate protein rows from independent
//!   identification sub-runs fold into one row with per-run audit columns
//!   instead of overwritten scores.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mztab_export::export::{ExportConfig, ExportDriver};
//! use mztab_export::model::Dataset;
//! use mztab_export::sink::TabSinkWriter;
//! use std::fs::File;
//!
//! let dataset = Dataset::from_file(std::path::Path::new("experiment.json"))?;
//! let mut sink = TabSinkWriter::new(File::create("experiment.mztab.tsv")?);
//!
//! let driver = ExportDriver::new(&dataset, ExportConfig::default());
//! let report = driver.run(&mut sink)?;
//! println!("{}", report);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Output Layout
//!
//! The tab-separated output carries three sections:
//!
//! | Prefix | Section | Content |
//! |--------|---------|---------|
//! | MTD | Metadata | Format version, export date, software, score-column legend |
//! | PRH / PRT | Proteins | One row per surviving protein or group anchor |
//! | PSH / PSM | PSMs | One row per surviving peptide-spectrum match |
//!
//! Protein rows carry `search_engine_score[n]` columns laid out by the
//! global registry, plus `opt_global_*` audit columns describing merges of
//! duplicate accessions.
//!
//! ## Pipeline
//!
//! The conversion is a single-threaded, two-pass batch transformation:
//!
//! 1. **Score registration** scans the entire dataset so the column layout
//!    is complete before any row exists.
//! 2. **Filter → resolve → build → merge** produces the rows, which are
//!    committed to the sink only after the merge pass; a fatal error leaves
//!    the sink untouched.
//!
//! ## Architecture
//!
//! - [`model`]: source-model entities and the [`model::SourceModel`] seam
//! - [`registry`]: global score-column index allocation
//! - [`filter`]: confidence filters and the policy decision table
//! - [`resolver`]: ambiguity-group resolution and anchor bookkeeping
//! - [`modification`]: peptide-to-protein modification propagation
//! - [`row`]: output row assembly
//! - [`merge`]: duplicate-protein merging with audit columns
//! - [`export`]: the two-pass driver state machine
//! - [`sink`]: output seams ([`sink::TabSinkWriter`], [`sink::VecSink`])
//! - [`report`]: recoverable-event accumulation and run counters
//! - [`controlled_vocabulary`]: PSI-MS CV terms used by the pipeline

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod controlled_vocabulary;
pub mod export;
pub mod filter;
pub mod merge;
pub mod model;
pub mod modification;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod row;
pub mod sink;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::controlled_vocabulary::{psi_terms, CvTerm};
    pub use crate::export::{ExportConfig, ExportDriver, ExportError, ExportState};
    pub use crate::filter::{FilterPolicy, PeptideFilter, ProteinFilter};
    pub use crate::merge::DEFAULT_AUDIT_DELIMITER;
    pub use crate::model::{
        AmbiguityGroup, Dataset, EngineId, ModelError, PeptideEvidence, PeptideMatch,
        ProteinRecord, ProtocolMetadata, ScoreBag, ScoreTypeId, SourceModel,
        SpectrumIdentification,
    };
    pub use crate::modification::{ProteinModification, SignificanceTable};
    pub use crate::registry::{ScoreColumn, ScoreIndexRegistry, ScoreLevel};
    pub use crate::report::{ExportReport, SkipEvent, SkipReason};
    pub use crate::resolver::{ClaimedAnchors, ResolveError, ResolvedGroup};
    pub use crate::row::{ProteinRow, PsmRow, RowBuilder};
    pub use crate::sink::{
        ExportMetadata, SinkError, SinkStats, SinkWriter, TabSinkWriter, VecSink,
        EXPORT_FORMAT_VERSION,
    };
}
