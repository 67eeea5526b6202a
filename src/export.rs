//! # Export Driver
//!
//! Orchestrates the conversion in two passes over the source model.
//!
//! Pass 1 (score registration) scans every protein and PSM so the
//! [`ScoreIndexRegistry`] observes the whole dataset before any column index
//! is considered stable. Pass 2 filters, resolves ambiguity groups, builds
//! rows, and merges duplicate accessions. Rows are buffered and committed to
//! the sink only after the merge completes, so a fatal error never leaves
//! partial output behind.
//!
//! States advance strictly forward:
//! `Init → ScoreRegistration → Filtering → GroupResolution → RowBuilding →
//! Merging → Finalized`. Per-record drops (empty protein, fully filtered
//! group, unmapped modification, missing spectrum reference) are recoverable
//! and recorded in the [`ExportReport`]; everything else aborts the run.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use log::info;
use serde::Deserialize;

use crate::filter;
use crate::merge;
use crate::model::{ModelError, ProteinRecord, SourceModel};
use crate::modification::SignificanceTable;
use crate::registry::{ScoreIndexRegistry, ScoreLevel};
use crate::report::ExportReport;
use crate::resolver::{self, ClaimedAnchors, ResolveError, ResolvedGroup};
use crate::row::{ProteinRow, PsmRow, RowBuilder, SequenceOwners};
use crate::sink::{ExportMetadata, SinkError, SinkWriter, EXPORT_FORMAT_VERSION};

/// Errors that abort an export run.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Anchor accession reused across ambiguity groups.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Source metadata is internally inconsistent.
    #[error("inconsistent source metadata ({id}): {reason}")]
    InconsistentMetadata {
        /// Identifier of the offending entity.
        id: String,
        /// What was inconsistent.
        reason: String,
    },

    /// Source model lookup or contract failure.
    #[error("source model error: {0}")]
    Model(#[from] ModelError),

    /// Sink failure while committing rows.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Pipeline states, strictly sequential and single-pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExportState {
    /// Nothing has run yet.
    Init,
    /// Pass 1: global score-column registration.
    ScoreRegistration,
    /// Filter-policy selection.
    Filtering,
    /// Ambiguity-group resolution.
    GroupResolution,
    /// Row assembly.
    RowBuilding,
    /// Duplicate-protein merging.
    Merging,
    /// Terminal: rows committed to the sink.
    Finalized,
}

/// Tunable settings for one export run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Case-insensitive spellings accepted as the no-threshold sentinel, in
    /// addition to the CV accession MS:1001494.
    pub no_threshold_names: Vec<String>,
    /// Separator between per-run segments in the merge audit columns.
    pub audit_delimiter: String,
    /// Run the same-set group collapse pass before resolution.
    pub collapse_same_set_groups: bool,
    /// Override for the biologically-significant modification accessions.
    /// `None` keeps the built-in table.
    pub significant_modifications: Option<Vec<String>>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            no_threshold_names: vec!["no threshold".to_string(), "none".to_string()],
            audit_delimiter: merge::DEFAULT_AUDIT_DELIMITER.to_string(),
            collapse_same_set_groups: false,
            significant_modifications: None,
        }
    }
}

impl ExportConfig {
    fn significance_table(&self) -> SignificanceTable {
        match &self.significant_modifications {
            Some(accessions) => SignificanceTable::from_accessions(accessions.iter().cloned()),
            None => SignificanceTable::default(),
        }
    }
}

/// Two-pass export pipeline over one source model.
pub struct ExportDriver<'a, M: SourceModel> {
    model: &'a M,
    config: ExportConfig,
    state: ExportState,
}

impl<'a, M: SourceModel> ExportDriver<'a, M> {
    /// Create a driver over `model` with the given configuration.
    pub fn new(model: &'a M, config: ExportConfig) -> Self {
        Self {
            model,
            config,
            state: ExportState::Init,
        }
    }

    /// Current pipeline state.
    pub fn state(&self) -> ExportState {
        self.state
    }

    fn advance(&mut self, next: ExportState) {
        debug_assert!(self.state < next, "export states only move forward");
        info!("export state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the full pipeline, committing rows to `sink` on success.
    ///
    /// Returns the run report. Fatal errors abort with no sink output; the
    /// per-record drop cases are recorded in the report instead.
    pub fn run(mut self, sink: &mut dyn SinkWriter) -> Result<ExportReport, ExportError> {
        let mut report = ExportReport::new();

        // Pass 1: the registry must see the entire dataset before any row
        // exists, because column layout cannot grow downstream.
        self.advance(ExportState::ScoreRegistration);
        self.check_protocol_consistency()?;
        let (registry, sequence_owners) = self.register_scores()?;

        self.advance(ExportState::Filtering);
        let policy = filter::select_policy(
            self.model.protocol(),
            &self.config.no_threshold_names,
        );

        self.advance(ExportState::GroupResolution);
        let mut claimed = ClaimedAnchors::new();
        let mut grouped_ids: HashSet<String> = HashSet::new();
        let mut resolved_groups: Vec<ResolvedGroup<'_>> = Vec::new();

        let mut groups = Vec::new();
        for id in self.model.group_ids() {
            groups.push(self.model.group(&id)?.clone());
        }
        if self.config.collapse_same_set_groups {
            let (collapsed, folded) = resolver::collapse_same_set_groups(groups, self.model)?;
            groups = collapsed;
            report.counters.groups_collapsed = folded;
        }

        for group in &groups {
            for member in &group.members {
                grouped_ids.insert(member.clone());
            }
            let members: Vec<&ProteinRecord> = group
                .members
                .iter()
                .map(|id| self.model.protein(id))
                .collect::<Result<_, _>>()?;

            if let Some(resolved) =
                resolver::resolve_group(&group.id, &members, &policy, &mut claimed, &mut report)?
            {
                report.counters.groups_resolved += 1;
                resolved_groups.push(resolved);
            }
        }

        // Standalone proteins export as single-member groups.
        for id in self.model.protein_ids() {
            if grouped_ids.contains(&id) {
                continue;
            }
            let protein = self.model.protein(&id)?;
            if policy.protein.retain(&[protein]).is_empty() {
                continue;
            }
            if let Some(peptides) = resolver::surviving_peptides(protein, &policy, &mut report) {
                resolved_groups.push(ResolvedGroup {
                    group_id: String::new(),
                    anchor: protein,
                    anchor_peptides: peptides,
                    member_accessions: Vec::new(),
                });
            }
        }

        self.advance(ExportState::RowBuilding);
        let significance = self.config.significance_table();
        let mut builder = RowBuilder::new(&registry, &significance, &sequence_owners);
        let mut protein_rows: Vec<ProteinRow> = Vec::new();
        let mut psm_rows: Vec<PsmRow> = Vec::new();
        for resolved in &resolved_groups {
            let (row, psms) = builder.build(resolved, &mut report);
            protein_rows.push(row);
            psm_rows.extend(psms);
        }

        self.advance(ExportState::Merging);
        let protein_rows =
            merge::merge_duplicates(protein_rows, &self.config.audit_delimiter, &mut report);

        // Commit: nothing has touched the sink before this point, so an
        // earlier abort leaves it empty.
        self.advance(ExportState::Finalized);
        sink.write_metadata(&ExportMetadata {
            format_version: EXPORT_FORMAT_VERSION.to_string(),
            exported_at: Utc::now(),
            protein_score_columns: registry.all_indices(ScoreLevel::Protein).to_vec(),
            psm_score_columns: registry.all_indices(ScoreLevel::Psm).to_vec(),
            software: self.model.software().to_vec(),
        })?;
        for row in &protein_rows {
            sink.write_protein_row(row)?;
        }
        for row in &psm_rows {
            sink.write_psm_row(row)?;
        }
        let stats = sink.finish()?;

        report.counters.proteins_exported = stats.protein_rows;
        report.counters.psms_exported = stats.psm_rows;
        info!(
            "export finalized: {} protein row(s), {} PSM row(s), {} skipped record(s)",
            stats.protein_rows,
            stats.psm_rows,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Fatal when the protocol references a software record the source does
    /// not declare: score-column provenance would be unassignable.
    fn check_protocol_consistency(&self) -> Result<(), ExportError> {
        if let Some(protocol) = self.model.protocol() {
            if let Some(software_ref) = &protocol.software_ref {
                let known = self
                    .model
                    .software()
                    .iter()
                    .any(|record| &record.id == software_ref);
                if !known {
                    return Err(ExportError::InconsistentMetadata {
                        id: software_ref.clone(),
                        reason: "protocol references an undeclared software record".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Pass 1: register every (engine, score type) pair in the dataset and
    /// count how many accessions each peptide sequence supports.
    fn register_scores(&self) -> Result<(ScoreIndexRegistry, SequenceOwners), ExportError> {
        let mut registry = ScoreIndexRegistry::new();
        let mut owners: HashMap<String, HashSet<String>> = HashMap::new();

        for id in self.model.protein_ids() {
            let protein = self.model.protein(&id)?;
            for entry in protein.scores.iter() {
                registry.register(ScoreLevel::Protein, &entry.engine, &entry.score_type);
            }
            for peptide in &protein.peptides {
                for entry in peptide.identification.scores.iter() {
                    registry.register(ScoreLevel::Psm, &entry.engine, &entry.score_type);
                }
                owners
                    .entry(peptide.evidence.sequence.clone())
                    .or_default()
                    .insert(protein.accession.clone());
            }
        }

        registry.finalize();
        let sequence_owners = owners
            .into_iter()
            .map(|(sequence, accessions)| (sequence, accessions.len()))
            .collect();
        Ok((registry, sequence_owners))
    }
}
