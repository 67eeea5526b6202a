//! # Output Row Assembly
//!
//! Builds one exported protein row and its PSM rows from a resolved
//! (protein, peptide-list) pair. Score values are placed into fixed-width
//! vectors indexed by the globally registered score columns; rows that fail
//! 1:1 accession correspondence carry the decoy and ambiguity flags.
//!
//! Rows are created here, mutated only by the duplicate-protein merger, and
//! immutable once handed to the sink.

use std::collections::{HashMap, HashSet};

use log::warn;

use crate::model::{EngineId, ScoreBag};
use crate::modification::{self, ProteinModification, SignificanceTable};
use crate::registry::{ScoreIndexRegistry, ScoreLevel};
use crate::report::{ExportReport, SkipReason};
use crate::resolver::ResolvedGroup;

/// One exported protein-section row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProteinRow {
    /// Owning accession.
    pub accession: String,
    /// Optional accession version suffix.
    pub accession_version: Option<String>,
    /// Sequence database reference.
    pub database: Option<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Sequence coverage in [0, 1], when reported.
    pub coverage: Option<f64>,
    /// Non-owning ambiguity-group member accessions, order-preserving.
    pub ambiguity_members: Vec<String>,
    /// Promoted modifications in protein coordinates.
    pub modifications: Vec<ProteinModification>,
    /// Score values in registry column order (index 1 at position 0).
    pub scores: Vec<Option<f64>>,
    /// Search engines that reported scores for this row's run.
    pub engines: Vec<EngineId>,
    /// True when every supporting evidence is a decoy match.
    pub is_decoy: bool,
    /// Number of supporting PSMs.
    pub num_psms: u32,
    /// Number of distinct peptide sequences.
    pub num_peptides_distinct: u32,
    /// Number of distinct sequences supporting only this accession.
    pub num_peptides_unique: u32,
    /// How many source rows were folded into this one (1 = no merge).
    pub merge_count: u32,
    /// Per-run search-engine audit column, one segment per merged run.
    pub run_search_engines: String,
    /// Per-run best-score audit column, one segment per merged run.
    pub run_best_scores: String,
    /// Per-run per-column score audit column, one segment per merged run.
    pub run_column_scores: String,
    /// True when any merged run carried quantitative-unit metadata; the
    /// quantitative values themselves are dropped on merge.
    pub quant_unit_present: bool,
}

impl ProteinRow {
    /// True when this row did not reach 1:1 accession correspondence.
    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguity_members.is_empty()
    }
}

/// One exported PSM-section row.
#[derive(Debug, Clone, PartialEq)]
pub struct PsmRow {
    /// Row identifier: the spectrum reference, or a synthetic sequential id
    /// when the source carried none.
    pub psm_id: String,
    /// Peptide sequence.
    pub sequence: String,
    /// Accession of the protein this PSM supports.
    pub accession: String,
    /// 1-based start of the peptide within the protein.
    pub start: u32,
    /// 1-based end of the peptide within the protein.
    pub end: u32,
    /// Preceding residue, when known.
    pub pre: Option<char>,
    /// Following residue, when known.
    pub post: Option<char>,
    /// Assumed charge state.
    pub charge: i32,
    /// Experimental mass-to-charge.
    pub experimental_mz: f64,
    /// Theoretical mass-to-charge, when computed.
    pub calculated_mz: Option<f64>,
    /// Engine-assigned rank (1 is best).
    pub rank: u32,
    /// Decoy flag from the underlying evidence.
    pub is_decoy: bool,
    /// Peptide-coordinate modifications, rendered `location-accession`.
    pub modifications: Vec<String>,
    /// Score values in registry column order.
    pub scores: Vec<Option<f64>>,
    /// Originating spectrum reference (same as `psm_id` unless synthetic).
    pub spectrum_ref: String,
}

/// Map how many distinct accessions each peptide sequence supports.
///
/// Built during the registration pass; the row builder uses it to compute
/// per-protein unique-peptide counts.
pub type SequenceOwners = HashMap<String, usize>;

/// Assembles output rows from resolved groups.
pub struct RowBuilder<'a> {
    registry: &'a ScoreIndexRegistry,
    significance: &'a SignificanceTable,
    sequence_owners: &'a SequenceOwners,
    next_synthetic_id: u64,
}

impl<'a> RowBuilder<'a> {
    /// Create a row builder over a finalized registry.
    pub fn new(
        registry: &'a ScoreIndexRegistry,
        significance: &'a SignificanceTable,
        sequence_owners: &'a SequenceOwners,
    ) -> Self {
        debug_assert!(registry.is_finalized());
        Self {
            registry,
            significance,
            sequence_owners,
            next_synthetic_id: 1,
        }
    }

    /// Build the protein row and PSM rows for one resolved group.
    pub fn build(
        &mut self,
        resolved: &ResolvedGroup<'_>,
        report: &mut ExportReport,
    ) -> (ProteinRow, Vec<PsmRow>) {
        let anchor = resolved.anchor;
        let peptides = &resolved.anchor_peptides;

        let mut distinct: HashSet<&str> = HashSet::new();
        let mut unique: HashSet<&str> = HashSet::new();
        for peptide in peptides {
            let sequence = peptide.evidence.sequence.as_str();
            distinct.insert(sequence);
            if self.sequence_owners.get(sequence).copied() == Some(1) {
                unique.insert(sequence);
            }
        }

        let scores = self.score_vector(ScoreLevel::Protein, &anchor.scores);
        let engines: Vec<EngineId> = anchor.scores.engines().into_iter().cloned().collect();
        let modifications =
            modification::propagate(&anchor.accession, peptides, self.significance, report);

        let mut row = ProteinRow {
            accession: anchor.accession.clone(),
            accession_version: anchor.accession_version.clone(),
            database: anchor.database.clone(),
            description: anchor.description.clone(),
            coverage: anchor.coverage,
            ambiguity_members: resolved.member_accessions.clone(),
            modifications,
            scores,
            engines,
            is_decoy: peptides.iter().all(|p| p.evidence.is_decoy),
            num_psms: peptides.len() as u32,
            num_peptides_distinct: distinct.len() as u32,
            num_peptides_unique: unique.len() as u32,
            merge_count: 1,
            run_search_engines: String::new(),
            run_best_scores: String::new(),
            run_column_scores: String::new(),
            quant_unit_present: anchor.quant_unit.is_some(),
        };
        row.run_search_engines = render_engines(&row.engines);
        row.run_best_scores = render_best_scores(&anchor.scores);
        row.run_column_scores = render_column_scores(&row.scores);

        let psm_rows = peptides
            .iter()
            .map(|peptide| {
                let identification = &peptide.identification;
                let spectrum_ref = match &identification.spectrum_ref {
                    Some(reference) => reference.clone(),
                    None => {
                        let synthetic = format!("synthetic:{}", self.next_synthetic_id);
                        self.next_synthetic_id += 1;
                        warn!(
                            "PSM {} has no spectrum reference; assigned {}",
                            identification.id, synthetic
                        );
                        report.skip(identification.id.clone(), SkipReason::MissingSpectrumRef);
                        synthetic
                    }
                };

                PsmRow {
                    psm_id: spectrum_ref.clone(),
                    sequence: peptide.evidence.sequence.clone(),
                    accession: anchor.accession.clone(),
                    start: peptide.evidence.start,
                    end: peptide.evidence.end,
                    pre: peptide.evidence.pre,
                    post: peptide.evidence.post,
                    charge: identification.charge,
                    experimental_mz: identification.experimental_mz,
                    calculated_mz: identification.calculated_mz,
                    rank: identification.rank,
                    is_decoy: peptide.evidence.is_decoy,
                    modifications: identification
                        .modifications
                        .iter()
                        .map(modification::format_psm_modification)
                        .collect(),
                    scores: self.score_vector(ScoreLevel::Psm, &identification.scores),
                    spectrum_ref,
                }
            })
            .collect();

        (row, psm_rows)
    }

    /// Place a score bag into the fixed-width column vector for `level`.
    fn score_vector(&self, level: ScoreLevel, bag: &ScoreBag) -> Vec<Option<f64>> {
        let mut values = vec![None; self.registry.column_count(level)];
        for entry in bag.iter() {
            match self.registry.lookup(level, &entry.engine, &entry.score_type) {
                Some(index) => values[index - 1] = Some(entry.value),
                None => {
                    // Every score was registered in pass 1; a miss here means
                    // the model changed between passes.
                    warn!(
                        "unregistered {} score {} / {}; value dropped",
                        level.label(),
                        entry.engine,
                        entry.score_type
                    );
                }
            }
        }
        values
    }
}

/// Render one run's engine list for the audit column ("Mascot|Sequest").
pub fn render_engines(engines: &[EngineId]) -> String {
    engines
        .iter()
        .map(EngineId::as_str)
        .collect::<Vec<_>>()
        .join("|")
}

/// Render one run's best score per engine ("Mascot:42.1|Sequest:10.3").
pub fn render_best_scores(bag: &ScoreBag) -> String {
    bag.engines()
        .into_iter()
        .map(|engine| {
            let best = bag
                .iter()
                .filter(|e| &e.engine == engine)
                .map(|e| e.value)
                .fold(f64::NEG_INFINITY, f64::max);
            format!("{engine}:{best}")
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Render one run's full score vector for the audit column ("1:42.1,2:null").
pub fn render_column_scores(scores: &[Option<f64>]) -> String {
    scores
        .iter()
        .enumerate()
        .map(|(idx, value)| match value {
            Some(v) => format!("{}:{}", idx + 1, v),
            None => format!("{}:null", idx + 1),
        })
        .collect::<Vec<_>>()
        .join(",")
}
