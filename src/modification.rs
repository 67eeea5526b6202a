//! # Modification Propagation
//!
//! Maps peptide-level modification occurrences into protein-relative
//! coordinates and decides which of them belong on the protein row. Every
//! occurrence stays on its PSM row regardless; promotion to the protein row
//! is gated by a biological-significance table and deduplicated by
//! (type, protein position).
//!
//! Coordinate rule: protein position = evidence start + peptide location − 1.
//! Peptide location 0 (N-terminus) maps to protein position 0 only when the
//! peptide starts at position 1 of the protein, i.e. the true protein
//! N-terminus. Any other peptide-boundary modification is not promoted.

use std::collections::HashSet;
use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use crate::model::{ModificationOccurrence, PeptideMatch};
use crate::report::{ExportReport, SkipReason};

/// Classification table deciding which modification types are biologically
/// significant and therefore promoted to protein rows.
///
/// The default table covers the common regulatory PTMs; callers can replace
/// it wholesale from configuration.
#[derive(Debug, Clone)]
pub struct SignificanceTable {
    significant: HashSet<String>,
}

impl SignificanceTable {
    /// Build a table from an explicit accession list.
    pub fn from_accessions<I, S>(accessions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            significant: accessions.into_iter().map(Into::into).collect(),
        }
    }

    /// True when `accession` should be promoted to the protein row.
    pub fn is_significant(&self, accession: &str) -> bool {
        self.significant.contains(accession)
    }
}

impl Default for SignificanceTable {
    fn default() -> Self {
        Self::from_accessions([
            "UNIMOD:1",   // Acetyl
            "UNIMOD:21",  // Phospho
            "UNIMOD:34",  // Methyl
            "UNIMOD:36",  // Dimethyl
            "UNIMOD:37",  // Trimethyl
            "UNIMOD:121", // GG (ubiquitinylation residue)
            "MOD:00696",  // phosphorylated residue
            "MOD:00394",  // acetylated residue
        ])
    }
}

/// One modification in protein coordinates, ready for the protein row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProteinModification {
    /// Modification type accession.
    pub accession: String,
    /// Human-readable name, when known.
    pub name: Option<String>,
    /// 1-based position within the protein (0 = protein N-terminus).
    pub position: u32,
}

impl fmt::Display for ProteinModification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.position, self.accession)
    }
}

/// Map one peptide-relative location to a protein-relative position.
///
/// Returns `None` for boundary locations that have no protein coordinate:
/// a peptide N-terminus that is not the protein N-terminus, and any peptide
/// C-terminus.
pub fn protein_position(evidence_start: u32, location: u32, peptide_len: u32) -> Option<u32> {
    if location == 0 {
        // Peptide N-terminus: meaningful only at the protein N-terminus.
        return (evidence_start == 1).then_some(0);
    }
    if location > peptide_len {
        // Peptide C-terminus.
        return None;
    }
    Some(evidence_start + location - 1)
}

/// Promote the significant modifications of the given peptides into protein
/// coordinates, deduplicated by (type, position).
///
/// Occurrences with an unresolved type accession are logged and skipped;
/// this never fails the run.
pub fn propagate(
    accession: &str,
    peptides: &[&PeptideMatch],
    table: &SignificanceTable,
    report: &mut ExportReport,
) -> Vec<ProteinModification> {
    let mut seen: HashSet<(String, u32)> = HashSet::new();
    let mut promoted = Vec::new();

    for peptide in peptides {
        let evidence = &peptide.evidence;
        let peptide_len = evidence.sequence.len() as u32;

        for occurrence in &peptide.identification.modifications {
            let Some(mod_accession) = occurrence.accession.as_deref() else {
                warn!(
                    "protein {}: modification at peptide location {} has no resolvable \
                     type accession; not propagated",
                    accession, occurrence.location
                );
                report.skip(
                    peptide.identification.id.clone(),
                    SkipReason::UnmappedModification,
                );
                continue;
            };

            if !table.is_significant(mod_accession) {
                debug!(
                    "protein {}: {} not biologically significant; kept at PSM level only",
                    accession, mod_accession
                );
                continue;
            }

            let Some(position) = protein_position(evidence.start, occurrence.location, peptide_len)
            else {
                debug!(
                    "protein {}: boundary modification {} at peptide location {} has no \
                     protein coordinate; not propagated",
                    accession, mod_accession, occurrence.location
                );
                continue;
            };

            if seen.insert((mod_accession.to_string(), position)) {
                promoted.push(ProteinModification {
                    accession: mod_accession.to_string(),
                    name: occurrence.name.clone(),
                    position,
                });
            }
        }
    }

    promoted
}

/// Render a PSM-level modification in `position-accession` form, keeping the
/// peptide-relative coordinate.
pub fn format_psm_modification(occurrence: &ModificationOccurrence) -> String {
    match occurrence.accession.as_deref() {
        Some(accession) => format!("{}-{}", occurrence.location, accession),
        None => format!("{}-unknown", occurrence.location),
    }
}
