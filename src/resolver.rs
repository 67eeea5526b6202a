//! # Ambiguity Group Resolution
//!
//! The target format allows exactly one owning protein per row, while the
//! source may assert that several proteins are indistinguishable on current
//! peptide evidence. This module picks one anchor protein per ambiguity
//! group, keeps the remaining accessions as non-owning members, and drops
//! members whose peptide evidence does not survive filtering.
//!
//! Member peptides are never folded into the anchor's evidence list; they
//! stay attached to their own protein for traceability. Only the member
//! accessions travel to the exported row.
//!
//! Anchor accessions are claimed in a shared [`ClaimedAnchors`] context:
//! the format forbids one protein belonging to two ambiguity groups, so a
//! reused anchor is a fatal inconsistency.

use std::collections::{BTreeSet, HashSet};

use log::{debug, info, warn};

use crate::filter::FilterPolicy;
use crate::model::{AmbiguityGroup, ModelError, PeptideMatch, ProteinRecord, SourceModel};
use crate::report::{ExportReport, SkipReason};

/// Errors raised during group resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The same accession was selected as anchor for two different groups.
    #[error("anchor accession {accession} reused by ambiguity group {group_id}")]
    AnchorReused {
        /// The accession claimed twice.
        accession: String,
        /// The group that attempted the second claim.
        group_id: String,
    },
}

/// Dataset-wide bookkeeping of anchor accessions already claimed.
///
/// An explicit context object rather than a global, so several datasets can
/// be resolved in one process (and so parallel resolution has one obvious
/// place to synchronize).
#[derive(Debug, Default)]
pub struct ClaimedAnchors {
    claimed: HashSet<String>,
}

impl ClaimedAnchors {
    /// Create an empty claim set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an accession; returns false when it was already claimed.
    pub fn claim(&mut self, accession: &str) -> bool {
        self.claimed.insert(accession.to_string())
    }

    /// Number of anchors claimed so far.
    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    /// True when no anchor has been claimed.
    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

/// A resolved ambiguity group, ready for row building.
#[derive(Debug)]
pub struct ResolvedGroup<'a> {
    /// Identifier of the source group ("" for standalone proteins).
    pub group_id: String,
    /// The protein that owns the exported row.
    pub anchor: &'a ProteinRecord,
    /// The anchor's own peptides that survived filtering.
    pub anchor_peptides: Vec<&'a PeptideMatch>,
    /// Accessions of surviving non-anchor members, in group order.
    pub member_accessions: Vec<String>,
}

/// Apply the peptide filter to one protein, logging a drop when nothing
/// survives. Returns `None` for an empty result.
pub fn surviving_peptides<'a>(
    protein: &'a ProteinRecord,
    policy: &FilterPolicy,
    report: &mut ExportReport,
) -> Option<Vec<&'a PeptideMatch>> {
    let peptides = policy.peptide.retain(&protein.peptides);
    if peptides.is_empty() {
        warn!(
            "protein {} has no peptides after filtering; dropped from export",
            protein.accession
        );
        report.skip(protein.accession.clone(), SkipReason::EmptyAfterFiltering);
        None
    } else {
        Some(peptides)
    }
}

/// Resolve one ambiguity group to an anchor plus member accessions.
///
/// Filtering is applied per protein, not per group, so a group that loses
/// some members still exports with the survivors. A group that loses every
/// member produces no row and is logged as fully filtered.
pub fn resolve_group<'a>(
    group_id: &str,
    members: &[&'a ProteinRecord],
    policy: &FilterPolicy,
    claimed: &mut ClaimedAnchors,
    report: &mut ExportReport,
) -> Result<Option<ResolvedGroup<'a>>, ResolveError> {
    let passing = policy.protein.retain(members);

    let mut survivors: Vec<(&ProteinRecord, Vec<&PeptideMatch>)> = Vec::new();
    for protein in passing {
        if let Some(peptides) = surviving_peptides(protein, policy, report) {
            survivors.push((protein, peptides));
        }
    }

    let mut iter = survivors.into_iter();
    let Some((anchor, anchor_peptides)) = iter.next() else {
        info!("ambiguity group {group_id} fully filtered; no row produced");
        report.skip(group_id, SkipReason::GroupFullyFiltered);
        return Ok(None);
    };

    if !claimed.claim(&anchor.accession) {
        return Err(ResolveError::AnchorReused {
            accession: anchor.accession.clone(),
            group_id: group_id.to_string(),
        });
    }

    let member_accessions: Vec<String> = iter.map(|(p, _)| p.accession.clone()).collect();
    debug!(
        "group {} resolved: anchor={} members=[{}]",
        group_id,
        anchor.accession,
        member_accessions.join(",")
    );

    Ok(Some(ResolvedGroup {
        group_id: group_id.to_string(),
        anchor,
        anchor_peptides,
        member_accessions,
    }))
}

/// Collapse chains of neighboring groups whose members carry identical
/// peptide-sequence sets into one group.
///
/// Auxiliary bookkeeping only: the pass changes how many member rows exist,
/// never which peptides are exported. Returns the collapsed group list and
/// how many groups were folded away.
pub fn collapse_same_set_groups<M: SourceModel>(
    groups: Vec<AmbiguityGroup>,
    model: &M,
) -> Result<(Vec<AmbiguityGroup>, usize), ModelError> {
    let mut collapsed: Vec<(AmbiguityGroup, BTreeSet<String>)> = Vec::new();
    let mut folded = 0usize;

    for group in groups {
        let mut sequences = BTreeSet::new();
        for accession in &group.members {
            let protein = model.protein(accession)?;
            for peptide in &protein.peptides {
                sequences.insert(peptide.evidence.sequence.clone());
            }
        }

        match collapsed.last_mut() {
            Some((last, last_sequences)) if *last_sequences == sequences => {
                debug!(
                    "collapsing same-set group {} into {}",
                    group.id, last.id
                );
                for member in group.members {
                    if !last.members.contains(&member) {
                        last.members.push(member);
                    }
                }
                folded += 1;
            }
            _ => collapsed.push((group, sequences)),
        }
    }

    Ok((collapsed.into_iter().map(|(g, _)| g).collect(), folded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{PeptideFilter, ProteinFilter};
    use crate::model::{Dataset, PeptideEvidence, ScoreBag, SpectrumIdentification};

    fn peptide(sequence: &str, rank: u32, pass: bool) -> PeptideMatch {
        PeptideMatch {
            evidence: PeptideEvidence {
                sequence: sequence.to_string(),
                start: 1,
                end: sequence.len() as u32,
                pre: None,
                post: None,
                is_decoy: false,
            },
            identification: SpectrumIdentification {
                id: format!("SII_{sequence}_{rank}"),
                spectrum_ref: Some(format!("index={rank}")),
                charge: 2,
                experimental_mz: 450.0,
                calculated_mz: None,
                rank,
                pass_threshold: pass,
                scores: ScoreBag::new(),
                modifications: Vec::new(),
            },
        }
    }

    fn protein(accession: &str, peptides: Vec<PeptideMatch>, pass: bool) -> ProteinRecord {
        ProteinRecord {
            id: format!("PDH_{accession}"),
            accession: accession.to_string(),
            accession_version: None,
            database: None,
            description: None,
            peptides,
            pass_threshold: pass,
            scores: ScoreBag::new(),
            coverage: None,
            quant_unit: None,
        }
    }

    fn threshold_policy() -> FilterPolicy {
        FilterPolicy {
            protein: ProteinFilter::Threshold,
            peptide: PeptideFilter::Threshold,
        }
    }

    #[test]
    fn test_first_survivor_becomes_anchor() {
        let p1 = protein("P1", vec![peptide("AAAK", 1, true)], true);
        let p2 = protein("P2", vec![peptide("CCCK", 2, false)], true);
        let p3 = protein("P3", vec![peptide("DDDK", 1, true)], true);

        let mut claimed = ClaimedAnchors::new();
        let mut report = ExportReport::new();
        let resolved = resolve_group(
            "PAG_1",
            &[&p1, &p2, &p3],
            &threshold_policy(),
            &mut claimed,
            &mut report,
        )
        .unwrap()
        .expect("group should survive");

        assert_eq!(resolved.anchor.accession, "P1");
        assert_eq!(resolved.member_accessions, vec!["P3".to_string()]);
        assert_eq!(report.count(&SkipReason::EmptyAfterFiltering), 1);
    }

    #[test]
    fn test_anchor_reuse_is_fatal() {
        let p1 = protein("P1", vec![peptide("AAAK", 1, true)], true);

        let mut claimed = ClaimedAnchors::new();
        let mut report = ExportReport::new();

        assert!(resolve_group("PAG_1", &[&p1], &threshold_policy(), &mut claimed, &mut report)
            .unwrap()
            .is_some());

        let second =
            resolve_group("PAG_2", &[&p1], &threshold_policy(), &mut claimed, &mut report);
        assert!(matches!(
            second,
            Err(ResolveError::AnchorReused { accession, group_id })
                if accession == "P1" && group_id == "PAG_2"
        ));
    }

    #[test]
    fn test_fully_filtered_group_produces_no_row() {
        let p1 = protein("P1", vec![peptide("AAAK", 2, false)], true);
        let p2 = protein("P2", vec![peptide("CCCK", 2, false)], false);

        let mut claimed = ClaimedAnchors::new();
        let mut report = ExportReport::new();
        let resolved = resolve_group(
            "PAG_1",
            &[&p1, &p2],
            &threshold_policy(),
            &mut claimed,
            &mut report,
        )
        .unwrap();

        assert!(resolved.is_none());
        assert!(claimed.is_empty());
        assert_eq!(report.count(&SkipReason::GroupFullyFiltered), 1);
    }

    #[test]
    fn test_member_peptides_stay_with_their_protein() {
        let p1 = protein("P1", vec![peptide("AAAK", 1, true)], true);
        let p2 = protein(
            "P2",
            vec![peptide("CCCK", 1, true), peptide("EEEK", 1, true)],
            true,
        );

        let mut claimed = ClaimedAnchors::new();
        let mut report = ExportReport::new();
        let resolved = resolve_group(
            "PAG_1",
            &[&p1, &p2],
            &threshold_policy(),
            &mut claimed,
            &mut report,
        )
        .unwrap()
        .expect("group should survive");

        // Only the anchor's own evidence is exported.
        assert_eq!(resolved.anchor_peptides.len(), 1);
        assert_eq!(resolved.anchor_peptides[0].evidence.sequence, "AAAK");
        assert_eq!(resolved.member_accessions, vec!["P2".to_string()]);
    }

    #[test]
    fn test_same_set_collapse_folds_neighbors() {
        let dataset = Dataset::new(
            vec![
                protein("P1", vec![peptide("AAAK", 1, true)], true),
                protein("P2", vec![peptide("AAAK", 1, true)], true),
                protein("P3", vec![peptide("CCCK", 1, true)], true),
            ],
            vec![
                AmbiguityGroup {
                    id: "PAG_1".to_string(),
                    members: vec!["PDH_P1".to_string()],
                },
                AmbiguityGroup {
                    id: "PAG_2".to_string(),
                    members: vec!["PDH_P2".to_string()],
                },
                AmbiguityGroup {
                    id: "PAG_3".to_string(),
                    members: vec!["PDH_P3".to_string()],
                },
            ],
            None,
            Vec::new(),
        )
        .unwrap();

        let (collapsed, folded) =
            collapse_same_set_groups(dataset.groups.clone(), &dataset).unwrap();

        assert_eq!(folded, 1);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(
            collapsed[0].members,
            vec!["PDH_P1".to_string(), "PDH_P2".to_string()]
        );
        assert_eq!(collapsed[1].members, vec!["PDH_P3".to_string()]);
    }
}
