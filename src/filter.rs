//! # Confidence Filters
//!
//! Pluggable predicates selecting the proteins and peptide matches that pass
//! the dataset's confidence policy, plus the decision table that picks the
//! policy from identification-protocol metadata.
//!
//! The policy is chosen once per dataset, before the main export pass. When
//! the protocol declares no usable threshold the pipeline falls back to
//! exporting rank-1 peptide matches only.

use log::{debug, warn};

use crate::controlled_vocabulary::psi_terms;
use crate::model::{PeptideMatch, ProteinRecord, ProtocolMetadata, ThresholdParam};

/// Protein-level confidence filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProteinFilter {
    /// Keep every protein.
    NoFilter,
    /// Keep proteins whose pass-threshold flag is set.
    Threshold,
}

impl ProteinFilter {
    /// Select the proteins that pass this filter, preserving input order.
    pub fn retain<'a>(&self, proteins: &[&'a ProteinRecord]) -> Vec<&'a ProteinRecord> {
        match self {
            ProteinFilter::NoFilter => proteins.to_vec(),
            ProteinFilter::Threshold => proteins
                .iter()
                .copied()
                .filter(|p| p.pass_threshold)
                .collect(),
        }
    }
}

/// Peptide-level confidence filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeptideFilter {
    /// Keep every peptide match.
    NoFilter,
    /// Keep matches whose pass-threshold flag is set.
    Threshold,
    /// Keep matches at rank 1 (ties at rank 1 are all kept).
    RankOne,
}

impl PeptideFilter {
    /// Select the peptide matches that pass this filter, preserving order.
    pub fn retain<'a>(&self, peptides: &'a [PeptideMatch]) -> Vec<&'a PeptideMatch> {
        match self {
            PeptideFilter::NoFilter => peptides.iter().collect(),
            PeptideFilter::Threshold => peptides
                .iter()
                .filter(|p| p.identification.pass_threshold)
                .collect(),
            PeptideFilter::RankOne => peptides
                .iter()
                .filter(|p| p.identification.rank == 1)
                .collect(),
        }
    }
}

/// The filter pair selected for one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Protein-level filter.
    pub protein: ProteinFilter,
    /// Peptide-level filter.
    pub peptide: PeptideFilter,
}

/// How a declared threshold parameter was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ThresholdDisposition {
    /// No threshold parameter declared at all.
    Absent,
    /// A real threshold is configured.
    Defined,
    /// The no-threshold sentinel (or an equivalent spelling) was declared.
    NoThreshold,
}

impl ThresholdDisposition {
    fn is_effective(self) -> bool {
        self == ThresholdDisposition::Defined
    }
}

/// Classify one threshold parameter against the sentinel allow-list.
///
/// The allow-list entries are compared case-insensitively after trimming.
/// A free-text parameter that matches nothing and carries no numeric value
/// is an unmatched sentinel candidate: it is logged for review and treated
/// as no-threshold (fail open to rank-1 filtering).
fn classify_threshold(
    param: Option<&ThresholdParam>,
    no_threshold_names: &[String],
) -> ThresholdDisposition {
    let matches_allow_list = |text: &str| {
        no_threshold_names
            .iter()
            .any(|name| name.trim().eq_ignore_ascii_case(text.trim()))
    };

    match param {
        None => ThresholdDisposition::Absent,
        Some(ThresholdParam::Cv(term)) => {
            if term.accession == psi_terms::NO_THRESHOLD_ACCESSION
                || matches_allow_list(&term.name)
            {
                ThresholdDisposition::NoThreshold
            } else {
                ThresholdDisposition::Defined
            }
        }
        Some(ThresholdParam::UserParam { name, value }) => {
            let value_text = value.as_deref().unwrap_or("");
            if matches_allow_list(name) || matches_allow_list(value_text) {
                return ThresholdDisposition::NoThreshold;
            }
            if value_text.trim().parse::<f64>().is_ok() {
                return ThresholdDisposition::Defined;
            }
            warn!(
                "unmatched no-threshold sentinel candidate: name={:?} value={:?}; \
                 treating as no threshold",
                name, value
            );
            ThresholdDisposition::NoThreshold
        }
    }
}

/// Select the filter policy for a dataset from its protocol metadata.
///
/// Decision table (spectrum column only matters when no protein threshold
/// is in effect):
///
/// | protein threshold | spectrum threshold | protein filter | peptide filter |
/// |---|---|---|---|
/// | defined | defined | Threshold | Threshold |
/// | defined | absent / no-threshold | Threshold | Threshold |
/// | absent / no-threshold | defined | NoFilter | Threshold |
/// | absent / no-threshold | absent / no-threshold | NoFilter | RankOne |
/// | (no protocol metadata) | — | NoFilter | RankOne |
pub fn select_policy(
    protocol: Option<&ProtocolMetadata>,
    no_threshold_names: &[String],
) -> FilterPolicy {
    let policy = match protocol {
        None => FilterPolicy {
            protein: ProteinFilter::NoFilter,
            peptide: PeptideFilter::RankOne,
        },
        Some(protocol) => {
            let protein =
                classify_threshold(protocol.protein_threshold.as_ref(), no_threshold_names);
            let spectrum =
                classify_threshold(protocol.spectrum_threshold.as_ref(), no_threshold_names);

            match (protein.is_effective(), spectrum.is_effective()) {
                (true, _) => FilterPolicy {
                    protein: ProteinFilter::Threshold,
                    peptide: PeptideFilter::Threshold,
                },
                (false, true) => FilterPolicy {
                    protein: ProteinFilter::NoFilter,
                    peptide: PeptideFilter::Threshold,
                },
                (false, false) => FilterPolicy {
                    protein: ProteinFilter::NoFilter,
                    peptide: PeptideFilter::RankOne,
                },
            }
        }
    };

    debug!(
        "selected filter policy: protein={:?} peptide={:?}",
        policy.protein, policy.peptide
    );
    policy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlled_vocabulary::CvTerm;
    use crate::model::{PeptideEvidence, ScoreBag, SpectrumIdentification};

    fn default_sentinels() -> Vec<String> {
        vec!["no threshold".to_string(), "none".to_string()]
    }

    fn peptide(rank: u32, pass: bool) -> PeptideMatch {
        PeptideMatch {
            evidence: PeptideEvidence {
                sequence: "PEPTIDEK".to_string(),
                start: 1,
                end: 8,
                pre: None,
                post: None,
                is_decoy: false,
            },
            identification: SpectrumIdentification {
                id: format!("SII_{rank}"),
                spectrum_ref: None,
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

    fn cv_threshold(accession: &str, name: &str) -> Option<ThresholdParam> {
        Some(ThresholdParam::Cv(CvTerm::new(accession, name)))
    }

    #[test]
    fn test_peptide_filters_are_monotone() {
        let peptides = vec![peptide(1, true), peptide(2, false), peptide(1, false)];

        assert_eq!(PeptideFilter::NoFilter.retain(&peptides).len(), 3);
        assert_eq!(PeptideFilter::Threshold.retain(&peptides).len(), 1);
        // Both rank-1 matches survive, including the failing one.
        assert_eq!(PeptideFilter::RankOne.retain(&peptides).len(), 2);
    }

    #[test]
    fn test_policy_both_thresholds_defined() {
        let protocol = ProtocolMetadata {
            protein_threshold: cv_threshold("MS:1001448", "pep:FDR threshold"),
            spectrum_threshold: cv_threshold("MS:1001448", "pep:FDR threshold"),
            software_ref: None,
        };
        let policy = select_policy(Some(&protocol), &default_sentinels());
        assert_eq!(policy.protein, ProteinFilter::Threshold);
        assert_eq!(policy.peptide, PeptideFilter::Threshold);
    }

    #[test]
    fn test_policy_protein_threshold_only_still_filters_peptides() {
        let protocol = ProtocolMetadata {
            protein_threshold: cv_threshold("MS:1001448", "pep:FDR threshold"),
            spectrum_threshold: cv_threshold(psi_terms::NO_THRESHOLD_ACCESSION, "no threshold"),
            software_ref: None,
        };
        let policy = select_policy(Some(&protocol), &default_sentinels());
        assert_eq!(policy.protein, ProteinFilter::Threshold);
        assert_eq!(policy.peptide, PeptideFilter::Threshold);
    }

    #[test]
    fn test_policy_spectrum_threshold_only() {
        let protocol = ProtocolMetadata {
            protein_threshold: None,
            spectrum_threshold: cv_threshold("MS:1001448", "pep:FDR threshold"),
            software_ref: None,
        };
        let policy = select_policy(Some(&protocol), &default_sentinels());
        assert_eq!(policy.protein, ProteinFilter::NoFilter);
        assert_eq!(policy.peptide, PeptideFilter::Threshold);
    }

    #[test]
    fn test_policy_no_protocol_falls_back_to_rank_one() {
        let policy = select_policy(None, &default_sentinels());
        assert_eq!(policy.protein, ProteinFilter::NoFilter);
        assert_eq!(policy.peptide, PeptideFilter::RankOne);
    }

    #[test]
    fn test_user_param_sentinel_is_case_insensitive() {
        let protocol = ProtocolMetadata {
            protein_threshold: Some(ThresholdParam::UserParam {
                name: "threshold".to_string(),
                value: Some("No Threshold".to_string()),
            }),
            spectrum_threshold: None,
            software_ref: None,
        };
        let policy = select_policy(Some(&protocol), &default_sentinels());
        assert_eq!(policy.protein, ProteinFilter::NoFilter);
        assert_eq!(policy.peptide, PeptideFilter::RankOne);
    }

    #[test]
    fn test_user_param_numeric_value_is_a_real_threshold() {
        let protocol = ProtocolMetadata {
            protein_threshold: Some(ThresholdParam::UserParam {
                name: "protein probability cutoff".to_string(),
                value: Some("0.95".to_string()),
            }),
            spectrum_threshold: None,
            software_ref: None,
        };
        let policy = select_policy(Some(&protocol), &default_sentinels());
        assert_eq!(policy.protein, ProteinFilter::Threshold);
    }

    #[test]
    fn test_unmatched_free_text_fails_open() {
        let protocol = ProtocolMetadata {
            protein_threshold: Some(ThresholdParam::UserParam {
                name: "cutoff".to_string(),
                value: Some("whatever the wizard said".to_string()),
            }),
            spectrum_threshold: None,
            software_ref: None,
        };
        let policy = select_policy(Some(&protocol), &default_sentinels());
        assert_eq!(policy.protein, ProteinFilter::NoFilter);
        assert_eq!(policy.peptide, PeptideFilter::RankOne);
    }
}
