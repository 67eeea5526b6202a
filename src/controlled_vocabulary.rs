//! # HUPO-PSI Controlled Vocabulary Terms
//!
//! Type-safe access to the PSI-MS controlled vocabulary terms used by the
//! export pipeline: score types, threshold sentinels, and modification
//! accessions. Using CV accessions keeps the emitted rows interoperable with
//! downstream mzTab consumers.
//!
//! ## Reference
//! - OBO file: https://raw.githubusercontent.com/HUPO-PSI/psi-ms-CV/master/psi-ms.obo

use serde::{Deserialize, Serialize};
use std::fmt;

/// A controlled vocabulary term with its accession and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CvTerm {
    /// CV accession (e.g., "MS:1001171")
    pub accession: String,
    /// Human-readable name
    pub name: String,
    /// Optional value associated with the term
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl CvTerm {
    /// Create a new CV term with accession and name
    pub fn new(accession: &str, name: &str) -> Self {
        Self {
            accession: accession.to_string(),
            name: name.to_string(),
            value: None,
        }
    }

    /// Add a value to the CV term
    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.value = Some(value.to_string());
        self
    }
}

impl fmt::Display for CvTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "[{}, {}, {}]", self.accession, self.name, v),
            None => write!(f, "[{}, {}]", self.accession, self.name),
        }
    }
}

/// PSI-MS terms used by the export pipeline
pub mod psi_terms {
    use super::CvTerm;

    /// MS:1001494 - no threshold. Marks an identification protocol that ran
    /// without any acceptance threshold.
    pub const NO_THRESHOLD_ACCESSION: &str = "MS:1001494";

    /// MS:1001153 - search engine specific score. Generic fallback used when
    /// a dataset reports no typed score at a given level.
    pub const SEARCH_ENGINE_SPECIFIC_SCORE_ACCESSION: &str = "MS:1001153";

    /// Engine label attached to the synthetic fallback score column.
    pub const UNSPECIFIED_ENGINE: &str = "unspecified";

    /// MS:1001494 - no threshold
    pub fn no_threshold() -> CvTerm {
        CvTerm::new(NO_THRESHOLD_ACCESSION, "no threshold")
    }

    /// MS:1001153 - search engine specific score
    pub fn search_engine_specific_score() -> CvTerm {
        CvTerm::new(
            SEARCH_ENGINE_SPECIFIC_SCORE_ACCESSION,
            "search engine specific score",
        )
    }
}
