//! # Identification Source Model
//!
//! In-memory representation of a mass-spectrometry identification experiment:
//! proteins, peptide-to-protein evidence, per-engine score bags, and
//! modifications. The pipeline treats these entities as read-only views; the
//! only mutation happens downstream on exported rows.
//!
//! Entities are plain value structs composed from small shared pieces
//! ([`crate::controlled_vocabulary::CvTerm`], score keys) rather than an
//! inheritance hierarchy. Score bags use value-typed, hashable keys so the
//! score index registry can rely on plain map lookups.
//!
//! The [`SourceModel`] trait is the accessor seam between the pipeline and
//! whatever produced the experiment. [`Dataset`] is the concrete
//! serde-backed implementation used by the CLI and the test suite.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::controlled_vocabulary::CvTerm;

/// Errors raised while loading or validating a source model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The model violates a structural invariant.
    #[error("model contract violation: {0}")]
    ContractViolation(String),

    /// A lookup referenced an identifier the model does not contain.
    #[error("unknown {kind} identifier: {id}")]
    UnknownId {
        /// Entity kind ("protein", "group", "software").
        kind: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while reading a model file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    fn violation(message: impl Into<String>) -> Self {
        Self::ContractViolation(message.into())
    }
}

/// Identity of a search engine (analysis software) reporting scores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineId(pub String);

impl EngineId {
    /// Create an engine identity from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a score type (typically a CV accession such as "MS:1001171").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreTypeId(pub String);

impl ScoreTypeId {
    /// Create a score-type identity from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScoreTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One reported score value: (engine, score type) -> value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Reporting search engine.
    pub engine: EngineId,
    /// Score type within that engine.
    pub score_type: ScoreTypeId,
    /// Numeric score value.
    pub value: f64,
}

/// A bag of scores owned by one protein or one PSM.
///
/// Absence of a key means "not reported", never zero. Entry order is the
/// order the source reported them in, which makes score-column assignment
/// deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreBag {
    entries: Vec<ScoreEntry>,
}

impl ScoreBag {
    /// Create an empty score bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the value for (engine, score type).
    pub fn insert(&mut self, engine: EngineId, score_type: ScoreTypeId, value: f64) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.engine == engine && e.score_type == score_type)
        {
            entry.value = value;
        } else {
            self.entries.push(ScoreEntry {
                engine,
                score_type,
                value,
            });
        }
    }

    /// Look up the value reported by `engine` under `score_type`.
    pub fn get(&self, engine: &EngineId, score_type: &ScoreTypeId) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| &e.engine == engine && &e.score_type == score_type)
            .map(|e| e.value)
    }

    /// Iterate entries in reported order.
    pub fn iter(&self) -> impl Iterator<Item = &ScoreEntry> {
        self.entries.iter()
    }

    /// Distinct engines in reported order.
    pub fn engines(&self) -> Vec<&EngineId> {
        let mut seen: Vec<&EngineId> = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&&entry.engine) {
                seen.push(&entry.engine);
            }
        }
        seen
    }

    /// True when no engine reported any score.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of (engine, score type) pairs present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// One modification occurrence on a peptide.
///
/// `location` is 1-based within the peptide sequence; 0 denotes the peptide
/// N-terminus and `len + 1` the peptide C-terminus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationOccurrence {
    /// Modification type accession (e.g., "UNIMOD:21"); `None` when the
    /// source could not resolve the type.
    pub accession: Option<String>,
    /// Human-readable modification name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Position within the peptide (0 = N-term, len+1 = C-term).
    pub location: u32,
    /// Monoisotopic mass delta in Da, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monoisotopic_delta: Option<f64>,
    /// Average mass delta in Da, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_delta: Option<f64>,
}

/// Position of a peptide within a specific protein sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeptideEvidence {
    /// Plain peptide sequence (uppercase residues).
    pub sequence: String,
    /// 1-based start position within the protein sequence.
    pub start: u32,
    /// 1-based end position within the protein sequence.
    pub end: u32,
    /// Residue immediately preceding the peptide, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre: Option<char>,
    /// Residue immediately following the peptide, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<char>,
    /// True when the peptide was matched against a decoy sequence.
    #[serde(default)]
    pub is_decoy: bool,
}

/// One scored pairing of a peptide to an observed spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumIdentification {
    /// Source-assigned identifier for this identification item.
    pub id: String,
    /// Reference to the originating spectrum, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectrum_ref: Option<String>,
    /// Assumed charge state.
    pub charge: i32,
    /// Experimental mass-to-charge.
    pub experimental_mz: f64,
    /// Theoretical mass-to-charge, when computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_mz: Option<f64>,
    /// Engine-assigned rank; 1 is best, ties at 1 are legal.
    pub rank: u32,
    /// Engine-level pass/fail for the spectrum threshold.
    pub pass_threshold: bool,
    /// PSM-level score bag.
    #[serde(default)]
    pub scores: ScoreBag,
    /// Modifications observed on the peptide.
    #[serde(default)]
    pub modifications: Vec<ModificationOccurrence>,
}

/// A pairing of one peptide evidence with one spectrum identification.
///
/// Several matches may share the same underlying peptide sequence while
/// referencing different spectra (repeat observations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeptideMatch {
    /// Where the peptide sits in the protein.
    pub evidence: PeptideEvidence,
    /// The scored spectrum observation.
    pub identification: SpectrumIdentification,
}

/// One identified protein with its supporting peptide matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinRecord {
    /// Record identifier, unique within the whole document. The same
    /// accession may be re-identified by several sub-runs, each under its
    /// own record id; the duplicate-protein merger folds those rows later.
    pub id: String,
    /// Accession, unique within one identification run.
    pub accession: String,
    /// Optional accession version suffix (e.g., ".2").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accession_version: Option<String>,
    /// Sequence database the accession resolves against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Human-readable description, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Supporting peptide matches.
    pub peptides: Vec<PeptideMatch>,
    /// Protein-level pass/fail for the detection threshold.
    pub pass_threshold: bool,
    /// Protein-level score bag.
    #[serde(default)]
    pub scores: ScoreBag,
    /// Fraction of the protein sequence covered by peptides, in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
    /// Quantitative-unit metadata attached to the run that identified this
    /// protein. Quantitative values themselves are out of scope; the unit is
    /// carried only so its loss on merge stays auditable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quant_unit: Option<CvTerm>,
}

impl ProteinRecord {
    /// Validate the structural invariants of one protein record.
    pub fn validate_contract(&self) -> Result<(), ModelError> {
        if self.id.is_empty() {
            return Err(ModelError::violation("protein record id must be non-empty"));
        }
        if self.accession.is_empty() {
            return Err(ModelError::violation("protein accession must be non-empty"));
        }

        if let Some(coverage) = self.coverage {
            if !(0.0..=1.0).contains(&coverage) {
                return Err(ModelError::violation(format!(
                    "protein {}: coverage must be within [0, 1], got {}",
                    self.accession, coverage
                )));
            }
        }

        for peptide in &self.peptides {
            let evidence = &peptide.evidence;
            if evidence.sequence.is_empty() {
                return Err(ModelError::violation(format!(
                    "protein {}: peptide evidence with empty sequence",
                    self.accession
                )));
            }
            if evidence.start == 0 || evidence.end < evidence.start {
                return Err(ModelError::violation(format!(
                    "protein {}: peptide {} has invalid span {}..{}",
                    self.accession, evidence.sequence, evidence.start, evidence.end
                )));
            }

            let len = evidence.sequence.len() as u32;
            for occurrence in &peptide.identification.modifications {
                if occurrence.location > len + 1 {
                    return Err(ModelError::violation(format!(
                        "protein {}: modification location {} outside peptide {} (len {})",
                        self.accession, occurrence.location, evidence.sequence, len
                    )));
                }
            }
        }

        Ok(())
    }
}

/// A set of proteins the search engine could not distinguish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguityGroup {
    /// Source-assigned group identifier.
    pub id: String,
    /// Member protein record ids in the order the source asserted them.
    pub members: Vec<String>,
}

/// Threshold configured on an identification protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdParam {
    /// A CV-typed threshold term (possibly the no-threshold sentinel).
    Cv(CvTerm),
    /// A free-text threshold the source did not type.
    UserParam {
        /// Parameter name as given by the source.
        name: String,
        /// Parameter value as given by the source.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

/// Analysis software declared by the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftwareRecord {
    /// Source-assigned software identifier.
    pub id: String,
    /// Software name.
    pub name: String,
    /// Version string, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Identification-protocol metadata used only to choose the filter policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMetadata {
    /// Protein-detection threshold, when the protocol declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein_threshold: Option<ThresholdParam>,
    /// Spectrum-identification threshold, when the protocol declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spectrum_threshold: Option<ThresholdParam>,
    /// Software record the protocol claims produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_ref: Option<String>,
}

/// Accessor seam between the pipeline and the experiment that feeds it.
///
/// The pipeline only ever reads through this trait; it never assumes how the
/// underlying document was parsed or stored.
pub trait SourceModel {
    /// All protein record ids, in document order.
    fn protein_ids(&self) -> Vec<String>;

    /// All ambiguity-group identifiers, in document order.
    fn group_ids(&self) -> Vec<String>;

    /// Fetch one protein record by its document-unique id.
    fn protein(&self, id: &str) -> Result<&ProteinRecord, ModelError>;

    /// Fetch one ambiguity group by identifier.
    fn group(&self, id: &str) -> Result<&AmbiguityGroup, ModelError>;

    /// Protocol metadata, absent when the source carried none.
    fn protocol(&self) -> Option<&ProtocolMetadata>;

    /// Software records declared by the source.
    fn software(&self) -> &[SoftwareRecord];
}

/// Serde-backed in-memory source model.
///
/// This is the repository's interchange representation: the CLI deserializes
/// it from JSON, and the test suite builds it directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Proteins in document order.
    pub proteins: Vec<ProteinRecord>,
    /// Ambiguity groups in document order.
    #[serde(default)]
    pub groups: Vec<AmbiguityGroup>,
    /// Protocol metadata, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ProtocolMetadata>,
    /// Declared analysis software.
    #[serde(default)]
    pub software: Vec<SoftwareRecord>,

    #[serde(skip)]
    protein_index: HashMap<String, usize>,
    #[serde(skip)]
    group_index: HashMap<String, usize>,
}

impl Dataset {
    /// Build a dataset from its parts, validating every record's contract.
    pub fn new(
        proteins: Vec<ProteinRecord>,
        groups: Vec<AmbiguityGroup>,
        protocol: Option<ProtocolMetadata>,
        software: Vec<SoftwareRecord>,
    ) -> Result<Self, ModelError> {
        let mut dataset = Self {
            proteins,
            groups,
            protocol,
            software,
            protein_index: HashMap::new(),
            group_index: HashMap::new(),
        };
        dataset.reindex()?;
        Ok(dataset)
    }

    /// Load a dataset from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a dataset from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, ModelError> {
        let mut dataset: Self = serde_json::from_str(content)?;
        dataset.reindex()?;
        Ok(dataset)
    }

    /// Serialize the dataset to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rebuild lookup indices and validate contracts. Called on every load.
    fn reindex(&mut self) -> Result<(), ModelError> {
        self.protein_index.clear();
        self.group_index.clear();

        for (idx, protein) in self.proteins.iter().enumerate() {
            protein.validate_contract()?;
            if self.protein_index.insert(protein.id.clone(), idx).is_some() {
                return Err(ModelError::violation(format!(
                    "duplicate protein record id: {}",
                    protein.id
                )));
            }
        }

        for (idx, group) in self.groups.iter().enumerate() {
            if group.members.is_empty() {
                return Err(ModelError::violation(format!(
                    "ambiguity group {} has no members",
                    group.id
                )));
            }
            for member in &group.members {
                if !self.protein_index.contains_key(member) {
                    return Err(ModelError::UnknownId {
                        kind: "protein",
                        id: member.clone(),
                    });
                }
            }
            if self.group_index.insert(group.id.clone(), idx).is_some() {
                return Err(ModelError::violation(format!(
                    "duplicate ambiguity group identifier: {}",
                    group.id
                )));
            }
        }

        Ok(())
    }
}

impl SourceModel for Dataset {
    fn protein_ids(&self) -> Vec<String> {
        self.proteins.iter().map(|p| p.id.clone()).collect()
    }

    fn group_ids(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.id.clone()).collect()
    }

    fn protein(&self, id: &str) -> Result<&ProteinRecord, ModelError> {
        self.protein_index
            .get(id)
            .map(|&idx| &self.proteins[idx])
            .ok_or_else(|| ModelError::UnknownId {
                kind: "protein",
                id: id.to_string(),
            })
    }

    fn group(&self, id: &str) -> Result<&AmbiguityGroup, ModelError> {
        self.group_index
            .get(id)
            .map(|&idx| &self.groups[idx])
            .ok_or_else(|| ModelError::UnknownId {
                kind: "group",
                id: id.to_string(),
            })
    }

    fn protocol(&self) -> Option<&ProtocolMetadata> {
        self.protocol.as_ref()
    }

    fn software(&self) -> &[SoftwareRecord] {
        self.software.as_slice()
    }
}
