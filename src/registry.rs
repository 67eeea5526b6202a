//! # Score Index Registry
//!
//! Assigns a stable integer index to every distinct (search engine, score
//! type) pair seen anywhere in the dataset, separately for protein-level and
//! PSM-level scores. Column layout is global: the registry must observe the
//! entire dataset (registration pass) before any row is built, because the
//! fixed-width score vectors downstream cannot grow once rows exist.
//!
//! Indices are 1-based and assigned in first-seen order. A level that ends
//! the registration pass empty receives one synthetic
//! "search engine specific score" entry so the output schema never has zero
//! score columns.

use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::controlled_vocabulary::psi_terms;
use crate::model::{EngineId, ScoreTypeId};

/// Which row section a score belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreLevel {
    /// Protein-section scores.
    Protein,
    /// PSM-section scores.
    Psm,
}

impl ScoreLevel {
    /// Lowercase section label used in log lines and column headers.
    pub fn label(&self) -> &'static str {
        match self {
            ScoreLevel::Protein => "protein",
            ScoreLevel::Psm => "psm",
        }
    }
}

/// One registered score column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreColumn {
    /// Reporting search engine.
    pub engine: EngineId,
    /// Score type within that engine.
    pub score_type: ScoreTypeId,
}

#[derive(Debug, Default)]
struct LevelIndex {
    by_key: HashMap<(EngineId, ScoreTypeId), usize>,
    ordered: Vec<ScoreColumn>,
}

impl LevelIndex {
    fn register(&mut self, engine: &EngineId, score_type: &ScoreTypeId) -> usize {
        let key = (engine.clone(), score_type.clone());
        if let Some(&index) = self.by_key.get(&key) {
            return index;
        }
        let index = self.ordered.len() + 1;
        self.by_key.insert(key, index);
        self.ordered.push(ScoreColumn {
            engine: engine.clone(),
            score_type: score_type.clone(),
        });
        index
    }

    fn lookup(&self, engine: &EngineId, score_type: &ScoreTypeId) -> Option<usize> {
        self.by_key
            .get(&(engine.clone(), score_type.clone()))
            .copied()
    }
}

/// Global allocator of score-column indices, one instance per export run.
///
/// Modeled as an explicit context object threaded through the pipeline, not
/// a process-wide singleton, so several datasets can be exported in one
/// process without sharing counters.
#[derive(Debug, Default)]
pub struct ScoreIndexRegistry {
    protein: LevelIndex,
    psm: LevelIndex,
    finalized: bool,
}

impl ScoreIndexRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (engine, score type) at `level`, returning its 1-based index.
    ///
    /// Idempotent: the same triple always yields the same index.
    pub fn register(
        &mut self,
        level: ScoreLevel,
        engine: &EngineId,
        score_type: &ScoreTypeId,
    ) -> usize {
        let index = self.level_mut(level).register(engine, score_type);
        debug!(
            "registered {} score column [{}]: {} / {}",
            level.label(),
            index,
            engine,
            score_type
        );
        index
    }

    /// Look up a previously registered index without allocating a new one.
    pub fn lookup(
        &self,
        level: ScoreLevel,
        engine: &EngineId,
        score_type: &ScoreTypeId,
    ) -> Option<usize> {
        self.level(level).lookup(engine, score_type)
    }

    /// Close the registration pass.
    ///
    /// Any level still empty receives the synthetic
    /// "search engine specific score" fallback at index 1, so downstream
    /// column generation never sees a zero-column schema.
    pub fn finalize(&mut self) {
        for level in [ScoreLevel::Protein, ScoreLevel::Psm] {
            if self.level(level).ordered.is_empty() {
                let engine = EngineId::new(psi_terms::UNSPECIFIED_ENGINE);
                let score_type =
                    ScoreTypeId::new(psi_terms::SEARCH_ENGINE_SPECIFIC_SCORE_ACCESSION);
                self.level_mut(level).register(&engine, &score_type);
                info!(
                    "no {} scores reported; injected fallback score column",
                    level.label()
                );
            }
        }
        self.finalized = true;
        info!(
            "score registration complete: {} protein column(s), {} psm column(s)",
            self.column_count(ScoreLevel::Protein),
            self.column_count(ScoreLevel::Psm)
        );
    }

    /// True once [`finalize`](Self::finalize) has run.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Full column assignment for `level`, in index order (index 1 first).
    pub fn all_indices(&self, level: ScoreLevel) -> &[ScoreColumn] {
        &self.level(level).ordered
    }

    /// Number of columns allocated at `level`.
    pub fn column_count(&self, level: ScoreLevel) -> usize {
        self.level(level).ordered.len()
    }

    fn level(&self, level: ScoreLevel) -> &LevelIndex {
        match level {
            ScoreLevel::Protein => &self.protein,
            ScoreLevel::Psm => &self.psm,
        }
    }

    fn level_mut(&mut self, level: ScoreLevel) -> &mut LevelIndex {
        match level {
            ScoreLevel::Protein => &mut self.protein,
            ScoreLevel::Psm => &mut self.psm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order_starting_at_one() {
        let mut registry = ScoreIndexRegistry::new();
        let mascot = EngineId::new("Mascot");
        let sequest = EngineId::new("Sequest");
        let score = ScoreTypeId::new("MS:1001171");
        let xcorr = ScoreTypeId::new("MS:1001155");

        assert_eq!(registry.register(ScoreLevel::Psm, &mascot, &score), 1);
        assert_eq!(registry.register(ScoreLevel::Psm, &sequest, &xcorr), 2);
        assert_eq!(registry.register(ScoreLevel::Psm, &mascot, &score), 1);
    }

    #[test]
    fn test_levels_are_independent() {
        let mut registry = ScoreIndexRegistry::new();
        let engine = EngineId::new("Mascot");
        let score = ScoreTypeId::new("MS:1001171");

        assert_eq!(registry.register(ScoreLevel::Protein, &engine, &score), 1);
        assert_eq!(registry.register(ScoreLevel::Psm, &engine, &score), 1);
        assert_eq!(registry.column_count(ScoreLevel::Protein), 1);
        assert_eq!(registry.column_count(ScoreLevel::Psm), 1);
    }

    #[test]
    fn test_empty_level_gets_synthetic_fallback() {
        let mut registry = ScoreIndexRegistry::new();
        registry.register(
            ScoreLevel::Psm,
            &EngineId::new("Mascot"),
            &ScoreTypeId::new("MS:1001171"),
        );
        registry.finalize();

        let protein_columns = registry.all_indices(ScoreLevel::Protein);
        assert_eq!(protein_columns.len(), 1);
        assert_eq!(
            protein_columns[0].score_type.as_str(),
            psi_terms::SEARCH_ENGINE_SPECIFIC_SCORE_ACCESSION
        );

        // The populated level is untouched.
        assert_eq!(registry.column_count(ScoreLevel::Psm), 1);
        assert_eq!(
            registry.all_indices(ScoreLevel::Psm)[0].engine.as_str(),
            "Mascot"
        );
    }

    #[test]
    fn test_lookup_does_not_allocate() {
        let mut registry = ScoreIndexRegistry::new();
        let engine = EngineId::new("Mascot");
        let score = ScoreTypeId::new("MS:1001171");

        assert_eq!(registry.lookup(ScoreLevel::Psm, &engine, &score), None);
        registry.register(ScoreLevel::Psm, &engine, &score);
        assert_eq!(registry.lookup(ScoreLevel::Psm, &engine, &score), Some(1));
        assert_eq!(registry.column_count(ScoreLevel::Psm), 1);
    }
}
