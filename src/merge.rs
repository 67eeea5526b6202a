//! # Duplicate-Protein Merging
//!
//! Some source documents re-identify the same accession once per
//! identification sub-run, producing several protein rows for one accession.
//! The merger folds them into a single row without silently overwriting
//! data: counts are summed, modification and member lists are unioned, and
//! each run's score values are concatenated into audit columns instead of
//! being averaged away.
//!
//! The fold is a deterministic left fold in discovery order, so merge output
//! is stable for a given input ordering.

use log::info;

use crate::report::ExportReport;
use crate::row::ProteinRow;

/// Default separator between per-run segments in the audit columns.
pub const DEFAULT_AUDIT_DELIMITER: &str = ";";

/// Fold `extra` into `base`, in run order.
fn fold(base: &mut ProteinRow, extra: ProteinRow, delimiter: &str) {
    // Union of promoted modifications keyed by (type, position),
    // order-preserving. Name metadata may diverge between runs; the base
    // run's spelling wins.
    for modification in extra.modifications {
        let known = base
            .modifications
            .iter()
            .any(|m| m.accession == modification.accession && m.position == modification.position);
        if !known {
            base.modifications.push(modification);
        }
    }

    // Union of ambiguity members, order-preserving.
    for member in extra.ambiguity_members {
        if !base.ambiguity_members.contains(&member) {
            base.ambiguity_members.push(member);
        }
    }

    // Per-run counts are additive.
    base.num_psms += extra.num_psms;
    base.num_peptides_distinct += extra.num_peptides_distinct;
    base.num_peptides_unique += extra.num_peptides_unique;

    // Scores are never averaged or overwritten: the base run keeps the
    // primary columns and every run's values land in the audit columns.
    for (column, segment) in [
        (&mut base.run_search_engines, extra.run_search_engines),
        (&mut base.run_best_scores, extra.run_best_scores),
        (&mut base.run_column_scores, extra.run_column_scores),
    ] {
        column.push_str(delimiter);
        column.push_str(&segment);
    }

    // Quantitative values are irreconcilable across runs and are dropped;
    // the flag keeps that loss visible downstream.
    base.quant_unit_present |= extra.quant_unit_present;
    base.is_decoy &= extra.is_decoy;
    // The folded row may itself be the product of earlier merges; its count
    // carries the runs it already absorbed.
    base.merge_count += extra.merge_count;

    if base.coverage.is_none() {
        base.coverage = extra.coverage;
    }
}

/// Merge all rows sharing an accession, preserving first-discovery order of
/// accessions and run order within each accession.
pub fn merge_duplicates(
    rows: Vec<ProteinRow>,
    delimiter: &str,
    report: &mut ExportReport,
) -> Vec<ProteinRow> {
    let mut merged: Vec<ProteinRow> = Vec::new();

    for row in rows {
        match merged.iter_mut().find(|r| r.accession == row.accession) {
            Some(base) => {
                fold(base, row, delimiter);
                report.counters.duplicates_merged += 1;
            }
            None => merged.push(row),
        }
    }

    let folded = report.counters.duplicates_merged;
    if folded > 0 {
        info!("duplicate-protein merge folded {} row(s)", folded);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EngineId;
    use crate::modification::ProteinModification;

    fn row(accession: &str, num_psms: u32, engines: &str) -> ProteinRow {
        ProteinRow {
            accession: accession.to_string(),
            accession_version: None,
            database: None,
            description: None,
            coverage: None,
            ambiguity_members: Vec::new(),
            modifications: Vec::new(),
            scores: vec![Some(1.0)],
            engines: vec![EngineId::new(engines)],
            is_decoy: false,
            num_psms,
            num_peptides_distinct: num_psms,
            num_peptides_unique: 1,
            merge_count: 1,
            run_search_engines: engines.to_string(),
            run_best_scores: format!("{engines}:1"),
            run_column_scores: "1:1".to_string(),
            quant_unit_present: false,
        }
    }

    #[test]
    fn test_three_runs_merge_into_one_row() {
        let rows = vec![
            row("ACC1", 2, "Mascot"),
            row("ACC1", 3, "Sequest"),
            row("ACC1", 5, "XTandem"),
        ];

        let mut report = ExportReport::new();
        let merged = merge_duplicates(rows, DEFAULT_AUDIT_DELIMITER, &mut report);

        assert_eq!(merged.len(), 1);
        let row = &merged[0];
        assert_eq!(row.num_psms, 10);
        assert_eq!(row.merge_count, 3);
        assert_eq!(row.run_search_engines, "Mascot;Sequest;XTandem");
        assert_eq!(row.run_search_engines.matches(';').count(), 2);
        assert_eq!(report.counters.duplicates_merged, 2);
    }

    #[test]
    fn test_counts_are_grouping_independent() {
        let make = || {
            vec![
                row("ACC1", 2, "A"),
                row("ACC1", 3, "B"),
                row("ACC1", 5, "C"),
            ]
        };

        // ((A,B),C)
        let mut report = ExportReport::new();
        let mut rows = make();
        let last = rows.pop().unwrap();
        let mut left = merge_duplicates(rows, DEFAULT_AUDIT_DELIMITER, &mut report);
        left.push(last);
        let left = merge_duplicates(left, DEFAULT_AUDIT_DELIMITER, &mut report);

        // (A,(B,C))
        let mut rows = make();
        let first = rows.remove(0);
        let mut right = merge_duplicates(rows, DEFAULT_AUDIT_DELIMITER, &mut report);
        right.insert(0, first);
        let right = merge_duplicates(right, DEFAULT_AUDIT_DELIMITER, &mut report);

        assert_eq!(left[0].num_psms, right[0].num_psms);
        assert_eq!(left[0].merge_count, right[0].merge_count);
        assert_eq!(left[0].merge_count, 3);
    }

    #[test]
    fn test_unions_have_no_duplicates() {
        let mut a = row("ACC1", 1, "Mascot");
        a.ambiguity_members = vec!["P2".to_string()];
        a.modifications = vec![ProteinModification {
            accession: "UNIMOD:21".to_string(),
            name: None,
            position: 12,
        }];

        let mut b = row("ACC1", 1, "Mascot");
        b.ambiguity_members = vec!["P2".to_string(), "P3".to_string()];
        b.modifications = vec![ProteinModification {
            accession: "UNIMOD:21".to_string(),
            name: None,
            position: 12,
        }];

        let mut report = ExportReport::new();
        let merged = merge_duplicates(vec![a, b], DEFAULT_AUDIT_DELIMITER, &mut report);

        assert_eq!(merged[0].ambiguity_members, vec!["P2", "P3"]);
        assert_eq!(merged[0].modifications.len(), 1);
    }

    #[test]
    fn test_modification_union_ignores_divergent_names() {
        // Two runs report the same PTM at the same coordinate; one resolved
        // the name, the other did not.
        let mut a = row("ACC1", 1, "Mascot");
        a.modifications = vec![ProteinModification {
            accession: "UNIMOD:21".to_string(),
            name: Some("Phospho".to_string()),
            position: 12,
        }];

        let mut b = row("ACC1", 1, "Sequest");
        b.modifications = vec![ProteinModification {
            accession: "UNIMOD:21".to_string(),
            name: None,
            position: 12,
        }];

        let mut report = ExportReport::new();
        let merged = merge_duplicates(vec![a, b], DEFAULT_AUDIT_DELIMITER, &mut report);

        assert_eq!(merged[0].modifications.len(), 1);
        assert_eq!(merged[0].modifications[0].name.as_deref(), Some("Phospho"));
    }

    #[test]
    fn test_quant_unit_loss_stays_visible() {
        let a = row("ACC1", 1, "Mascot");
        let mut b = row("ACC1", 1, "Sequest");
        b.quant_unit_present = true;

        let mut report = ExportReport::new();
        let merged = merge_duplicates(vec![a, b], DEFAULT_AUDIT_DELIMITER, &mut report);
        assert!(merged[0].quant_unit_present);
    }

    #[test]
    fn test_distinct_accessions_do_not_merge() {
        let rows = vec![row("ACC1", 2, "Mascot"), row("ACC2", 3, "Mascot")];
        let mut report = ExportReport::new();
        let merged = merge_duplicates(rows, DEFAULT_AUDIT_DELIMITER, &mut report);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].merge_count, 1);
        assert_eq!(report.counters.duplicates_merged, 0);
    }

    #[test]
    fn test_primary_scores_not_overwritten() {
        let mut a = row("ACC1", 1, "Mascot");
        a.scores = vec![Some(42.0)];
        let mut b = row("ACC1", 1, "Sequest");
        b.scores = vec![Some(7.0)];

        let mut report = ExportReport::new();
        let merged = merge_duplicates(vec![a, b], DEFAULT_AUDIT_DELIMITER, &mut report);

        assert_eq!(merged[0].scores, vec![Some(42.0)]);
        assert_eq!(merged[0].run_column_scores, "1:1;1:1");
    }
}
