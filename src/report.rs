//! # Export Run Report
//!
//! Structured record of everything the pipeline dropped or adjusted without
//! aborting: proteins filtered to zero peptides, fully filtered groups,
//! unmapped modifications, synthesized spectrum references, and merge audits.
//! Recoverable events never raise out of the pipeline; they accumulate here
//! and are handed to the caller after the run.

use std::fmt;

use serde::Serialize;

/// Why a record was skipped or adjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A protein had no surviving peptides after filtering.
    EmptyAfterFiltering,
    /// An ambiguity group lost every member to filtering.
    GroupFullyFiltered,
    /// A modification occurrence had no resolvable type accession.
    UnmappedModification,
    /// A peptide match carried no spectrum reference; a synthetic sequential
    /// identifier was substituted.
    MissingSpectrumRef,
}

impl SkipReason {
    fn describe(&self) -> &'static str {
        match self {
            SkipReason::EmptyAfterFiltering => "no peptides survived filtering",
            SkipReason::GroupFullyFiltered => "every group member was filtered out",
            SkipReason::UnmappedModification => "modification type accession unresolved",
            SkipReason::MissingSpectrumRef => "spectrum reference missing, synthetic id assigned",
        }
    }
}

/// One recoverable event: which entity, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipEvent {
    /// Identifier of the affected entity (accession, group id, PSM id).
    pub entity_id: String,
    /// What happened.
    pub reason: SkipReason,
}

/// Counters describing the completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportCounters {
    /// Protein rows handed to the sink (after merging).
    pub proteins_exported: usize,
    /// PSM rows handed to the sink.
    pub psms_exported: usize,
    /// Ambiguity groups resolved to an anchor.
    pub groups_resolved: usize,
    /// Groups collapsed away by the same-set merge pass.
    pub groups_collapsed: usize,
    /// Protein rows folded into another row by the duplicate merger.
    pub duplicates_merged: usize,
}

/// Accumulated outcome of one export run.
#[derive(Debug, Default, Serialize)]
pub struct ExportReport {
    /// Recoverable events, in the order they occurred.
    pub skipped: Vec<SkipEvent>,
    /// Run counters.
    pub counters: ExportCounters,
}

impl ExportReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one recoverable event.
    pub fn skip(&mut self, entity_id: impl Into<String>, reason: SkipReason) {
        self.skipped.push(SkipEvent {
            entity_id: entity_id.into(),
            reason,
        });
    }

    /// Number of recoverable events of the given kind.
    pub fn count(&self, reason: &SkipReason) -> usize {
        self.skipped.iter().filter(|e| &e.reason == reason).count()
    }

    /// True when nothing was dropped or adjusted.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Machine-readable JSON dump of the report.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Format the report with colors (requires the `colorized_output` feature).
    #[cfg(feature = "colorized_output")]
    pub fn format_colored(&self) -> String {
        use console::style;

        let mut output = String::new();
        output.push_str(&format!("{}\n", style("Export Report").bold().cyan()));
        output.push_str(&format!("{}\n", style("=============").cyan()));
        output.push_str(&format!(
            "  Proteins exported:  {}\n",
            style(self.counters.proteins_exported).green()
        ));
        output.push_str(&format!(
            "  PSMs exported:      {}\n",
            style(self.counters.psms_exported).green()
        ));
        output.push_str(&format!(
            "  Groups resolved:    {}\n",
            self.counters.groups_resolved
        ));
        output.push_str(&format!(
            "  Groups collapsed:   {}\n",
            self.counters.groups_collapsed
        ));
        output.push_str(&format!(
            "  Duplicates merged:  {}\n",
            self.counters.duplicates_merged
        ));

        if self.skipped.is_empty() {
            output.push_str(&format!("\n{}\n", style("No records skipped").green()));
        } else {
            output.push_str(&format!(
                "\n{} ({}):\n",
                style("Skipped records").yellow().bold(),
                self.skipped.len()
            ));
            for event in &self.skipped {
                output.push_str(&format!(
                    "  [{}] {}: {}\n",
                    style("skip").yellow(),
                    event.entity_id,
                    event.reason.describe()
                ));
            }
        }

        output
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Export Report")?;
        writeln!(f, "=============")?;
        writeln!(
            f,
            "  Proteins exported:  {}",
            self.counters.proteins_exported
        )?;
        writeln!(f, "  PSMs exported:      {}", self.counters.psms_exported)?;
        writeln!(f, "  Groups resolved:    {}", self.counters.groups_resolved)?;
        writeln!(
            f,
            "  Groups collapsed:   {}",
            self.counters.groups_collapsed
        )?;
        writeln!(
            f,
            "  Duplicates merged:  {}",
            self.counters.duplicates_merged
        )?;

        if self.skipped.is_empty() {
            writeln!(f, "\nNo records skipped")?;
        } else {
            writeln!(f, "\nSkipped records ({}):", self.skipped.len())?;
            for event in &self.skipped {
                writeln!(f, "  {}: {}", event.entity_id, event.reason.describe())?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display() {
        let mut report = ExportReport::new();
        report.counters.proteins_exported = 2;
        report.skip("P2", SkipReason::EmptyAfterFiltering);
        report.skip("PAG_3", SkipReason::GroupFullyFiltered);

        let output = format!("{}", report);
        assert!(output.contains("Proteins exported:  2"));
        assert!(output.contains("Skipped records (2):"));
        assert!(output.contains("P2: no peptides survived filtering"));
    }

    #[test]
    fn test_report_counts_by_reason() {
        let mut report = ExportReport::new();
        report.skip("SII_1", SkipReason::MissingSpectrumRef);
        report.skip("SII_2", SkipReason::MissingSpectrumRef);
        report.skip("P1", SkipReason::EmptyAfterFiltering);

        assert_eq!(report.count(&SkipReason::MissingSpectrumRef), 2);
        assert_eq!(report.count(&SkipReason::GroupFullyFiltered), 0);
        assert!(!report.is_clean());
    }
}
