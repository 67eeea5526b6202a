//! # Sink Writers
//!
//! The pipeline hands finalized rows to a [`SinkWriter`]; nothing upstream
//! knows or cares what the sink does with them. [`TabSinkWriter`] emits the
//! mzTab-style tab-separated representation (MTD metadata lines, a protein
//! section, a PSM section); [`VecSink`] buffers rows in memory for tests.

use std::io::Write;

use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use log::info;

use crate::model::SoftwareRecord;
use crate::registry::ScoreColumn;
use crate::row::{ProteinRow, PsmRow};

/// Format version written into the metadata header.
pub const EXPORT_FORMAT_VERSION: &str = "1.0.0";

/// Value rendered for absent optional cells.
const NULL: &str = "null";

/// Errors raised while emitting rows.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// CSV layer failure.
    #[error("row emission error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O failure on the underlying writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rows were written out of section order.
    #[error("section order violation: {0}")]
    SectionOrder(String),
}

/// Statistics returned when a sink is finalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Protein rows written.
    pub protein_rows: usize,
    /// PSM rows written.
    pub psm_rows: usize,
}

/// Run-level metadata emitted before any row.
#[derive(Debug, Clone)]
pub struct ExportMetadata {
    /// Format version of the emitted document.
    pub format_version: String,
    /// When the export ran.
    pub exported_at: DateTime<Utc>,
    /// Protein score-column legend, in index order.
    pub protein_score_columns: Vec<ScoreColumn>,
    /// PSM score-column legend, in index order.
    pub psm_score_columns: Vec<ScoreColumn>,
    /// Analysis software declared by the source.
    pub software: Vec<SoftwareRecord>,
}

/// Destination seam for finalized rows.
///
/// Call order is fixed: `write_metadata`, every protein row, every PSM row,
/// then `finish`. Implementations may reject out-of-order calls.
pub trait SinkWriter {
    /// Emit the run-level metadata header.
    fn write_metadata(&mut self, metadata: &ExportMetadata) -> Result<(), SinkError>;

    /// Emit one protein-section row.
    fn write_protein_row(&mut self, row: &ProteinRow) -> Result<(), SinkError>;

    /// Emit one PSM-section row.
    fn write_psm_row(&mut self, row: &PsmRow) -> Result<(), SinkError>;

    /// Flush and finalize the sink.
    fn finish(&mut self) -> Result<SinkStats, SinkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Metadata,
    Proteins,
    Psms,
    Finished,
}

/// Tab-separated sink in the mzTab section style.
pub struct TabSinkWriter<W: Write> {
    writer: csv::Writer<W>,
    section: Section,
    protein_score_count: usize,
    psm_score_count: usize,
    stats: SinkStats,
}

impl<W: Write> TabSinkWriter<W> {
    /// Create a sink over any `Write` target.
    pub fn new(target: W) -> Self {
        Self {
            writer: WriterBuilder::new()
                .delimiter(b'\t')
                .flexible(true)
                .from_writer(target),
            section: Section::Metadata,
            protein_score_count: 0,
            psm_score_count: 0,
            stats: SinkStats::default(),
        }
    }

    fn require_section(&mut self, wanted: Section, what: &str) -> Result<(), SinkError> {
        if self.section > wanted {
            return Err(SinkError::SectionOrder(format!(
                "{what} written after its section was closed"
            )));
        }
        self.section = wanted;
        Ok(())
    }

    fn write_protein_header(&mut self) -> Result<(), SinkError> {
        let mut header = vec![
            "PRH".to_string(),
            "accession".to_string(),
            "description".to_string(),
            "database".to_string(),
            "protein_coverage".to_string(),
            "ambiguity_members".to_string(),
            "modifications".to_string(),
            "num_psms".to_string(),
            "num_peptides_distinct".to_string(),
            "num_peptides_unique".to_string(),
        ];
        for index in 1..=self.protein_score_count {
            header.push(format!("search_engine_score[{index}]"));
        }
        header.extend(
            [
                "opt_global_decoy",
                "opt_global_merged_rows",
                "opt_global_run_search_engines",
                "opt_global_run_best_scores",
                "opt_global_run_scores",
                "opt_global_quant_unit_dropped",
            ]
            .map(str::to_string),
        );
        self.writer.write_record(&header)?;
        Ok(())
    }

    fn write_psm_header(&mut self) -> Result<(), SinkError> {
        let mut header = vec![
            "PSH".to_string(),
            "PSM_ID".to_string(),
            "sequence".to_string(),
            "accession".to_string(),
            "start".to_string(),
            "end".to_string(),
            "pre".to_string(),
            "post".to_string(),
            "charge".to_string(),
            "exp_mass_to_charge".to_string(),
            "calc_mass_to_charge".to_string(),
            "rank".to_string(),
            "opt_global_decoy".to_string(),
            "modifications".to_string(),
            "spectra_ref".to_string(),
        ];
        for index in 1..=self.psm_score_count {
            header.push(format!("search_engine_score[{index}]"));
        }
        self.writer.write_record(&header)?;
        Ok(())
    }
}

fn opt_cell<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| NULL.to_string())
}

fn score_cells(scores: &[Option<f64>]) -> impl Iterator<Item = String> + '_ {
    scores.iter().map(opt_cell)
}

impl<W: Write> SinkWriter for TabSinkWriter<W> {
    fn write_metadata(&mut self, metadata: &ExportMetadata) -> Result<(), SinkError> {
        self.require_section(Section::Metadata, "metadata")?;
        self.protein_score_count = metadata.protein_score_columns.len();
        self.psm_score_count = metadata.psm_score_columns.len();

        self.writer
            .write_record(["MTD", "format_version", &metadata.format_version])?;
        self.writer.write_record([
            "MTD",
            "export_date",
            &metadata.exported_at.to_rfc3339(),
        ])?;

        for (idx, software) in metadata.software.iter().enumerate() {
            let value = match &software.version {
                Some(version) => format!("{} {}", software.name, version),
                None => software.name.clone(),
            };
            self.writer
                .write_record(["MTD", &format!("software[{}]", idx + 1), &value])?;
        }

        for (idx, column) in metadata.protein_score_columns.iter().enumerate() {
            self.writer.write_record([
                "MTD",
                &format!("protein_search_engine_score[{}]", idx + 1),
                &format!("[{}, {}]", column.engine, column.score_type),
            ])?;
        }
        for (idx, column) in metadata.psm_score_columns.iter().enumerate() {
            self.writer.write_record([
                "MTD",
                &format!("psm_search_engine_score[{}]", idx + 1),
                &format!("[{}, {}]", column.engine, column.score_type),
            ])?;
        }

        Ok(())
    }

    fn write_protein_row(&mut self, row: &ProteinRow) -> Result<(), SinkError> {
        let starting = self.section < Section::Proteins;
        self.require_section(Section::Proteins, "protein row")?;
        if starting {
            self.write_protein_header()?;
        }

        let accession = match &row.accession_version {
            Some(version) => format!("{}.{}", row.accession, version),
            None => row.accession.clone(),
        };
        let modifications = row
            .modifications
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let mut record = vec![
            "PRT".to_string(),
            accession,
            opt_cell(&row.description),
            opt_cell(&row.database),
            opt_cell(&row.coverage),
            if row.ambiguity_members.is_empty() {
                NULL.to_string()
            } else {
                row.ambiguity_members.join(",")
            },
            if modifications.is_empty() {
                NULL.to_string()
            } else {
                modifications
            },
            row.num_psms.to_string(),
            row.num_peptides_distinct.to_string(),
            row.num_peptides_unique.to_string(),
        ];
        record.extend(score_cells(&row.scores));
        record.push((row.is_decoy as u8).to_string());
        record.push(row.merge_count.to_string());
        record.push(row.run_search_engines.clone());
        record.push(row.run_best_scores.clone());
        record.push(row.run_column_scores.clone());
        record.push((row.quant_unit_present as u8).to_string());

        self.writer.write_record(&record)?;
        self.stats.protein_rows += 1;
        Ok(())
    }

    fn write_psm_row(&mut self, row: &PsmRow) -> Result<(), SinkError> {
        let starting = self.section < Section::Psms;
        self.require_section(Section::Psms, "PSM row")?;
        if starting {
            self.write_psm_header()?;
        }

        let mut record = vec![
            "PSM".to_string(),
            row.psm_id.clone(),
            row.sequence.clone(),
            row.accession.clone(),
            row.start.to_string(),
            row.end.to_string(),
            opt_cell(&row.pre),
            opt_cell(&row.post),
            row.charge.to_string(),
            row.experimental_mz.to_string(),
            opt_cell(&row.calculated_mz),
            row.rank.to_string(),
            (row.is_decoy as u8).to_string(),
            if row.modifications.is_empty() {
                NULL.to_string()
            } else {
                row.modifications.join(",")
            },
            row.spectrum_ref.clone(),
        ];
        record.extend(score_cells(&row.scores));

        self.writer.write_record(&record)?;
        self.stats.psm_rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<SinkStats, SinkError> {
        self.section = Section::Finished;
        self.writer.flush()?;
        info!(
            "sink finalized: {} protein row(s), {} PSM row(s)",
            self.stats.protein_rows, self.stats.psm_rows
        );
        Ok(self.stats)
    }
}

/// In-memory sink used by the test suite.
#[derive(Debug, Default)]
pub struct VecSink {
    /// Metadata header, once written.
    pub metadata: Option<ExportMetadata>,
    /// Protein rows in emission order.
    pub proteins: Vec<ProteinRow>,
    /// PSM rows in emission order.
    pub psms: Vec<PsmRow>,
}

impl VecSink {
    /// Create an empty in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SinkWriter for VecSink {
    fn write_metadata(&mut self, metadata: &ExportMetadata) -> Result<(), SinkError> {
        self.metadata = Some(metadata.clone());
        Ok(())
    }

    fn write_protein_row(&mut self, row: &ProteinRow) -> Result<(), SinkError> {
        self.proteins.push(row.clone());
        Ok(())
    }

    fn write_psm_row(&mut self, row: &PsmRow) -> Result<(), SinkError> {
        self.psms.push(row.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<SinkStats, SinkError> {
        Ok(SinkStats {
            protein_rows: self.proteins.len(),
            psm_rows: self.psms.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EngineId;
    use crate::model::ScoreTypeId;

    fn metadata() -> ExportMetadata {
        ExportMetadata {
            format_version: EXPORT_FORMAT_VERSION.to_string(),
            exported_at: Utc::now(),
            protein_score_columns: vec![ScoreColumn {
                engine: EngineId::new("Mascot"),
                score_type: ScoreTypeId::new("MS:1001171"),
            }],
            psm_score_columns: vec![ScoreColumn {
                engine: EngineId::new("Mascot"),
                score_type: ScoreTypeId::new("MS:1001172"),
            }],
            software: vec![SoftwareRecord {
                id: "AS_mascot".to_string(),
                name: "Mascot".to_string(),
                version: Some("2.7".to_string()),
            }],
        }
    }

    fn protein_row() -> ProteinRow {
        ProteinRow {
            accession: "P12345".to_string(),
            accession_version: None,
            database: Some("SwissProt".to_string()),
            description: None,
            coverage: Some(0.25),
            ambiguity_members: vec!["Q99999".to_string()],
            modifications: Vec::new(),
            scores: vec![Some(88.5)],
            engines: vec![EngineId::new("Mascot")],
            is_decoy: false,
            num_psms: 3,
            num_peptides_distinct: 2,
            num_peptides_unique: 1,
            merge_count: 1,
            run_search_engines: "Mascot".to_string(),
            run_best_scores: "Mascot:88.5".to_string(),
            run_column_scores: "1:88.5".to_string(),
            quant_unit_present: false,
        }
    }

    fn psm_row() -> PsmRow {
        PsmRow {
            psm_id: "index=3".to_string(),
            sequence: "PEPTIDEK".to_string(),
            accession: "P12345".to_string(),
            start: 10,
            end: 17,
            pre: Some('K'),
            post: Some('R'),
            charge: 2,
            experimental_mz: 520.3,
            calculated_mz: Some(520.28),
            rank: 1,
            is_decoy: false,
            modifications: vec!["3-UNIMOD:21".to_string()],
            scores: vec![Some(0.01)],
            spectrum_ref: "index=3".to_string(),
        }
    }

    #[test]
    fn test_tab_sink_emits_sections_in_order() {
        let mut buffer = Vec::new();
        {
            let mut sink = TabSinkWriter::new(&mut buffer);
            sink.write_metadata(&metadata()).unwrap();
            sink.write_protein_row(&protein_row()).unwrap();
            sink.write_psm_row(&psm_row()).unwrap();
            let stats = sink.finish().unwrap();
            assert_eq!(stats.protein_rows, 1);
            assert_eq!(stats.psm_rows, 1);
        }

        let output = String::from_utf8(buffer).unwrap();
        let mtd = output.lines().position(|l| l.starts_with("MTD"));
        let prh = output.lines().position(|l| l.starts_with("PRH"));
        let prt = output.lines().position(|l| l.starts_with("PRT"));
        let psh = output.lines().position(|l| l.starts_with("PSH"));
        let psm = output.lines().position(|l| l.starts_with("PSM\t"));
        assert!(mtd < prh && prh < prt && prt < psh && psh < psm);

        assert!(output.contains("protein_search_engine_score[1]\t[Mascot, MS:1001171]"));
        assert!(output.contains("PRT\tP12345\tnull\tSwissProt\t0.25\tQ99999"));
        assert!(output.contains("PSM\tindex=3\tPEPTIDEK\tP12345\t10\t17"));
    }

    #[test]
    fn test_tab_sink_rejects_out_of_order_rows() {
        let mut buffer = Vec::new();
        let mut sink = TabSinkWriter::new(&mut buffer);
        sink.write_metadata(&metadata()).unwrap();
        sink.write_psm_row(&psm_row()).unwrap();

        let result = sink.write_protein_row(&protein_row());
        assert!(matches!(result, Err(SinkError::SectionOrder(_))));
    }
}
