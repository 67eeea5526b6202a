//! TOML configuration file support for power users.
//!
//! Instead of passing many CLI flags, users can specify settings in a config
//! file:
//!
//! ```toml
//! # mztab-export.toml
//! [export]
//! no_threshold_names = ["no threshold", "none", "nothreshold"]
//! audit_delimiter = ";"
//! collapse_same_set_groups = true
//! significant_modifications = ["UNIMOD:21", "UNIMOD:1"]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use mztab_export::export::ExportConfig;

/// Root configuration structure for mztab-export.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Export-specific settings.
    #[serde(default)]
    pub export: ExportSection,
}

/// Configuration for the export command.
#[derive(Debug, Default, Deserialize)]
pub struct ExportSection {
    /// Spellings accepted as the no-threshold sentinel.
    pub no_threshold_names: Option<Vec<String>>,

    /// Separator between per-run segments in the merge audit columns.
    pub audit_delimiter: Option<String>,

    /// Collapse neighboring same-evidence ambiguity groups.
    pub collapse_same_set_groups: Option<bool>,

    /// Accessions treated as biologically significant modifications.
    pub significant_modifications: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Fold the file settings over the defaults.
    pub fn into_export_config(self) -> ExportConfig {
        let mut config = ExportConfig::default();
        if let Some(names) = self.export.no_threshold_names {
            config.no_threshold_names = names;
        }
        if let Some(delimiter) = self.export.audit_delimiter {
            config.audit_delimiter = delimiter;
        }
        if let Some(collapse) = self.export.collapse_same_set_groups {
            config.collapse_same_set_groups = collapse;
        }
        if let Some(accessions) = self.export.significant_modifications {
            config.significant_modifications = Some(accessions);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [export]
            no_threshold_names = ["no threshold", "nothreshold"]
            audit_delimiter = "|"
            collapse_same_set_groups = true
        "#;

        let config = Config::parse(toml).unwrap();
        let export = config.into_export_config();
        assert_eq!(export.no_threshold_names.len(), 2);
        assert_eq!(export.audit_delimiter, "|");
        assert!(export.collapse_same_set_groups);
        assert!(export.significant_modifications.is_none());
    }

    #[test]
    fn test_empty_config_keeps_defaults() {
        let config = Config::parse("").unwrap();
        let export = config.into_export_config();
        assert_eq!(export.audit_delimiter, ";");
        assert!(!export.collapse_same_set_groups);
    }
}
