//! Run configuration shared by every stage.
//!
//! Read from a JSON file; any field left out takes its default, and the CLI
//! overrides individual fields after loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::calc::{self, CalcOptions, MethodSelection};
use crate::classify::CategoryTable;
use crate::error::MacroLcaError;
use crate::layout::DataLayout;
use crate::report::{ReportOptions, SummaryOptions};
use crate::rules::schema::{FilterRuleSet, ProcessingProfile};
use crate::rules::{self, builtin};
use crate::store::{Project, ProjectStore, DEFAULT_EXCLUDED_DATABASES};

/// An external program and its leading arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub store_dir: PathBuf,
    pub data_dir: PathBuf,
    pub project: String,
    /// Name of the activity set; part of every output file name.
    pub title: String,
    /// Explicit database list; empty means every database not excluded.
    pub databases: Vec<String>,
    pub exclude_databases: Vec<String>,
    pub preset: String,
    pub ruleset: Option<PathBuf>,
    pub categories: Option<PathBuf>,
    pub profile: String,
    pub profile_path: Option<PathBuf>,
    pub methods: MethodSelection,
    pub limit: Option<usize>,
    pub seed: Option<u64>,
    pub parallel: bool,
    pub workers: Option<usize>,
    pub solver: Option<ExternalCommand>,
    pub generator: Option<ExternalCommand>,
    pub prices: Option<PathBuf>,
    pub report: ReportOptions,
    pub summary: SummaryOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            store_dir: PathBuf::from("projects"),
            data_dir: PathBuf::from("data"),
            project: "T-reX_macro".to_string(),
            title: "markets".to_string(),
            databases: Vec::new(),
            exclude_databases: DEFAULT_EXCLUDED_DATABASES.iter().map(|s| s.to_string()).collect(),
            preset: "markets".to_string(),
            ruleset: None,
            categories: None,
            profile: "waste-footprint".to_string(),
            profile_path: None,
            methods: MethodSelection::default(),
            limit: None,
            seed: None,
            parallel: false,
            workers: None,
            solver: None,
            generator: None,
            prices: None,
            report: ReportOptions::default(),
            summary: SummaryOptions::default(),
        }
    }
}

/// Load a configuration file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, MacroLcaError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| MacroLcaError::Config(format!("cannot read {}: {e}", path.display())))?;
    let config: PipelineConfig = serde_json::from_str(&content)
        .map_err(|e| MacroLcaError::Config(format!("{}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), MacroLcaError> {
        if self.project.trim().is_empty() {
            return Err(MacroLcaError::Config("project must not be empty".into()));
        }
        if self.title.trim().is_empty() {
            return Err(MacroLcaError::Config("title must not be empty".into()));
        }
        if self.limit == Some(0) {
            return Err(MacroLcaError::Config("limit must be at least 1".into()));
        }
        if self.workers == Some(0) {
            return Err(MacroLcaError::Config("workers must be at least 1".into()));
        }
        Ok(())
    }

    pub fn store(&self) -> ProjectStore {
        ProjectStore::new(&self.store_dir)
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_dir)
    }

    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(calc::worker_count)
    }

    pub fn calc_options(&self) -> CalcOptions {
        CalcOptions {
            title: self.title.clone(),
            limit: self.limit,
            seed: self.seed,
            parallel: self.parallel,
            workers: self.workers(),
        }
    }

    /// The rule set file if one is configured, else the named preset.
    pub fn filter_rules(&self) -> Result<FilterRuleSet, MacroLcaError> {
        match &self.ruleset {
            Some(path) => rules::load_ruleset(path),
            None => builtin::load_preset(&self.preset),
        }
    }

    pub fn category_table(&self) -> Result<CategoryTable, MacroLcaError> {
        match &self.categories {
            Some(path) => rules::load_category_table(path),
            None => builtin::category_table(),
        }
    }

    pub fn processing_profile(&self) -> Result<ProcessingProfile, MacroLcaError> {
        match &self.profile_path {
            Some(path) => rules::load_profile(path),
            None => builtin::load_profile(&self.profile),
        }
    }

    /// Databases a stage iterates over, sorted unless listed explicitly.
    pub fn selected_databases(&self, project: &Project) -> Result<Vec<String>, MacroLcaError> {
        if self.databases.is_empty() {
            return project.selected_databases(&self.exclude_databases);
        }
        for name in &self.databases {
            if !project.has_database(name) {
                return Err(MacroLcaError::DatabaseNotFound {
                    project: project.name().to_string(),
                    database: name.clone(),
                });
            }
        }
        Ok(self.databases.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "project": "study", "limit": 10, "seed": 42 }"#).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.project, "study");
        assert_eq!(config.title, "markets");
        assert_eq!(config.limit, Some(10));
        assert_eq!(config.exclude_databases, vec!["biosphere3", "biosphere_T-reX"]);
        assert_eq!(config.methods, MethodSelection::default());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "limit": 0 }"#).unwrap();
        assert!(matches!(load_config(&path), Err(MacroLcaError::Config(_))));
    }

    #[test]
    fn test_unknown_preset_surfaces() {
        let config = PipelineConfig {
            preset: "nope".into(),
            ..PipelineConfig::default()
        };
        assert!(config.filter_rules().is_err());
        assert!(config.category_table().is_ok());
        assert!(config.processing_profile().is_ok());
    }

    #[test]
    fn test_explicit_databases_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            store_dir: dir.path().to_path_buf(),
            databases: vec!["missing".into()],
            ..PipelineConfig::default()
        };
        let project = config.store().create_project("T-reX_macro").unwrap();
        assert!(matches!(
            config.selected_databases(&project),
            Err(MacroLcaError::DatabaseNotFound { .. })
        ));
    }
}
