//! Scenario database generation.
//!
//! Projection itself is an external capability reached through
//! [`ScenarioGenerator`]. This module only decides which scenarios still
//! need to be produced and stores what the generator returns.

pub mod command;

use crate::error::MacroLcaError;
use crate::model::Database;
use crate::store::{Project, ProjectStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One (model, pathway, year) projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub model: String,
    pub pathway: String,
    pub year: u16,
}

impl ScenarioSpec {
    pub fn new(model: &str, pathway: &str, year: u16) -> Self {
        ScenarioSpec {
            model: model.to_string(),
            pathway: pathway.to_string(),
            year,
        }
    }

    /// Name of the generated database, e.g. `"SSP1-PkBudg500-2030"`.
    pub fn database_name(&self) -> String {
        format!("{}-{}", self.pathway, self.year)
    }
}

/// The REMIND SSP1/SSP5 1.5°C-budget runs for 2020 to 2050.
pub fn default_scenarios() -> Vec<ScenarioSpec> {
    let mut specs = Vec::new();
    for pathway in ["SSP1-PkBudg500", "SSP5-PkBudg500"] {
        for year in [2020, 2030, 2040, 2050] {
            specs.push(ScenarioSpec::new("remind", pathway, year));
        }
    }
    specs
}

/// What the generator is asked to produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub source_database: String,
    /// Path of the source database export.
    pub source_path: PathBuf,
    pub scenarios: Vec<ScenarioSpec>,
    /// Directory the generator writes `<database>.json` exports into.
    pub output_dir: PathBuf,
    /// When set, produce one superstructure database of this name instead of
    /// one database per scenario.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superstructure: Option<String>,
}

impl GenerationRequest {
    /// Database names the generator is expected to return.
    pub fn expected_databases(&self) -> Vec<String> {
        match &self.superstructure {
            Some(name) => vec![name.clone()],
            None => self.scenarios.iter().map(ScenarioSpec::database_name).collect(),
        }
    }
}

/// Trait for scenario projection backends.
pub trait ScenarioGenerator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<Database>, MacroLcaError>;

    /// Name of this backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    pub source_project: String,
    pub target_project: String,
    pub source_database: String,
    pub superstructure: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioRun {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
}

/// Copy the source project to the target (if absent), then generate every
/// scenario whose database does not exist yet.
pub fn generate_scenarios(
    store: &ProjectStore,
    options: &ScenarioOptions,
    specs: &[ScenarioSpec],
    generator: &dyn ScenarioGenerator,
) -> Result<ScenarioRun, MacroLcaError> {
    let target: Project = if store.exists(&options.target_project) {
        store.open(&options.target_project)?
    } else {
        tracing::info!(
            source = %options.source_project,
            target = %options.target_project,
            "copying project"
        );
        store.copy_project(&options.source_project, &options.target_project)?
    };

    if !target.has_database(&options.source_database) {
        return Err(MacroLcaError::DatabaseNotFound {
            project: target.name().to_string(),
            database: options.source_database.clone(),
        });
    }

    let mut run = ScenarioRun::default();
    let pending: Vec<ScenarioSpec> = match &options.superstructure {
        Some(name) if target.has_database(name) => {
            run.skipped.push(name.clone());
            Vec::new()
        }
        Some(_) => specs.to_vec(),
        None => specs
            .iter()
            .filter(|s| {
                let exists = target.has_database(&s.database_name());
                if exists {
                    run.skipped.push(s.database_name());
                }
                !exists
            })
            .cloned()
            .collect(),
    };

    if pending.is_empty() {
        tracing::info!(skipped = run.skipped.len(), "all scenario databases already exist");
        return Ok(run);
    }

    let output_dir = tempfile::tempdir()?;
    let request = GenerationRequest {
        source_database: options.source_database.clone(),
        source_path: target.database_path(&options.source_database),
        scenarios: pending,
        output_dir: output_dir.path().to_path_buf(),
        superstructure: options.superstructure.clone(),
    };

    tracing::info!(
        backend = generator.backend_name(),
        scenarios = request.scenarios.len(),
        "generating scenario databases"
    );
    let databases = generator.generate(&request)?;

    let expected = request.expected_databases();
    for db in &databases {
        if !expected.contains(&db.name) {
            tracing::warn!(database = %db.name, "generator returned an unrequested database");
        }
        target.write_database(db)?;
        run.written.push(db.name.clone());
    }
    for name in expected.iter().filter(|n| !run.written.contains(n)) {
        tracing::warn!(database = %name, "generator did not produce requested database");
    }

    Ok(run)
}
