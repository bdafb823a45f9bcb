pub mod calculate;
pub mod filter;
pub mod import;
pub mod process;
pub mod project;
pub mod report;
pub mod rules;
pub mod scenarios;

use macrolca_core::config::{self, PipelineConfig};
use macrolca_core::error::MacroLcaError;
use macrolca_core::store::Project;
use std::path::Path;

/// The configuration file if given, else the defaults.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, MacroLcaError> {
    match path {
        Some(p) => {
            tracing::debug!(path = %p.display(), "loading configuration");
            config::load_config(p)
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// The configured project, which must exist.
fn open_project(config: &PipelineConfig) -> Result<Project, MacroLcaError> {
    config.store().open(&config.project)
}
