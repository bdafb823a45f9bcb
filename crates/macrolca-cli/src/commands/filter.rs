use macrolca_core::config::PipelineConfig;
use macrolca_core::error::MacroLcaError;

use crate::output;

pub fn run(config: &PipelineConfig, explain: bool, output_format: &str) -> Result<(), MacroLcaError> {
    let project = super::open_project(config)?;
    let databases = config.selected_databases(&project)?;
    let rules = config.filter_rules()?;
    let table = config.category_table()?;

    let run = macrolca_core::filter_project(
        &project,
        &databases,
        &rules,
        &table,
        &config.layout(),
        &config.title,
    )?;

    match output_format {
        "json" => output::json::print(&run.outcomes.iter().map(|o| &o.trace).collect::<Vec<_>>())?,
        _ => output::table::print_filter(&run, explain),
    }
    Ok(())
}
