use macrolca_core::config::PipelineConfig;
use macrolca_core::error::MacroLcaError;
use macrolca_core::report;

use crate::output;

pub fn plot(config: &PipelineConfig) -> Result<(), MacroLcaError> {
    let written = macrolca_core::plot_results(&config.layout(), &config.title, &config.report)?;
    println!("Wrote {} file(s):", written.len());
    for path in &written {
        println!("  {}", path.display());
    }
    Ok(())
}

pub fn summary(config: &PipelineConfig, output_format: &str) -> Result<(), MacroLcaError> {
    let layout = config.layout();
    let table = macrolca_core::load_processed(&layout, &config.title)?;
    let rows = report::summarize(&table, &config.summary);
    report::write_summaries(&layout.summary_dir(), &rows)?;

    match output_format {
        "json" => output::json::print(&rows)?,
        _ => output::table::print_summary(&rows),
    }
    Ok(())
}
