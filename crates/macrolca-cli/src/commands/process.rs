use macrolca_core::config::PipelineConfig;
use macrolca_core::error::MacroLcaError;
use std::path::PathBuf;

pub fn run(config: &PipelineConfig, prices: Option<PathBuf>, limit: Option<usize>) -> Result<(), MacroLcaError> {
    let profile = config.processing_profile()?;
    let prices = prices.or_else(|| config.prices.clone());
    let run = macrolca_core::process_project(
        &config.project,
        &config.layout(),
        &config.title,
        limit.or(config.limit),
        &profile,
        prices.as_deref(),
    )?;

    println!("Processed with profile '{}' (v{})", profile.name, profile.version);
    println!("  Joined rows:           {}", run.join.matched);
    println!("  Results without match: {}", run.join.results_only);
    println!("  Activities unscored:   {}", run.join.activities_only);
    println!("  Duplicate activities:  {}", run.join.duplicates);
    println!("  Dropped by unit:       {}", run.unit_dropped);
    println!("  Indicators:            {}", run.table.indicators.len());
    println!("\n  Written: {}", run.cooked_path.display());
    if let Some(ref path) = run.priced_path {
        println!("  Priced:  {}", path.display());
    }
    Ok(())
}
