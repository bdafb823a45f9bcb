use macrolca_core::config::PipelineConfig;
use macrolca_core::error::MacroLcaError;
use macrolca_core::scenario::command::CommandGenerator;
use macrolca_core::scenario::{self, ScenarioOptions};

pub fn run(
    config: &PipelineConfig,
    source: Option<String>,
    database: String,
    superstructure: Option<String>,
) -> Result<(), MacroLcaError> {
    let generator = match &config.generator {
        Some(cmd) => CommandGenerator::new(&cmd.program, cmd.args.clone()),
        None => {
            return Err(MacroLcaError::Config(
                "no scenario generator configured (set \"generator\" in the config file)".into(),
            ))
        }
    };

    let options = ScenarioOptions {
        source_project: source.unwrap_or_else(|| config.project.clone()),
        target_project: config.project.clone(),
        source_database: database,
        superstructure,
    };
    let specs = scenario::default_scenarios();
    let run = scenario::generate_scenarios(&config.store(), &options, &specs, &generator)?;

    for name in &run.skipped {
        println!("  exists   {name}");
    }
    for name in &run.written {
        println!("  written  {name}");
    }
    println!(
        "\n{} database(s) written, {} already present",
        run.written.len(),
        run.skipped.len()
    );
    Ok(())
}
