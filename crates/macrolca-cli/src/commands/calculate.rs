use macrolca_core::calc::CommandSolverFactory;
use macrolca_core::config::PipelineConfig;
use macrolca_core::error::MacroLcaError;

pub fn run(
    mut config: PipelineConfig,
    limit: Option<usize>,
    seed: Option<u64>,
    parallel: bool,
    workers: Option<usize>,
) -> Result<(), MacroLcaError> {
    if limit.is_some() {
        config.limit = limit;
    }
    if seed.is_some() {
        config.seed = seed;
    }
    if workers.is_some() {
        config.workers = workers;
    }
    config.parallel |= parallel;
    config.validate()?;

    let factory = match &config.solver {
        Some(cmd) => CommandSolverFactory::new(&cmd.program, cmd.args.clone()),
        None => {
            return Err(MacroLcaError::Config(
                "no impact solver configured (set \"solver\" in the config file)".into(),
            ))
        }
    };

    let project = super::open_project(&config)?;
    let databases = config.selected_databases(&project)?;
    let options = config.calc_options();
    let run = macrolca_core::calculate(
        &project,
        &databases,
        &config.layout(),
        &factory,
        &config.methods,
        &options,
    )?;

    for db in &run.outcome.databases {
        println!("{}", db.summary_line());
    }
    println!(
        "\n{} calculations in {}s, {} failed; {} rows combined",
        run.outcome.calculations(),
        run.outcome.duration.as_secs(),
        run.outcome.failures(),
        run.combined.records.len()
    );
    Ok(())
}
