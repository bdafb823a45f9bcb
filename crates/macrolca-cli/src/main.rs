mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "macrolca",
    version,
    about = "Macro-scale life cycle assessment of market activities across future scenarios"
)]
struct Cli {
    /// Pipeline configuration file (JSON)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects in the store
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Import an extracted EcoSpold2 database or a method catalog
    Import {
        #[command(subcommand)]
        action: ImportAction,
    },
    /// Generate future scenario databases with the configured generator
    Scenarios {
        /// Project holding the base database
        #[arg(long, value_name = "NAME")]
        source: Option<String>,

        /// Database to project forward
        #[arg(long, default_value = "ecoinvent-3.9.1-cutoff")]
        database: String,

        /// Write one superstructure database with this name instead of one per scenario
        #[arg(long, value_name = "NAME")]
        superstructure: Option<String>,
    },
    /// Select market activities and write the activity lists
    Filter {
        /// Print per-activity keep/drop reasons
        #[arg(long)]
        explain: bool,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Score the filtered activities with the configured impact solver
    Calculate {
        /// Score a random sample of this many activities per database
        #[arg(long)]
        limit: Option<usize>,

        /// Seed for the sample
        #[arg(long)]
        seed: Option<u64>,

        /// One worker per database
        #[arg(long)]
        parallel: bool,

        /// Worker count (default: SLURM allocation or CPU count)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Join, convert and relabel the raw results
    Process {
        /// Price table (XLSX/ODS or semicolon CSV) to attach
        #[arg(long, value_name = "FILE")]
        prices: Option<PathBuf>,

        /// Process the results of a limited run
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Render box plots, scatter plots and regression statistics
    Plot,
    /// Write the per-scenario summary tables
    Summary {
        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Manage and inspect rule sets
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// List projects in the store
    List,
    /// Create an empty project
    Create { name: String },
    /// Delete a project and all its databases
    Delete { name: String },
    /// Copy a project under a new name
    Copy { source: String, target: String },
    /// Show the databases and method count of a project
    Show { name: Option<String> },
}

#[derive(Subcommand)]
enum ImportAction {
    /// Import an extracted EcoSpold2 archive directory
    Database {
        /// Extracted archive root or its datasets/ directory
        dir: PathBuf,

        /// Database name (default: derived from the directory name)
        #[arg(long)]
        name: Option<String>,

        /// Write the database even if exchanges are unlinked
        #[arg(long)]
        allow_unlinked: bool,
    },
    /// Import a method catalog (JSON array of [family, category, indicator])
    Methods { file: PathBuf },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List builtin filter presets and processing profiles
    List,
    /// Explain a filter preset in plain language
    Explain {
        /// Preset name (e.g., "markets")
        preset: String,
    },
    /// Print the rule file formats with an example
    Schema,
    /// Validate a filter rule file or processing profile
    Validate {
        /// Path to JSON rule file
        file: PathBuf,
    },
    /// Show the product category table and its range overlaps
    Categories,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = commands::load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Project { action } => match action {
            ProjectAction::List => commands::project::list(&config),
            ProjectAction::Create { name } => commands::project::create(&config, &name),
            ProjectAction::Delete { name } => commands::project::delete(&config, &name),
            ProjectAction::Copy { source, target } => commands::project::copy(&config, &source, &target),
            ProjectAction::Show { name } => commands::project::show(&config, name.as_deref()),
        },
        Commands::Import { action } => match action {
            ImportAction::Database {
                dir,
                name,
                allow_unlinked,
            } => commands::import::database(&config, &dir, name, allow_unlinked),
            ImportAction::Methods { file } => commands::import::methods(&config, &file),
        },
        Commands::Scenarios {
            source,
            database,
            superstructure,
        } => commands::scenarios::run(&config, source, database, superstructure),
        Commands::Filter { explain, output } => commands::filter::run(&config, explain, &output),
        Commands::Calculate {
            limit,
            seed,
            parallel,
            workers,
        } => commands::calculate::run(config, limit, seed, parallel, workers),
        Commands::Process { prices, limit } => commands::process::run(&config, prices, limit),
        Commands::Plot => commands::report::plot(&config),
        Commands::Summary { output } => commands::report::summary(&config, &output),
        Commands::Rules { action } => match action {
            RulesAction::List => commands::rules::list(),
            RulesAction::Explain { preset } => commands::rules::explain(&preset),
            RulesAction::Schema => commands::rules::schema(),
            RulesAction::Validate { file } => commands::rules::validate(&file),
            RulesAction::Categories => commands::rules::categories(&config),
        },
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
