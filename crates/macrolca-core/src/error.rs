use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MacroLcaError {
    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    #[error("project '{0}' already exists")]
    ProjectExists(String),

    #[error("database '{database}' not found in project '{project}'")]
    DatabaseNotFound { project: String, database: String },

    #[error("failed to import datasets from {path}: {reason}")]
    Import { path: PathBuf, reason: String },

    #[error("database '{database}' has {unlinked} unlinked exchange(s); rerun with --allow-unlinked to write it anyway")]
    UnlinkedExchanges { database: String, unlinked: usize },

    #[error("scenario generator not found: {0}")]
    GeneratorNotFound(String),

    #[error("scenario generator failed with exit code {code}: {stderr}")]
    GeneratorFailed { code: i32, stderr: String },

    #[error("impact solver not found: {0}")]
    SolverNotFound(String),

    #[error("impact calculation failed: {0}")]
    Solver(String),

    #[error("failed to load {kind} from {path}: {reason}")]
    RulesetLoad {
        kind: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("invalid ruleset: {0}")]
    RulesetInvalid(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("missing column '{column}' in {path}")]
    MissingColumn { column: String, path: PathBuf },

    #[error("failed to parse table: {0}")]
    Table(String),

    #[error("no methods matched the selection")]
    NoMethods,

    #[error("failed to draw plot: {0}")]
    Plot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}
