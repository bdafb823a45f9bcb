pub mod calc;
pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod import;
pub mod layout;
pub mod model;
pub mod process;
pub mod report;
pub mod rules;
pub mod scenario;
pub mod store;
pub mod table;

use std::path::{Path, PathBuf};

use chrono::Local;
use rayon::prelude::*;

use calc::{CalcOptions, MethodSelection, ProjectOutcome, RunEstimate, SolverFactory};
use classify::CategoryTable;
use error::MacroLcaError;
use filter::FilterOutcome;
use layout::DataLayout;
use model::{ActivityRecord, ScoreTable};
use process::{JoinReport, PriceTable, ProcessedTable};
use report::{ReportOptions, SummaryOptions};
use rules::schema::{FilterRuleSet, ProcessingProfile};
use store::Project;

/// Output of the filter stage.
#[derive(Debug, Clone)]
pub struct FilterRun {
    pub outcomes: Vec<FilterOutcome>,
    pub merged: Vec<ActivityRecord>,
    pub merged_path: PathBuf,
}

/// Filter every database of a project and write the per-database and
/// merged activity lists.
///
/// Databases are loaded and filtered in parallel; files are written in
/// database order.
pub fn filter_project(
    project: &Project,
    databases: &[String],
    rules: &FilterRuleSet,
    table: &CategoryTable,
    layout: &DataLayout,
    title: &str,
) -> Result<FilterRun, MacroLcaError> {
    let outcomes: Vec<FilterOutcome> = databases
        .par_iter()
        .map(|name| {
            let db = project.load_database(name)?;
            Ok(filter::filter_database(&db, rules, table))
        })
        .collect::<Result<_, MacroLcaError>>()?;

    for outcome in &outcomes {
        let path = layout.filtered_activities(title, project.name(), &outcome.database);
        table::write_activities(&path, &outcome.records)?;
        table::write_json(
            &layout.filter_trace(title, project.name(), &outcome.database),
            &outcome.trace,
        )?;
        tracing::info!(
            database = %outcome.database,
            kept = outcome.records.len(),
            total = outcome.total,
            ambiguous = outcome.ambiguous(),
            path = %path.display(),
            "filtered database"
        );
    }

    let merged = filter::merge_activities(
        outcomes.iter().map(|o| o.records.clone()).collect(),
        rules,
    );
    let merged_path = layout.merged_activities(title, project.name());
    table::write_activities(&merged_path, &merged)?;
    tracing::info!(rows = merged.len(), path = %merged_path.display(), "merged activity lists");

    Ok(FilterRun {
        outcomes,
        merged,
        merged_path,
    })
}

/// Output of the calculation stage.
#[derive(Debug, Clone)]
pub struct CalcRun {
    pub estimate: RunEstimate,
    pub outcome: ProjectOutcome,
    pub combined: ScoreTable,
}

/// Score the merged activity list of `project` against the selected methods.
pub fn calculate(
    project: &Project,
    databases: &[String],
    layout: &DataLayout,
    factory: &dyn SolverFactory,
    selection: &MethodSelection,
    options: &CalcOptions,
) -> Result<CalcRun, MacroLcaError> {
    let activities = table::read_activities(&layout.merged_activities(&options.title, project.name()))?;
    let methods = calc::select_methods(&project.methods()?, selection)?;

    let estimate = RunEstimate::new(
        activities.len(),
        databases.len(),
        methods.len(),
        options.limit,
        Local::now(),
    );
    tracing::info!(
        databases = estimate.databases,
        activities = estimate.activities,
        methods = estimate.methods,
        calculations = estimate.calculations,
        "estimated {:.2} minutes, finishing at {}",
        estimate.minutes,
        estimate.finish_display(Local::now())
    );

    let outcome = calc::calculate_project(project, layout, factory, databases, &activities, &methods, options)?;
    let combined = calc::merge_results(layout, &options.title, databases, options.limit)?;
    Ok(CalcRun {
        estimate,
        outcome,
        combined,
    })
}

/// Output of the processing stage.
#[derive(Debug, Clone)]
pub struct ProcessRun {
    pub table: ProcessedTable,
    pub join: JoinReport,
    pub unit_dropped: usize,
    pub cooked_path: PathBuf,
    pub priced_path: Option<PathBuf>,
}

/// Join raw results with activity metadata, apply the profile and write the
/// processed table; with a price table, also write the priced variant.
pub fn process_project(
    project_name: &str,
    layout: &DataLayout,
    title: &str,
    limit: Option<usize>,
    profile: &ProcessingProfile,
    prices: Option<&Path>,
) -> Result<ProcessRun, MacroLcaError> {
    let activities = table::read_activities(&layout.merged_activities(title, project_name))?;
    let scores = table::read_scores(&layout.combined_raw_results(title, limit, "csv"))?;

    let outcome = process::process_results(&activities, scores, profile);
    let cooked_path = layout.cooked_results(title);
    table::write_processed(&cooked_path, &outcome.table)?;
    tracing::info!(
        rows = outcome.table.records.len(),
        matched = outcome.join.matched,
        dropped = outcome.join.dropped(),
        path = %cooked_path.display(),
        "wrote processed results"
    );

    let mut table = outcome.table;
    let priced_path = match prices {
        Some(path) => {
            let prices: PriceTable = process::load_price_table(path)?;
            process::attach_prices(&mut table, &prices);
            let out = layout.priced_results(title);
            table::write_processed(&out, &table)?;
            Some(out)
        }
        None => {
            let stale = layout.priced_results(title);
            if stale.is_file() {
                std::fs::remove_file(&stale)?;
                tracing::info!(path = %stale.display(), "removed priced results from an earlier run");
            }
            None
        }
    };

    Ok(ProcessRun {
        table,
        join: outcome.join,
        unit_dropped: outcome.unit_dropped,
        cooked_path,
        priced_path,
    })
}

/// The processed table of the last `process` run: priced if that run had
/// prices, else cooked.
pub fn load_processed(layout: &DataLayout, title: &str) -> Result<ProcessedTable, MacroLcaError> {
    let priced = layout.priced_results(title);
    if priced.is_file() {
        return table::read_processed(&priced);
    }
    table::read_processed(&layout.cooked_results(title))
}

/// Render plots and regression statistics for the processed table.
pub fn plot_results(
    layout: &DataLayout,
    title: &str,
    options: &ReportOptions,
) -> Result<Vec<PathBuf>, MacroLcaError> {
    let table = load_processed(layout, title)?;
    report::write_plots(layout, &table, options)
}

/// Write the per-scenario summary tables.
pub fn summarize_results(
    layout: &DataLayout,
    title: &str,
    options: &SummaryOptions,
) -> Result<Vec<PathBuf>, MacroLcaError> {
    let table = load_processed(layout, title)?;
    let rows = report::summarize(&table, options);
    report::write_summaries(&layout.summary_dir(), &rows)
}
