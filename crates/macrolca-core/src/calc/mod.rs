//! Bulk impact calculation over (database, activity, method).
//!
//! The matrix solver is an external capability reached through
//! [`SolverFactory`]; this module owns iteration order, sampling, failure
//! accounting and persistence of the per-database raw results.

pub mod command;
pub mod outcome;

pub use command::{CommandSolver, CommandSolverFactory};
pub use outcome::{CalcFailure, DatabaseOutcome, ProjectOutcome, RunEstimate};

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::MacroLcaError;
use crate::layout::DataLayout;
use crate::model::{ActivityRecord, ImpactMethod, ScoreRecord, ScoreTable};
use crate::store::Project;
use crate::table;

/// One database's solver session.
///
/// `factorize` sets up the system for one unit of the given activity; every
/// following `score` call reuses that factorization.
pub trait ImpactSolver {
    fn factorize(&mut self, code: &str) -> Result<(), MacroLcaError>;
    fn score(&mut self, method: &ImpactMethod) -> Result<f64, MacroLcaError>;
}

/// Opens one solver per database so setup cost is paid once per database.
pub trait SolverFactory: Send + Sync {
    fn open(&self, project: &Project, database: &str) -> Result<Box<dyn ImpactSolver>, MacroLcaError>;

    fn backend_name(&self) -> &str;
}

/// Which methods of the project catalog get calculated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSelection {
    /// Substrings matched against the method category.
    #[serde(default)]
    pub category_keywords: Vec<String>,
    #[serde(default)]
    pub families: Vec<FamilySelection>,
}

/// Methods of one family whose category contains `category_contains`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilySelection {
    pub family: String,
    #[serde(default)]
    pub category_contains: String,
}

impl Default for MethodSelection {
    fn default() -> Self {
        MethodSelection {
            category_keywords: vec![
                "Waste: Total combined".to_string(),
                "Waste: Hazardous".to_string(),
            ],
            families: vec![FamilySelection {
                family: "ReCiPe 2016 v1.03, endpoint (H)".to_string(),
                category_contains: "total:".to_string(),
            }],
        }
    }
}

/// Select methods in selection order: keyword groups first, then families.
/// Each method appears once.
pub fn select_methods(
    catalog: &[ImpactMethod],
    selection: &MethodSelection,
) -> Result<Vec<ImpactMethod>, MacroLcaError> {
    let mut selected: Vec<ImpactMethod> = Vec::new();
    let mut push = |m: &ImpactMethod| {
        if !selected.contains(m) {
            selected.push(m.clone());
        }
    };
    for keyword in &selection.category_keywords {
        catalog
            .iter()
            .filter(|m| m.category().contains(keyword.as_str()))
            .for_each(&mut push);
    }
    for fam in &selection.families {
        catalog
            .iter()
            .filter(|m| m.family() == fam.family && m.category().contains(fam.category_contains.as_str()))
            .for_each(&mut push);
    }
    if selected.is_empty() {
        return Err(MacroLcaError::NoMethods);
    }

    // Scores are keyed by indicator; a second method with the same indicator
    // would overwrite the first one's column.
    let mut kept: Vec<ImpactMethod> = Vec::with_capacity(selected.len());
    for m in selected {
        if let Some(first) = kept.iter().find(|k| k.column_label() == m.column_label()) {
            tracing::warn!(
                indicator = m.column_label(),
                kept = %first,
                dropped = %m,
                "selected methods share an indicator label; keeping the first"
            );
            continue;
        }
        kept.push(m);
    }
    Ok(kept)
}

#[derive(Debug, Clone)]
pub struct CalcOptions {
    pub title: String,
    /// Random sample of at most this many activities per database.
    pub limit: Option<usize>,
    pub seed: Option<u64>,
    pub parallel: bool,
    pub workers: usize,
}

impl Default for CalcOptions {
    fn default() -> Self {
        CalcOptions {
            title: "markets".to_string(),
            limit: None,
            seed: None,
            parallel: false,
            workers: worker_count(),
        }
    }
}

/// Worker count from the batch scheduler, else the machine's CPU count.
pub fn worker_count() -> usize {
    worker_count_from(
        std::env::var("SLURM_CPUS_PER_TASK").ok().as_deref(),
        std::env::var("SLURM_JOB_CPUS_PER_NODE").ok().as_deref(),
    )
}

/// `SLURM_JOB_CPUS_PER_NODE` may read like `16(x2)`; the leading count is used.
pub fn worker_count_from(per_task: Option<&str>, per_node: Option<&str>) -> usize {
    let parse = |v: &str| {
        let digits: String = v.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse::<usize>().ok().filter(|n| *n > 0)
    };
    per_task
        .and_then(parse)
        .or_else(|| per_node.and_then(parse))
        .unwrap_or_else(num_cpus::get)
}

/// Serializes appends to log files shared by parallel workers.
#[derive(Debug, Default)]
pub struct RunLog {
    lock: Mutex<()>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, path: &Path, line: &str) -> Result<(), MacroLcaError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(
            file,
            "** {} -- * {line}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        Ok(())
    }
}

/// Pick `limit` activities at random, keeping their loaded order.
pub fn sample_activities<'a, R: Rng + ?Sized>(
    activities: Vec<&'a ActivityRecord>,
    limit: usize,
    rng: &mut R,
) -> Vec<&'a ActivityRecord> {
    if limit >= activities.len() {
        return activities;
    }
    let mut picked = rand::seq::index::sample(rng, activities.len(), limit).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| activities[i]).collect()
}

fn method_columns(methods: &[ImpactMethod]) -> Vec<String> {
    let mut cols: Vec<String> = Vec::new();
    for m in methods {
        let label = m.column_label().to_string();
        if !cols.contains(&label) {
            cols.push(label);
        }
    }
    cols
}

/// Score every activity of `database` against every method.
///
/// Failures are recorded and the pair is left out of the table; an activity
/// whose factorization fails contributes no row at all.
pub fn calculate_database<R: Rng + ?Sized>(
    solver: &mut dyn ImpactSolver,
    database: &str,
    activities: &[ActivityRecord],
    methods: &[ImpactMethod],
    limit: Option<usize>,
    rng: &mut R,
) -> DatabaseOutcome {
    let start = Instant::now();
    let mut acts: Vec<&ActivityRecord> = activities.iter().filter(|a| a.database == database).collect();
    if let Some(n) = limit {
        acts = sample_activities(acts, n, rng);
        tracing::info!(database, limit = n, "limiting activities");
    }

    let mut table = ScoreTable {
        methods: method_columns(methods),
        records: Vec::new(),
    };
    let mut failures = Vec::new();

    for (i, act) in acts.iter().enumerate() {
        if let Err(e) = solver.factorize(&act.code) {
            tracing::warn!(database, code = %act.code, error = %e, "factorization failed");
            failures.push(CalcFailure {
                code: act.code.clone(),
                method: None,
                message: e.to_string(),
            });
            continue;
        }

        let mut scores = BTreeMap::new();
        for (k, method) in methods.iter().enumerate() {
            match solver.score(method) {
                Ok(score) => {
                    if score.abs() > 1.0 {
                        tracing::debug!(
                            "{database} Act.{}/{} Met.{}/{} | Score: {score:.1e} | '{}' with method: {}",
                            i + 1,
                            acts.len(),
                            k + 1,
                            methods.len(),
                            act.name,
                            method.column_label()
                        );
                    }
                    scores.insert(method.column_label().to_string(), score);
                }
                Err(e) => {
                    tracing::warn!(database, code = %act.code, method = %method, error = %e, "calculation failed");
                    failures.push(CalcFailure {
                        code: act.code.clone(),
                        method: Some(method.clone()),
                        message: e.to_string(),
                    });
                }
            }
        }

        if !scores.is_empty() {
            table.records.push(ScoreRecord {
                code: act.code.clone(),
                name: act.name.clone(),
                database: database.to_string(),
                unit: act.unit.clone(),
                location: act.location.clone(),
                reference_product: act.reference_product.clone(),
                scores,
            });
        }
    }

    DatabaseOutcome {
        database: database.to_string(),
        table,
        activities: acts.len(),
        failures,
        duration: start.elapsed(),
    }
}

/// Run every database, sequentially or one rayon task per database.
///
/// Each database's raw results are written (CSV and JSON) only once its loop
/// has finished. Output order follows `databases` in both modes.
pub fn calculate_project(
    project: &Project,
    layout: &DataLayout,
    factory: &dyn SolverFactory,
    databases: &[String],
    activities: &[ActivityRecord],
    methods: &[ImpactMethod],
    options: &CalcOptions,
) -> Result<ProjectOutcome, MacroLcaError> {
    let start = Instant::now();
    let log = RunLog::new();

    let run_one = |index: usize, database: &String| -> Result<DatabaseOutcome, MacroLcaError> {
        tracing::info!(database = %database, backend = factory.backend_name(), "calculating");
        let mut solver = factory.open(project, database)?;
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_os_rng(),
        };
        let outcome = calculate_database(
            solver.as_mut(),
            database,
            activities,
            methods,
            options.limit,
            &mut rng,
        );
        table::write_scores(&layout.raw_results(database, &options.title, "csv"), &outcome.table)?;
        table::write_json(&layout.raw_results(database, &options.title, "json"), &outcome.table)?;
        log.append(&layout.database_log(database, &options.title), &outcome.summary_line())?;
        tracing::info!("{}", outcome.summary_line());
        Ok(outcome)
    };

    let outcomes: Vec<DatabaseOutcome> = if options.parallel && databases.len() > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers.max(1))
            .thread_name(|i| format!("macrolca-calc-{i}"))
            .build()
            .map_err(|e| MacroLcaError::Config(format!("failed to build worker pool: {e}")))?;
        pool.install(|| {
            databases
                .par_iter()
                .enumerate()
                .map(|(i, db)| run_one(i, db))
                .collect::<Result<Vec<_>, _>>()
        })?
    } else {
        databases
            .iter()
            .enumerate()
            .map(|(i, db)| run_one(i, db))
            .collect::<Result<Vec<_>, _>>()?
    };

    let outcome = ProjectOutcome {
        databases: outcomes,
        duration: start.elapsed(),
    };
    log.append(
        &layout.run_log(&options.title),
        &format!(
            "Completed {} LCIA calculations across {} databases in: {} seconds",
            outcome.calculations(),
            outcome.databases.len(),
            outcome.duration.as_secs()
        ),
    )?;
    Ok(outcome)
}

/// Concatenate the per-database raw results from disk and write the combined
/// table as CSV and JSON.
pub fn merge_results(
    layout: &DataLayout,
    title: &str,
    databases: &[String],
    limit: Option<usize>,
) -> Result<ScoreTable, MacroLcaError> {
    let mut tables = Vec::with_capacity(databases.len());
    for db in databases {
        let path = layout.raw_results(db, title, "csv");
        if !path.is_file() {
            tracing::warn!(database = %db, path = %path.display(), "no raw results to merge");
            continue;
        }
        tables.push(table::read_scores(&path)?);
    }
    let merged = ScoreTable::concat(tables);
    table::write_scores(&layout.combined_raw_results(title, limit, "csv"), &merged)?;
    table::write_json(&layout.combined_raw_results(title, limit, "json"), &merged)?;
    tracing::info!(rows = merged.records.len(), "merged raw results");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Unit;

    fn method(family: &str, category: &str, indicator: &str) -> ImpactMethod {
        ImpactMethod(family.into(), category.into(), indicator.into())
    }

    fn catalog() -> Vec<ImpactMethod> {
        vec![
            method("ReCiPe 2016 v1.03, endpoint (H)", "total: ecosystem quality", "ecosystem quality"),
            method("ReCiPe 2016 v1.03, endpoint (H)", "ecosystem quality", "climate change"),
            method("WasteAndMaterialFootprint", "Waste: Hazardous", "Hazardous (kg)"),
            method("WasteAndMaterialFootprint", "Waste: Total combined", "Total (kg)"),
            method("ReCiPe 2016 v1.03, midpoint (H)", "total: climate change", "GWP1000"),
        ]
    }

    #[test]
    fn test_select_methods_order() {
        let m = select_methods(&catalog(), &MethodSelection::default()).unwrap();
        let labels: Vec<&str> = m.iter().map(|m| m.column_label()).collect();
        assert_eq!(labels, vec!["Total (kg)", "Hazardous (kg)", "ecosystem quality"]);
    }

    #[test]
    fn test_select_methods_empty() {
        let sel = MethodSelection {
            category_keywords: vec!["nothing".into()],
            families: vec![],
        };
        assert!(matches!(select_methods(&catalog(), &sel), Err(MacroLcaError::NoMethods)));
    }

    #[test]
    fn test_select_methods_colliding_indicator_keeps_first() {
        let catalog = vec![
            method("WasteAndMaterialFootprint", "Waste: Total combined", "Total (kg)"),
            method("WasteAndMaterialFootprint v2", "Waste: Total combined", "Total (kg)"),
            method("WasteAndMaterialFootprint", "Waste: Hazardous combined", "Hazardous (kg)"),
        ];
        let m = select_methods(&catalog, &MethodSelection::default()).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m[0].family(), "WasteAndMaterialFootprint");
        assert_eq!(method_columns(&m), vec!["Total (kg)", "Hazardous (kg)"]);
    }

    #[test]
    fn test_worker_count_sources() {
        assert_eq!(worker_count_from(Some("8"), Some("16")), 8);
        assert_eq!(worker_count_from(None, Some("16(x2)")), 16);
        assert_eq!(worker_count_from(Some("zero"), None), num_cpus::get());
    }

    fn record(code: &str, db: &str) -> ActivityRecord {
        ActivityRecord {
            code: code.into(),
            name: format!("market for {code}"),
            unit: Unit::Kilogram,
            location: "GLO".into(),
            activity_type: None,
            reference_product: None,
            database: db.into(),
            production_amount: None,
            price: None,
            isic: None,
            cpc: None,
            category: None,
            subcategory: None,
        }
    }

    #[test]
    fn test_sampling_is_seeded_and_ordered() {
        let acts: Vec<ActivityRecord> = (0..20).map(|i| record(&format!("a{i:02}"), "db")).collect();
        let refs: Vec<&ActivityRecord> = acts.iter().collect();
        let a = sample_activities(refs.clone(), 5, &mut StdRng::seed_from_u64(7));
        let b = sample_activities(refs.clone(), 5, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0].code < w[1].code));
        assert_eq!(sample_activities(refs, 50, &mut StdRng::seed_from_u64(7)).len(), 20);
    }

    /// Fails on activity "bad" and on the hazardous method.
    struct FlakySolver {
        current: String,
    }

    impl ImpactSolver for FlakySolver {
        fn factorize(&mut self, code: &str) -> Result<(), MacroLcaError> {
            if code == "bad" {
                return Err(MacroLcaError::Solver("singular technosphere matrix".into()));
            }
            self.current = code.to_string();
            Ok(())
        }

        fn score(&mut self, method: &ImpactMethod) -> Result<f64, MacroLcaError> {
            if method.indicator().starts_with("Hazardous") {
                return Err(MacroLcaError::Solver("no characterization factors".into()));
            }
            Ok(self.current.len() as f64)
        }
    }

    #[test]
    fn test_failures_leave_pairs_out() {
        let acts = vec![record("ok", "db"), record("bad", "db"), record("other", "db2")];
        let methods = select_methods(&catalog(), &MethodSelection::default()).unwrap();
        let mut solver = FlakySolver { current: String::new() };
        let out = calculate_database(&mut solver, "db", &acts, &methods, None, &mut StdRng::seed_from_u64(1));

        assert_eq!(out.activities, 2);
        assert_eq!(out.table.records.len(), 1);
        let row = &out.table.records[0];
        assert_eq!(row.code, "ok");
        assert_eq!(row.scores.len(), 2);
        assert!(!row.scores.contains_key("Hazardous (kg)"));
        // one pair failure for "ok", one factorization failure for "bad"
        assert_eq!(out.failures.len(), 2);
        assert!(out.failures.iter().any(|f| f.code == "bad" && f.method.is_none()));
    }

    #[test]
    fn test_run_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("db_markets_log.txt");
        let log = RunLog::new();
        log.append(&path, "first").unwrap();
        log.append(&path, "second").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().ends_with("second"));
    }
}
