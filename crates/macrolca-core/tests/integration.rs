//! End-to-end pipeline tests: filter, calculate, process, report.
//!
//! Uses a MockSolverFactory that returns fixed scores per indicator, so the
//! tests run without an external LCA solver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use macrolca_core::calc::{CalcOptions, ImpactSolver, MethodSelection, SolverFactory};
use macrolca_core::config::PipelineConfig;
use macrolca_core::error::MacroLcaError;
use macrolca_core::layout::DataLayout;
use macrolca_core::model::{Activity, Classification, Database, ImpactMethod, Unit};
use macrolca_core::report::{ReportOptions, SummaryOptions};
use macrolca_core::rules::builtin;
use macrolca_core::store::{Project, ProjectStore};
use macrolca_core::{
    calculate, filter_project, load_processed, plot_results, process_project, summarize_results, table,
};

const BASELINE: &str = "ecoinvent-3.9.1-cutoff";
const SCENARIOS: [&str; 2] = ["SSP5-Base-2030", "SSP1-PkBudg500-2030"];

struct MockSolverFactory {
    scores: HashMap<String, f64>,
    factorizations: Arc<AtomicUsize>,
}

struct MockSolver {
    scores: HashMap<String, f64>,
    factorizations: Arc<AtomicUsize>,
    ready: bool,
}

impl SolverFactory for MockSolverFactory {
    fn open(&self, _project: &Project, _database: &str) -> Result<Box<dyn ImpactSolver>, MacroLcaError> {
        Ok(Box::new(MockSolver {
            scores: self.scores.clone(),
            factorizations: Arc::clone(&self.factorizations),
            ready: false,
        }))
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

impl ImpactSolver for MockSolver {
    fn factorize(&mut self, _code: &str) -> Result<(), MacroLcaError> {
        self.factorizations.fetch_add(1, Ordering::SeqCst);
        self.ready = true;
        Ok(())
    }

    fn score(&mut self, method: &ImpactMethod) -> Result<f64, MacroLcaError> {
        if !self.ready {
            return Err(MacroLcaError::Solver("score before factorize".into()));
        }
        self.scores
            .get(method.indicator())
            .copied()
            .ok_or_else(|| MacroLcaError::Solver(format!("no factors for {method}")))
    }
}

fn mock_factory() -> MockSolverFactory {
    let scores = [
        ("Total (kg)", 2.0),
        ("Total (m3)", 0.001),
        ("Hazardous (kg)", 0.5),
        ("Hazardous (m3)", 0.0),
        ("human health", 1e-6),
        ("ecosystem quality", 2e-9),
        ("natural resources", 0.05),
    ];
    MockSolverFactory {
        scores: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        factorizations: Arc::new(AtomicUsize::new(0)),
    }
}

fn method(family: &str, category: &str, indicator: &str) -> ImpactMethod {
    ImpactMethod(family.into(), category.into(), indicator.into())
}

fn catalog() -> Vec<ImpactMethod> {
    let wf = "WasteAndMaterialFootprint";
    let recipe = "ReCiPe 2016 v1.03, endpoint (H)";
    vec![
        method(wf, "Waste: Total combined", "Total (kg)"),
        method(wf, "Waste: Total combined", "Total (m3)"),
        method(wf, "Waste: Hazardous combined", "Hazardous (kg)"),
        method(wf, "Waste: Hazardous combined", "Hazardous (m3)"),
        method(recipe, "total: human health", "human health"),
        method(recipe, "total: ecosystem quality", "ecosystem quality"),
        method(recipe, "total: natural resources", "natural resources"),
        method(recipe, "human health", "climate change"),
        method("EF v3.1", "climate change", "GWP100"),
    ]
}

fn activity(code: &str, name: &str, location: &str, unit: Unit, cpc: &str) -> Activity {
    Activity {
        code: code.into(),
        name: name.into(),
        unit,
        location: location.into(),
        activity_type: Some("market activity".into()),
        reference_product: Some(name.trim_start_matches("market for ").into()),
        classifications: Some(vec![
            Classification {
                system: "ISIC rev.4 ecoinvent".into(),
                value: "1622:Manufacture of builders' carpentry and joinery".into(),
            },
            Classification {
                system: "CPC".into(),
                value: cpc.into(),
            },
        ]),
        production_amount: Some(1.0),
        price: None,
        exchanges: vec![],
    }
}

/// Three market activities: one kept, one rejected on "waste", one on location.
fn three_row_database() -> Database {
    Database {
        name: BASELINE.into(),
        depends: vec!["biosphere3".into()],
        activities: vec![
            activity("a", "market for sawnwood, board", "GLO", Unit::CubicMeter, "381: Furniture"),
            activity("b", "market for waste wood, untreated", "GLO", Unit::Kilogram, "39280: Wastes of wood"),
            activity("c", "market for sawnwood, beam", "CH", Unit::CubicMeter, "31100: Wood, sawn"),
        ],
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    project: Project,
    layout: DataLayout,
    config: PipelineConfig,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        store_dir: dir.path().join("projects"),
        data_dir: dir.path().join("data"),
        ..PipelineConfig::default()
    };
    let store = ProjectStore::new(&config.store_dir);
    let project = store.create_project(&config.project).unwrap();
    project.write_database(&three_row_database()).unwrap();
    project
        .write_database(&Database {
            name: "biosphere3".into(),
            depends: vec![],
            activities: vec![],
        })
        .unwrap();
    project.import_methods(&catalog()).unwrap();
    let layout = config.layout();
    Fixture {
        _dir: dir,
        project,
        layout,
        config,
    }
}

fn run_filter(f: &Fixture) -> macrolca_core::FilterRun {
    let databases = f.config.selected_databases(&f.project).unwrap();
    assert_eq!(databases, vec![BASELINE.to_string()]);
    filter_project(
        &f.project,
        &databases,
        &f.config.filter_rules().unwrap(),
        &f.config.category_table().unwrap(),
        &f.layout,
        &f.config.title,
    )
    .unwrap()
}

fn run_calc(f: &Fixture, factory: &MockSolverFactory) -> macrolca_core::CalcRun {
    let databases = f.config.selected_databases(&f.project).unwrap();
    calculate(
        &f.project,
        &databases,
        &f.layout,
        factory,
        &MethodSelection::default(),
        &f.config.calc_options(),
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Filter: 3 rows in, 1 row out
// ---------------------------------------------------------------------------
#[test]
fn filter_keeps_one_of_three() {
    let f = fixture();
    let run = run_filter(&f);

    assert_eq!(run.outcomes.len(), 1);
    assert_eq!(run.outcomes[0].total, 3);
    assert_eq!(run.merged.len(), 1);
    assert_eq!(run.merged[0].code, "a");
    assert_eq!(run.merged[0].category.as_deref(), Some("ProcBio"));

    let from_disk = table::read_activities(&run.merged_path).unwrap();
    assert_eq!(from_disk, run.merged);
    assert!(f
        .layout
        .filtered_activities(&f.config.title, f.project.name(), BASELINE)
        .is_file());
}

#[test]
fn filter_rerun_is_byte_identical() {
    let f = fixture();
    let first = std::fs::read(run_filter(&f).merged_path).unwrap();
    let second = std::fs::read(run_filter(&f).merged_path).unwrap();
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Calculation: one factorization per activity, one score per selected method
// ---------------------------------------------------------------------------
#[test]
fn calculate_scores_selected_methods() {
    let f = fixture();
    run_filter(&f);
    let factory = mock_factory();
    let run = run_calc(&f, &factory);

    assert_eq!(run.estimate.methods, 7);
    assert_eq!(factory.factorizations.load(Ordering::SeqCst), 1);
    assert_eq!(run.combined.records.len(), 1);
    assert_eq!(run.combined.methods.len(), 7);
    assert!(!run.combined.methods.contains(&"GWP100".to_string()));
    assert_eq!(run.outcome.failures(), 0);

    assert!(f.layout.raw_results(BASELINE, "markets", "csv").is_file());
    assert!(f.layout.raw_results(BASELINE, "markets", "json").is_file());
    let log = std::fs::read_to_string(f.layout.database_log(BASELINE, "markets")).unwrap();
    assert!(log.contains("Completed 7 LCIA calculations"));
}

/// Two premise databases, listed out of name order.
fn scenario_databases(f: &Fixture) -> Vec<String> {
    for name in SCENARIOS {
        let mut db = three_row_database();
        db.name = name.into();
        f.project.write_database(&db).unwrap();
    }
    SCENARIOS.iter().map(|s| s.to_string()).collect()
}

#[test]
fn parallel_run_over_scenario_databases_keeps_order() {
    let f = fixture();
    let databases = scenario_databases(&f);
    filter_project(
        &f.project,
        &databases,
        &f.config.filter_rules().unwrap(),
        &f.config.category_table().unwrap(),
        &f.layout,
        &f.config.title,
    )
    .unwrap();

    let run_with = |parallel: bool, factory: &MockSolverFactory| {
        let options = CalcOptions {
            parallel,
            workers: 2,
            ..f.config.calc_options()
        };
        calculate(
            &f.project,
            &databases,
            &f.layout,
            factory,
            &MethodSelection::default(),
            &options,
        )
        .unwrap()
    };

    let factory = mock_factory();
    let parallel = run_with(true, &factory);
    assert_eq!(factory.factorizations.load(Ordering::SeqCst), 2);

    let order: Vec<&str> = parallel.outcome.databases.iter().map(|d| d.database.as_str()).collect();
    assert_eq!(order, SCENARIOS.to_vec());
    assert!(parallel.outcome.databases.iter().all(|d| d.table.records.len() == 1));

    let rows: Vec<&str> = parallel.combined.records.iter().map(|r| r.database.as_str()).collect();
    assert_eq!(rows, SCENARIOS.to_vec());
    for db in SCENARIOS {
        let raw = table::read_scores(&f.layout.raw_results(db, "markets", "csv")).unwrap();
        assert_eq!(raw.records.len(), 1);
        assert_eq!(raw.records[0].database, db);
        assert!(f.layout.raw_results(db, "markets", "json").is_file());
    }

    let sequential = run_with(false, &mock_factory());
    assert_eq!(sequential.combined, parallel.combined);
}

#[test]
fn limited_run_writes_separate_combined_file() {
    let f = fixture();
    run_filter(&f);
    let options = CalcOptions {
        limit: Some(1),
        seed: Some(3),
        ..f.config.calc_options()
    };
    let databases = f.config.selected_databases(&f.project).unwrap();
    calculate(
        &f.project,
        &databases,
        &f.layout,
        &mock_factory(),
        &MethodSelection::default(),
        &options,
    )
    .unwrap();
    assert!(f.layout.combined_raw_results("markets", Some(1), "csv").is_file());
    assert!(!f.layout.combined_raw_results("markets", None, "csv").is_file());
}

// ---------------------------------------------------------------------------
// Processing: 1 joined record, cubic meters converted, columns relabelled
// ---------------------------------------------------------------------------
#[test]
fn end_to_end_single_record() {
    let f = fixture();
    run_filter(&f);
    run_calc(&f, &mock_factory());

    let profile = builtin::load_profile("waste-footprint").unwrap();
    let run = process_project(f.project.name(), &f.layout, "markets", None, &profile, None).unwrap();

    assert_eq!(run.join.matched, 1);
    assert_eq!(run.join.dropped(), 0);
    assert_eq!(run.table.records.len(), 1);

    let rec = &run.table.records[0];
    assert_eq!(rec.code, "a");
    assert_eq!(rec.unit, "kg");
    assert_eq!(rec.label.database, "ecoinvent-default");
    assert_eq!(rec.label.year, Some(2020));
    assert_eq!(rec.category.as_deref(), Some("ProcBio"));

    // (2 kg + 1000 * 0.001 m3) per m3 of product, times 1000
    assert!((rec.values["Total waste (kg/kg)"] - 3000.0).abs() < 1e-9);
    assert!((rec.values["Hazardous waste (kg/kg)"] - 500.0).abs() < 1e-9);
    assert!((rec.values["Human health damage (DALY/kg)"] - 1e-3).abs() < 1e-15);
    assert!((rec.values["Hazardous waste (%)"] - 100.0 * 500.0 / 3000.0).abs() < 1e-9);

    let cooked = table::read_processed(&run.cooked_path).unwrap();
    assert_eq!(cooked.records.len(), 1);
    assert_eq!(cooked.indicators, run.table.indicators);
}

#[test]
fn join_reports_rows_missing_from_metadata() {
    let f = fixture();
    run_filter(&f);
    run_calc(&f, &mock_factory());

    // a score row for an activity the filter never kept
    let path = f.layout.combined_raw_results("markets", None, "csv");
    let mut scores = table::read_scores(&path).unwrap();
    let mut extra = scores.records[0].clone();
    extra.code = "zzz".into();
    scores.records.push(extra);
    table::write_scores(&path, &scores).unwrap();

    let profile = builtin::load_profile("waste-footprint").unwrap();
    let run = process_project(f.project.name(), &f.layout, "markets", None, &profile, None).unwrap();
    assert_eq!(run.join.matched, 1);
    assert_eq!(run.join.results_only, 1);
    assert_eq!(run.join.activities_only, 0);
    assert_eq!(run.table.records.len(), 1);
}

#[test]
fn prices_produce_priced_table() {
    let f = fixture();
    run_filter(&f);
    run_calc(&f, &mock_factory());

    let prices = f.layout.root().join("prices.csv");
    std::fs::write(&prices, "name;location;amount\nmarket for sawnwood, board;GLO;212.5\n").unwrap();
    let profile = builtin::load_profile("waste-footprint").unwrap();
    let run = process_project(f.project.name(), &f.layout, "markets", None, &profile, Some(&prices)).unwrap();

    let priced = table::read_processed(run.priced_path.as_ref().unwrap()).unwrap();
    assert!(priced.priced);
    assert_eq!(priced.records[0].price.map(|p| p.to_string()), Some("212.5".to_string()));
}

#[test]
fn process_without_prices_discards_earlier_priced_table() {
    let f = fixture();
    run_filter(&f);
    run_calc(&f, &mock_factory());

    let prices = f.layout.root().join("prices.csv");
    std::fs::write(&prices, "name;location;amount\nmarket for sawnwood, board;GLO;212.5\n").unwrap();
    let profile = builtin::load_profile("waste-footprint").unwrap();
    process_project(f.project.name(), &f.layout, "markets", None, &profile, Some(&prices)).unwrap();
    assert!(load_processed(&f.layout, "markets").unwrap().priced);

    let mut factory = mock_factory();
    factory.scores.insert("Total (kg)".into(), 5.0);
    run_calc(&f, &factory);
    let run = process_project(f.project.name(), &f.layout, "markets", None, &profile, None).unwrap();
    assert!(run.priced_path.is_none());
    assert!(!f.layout.priced_results("markets").exists());

    let loaded = load_processed(&f.layout, "markets").unwrap();
    assert!(!loaded.priced);
    // (5 kg + 1000 * 0.001 m3) per m3 of product, times 1000
    assert!((loaded.records[0].values["Total waste (kg/kg)"] - 6000.0).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------
#[test]
fn report_stage_writes_files() {
    let f = fixture();
    run_filter(&f);
    run_calc(&f, &mock_factory());
    let profile = builtin::load_profile("waste-footprint").unwrap();
    process_project(f.project.name(), &f.layout, "markets", None, &profile, None).unwrap();

    let plots = plot_results(&f.layout, "markets", &ReportOptions::default()).unwrap();
    assert!(plots.iter().any(|p| p.extension().is_some_and(|e| e == "svg")));
    assert!(f
        .layout
        .boxplot_dir()
        .join("boxplot_Total_waste_(kg_kg).html")
        .is_file());

    let summaries = summarize_results(&f.layout, "markets", &SummaryOptions::default()).unwrap();
    assert!(summaries
        .iter()
        .any(|p| p.ends_with("all_methods_summary_all_scenarios.csv")));
}

#[test]
fn calculate_without_filter_output_fails() {
    let f = fixture();
    let databases = f.config.selected_databases(&f.project).unwrap();
    let result = calculate(
        &f.project,
        &databases,
        &f.layout,
        &mock_factory(),
        &MethodSelection::default(),
        &f.config.calc_options(),
    );
    assert!(result.is_err());
}
