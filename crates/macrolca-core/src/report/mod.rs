//! Plots, regression statistics and scenario summary tables built from the
//! processed results.

pub mod stats;
pub mod svg;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MacroLcaError;
use crate::layout::{file_stem, DataLayout};
use crate::process::{ProcessedRecord, ProcessedTable};
use stats::{describe, format_sci, log_regression, LogBase, Regression};
use svg::{BoxGroup, BoxPlot, ScatterPlot, ScatterPoint};

const UNCATEGORISED: &str = "Uncategorised";
const FIT_SAMPLES: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Rows are restricted to this `Database` label.
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_waste_methods")]
    pub waste_methods: Vec<String>,
    #[serde(default = "default_impact_methods")]
    pub impact_methods: Vec<String>,
}

fn default_database() -> String {
    "ecoinvent-default".to_string()
}

fn default_waste_methods() -> Vec<String> {
    vec![
        "Total waste (kg/kg)".to_string(),
        "Hazardous waste (kg/kg)".to_string(),
    ]
}

fn default_impact_methods() -> Vec<String> {
    vec![
        "Ecosystem damage (species-year/kg)".to_string(),
        "Human health damage (DALY/kg)".to_string(),
        "Natural resource scarcity (USD2013/kg)".to_string(),
    ]
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            database: default_database(),
            waste_methods: default_waste_methods(),
            impact_methods: default_impact_methods(),
        }
    }
}

impl ReportOptions {
    /// Columns that get a box plot.
    pub fn box_methods(&self) -> Vec<String> {
        self.impact_methods
            .iter()
            .chain(&self.waste_methods)
            .cloned()
            .collect()
    }
}

fn rows_for<'a>(table: &'a ProcessedTable, database: &str) -> impl Iterator<Item = &'a ProcessedRecord> {
    let database = database.to_string();
    table.records.iter().filter(move |r| r.label.database == database)
}

fn positive(r: &ProcessedRecord, column: &str) -> Option<f64> {
    r.values.get(column).copied().filter(|v| v.is_finite() && *v > 0.0)
}

/// One box plot per method, grouped by product category; non-positive values
/// are left out so the log axis stays defined.
pub fn box_plots(table: &ProcessedTable, options: &ReportOptions) -> Vec<BoxPlot> {
    let mut plots = Vec::new();
    for method in options.box_methods() {
        if !table.indicators.contains(&method) {
            tracing::warn!(method = %method, "column not in results; no box plot");
            continue;
        }
        let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for r in rows_for(table, &options.database) {
            if let Some(v) = positive(r, &method) {
                let group = r.category.clone().unwrap_or_else(|| UNCATEGORISED.to_string());
                groups.entry(group).or_default().push(v);
            }
        }
        let groups: Vec<BoxGroup> = groups
            .into_iter()
            .map(|(name, v)| BoxGroup { name, values: vec![v] })
            .collect();
        if groups.is_empty() {
            tracing::warn!(method = %method, database = %options.database, "no positive values; no box plot");
            continue;
        }
        plots.push(BoxPlot {
            title: method.clone(),
            group_label: "Product category".to_string(),
            value_label: method,
            log_scale: true,
            show_outliers: true,
            series: Vec::new(),
            groups,
        });
    }
    plots
}

/// `Total waste (kg/kg)` becomes `total_waste_kg-kg`.
pub fn trend_slug(method: &str) -> String {
    method
        .to_lowercase()
        .replace('/', "-")
        .replace(['(', ')', ','], "")
        .replace(' ', "_")
        .replace("__", "_")
}

/// Scenario rows per method: one group per year, one box per scenario
/// database, on a linear axis without outliers. Returns file stems with
/// the plots.
pub fn trend_plots(table: &ProcessedTable, options: &ReportOptions) -> Vec<(String, BoxPlot)> {
    let rows: Vec<&ProcessedRecord> = table
        .records
        .iter()
        .filter(|r| r.label.database != options.database && r.label.year.is_some())
        .collect();
    if rows.is_empty() {
        tracing::debug!("no scenario rows; no trend plots");
        return Vec::new();
    }
    let mut databases: Vec<String> = rows.iter().map(|r| r.label.database.clone()).collect();
    databases.sort();
    databases.dedup();
    let mut years: Vec<u16> = rows.iter().filter_map(|r| r.label.year).collect();
    years.sort_unstable();
    years.dedup();

    let mut plots = Vec::new();
    for method in options.box_methods() {
        if !table.indicators.contains(&method) {
            continue;
        }
        let groups: Vec<BoxGroup> = years
            .iter()
            .map(|year| BoxGroup {
                name: year.to_string(),
                values: databases
                    .iter()
                    .map(|db| {
                        rows.iter()
                            .filter(|r| r.label.year == Some(*year) && r.label.database == *db)
                            .filter_map(|r| r.values.get(&method).copied())
                            .filter(|v| v.is_finite())
                            .collect()
                    })
                    .collect(),
            })
            .collect();
        if groups.iter().all(|g| g.values.iter().all(Vec::is_empty)) {
            continue;
        }
        plots.push((
            format!("{}__by-year_by-database__linear", trend_slug(&method)),
            BoxPlot {
                title: format!("{method}: by year and database"),
                group_label: "Year".to_string(),
                value_label: method,
                log_scale: false,
                show_outliers: false,
                series: databases.clone(),
                groups,
            },
        ));
    }
    plots
}

/// One row of the regression statistics CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionRow {
    #[serde(rename = "X (waste)")]
    pub x: String,
    #[serde(rename = "Y (impact)")]
    pub y: String,
    pub n: usize,
    pub r: f64,
    pub p: f64,
    #[serde(rename = "R2")]
    pub r2: f64,
    pub b: f64,
    pub a: f64,
    pub k_backtransform: f64,
}

impl RegressionRow {
    fn new(x: &str, y: &str, reg: &Regression) -> Self {
        RegressionRow {
            x: x.to_string(),
            y: y.to_string(),
            n: reg.n,
            r: reg.r,
            p: reg.p,
            r2: reg.r2,
            b: reg.b,
            a: reg.a,
            k_backtransform: reg.k_backtransform,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScatterAnalysis {
    /// File stem and plot.
    pub plots: Vec<(String, ScatterPlot)>,
    pub log10: Vec<RegressionRow>,
    pub ln: Vec<RegressionRow>,
}

/// Waste indicator against impact indicator, fitted in log10 and ln space.
pub fn scatter_analysis(table: &ProcessedTable, options: &ReportOptions) -> ScatterAnalysis {
    let mut out = ScatterAnalysis::default();
    for x in &options.waste_methods {
        for y in &options.impact_methods {
            let rows: Vec<(&ProcessedRecord, f64, f64)> = rows_for(table, &options.database)
                .filter_map(|r| Some((r, positive(r, x)?, positive(r, y)?)))
                .collect();
            if rows.is_empty() {
                continue;
            }
            let pairs: Vec<(f64, f64)> = rows.iter().map(|(_, a, b)| (*a, *b)).collect();

            for base in [LogBase::Log10, LogBase::Ln] {
                let Some(reg) = log_regression(&pairs, base) else {
                    continue;
                };
                let row = RegressionRow::new(x, y, &reg);
                let plot = scatter_plot(x, y, &rows, &reg, base);
                let stem = format!("scatter_{}__vs__{}_{}", file_stem(x), file_stem(y), base.name());
                out.plots.push((stem, plot));
                match base {
                    LogBase::Log10 => out.log10.push(row),
                    LogBase::Ln => out.ln.push(row),
                }
            }
        }
    }
    out
}

fn hover(r: &ProcessedRecord) -> String {
    format!(
        "{}\n{}\n{} / {}\n{} ({})",
        r.name,
        r.reference_product.as_deref().unwrap_or(""),
        r.category.as_deref().unwrap_or(UNCATEGORISED),
        r.subcategory.as_deref().unwrap_or(""),
        r.location,
        r.unit
    )
}

fn scatter_plot(
    x: &str,
    y: &str,
    rows: &[(&ProcessedRecord, f64, f64)],
    reg: &Regression,
    base: LogBase,
) -> ScatterPlot {
    let group = |r: &ProcessedRecord| r.category.clone().unwrap_or_else(|| UNCATEGORISED.to_string());
    let stats_line = format!("r={:.2}, R²={:.2}, b={:.2}, n={}", reg.r, reg.r2, reg.b, reg.n);
    let (x_min, x_max) = rows
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v, _)| (lo.min(*v), hi.max(*v)));

    match base {
        LogBase::Log10 => {
            let (l0, l1) = (x_min.log10(), x_max.log10());
            let fit = (0..FIT_SAMPLES)
                .map(|i| {
                    let xv = 10f64.powf(l0 + (l1 - l0) * i as f64 / (FIT_SAMPLES - 1) as f64);
                    (xv, reg.predict(xv))
                })
                .collect();
            ScatterPlot {
                title: format!("{x} vs {y} (log10) {stats_line}"),
                x_label: x.to_string(),
                y_label: y.to_string(),
                log_scale: true,
                points: rows
                    .iter()
                    .map(|(r, xv, yv)| ScatterPoint { x: *xv, y: *yv, group: group(r), hover: hover(r) })
                    .collect(),
                fit,
            }
        }
        LogBase::Ln => {
            let (l0, l1) = (x_min.ln(), x_max.ln());
            let fit = (0..FIT_SAMPLES)
                .map(|i| {
                    let xv = l0 + (l1 - l0) * i as f64 / (FIT_SAMPLES - 1) as f64;
                    (xv, reg.a + reg.b * xv)
                })
                .collect();
            ScatterPlot {
                title: format!("ln({x}) vs ln({y}) {stats_line}"),
                x_label: format!("ln({x})"),
                y_label: format!("ln({y})"),
                log_scale: false,
                points: rows
                    .iter()
                    .map(|(r, xv, yv)| ScatterPoint { x: xv.ln(), y: yv.ln(), group: group(r), hover: hover(r) })
                    .collect(),
                fit,
            }
        }
    }
}

fn write_chart(
    dir: &Path,
    stem: &str,
    title: &str,
    svg: &str,
    points: &[&str],
) -> Result<Vec<PathBuf>, MacroLcaError> {
    std::fs::create_dir_all(dir)?;
    let svg_path = dir.join(format!("{stem}.svg"));
    let html_path = dir.join(format!("{stem}.html"));
    std::fs::write(&svg_path, svg)?;
    std::fs::write(&html_path, svg::html_page(title, svg, points))?;
    Ok(vec![svg_path, html_path])
}

/// Render box, trend and scatter plots and write the regression CSVs.
pub fn write_plots(
    layout: &DataLayout,
    table: &ProcessedTable,
    options: &ReportOptions,
) -> Result<Vec<PathBuf>, MacroLcaError> {
    let mut written = Vec::new();
    for plot in box_plots(table, options) {
        let svg = svg::render_box_plot(&plot)?;
        let stem = format!("boxplot_{}", file_stem(&plot.title));
        written.extend(write_chart(&layout.boxplot_dir(), &stem, &plot.title, &svg, &[])?);
    }
    for (stem, plot) in trend_plots(table, options) {
        let svg = svg::render_box_plot(&plot)?;
        written.extend(write_chart(&layout.trend_dir(), &stem, &plot.title, &svg, &[])?);
    }

    let scatter = scatter_analysis(table, options);
    for (stem, plot) in &scatter.plots {
        let svg = svg::render_scatter_plot(plot)?;
        let hovers: Vec<&str> = plot.points.iter().map(|p| p.hover.as_str()).collect();
        written.extend(write_chart(&layout.scatter_dir(), stem, &plot.title, &svg, &hovers)?);
    }
    for (base, rows) in [(LogBase::Log10, &scatter.log10), (LogBase::Ln, &scatter.ln)] {
        if rows.is_empty() {
            continue;
        }
        let path = layout.regression_stats(base.name());
        write_csv(&path, rows)?;
        written.push(path);
    }
    tracing::info!(files = written.len(), "wrote plots");
    Ok(written)
}

/// Comma-separated, one row per serialized record.
fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), MacroLcaError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut w = csv::Writer::from_path(path)?;
    for r in rows {
        w.serialize(r)?;
    }
    w.flush()?;
    Ok(())
}

/// Descriptive statistics of one method for one (SSP, year).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SummaryRow {
    pub method: String,
    pub letter: String,
    #[serde(rename = "SSP")]
    pub ssp: String,
    pub year: u16,
    pub median: String,
    pub std: String,
    pub min: String,
    pub max: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryOptions {
    /// Empty means every indicator column of the table.
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default = "default_ssps")]
    pub ssps: Vec<String>,
    #[serde(default = "default_years")]
    pub years: Vec<u16>,
}

fn default_ssps() -> Vec<String> {
    vec!["SSP1".to_string(), "SSP5".to_string()]
}

fn default_years() -> Vec<u16> {
    vec![2020, 2030, 2040, 2050]
}

impl Default for SummaryOptions {
    fn default() -> Self {
        SummaryOptions {
            methods: Vec::new(),
            ssps: default_ssps(),
            years: default_years(),
        }
    }
}

fn letter(i: usize) -> String {
    let c = (b'a' + (i % 26) as u8) as char;
    c.to_string()
}

/// One row per (method, SSP, year), in that nesting order. Cells of empty
/// groups read `nan`.
pub fn summarize(table: &ProcessedTable, options: &SummaryOptions) -> Vec<SummaryRow> {
    let methods = if options.methods.is_empty() {
        table.indicators.clone()
    } else {
        options.methods.clone()
    };
    let mut rows = Vec::new();
    for (i, method) in methods.iter().enumerate() {
        for ssp in &options.ssps {
            for year in &options.years {
                let values: Vec<f64> = table
                    .records
                    .iter()
                    .filter(|r| r.label.ssp == *ssp && r.label.year == Some(*year))
                    .filter_map(|r| r.values.get(method).copied())
                    .collect();
                let s = describe(&values);
                rows.push(SummaryRow {
                    method: method.clone(),
                    letter: letter(i),
                    ssp: ssp.clone(),
                    year: *year,
                    median: format_sci(s.median),
                    std: format_sci(s.std),
                    min: format_sci(s.min),
                    max: format_sci(s.max),
                });
            }
        }
    }
    rows
}

/// `Waste - Total` becomes `waste__total_summary_all_scenarios.csv`.
pub fn summary_file_name(method: &str) -> String {
    format!(
        "{}_summary_all_scenarios.csv",
        file_stem(method).replace('-', "").to_lowercase()
    )
}

/// One CSV per method plus `all_methods_summary_all_scenarios.csv`.
pub fn write_summaries(dir: &Path, rows: &[SummaryRow]) -> Result<Vec<PathBuf>, MacroLcaError> {
    let mut by_method: BTreeMap<&str, Vec<&SummaryRow>> = BTreeMap::new();
    for r in rows {
        by_method.entry(r.method.as_str()).or_default().push(r);
    }
    let mut written = Vec::new();
    for (method, group) in by_method {
        let path = dir.join(summary_file_name(method));
        write_csv(&path, &group)?;
        written.push(path);
    }
    let all = dir.join("all_methods_summary_all_scenarios.csv");
    write_csv(&all, rows)?;
    written.push(all);
    Ok(written)
}
