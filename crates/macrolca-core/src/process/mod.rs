//! Turning raw scores into the processed results table.

pub mod label;
pub mod prices;

pub use label::ScenarioLabel;
pub use prices::{attach_prices, load_price_table, PriceTable};

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{ActivityRecord, RecordKey, ScoreTable, Unit};
use crate::rules::schema::{CombinedIndicatorDef, ProcessingProfile, RatioIndicatorDef};

/// One row of the processed table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub code: String,
    pub name: String,
    pub reference_product: Option<String>,
    pub unit: String,
    pub location: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub label: ScenarioLabel,
    pub price: Option<Decimal>,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTable {
    /// Indicator columns in output order.
    pub indicators: Vec<String>,
    pub records: Vec<ProcessedRecord>,
    /// Whether a price column is carried.
    pub priced: bool,
}

/// Activity metadata joined with its scores.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub activity: ActivityRecord,
    pub scores: BTreeMap<String, f64>,
}

/// Row accounting for the inner join of activities and scores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReport {
    pub matched: usize,
    /// Score rows with no activity metadata; dropped.
    pub results_only: usize,
    /// Activities that were never scored; dropped.
    pub activities_only: usize,
    /// Repeated keys among activities; only the first is joined.
    pub duplicates: usize,
}

impl JoinReport {
    pub fn dropped(&self) -> usize {
        self.results_only + self.activities_only
    }
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub records: Vec<JoinedRecord>,
    pub report: JoinReport,
}

#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub table: ProcessedTable,
    pub join: JoinReport,
    /// Rows removed because their unit is not kept.
    pub unit_dropped: usize,
}

/// Remove method columns listed in `drop`.
pub fn drop_columns(scores: &mut ScoreTable, drop: &[String]) {
    scores.methods.retain(|m| !drop.contains(m));
    for r in &mut scores.records {
        r.scores.retain(|m, _| !drop.contains(m));
    }
}

/// Fold each mass/volume pair into one column: `mass + density * volume`.
///
/// A side that is absent for a row counts as zero; a row with neither side
/// gets no value. The input columns are removed.
pub fn combine_indicators(scores: &mut ScoreTable, defs: &[CombinedIndicatorDef], density: f64) {
    for def in defs {
        let present = scores.methods.iter().any(|m| *m == def.mass || *m == def.volume);
        if !present {
            tracing::debug!(output = %def.output, "no inputs for combined indicator");
            continue;
        }
        for r in &mut scores.records {
            let mass = r.scores.remove(&def.mass);
            let volume = r.scores.remove(&def.volume);
            if mass.is_some() || volume.is_some() {
                let v = mass.unwrap_or(0.0) + density * volume.unwrap_or(0.0);
                r.scores.insert(def.output.clone(), v);
            }
        }
        scores.methods.retain(|m| *m != def.mass && *m != def.volume);
        if !scores.methods.contains(&def.output) {
            scores.methods.push(def.output.clone());
        }
    }
}

/// Inner join on (code, database, name).
pub fn join_results(activities: &[ActivityRecord], scores: &ScoreTable) -> JoinOutcome {
    let mut report = JoinReport::default();
    let mut by_key: HashMap<RecordKey, &ActivityRecord> = HashMap::new();
    for a in activities {
        match by_key.entry(a.key()) {
            Entry::Occupied(_) => report.duplicates += 1,
            Entry::Vacant(slot) => {
                slot.insert(a);
            }
        }
    }

    let mut seen: HashSet<RecordKey> = HashSet::new();
    let mut records = Vec::new();
    for s in &scores.records {
        let key = s.key();
        match by_key.get(&key) {
            Some(a) => {
                report.matched += 1;
                records.push(JoinedRecord {
                    activity: (*a).clone(),
                    scores: s.scores.clone(),
                });
                seen.insert(key);
            }
            None => report.results_only += 1,
        }
    }
    report.activities_only = by_key.keys().filter(|k| !seen.contains(*k)).count();

    if report.dropped() > 0 {
        tracing::warn!(
            results_only = report.results_only,
            activities_only = report.activities_only,
            "rows dropped by the activity/result join"
        );
    }
    JoinOutcome { records, report }
}

/// Keep rows whose unit is listed, scale volume rows by `density` and relabel
/// them as kilograms.
pub fn harmonize_units(
    records: Vec<JoinedRecord>,
    keep_units: &[String],
    density: f64,
) -> (Vec<JoinedRecord>, usize) {
    let keep: Vec<Unit> = keep_units.iter().map(|u| Unit::from_str_loose(u)).collect();
    let before = records.len();
    let kept: Vec<JoinedRecord> = records
        .into_iter()
        .filter(|r| keep.is_empty() || keep.contains(&r.activity.unit))
        .map(|mut r| {
            if r.activity.unit.is_volume() {
                for v in r.scores.values_mut() {
                    *v *= density;
                }
                r.activity.unit = Unit::Kilogram;
            }
            r
        })
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Add percentage columns: `100 * sum(numerators) / denominator`.
///
/// A zero denominator is not guarded and yields `NaN` or infinity. Ratios
/// whose inputs are not all columns of the table are skipped.
pub fn derive_ratios(
    records: &mut [JoinedRecord],
    indicators: &mut Vec<String>,
    defs: &[RatioIndicatorDef],
) {
    for def in defs {
        let missing: Vec<&String> = def
            .numerators
            .iter()
            .chain(std::iter::once(&def.denominator))
            .filter(|c| !indicators.contains(c))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(output = %def.output, ?missing, "skipping ratio with missing columns");
            continue;
        }
        for r in records.iter_mut() {
            let nums: Option<f64> = def
                .numerators
                .iter()
                .map(|n| r.scores.get(n).copied())
                .sum();
            if let (Some(n), Some(d)) = (nums, r.scores.get(&def.denominator).copied()) {
                r.scores.insert(def.output.clone(), 100.0 * n / d);
            }
        }
        if !indicators.contains(&def.output) {
            indicators.push(def.output.clone());
        }
    }
}

/// Run the whole processing chain for one profile.
pub fn process_results(
    activities: &[ActivityRecord],
    mut scores: ScoreTable,
    profile: &ProcessingProfile,
) -> ProcessingOutcome {
    drop_columns(&mut scores, &profile.drop);
    combine_indicators(&mut scores, &profile.combined, profile.density);

    let JoinOutcome { records, report } = join_results(activities, &scores);
    let (mut records, unit_dropped) = harmonize_units(records, &profile.keep_units, profile.density);
    if unit_dropped > 0 {
        tracing::info!(unit_dropped, "dropped rows with units outside the kept set");
    }

    let mut indicators = scores.methods.clone();
    derive_ratios(&mut records, &mut indicators, &profile.ratios);

    let rename = |c: &String| profile.rename.get(c).cloned().unwrap_or_else(|| c.clone());
    let table = ProcessedTable {
        indicators: indicators.iter().map(rename).collect(),
        records: records
            .into_iter()
            .map(|r| {
                let mut database = r.activity.database.clone();
                if let Some(b) = &profile.baseline {
                    if database == b.from {
                        database = b.to.clone();
                    }
                }
                ProcessedRecord {
                    code: r.activity.code,
                    name: r.activity.name,
                    reference_product: r.activity.reference_product,
                    unit: r.activity.unit.short_label(),
                    location: r.activity.location,
                    category: r.activity.category,
                    subcategory: r.activity.subcategory,
                    label: ScenarioLabel::parse(&database),
                    price: None,
                    values: r.scores.iter().map(|(k, v)| (rename(k), *v)).collect(),
                }
            })
            .collect(),
        priced: false,
    };

    ProcessingOutcome {
        table,
        join: report,
        unit_dropped,
    }
}
