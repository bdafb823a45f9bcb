//! Activity selection: classification extraction, the filter predicate,
//! category assignment and the cross-database merge.

pub mod trace;

use crate::classify::categories::CategoryTable;
use crate::classify::codes::extract_codes;
use crate::model::{Activity, ActivityRecord, Database, Unit};
use crate::rules::schema::FilterRuleSet;
use std::collections::HashMap;
use trace::{FilterDecision, FilterDimension, FilterTrace, TraceSeverity, TraceWarning};

/// Result of filtering one database.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub database: String,
    /// Activities in the database before filtering.
    pub total: usize,
    pub records: Vec<ActivityRecord>,
    pub trace: FilterTrace,
    /// The database carries no classification data; everything passed
    /// through unfiltered.
    pub degraded: bool,
}

impl FilterOutcome {
    /// Kept records whose CPC code matched more than one category range.
    pub fn ambiguous(&self) -> usize {
        self.trace
            .decisions
            .iter()
            .filter(|d| d.kept && d.ambiguous_category)
            .count()
    }
}

/// Filter one database with `rules`, assigning categories from `table`.
pub fn filter_database(db: &Database, rules: &FilterRuleSet, table: &CategoryTable) -> FilterOutcome {
    let mut trace = FilterTrace::default();

    let has_classifications = db.activities.iter().any(|a| a.classifications.is_some());
    if !has_classifications && !db.activities.is_empty() {
        let message = format!(
            "no classification data in '{}'; skipping filters, all {} activities kept",
            db.name,
            db.activities.len()
        );
        tracing::warn!(database = %db.name, "{message}");
        trace.warnings.push(TraceWarning {
            database: db.name.clone(),
            message,
            severity: TraceSeverity::Important,
        });

        let records = db
            .activities
            .iter()
            .map(|a| ActivityRecord::from_activity(a, &db.name))
            .collect();
        return FilterOutcome {
            database: db.name.clone(),
            total: db.activities.len(),
            records,
            trace,
            degraded: true,
        };
    }

    let exclude: Vec<String> = rules.exclude.iter().map(|e| e.to_lowercase()).collect();
    let mut records = Vec::new();

    for activity in &db.activities {
        let codes = extract_codes(activity.classifications.as_deref().unwrap_or(&[]));
        let mut record = ActivityRecord::from_activity(activity, &db.name);
        record.isic = Some(codes.isic);
        record.cpc = Some(codes.cpc);

        let rejected_by = rejections(activity, &record, rules, &exclude);
        let mut decision = FilterDecision {
            code: activity.code.clone(),
            name: activity.name.clone(),
            kept: rejected_by.is_empty(),
            rejected_by,
            category: None,
            ambiguous_category: false,
        };

        if decision.kept {
            let cpc = record.cpc.as_ref().map(|c| c.num).unwrap_or(-1);
            if let Some(assignment) = table.assign(cpc) {
                if assignment.is_flagged() {
                    tracing::debug!(
                        code = %activity.code,
                        cpc,
                        ranges = assignment.matched,
                        "CPC code matched overlapping category ranges"
                    );
                }
                decision.ambiguous_category = assignment.is_flagged();
                decision.category = Some(assignment.category.clone());
                record.category = Some(assignment.category);
                record.subcategory = Some(assignment.subcategory);
            }
            records.push(record);
        }

        trace.decisions.push(decision);
    }

    tracing::info!(
        database = %db.name,
        before = db.activities.len(),
        after = records.len(),
        "filtered activities"
    );

    FilterOutcome {
        database: db.name.clone(),
        total: db.activities.len(),
        records,
        trace,
        degraded: false,
    }
}

fn rejections(
    activity: &Activity,
    record: &ActivityRecord,
    rules: &FilterRuleSet,
    exclude_lower: &[String],
) -> Vec<FilterDimension> {
    let mut out = Vec::new();

    if !rules.names.is_empty() && !rules.names.iter().any(|n| activity.name.starts_with(n.as_str())) {
        out.push(FilterDimension::Name);
    }

    if contains_any(&activity.name, exclude_lower) {
        out.push(FilterDimension::ExcludeName);
    }
    if record.cpc.as_ref().is_some_and(|c| contains_any(&c.name, exclude_lower)) {
        out.push(FilterDimension::ExcludeCpcName);
    }
    if record.isic.as_ref().is_some_and(|c| contains_any(&c.name, exclude_lower)) {
        out.push(FilterDimension::ExcludeIsicName);
    }

    if !rules.locations.is_empty() && !rules.locations.iter().any(|l| *l == activity.location) {
        out.push(FilterDimension::Location);
    }

    if !rules.units.is_empty() && !rules.units.iter().any(|u| Unit::from_str_loose(u) == activity.unit) {
        out.push(FilterDimension::Unit);
    }

    if !rules.cpc_num.is_empty() {
        let num = record.cpc.as_ref().map(|c| c.num).unwrap_or(-1);
        if !rules.cpc_num.contains(&num) {
            out.push(FilterDimension::CpcNum);
        }
    }
    if !rules.isic_num.is_empty() {
        let num = record.isic.as_ref().map(|c| c.num).unwrap_or(-1);
        if !rules.isic_num.contains(&num) {
            out.push(FilterDimension::IsicNum);
        }
    }

    if !activity_type_accepted(activity.activity_type.as_deref(), &rules.activity_types) {
        out.push(FilterDimension::ActivityType);
    }

    out
}

fn contains_any(text: &str, needles_lower: &[String]) -> bool {
    if needles_lower.is_empty() {
        return false;
    }
    let lower = text.to_lowercase();
    needles_lower.iter().any(|n| lower.contains(n.as_str()))
}

/// Activity-type predicate. A missing type is accepted.
fn activity_type_accepted(activity_type: Option<&str>, accepted: &[String]) -> bool {
    match activity_type {
        _ if accepted.is_empty() => true,
        None => true,
        Some(t) => accepted.iter().any(|a| t.contains(a.as_str())),
    }
}

/// Concatenate per-database lists and fill classification gaps.
///
/// Within each group of rows sharing a name, ISIC, CPC, category and
/// activity type are forward- then backward-filled. Rows are then filtered
/// on activity type again, keeping rows whose type is still unknown.
pub fn merge_activities(lists: Vec<Vec<ActivityRecord>>, rules: &FilterRuleSet) -> Vec<ActivityRecord> {
    let mut merged: Vec<ActivityRecord> = lists.into_iter().flatten().collect();

    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, r) in merged.iter().enumerate() {
        groups.entry(r.name.clone()).or_default().push(i);
    }

    for idx in groups.values() {
        if idx.len() < 2 {
            continue;
        }
        fill_column(&mut merged, idx, |r| &mut r.isic);
        fill_column(&mut merged, idx, |r| &mut r.cpc);
        fill_column(&mut merged, idx, |r| &mut r.category);
        fill_column(&mut merged, idx, |r| &mut r.subcategory);
        fill_column(&mut merged, idx, |r| &mut r.activity_type);
    }

    let before = merged.len();
    merged.retain(|r| activity_type_accepted(r.activity_type.as_deref(), &rules.activity_types));
    if merged.len() < before {
        tracing::info!(dropped = before - merged.len(), "dropped rows on filled activity type");
    }

    merged
}

/// Forward-fill then backward-fill one optional column over the rows `idx`.
fn fill_column<T, F>(rows: &mut [ActivityRecord], idx: &[usize], field: F)
where
    T: Clone,
    F: Fn(&mut ActivityRecord) -> &mut Option<T>,
{
    let mut last: Option<T> = None;
    for &i in idx {
        let slot = field(&mut rows[i]);
        if slot.is_some() {
            last = slot.clone();
        } else {
            *slot = last.clone();
        }
    }

    let mut next: Option<T> = None;
    for &i in idx.iter().rev() {
        let slot = field(&mut rows[i]);
        if slot.is_some() {
            next = slot.clone();
        } else {
            *slot = next.clone();
        }
    }
}
