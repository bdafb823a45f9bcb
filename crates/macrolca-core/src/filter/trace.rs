use serde::{Deserialize, Serialize};

pub const TRACE_SCHEMA_VERSION: &str = "1.0";

/// A filter dimension that can reject an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterDimension {
    Name,
    ExcludeName,
    ExcludeCpcName,
    ExcludeIsicName,
    Location,
    Unit,
    CpcNum,
    IsicNum,
    ActivityType,
}

impl FilterDimension {
    pub fn describe(&self) -> &'static str {
        match self {
            FilterDimension::Name => "name does not start with an accepted prefix",
            FilterDimension::ExcludeName => "name contains an excluded keyword",
            FilterDimension::ExcludeCpcName => "CPC name contains an excluded keyword",
            FilterDimension::ExcludeIsicName => "ISIC name contains an excluded keyword",
            FilterDimension::Location => "location not accepted",
            FilterDimension::Unit => "unit not accepted",
            FilterDimension::CpcNum => "CPC code not accepted",
            FilterDimension::IsicNum => "ISIC code not accepted",
            FilterDimension::ActivityType => "activity type not accepted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceSeverity {
    Important,
    Info,
}

/// Why one activity was kept or dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDecision {
    pub code: String,
    pub name: String,
    pub kept: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_by: Vec<FilterDimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// The CPC code fell in more than one category range.
    #[serde(default)]
    pub ambiguous_category: bool,
}

impl FilterDecision {
    pub fn reason(&self) -> String {
        if self.kept {
            match &self.category {
                Some(c) if self.ambiguous_category => format!("kept, category {c} (overlapping ranges)"),
                Some(c) => format!("kept, category {c}"),
                None => "kept, no category".to_string(),
            }
        } else {
            self.rejected_by
                .iter()
                .map(FilterDimension::describe)
                .collect::<Vec<_>>()
                .join("; ")
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceWarning {
    pub database: String,
    pub message: String,
    pub severity: TraceSeverity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterTrace {
    pub trace_schema_version: String,
    pub decisions: Vec<FilterDecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<TraceWarning>,
}

impl Default for FilterTrace {
    fn default() -> Self {
        Self {
            trace_schema_version: TRACE_SCHEMA_VERSION.to_string(),
            decisions: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl FilterTrace {
    /// Number of activities each dimension rejected.
    pub fn rejection_counts(&self) -> Vec<(FilterDimension, usize)> {
        let mut counts: Vec<(FilterDimension, usize)> = Vec::new();
        for d in &self.decisions {
            for dim in &d.rejected_by {
                match counts.iter_mut().find(|(k, _)| k == dim) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((*dim, 1)),
                }
            }
        }
        counts
    }
}
