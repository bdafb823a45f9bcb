use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A filter rule set selecting the activities of interest.
///
/// Every dimension is ANDed with the others; an empty list means the
/// dimension does not constrain anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRuleSet {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    /// Accepted activity name prefixes.
    #[serde(default)]
    pub names: Vec<String>,
    /// Accepted CPC codes (five-digit integers).
    #[serde(default)]
    pub cpc_num: Vec<i64>,
    /// Accepted ISIC codes (five-digit integers).
    #[serde(default)]
    pub isic_num: Vec<i64>,
    /// Case-insensitive keywords rejected in name, CPC name and ISIC name.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub units: Vec<String>,
    /// Accepted activity type substrings.
    #[serde(default)]
    pub activity_types: Vec<String>,
}

/// One CPC code range mapped to a product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRuleDef {
    /// Inclusive lower bound.
    pub start: i64,
    /// Exclusive upper bound.
    pub end: i64,
    pub category: String,
    pub subcategory: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTableDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    pub rules: Vec<CategoryRuleDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineRename {
    pub from: String,
    pub to: String,
}

/// `output = mass + density * volume`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedIndicatorDef {
    pub output: String,
    pub mass: String,
    pub volume: String,
}

/// `output = 100 * sum(numerators) / denominator`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatioIndicatorDef {
    pub output: String,
    pub numerators: Vec<String>,
    pub denominator: String,
}

/// How raw calculation results are turned into the processed table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingProfile {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    #[serde(default)]
    pub baseline: Option<BaselineRename>,
    #[serde(default = "default_density")]
    pub density: f64,
    /// Units kept in the processed table; everything else is dropped.
    #[serde(default)]
    pub keep_units: Vec<String>,
    #[serde(default)]
    pub combined: Vec<CombinedIndicatorDef>,
    #[serde(default)]
    pub ratios: Vec<RatioIndicatorDef>,
    #[serde(default)]
    pub drop: Vec<String>,
    /// Presentation labels for indicator columns.
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
}

fn default_density() -> f64 {
    1000.0
}
