pub mod builtin;
pub mod schema;

use crate::classify::categories::CategoryTable;
use crate::error::MacroLcaError;
use schema::{CategoryTableDef, FilterRuleSet, ProcessingProfile};
use serde::de::DeserializeOwned;
use std::path::Path;

fn load_json<T: DeserializeOwned>(path: &Path, kind: &'static str) -> Result<T, MacroLcaError> {
    let content = std::fs::read_to_string(path).map_err(|e| MacroLcaError::RulesetLoad {
        kind,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| MacroLcaError::RulesetLoad {
        kind,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Load a filter rule set from a JSON file.
pub fn load_ruleset(path: &Path) -> Result<FilterRuleSet, MacroLcaError> {
    let ruleset: FilterRuleSet = load_json(path, "filter rule set")?;
    validate_ruleset(&ruleset)?;
    Ok(ruleset)
}

/// Parse a filter rule set from a JSON string (no file path context).
pub fn parse_ruleset_str(json: &str) -> Result<FilterRuleSet, MacroLcaError> {
    let ruleset: FilterRuleSet = serde_json::from_str(json)?;
    validate_ruleset(&ruleset)?;
    Ok(ruleset)
}

/// Validate that a filter rule set is well-formed.
pub fn validate_ruleset(ruleset: &FilterRuleSet) -> Result<(), MacroLcaError> {
    if ruleset.name.trim().is_empty() {
        return Err(MacroLcaError::RulesetInvalid(
            "name must not be empty".into(),
        ));
    }

    let string_lists = [
        ("names", &ruleset.names),
        ("exclude", &ruleset.exclude),
        ("locations", &ruleset.locations),
        ("units", &ruleset.units),
        ("activity_types", &ruleset.activity_types),
    ];
    for (field, values) in string_lists {
        if values.iter().any(|v| v.trim().is_empty()) {
            return Err(MacroLcaError::RulesetInvalid(format!(
                "'{}' contains an empty entry",
                field
            )));
        }
    }

    for num in ruleset.cpc_num.iter().chain(ruleset.isic_num.iter()) {
        if *num < -1 {
            return Err(MacroLcaError::RulesetInvalid(format!(
                "classification code {} is negative (only -1 is allowed, for missing codes)",
                num
            )));
        }
    }

    Ok(())
}

/// Load a category table from a JSON file.
pub fn load_category_table(path: &Path) -> Result<CategoryTable, MacroLcaError> {
    let def: CategoryTableDef = load_json(path, "category table")?;
    CategoryTable::new(def)
}

/// Load a processing profile from a JSON file.
pub fn load_profile(path: &Path) -> Result<ProcessingProfile, MacroLcaError> {
    let profile: ProcessingProfile = load_json(path, "processing profile")?;
    validate_profile(&profile)?;
    Ok(profile)
}

/// Validate that a processing profile is well-formed.
pub fn validate_profile(profile: &ProcessingProfile) -> Result<(), MacroLcaError> {
    if !(profile.density.is_finite() && profile.density > 0.0) {
        return Err(MacroLcaError::RulesetInvalid(format!(
            "density must be a positive number, got {}",
            profile.density
        )));
    }

    for ratio in &profile.ratios {
        if ratio.numerators.is_empty() {
            return Err(MacroLcaError::RulesetInvalid(format!(
                "ratio '{}' has no numerator columns",
                ratio.output
            )));
        }
    }

    let mut outputs: Vec<&str> = profile
        .combined
        .iter()
        .map(|c| c.output.as_str())
        .chain(profile.ratios.iter().map(|r| r.output.as_str()))
        .collect();
    outputs.sort_unstable();
    if let Some(dup) = outputs.windows(2).find(|w| w[0] == w[1]) {
        return Err(MacroLcaError::RulesetInvalid(format!(
            "indicator '{}' is defined more than once",
            dup[0]
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_ruleset() {
        let json = r#"{
            "name": "Test",
            "version": "1.0",
            "names": ["market for"],
            "locations": ["GLO"]
        }"#;
        let rs = parse_ruleset_str(json).unwrap();
        assert_eq!(rs.name, "Test");
        assert_eq!(rs.names, vec!["market for"]);
        assert!(rs.exclude.is_empty());
        assert!(rs.units.is_empty());
    }

    #[test]
    fn test_empty_entry_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "exclude": ["waste", " "]
        }"#;
        assert!(parse_ruleset_str(json).is_err());
    }

    #[test]
    fn test_non_integer_cpc_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "cpc_num": ["46420"]
        }"#;
        assert!(parse_ruleset_str(json).is_err());
    }

    #[test]
    fn test_missing_code_marker_allowed() {
        let json = r#"{
            "name": "Missing codes",
            "version": "1.0",
            "cpc_num": [46420, -1]
        }"#;
        assert!(parse_ruleset_str(json).is_ok());
    }

    #[test]
    fn test_profile_duplicate_output_rejected() {
        let json = r#"{
            "name": "Dup",
            "version": "1.0",
            "combined": [{ "output": "Total", "mass": "a", "volume": "b" }],
            "ratios": [{ "output": "Total", "numerators": ["a"], "denominator": "b" }]
        }"#;
        let profile: ProcessingProfile = serde_json::from_str(json).unwrap();
        assert!(validate_profile(&profile).is_err());
    }

    #[test]
    fn test_profile_density_defaults() {
        let profile: ProcessingProfile =
            serde_json::from_str(r#"{ "name": "P", "version": "1" }"#).unwrap();
        assert_eq!(profile.density, 1000.0);
        assert!(validate_profile(&profile).is_ok());
    }
}
