use crate::classify::categories::CategoryTable;
use crate::error::MacroLcaError;
use crate::rules::schema::{CategoryTableDef, FilterRuleSet, ProcessingProfile};

const MARKETS_JSON: &str = include_str!("../../../../rules/markets.json");
const CPC_CATEGORIES_JSON: &str = include_str!("../../../../rules/cpc-categories.json");
const WASTE_FOOTPRINT_JSON: &str = include_str!("../../../../rules/waste-footprint.json");

/// Available predefined filter rule sets.
pub const PRESETS: &[&str] = &["markets"];

/// Available predefined processing profiles.
pub const PROFILES: &[&str] = &["waste-footprint"];

/// Load a predefined filter rule set by name.
pub fn load_preset(name: &str) -> Result<FilterRuleSet, MacroLcaError> {
    match name {
        "markets" => Ok(serde_json::from_str(MARKETS_JSON)?),
        _ => Err(MacroLcaError::RulesetInvalid(format!(
            "unknown preset '{}'. Available: {}",
            name,
            PRESETS.join(", ")
        ))),
    }
}

/// The built-in CPC category table.
pub fn category_table() -> Result<CategoryTable, MacroLcaError> {
    let def: CategoryTableDef = serde_json::from_str(CPC_CATEGORIES_JSON)?;
    CategoryTable::new(def)
}

/// Load a predefined processing profile by name.
pub fn load_profile(name: &str) -> Result<ProcessingProfile, MacroLcaError> {
    match name {
        "waste-footprint" => Ok(serde_json::from_str(WASTE_FOOTPRINT_JSON)?),
        _ => Err(MacroLcaError::RulesetInvalid(format!(
            "unknown processing profile '{}'. Available: {}",
            name,
            PROFILES.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{validate_profile, validate_ruleset};

    #[test]
    fn test_load_markets_preset() {
        let rs = load_preset("markets").unwrap();
        assert_eq!(rs.names, vec!["market for"]);
        assert!(rs.exclude.contains(&"waste".to_string()));
        assert!(validate_ruleset(&rs).is_ok());
    }

    #[test]
    fn test_unknown_preset() {
        assert!(load_preset("xyz").is_err());
    }

    #[test]
    fn test_builtin_category_table_loads() {
        let table = category_table().unwrap();
        assert!(table.len() > 20);
    }

    #[test]
    fn test_builtin_profile_is_valid() {
        let profile = load_profile("waste-footprint").unwrap();
        assert!(validate_profile(&profile).is_ok());
        assert_eq!(profile.density, 1000.0);
        assert!(load_profile("nope").is_err());
    }
}
