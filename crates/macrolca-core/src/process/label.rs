use serde::{Deserialize, Serialize};

/// Scenario metadata recovered from a database name such as
/// `SSP1-PkBudg500-2030`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioLabel {
    /// First two dash-separated parts, e.g. `SSP1-PkBudg500`.
    pub database: String,
    pub year: Option<u16>,
    pub ssp: String,
    pub rcp: String,
}

impl ScenarioLabel {
    /// Split on `-`: parts 0..2 name the database, part 2 is the year.
    ///
    /// Names that do not follow the pattern still produce a label; the year is
    /// `None` when the third part is missing or not a number.
    pub fn parse(database: &str) -> ScenarioLabel {
        let parts: Vec<&str> = database.split('-').collect();
        let head = parts.len().min(2);
        ScenarioLabel {
            database: parts[..head].join("-"),
            year: parts.get(2).and_then(|y| y.trim().parse::<u16>().ok()),
            ssp: parts.first().map(|s| s.to_string()).unwrap_or_default(),
            rcp: parts.get(1).map(|s| s.to_string()).unwrap_or_default(),
        }
    }

    pub fn is_scenario(&self) -> bool {
        self.ssp.starts_with("SSP")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_database() {
        let l = ScenarioLabel::parse("SSP1-PkBudg500-2030");
        assert_eq!(l.database, "SSP1-PkBudg500");
        assert_eq!(l.year, Some(2030));
        assert_eq!(l.ssp, "SSP1");
        assert_eq!(l.rcp, "PkBudg500");
        assert!(l.is_scenario());
    }

    #[test]
    fn test_renamed_baseline() {
        let l = ScenarioLabel::parse("ecoinvent-default-2020");
        assert_eq!(l.database, "ecoinvent-default");
        assert_eq!(l.year, Some(2020));
        assert!(!l.is_scenario());
    }

    #[test]
    fn test_non_numeric_year() {
        let l = ScenarioLabel::parse("ecoinvent-3.9.1-cutoff");
        assert_eq!(l.database, "ecoinvent-3.9.1");
        assert_eq!(l.year, None);
    }

    #[test]
    fn test_single_part() {
        let l = ScenarioLabel::parse("custom");
        assert_eq!(l.database, "custom");
        assert_eq!(l.year, None);
        assert_eq!(l.rcp, "");
    }
}
