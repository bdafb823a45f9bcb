use crate::model::{ClassCode, Classification};

/// Width that classification codes are filled to before integer conversion.
const CODE_WIDTH: usize = 5;

/// ISIC and CPC codes extracted from an activity's classification list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCodes {
    pub isic: ClassCode,
    pub cpc: ClassCode,
}

/// Extract the ISIC and CPC entries from a classification list.
///
/// Entries are matched on the system label ("ISIC rev.4 ecoinvent", "CPC").
/// Values look like `"381: Furniture"`; the digit part is filled with
/// trailing zeros to five digits, so `"381"` becomes `38100`. Missing or
/// malformed entries yield [`ClassCode::missing`].
pub fn extract_codes(classifications: &[Classification]) -> ExtractedCodes {
    let mut isic = ClassCode::missing();
    let mut cpc = ClassCode::missing();

    for c in classifications {
        if c.system.contains("ISIC") {
            isic = parse_code(&c.value).unwrap_or_else(ClassCode::missing);
        } else if c.system.contains("CPC") {
            cpc = parse_code(&c.value).unwrap_or_else(ClassCode::missing);
        }
    }

    ExtractedCodes { isic, cpc }
}

/// Parse `"<digits>: <name>"` into a [`ClassCode`].
pub fn parse_code(value: &str) -> Option<ClassCode> {
    let (raw_num, name) = match value.split_once(':') {
        Some((num, rest)) => (num.trim(), rest.trim()),
        None => (value.trim(), ""),
    };

    if raw_num.is_empty() || !raw_num.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut digits = raw_num.to_string();
    while digits.len() < CODE_WIDTH {
        digits.push('0');
    }

    let num = digits.parse::<i64>().ok()?;
    Some(ClassCode {
        num,
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(system: &str, value: &str) -> Classification {
        Classification {
            system: system.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_short_code_is_filled_to_five_digits() {
        let c = parse_code("381: Furniture").unwrap();
        assert_eq!(c.num, 38100);
        assert_eq!(c.name, "Furniture");
    }

    #[test]
    fn test_name_keeps_later_colons() {
        let c = parse_code("2410:Manufacture of basic iron: and steel").unwrap();
        assert_eq!(c.num, 24100);
        assert_eq!(c.name, "Manufacture of basic iron: and steel");
    }

    #[test]
    fn test_long_code_untouched() {
        let c = parse_code("346110: Fertilisers").unwrap();
        assert_eq!(c.num, 346110);
    }

    #[test]
    fn test_malformed_code_is_none() {
        assert!(parse_code("abc: nonsense").is_none());
        assert!(parse_code(": empty").is_none());
    }

    #[test]
    fn test_extract_both_systems() {
        let codes = extract_codes(&[
            class("ISIC rev.4 ecoinvent", "2011:Manufacture of basic chemicals"),
            class("CPC", "34210: Hydrogen"),
        ]);
        assert_eq!(codes.isic.num, 20110);
        assert_eq!(codes.cpc.num, 34210);
        assert_eq!(codes.cpc.name, "Hydrogen");
    }

    #[test]
    fn test_absent_entries_fall_back_to_sentinel() {
        let codes = extract_codes(&[class("EcoSpold01Categories", "chemicals/inorganics")]);
        assert_eq!(codes.isic, ClassCode::missing());
        assert_eq!(codes.cpc, ClassCode::missing());
    }

    #[test]
    fn test_malformed_entry_falls_back_silently() {
        let codes = extract_codes(&[class("CPC", "n/a")]);
        assert!(codes.cpc.is_missing());
        assert_eq!(codes.cpc.name, "missing");
    }
}
