//! Market price lookup keyed on (name, location).

use std::collections::HashMap;
use std::path::Path;

use calamine::Reader;
use rust_decimal::Decimal;

use crate::error::MacroLcaError;
use crate::process::ProcessedTable;
use crate::table::{parse_decimal, DELIMITER};

const NAME: &str = "name";
const LOCATION: &str = "location";
const AMOUNT: &str = "amount";

#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    entries: HashMap<(String, String), Decimal>,
    duplicates: usize,
}

impl PriceTable {
    /// Insert unless the key is already present; the first price wins.
    pub fn insert(&mut self, name: &str, location: &str, amount: Decimal) -> bool {
        let key = (name.to_string(), location.to_string());
        if self.entries.contains_key(&key) {
            self.duplicates += 1;
            return false;
        }
        self.entries.insert(key, amount);
        true
    }

    pub fn get(&self, name: &str, location: &str) -> Option<Decimal> {
        self.entries
            .get(&(name.to_string(), location.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

/// Load a price table from `;`-separated CSV or a spreadsheet
/// (`.xlsx`, `.xls`, `.ods`), using the `name`, `location`, `amount` columns.
pub fn load_price_table(path: &Path) -> Result<PriceTable, MacroLcaError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let table = match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "ods" => load_spreadsheet(path)?,
        _ => load_csv(path)?,
    };
    if table.duplicates() > 0 {
        tracing::warn!(
            path = %path.display(),
            duplicates = table.duplicates(),
            "price table has duplicate (name, location) rows; keeping the first"
        );
    }
    Ok(table)
}

fn load_csv(path: &Path) -> Result<PriceTable, MacroLcaError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)?;
    let headers = rdr.headers()?.clone();
    let find = |col: &str| {
        headers
            .iter()
            .position(|h| h.trim() == col)
            .ok_or_else(|| MacroLcaError::MissingColumn {
                column: col.to_string(),
                path: path.to_path_buf(),
            })
    };
    let (name, location, amount) = (find(NAME)?, find(LOCATION)?, find(AMOUNT)?);

    let mut table = PriceTable::default();
    for row in rdr.records() {
        let row = row?;
        let price = row.get(amount).and_then(parse_decimal);
        if let (Some(n), Some(l), Some(p)) = (row.get(name), row.get(location), price) {
            table.insert(n.trim(), l.trim(), p);
        }
    }
    Ok(table)
}

fn load_spreadsheet(path: &Path) -> Result<PriceTable, MacroLcaError> {
    let mut workbook = calamine::open_workbook_auto(path).map_err(|e| {
        MacroLcaError::Table(format!("failed to open {}: {e}", path.display()))
    })?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| MacroLcaError::Table(format!("{} has no sheets", path.display())))?;
    let sheet = workbook
        .worksheet_range(&first)
        .map_err(|e| MacroLcaError::Table(format!("sheet '{first}' unreadable: {e}")))?;

    let mut rows = sheet.rows();
    let header: Vec<Option<String>> = rows
        .next()
        .map(|r| r.iter().map(cell_as_string).collect())
        .unwrap_or_default();
    let find = |col: &str| {
        header
            .iter()
            .position(|h| h.as_deref() == Some(col))
            .ok_or_else(|| MacroLcaError::MissingColumn {
                column: col.to_string(),
                path: path.to_path_buf(),
            })
    };
    let (name, location, amount) = (find(NAME)?, find(LOCATION)?, find(AMOUNT)?);

    let mut table = PriceTable::default();
    for row in rows {
        let n = row.get(name).and_then(cell_as_string);
        let l = row.get(location).and_then(cell_as_string);
        let p = match row.get(amount) {
            Some(calamine::Data::Float(f)) => Some(f64_to_decimal(*f)),
            Some(calamine::Data::Int(i)) => Some(Decimal::from(*i)),
            Some(calamine::Data::String(s)) => parse_decimal(s),
            _ => None,
        };
        if let (Some(n), Some(l), Some(p)) = (n, l, p) {
            table.insert(&n, &l, p);
        }
    }
    Ok(table)
}

fn cell_as_string(cell: &calamine::Data) -> Option<String> {
    match cell {
        calamine::Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        calamine::Data::Float(f) => Some(f.to_string()),
        calamine::Data::Int(i) => Some(i.to_string()),
        calamine::Data::Empty => None,
        _ => Some(format!("{cell}")),
    }
}

/// String round-trip keeps spreadsheet floats like 0.35 exact.
fn f64_to_decimal(f: f64) -> Decimal {
    format!("{f}")
        .parse::<Decimal>()
        .unwrap_or_else(|_| Decimal::try_from(f).unwrap_or_default())
}

/// Left join prices into the processed table on (Name, Location).
///
/// Returns the number of rows that received a price.
pub fn attach_prices(table: &mut ProcessedTable, prices: &PriceTable) -> usize {
    let mut matched = 0;
    for record in &mut table.records {
        record.price = prices.get(&record.name, &record.location);
        if record.price.is_some() {
            matched += 1;
        }
    }
    table.priced = true;
    tracing::info!(
        matched,
        rows = table.records.len(),
        "attached prices"
    );
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessedRecord, ScenarioLabel};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn row(name: &str, location: &str) -> ProcessedRecord {
        ProcessedRecord {
            code: "c".into(),
            name: name.into(),
            reference_product: None,
            unit: "kg".into(),
            location: location.into(),
            category: None,
            subcategory: None,
            label: ScenarioLabel::parse("SSP1-PkBudg500-2030"),
            price: None,
            values: BTreeMap::new(),
        }
    }

    #[test]
    fn test_csv_prices_first_duplicate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(
            &path,
            "name;location;amount;unit\n\
             market for sawnwood;GLO;0.35;EUR2005\n\
             market for sawnwood;GLO;9.99;EUR2005\n\
             market for cement;CH;1.2e-1;EUR2005\n",
        )
        .unwrap();
        let prices = load_price_table(&path).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices.duplicates(), 1);
        assert_eq!(prices.get("market for sawnwood", "GLO"), Some(dec!(0.35)));
        assert_eq!(prices.get("market for cement", "CH"), Some(dec!(0.12)));
    }

    #[test]
    fn test_attach_is_left_join() {
        let mut prices = PriceTable::default();
        prices.insert("market for sawnwood", "GLO", dec!(0.35));
        let mut table = ProcessedTable {
            indicators: vec![],
            records: vec![row("market for sawnwood", "GLO"), row("market for sawnwood", "RER")],
            priced: false,
        };
        assert_eq!(attach_prices(&mut table, &prices), 1);
        assert!(table.priced);
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].price, Some(dec!(0.35)));
        assert_eq!(table.records[1].price, None);
    }

    #[test]
    fn test_missing_amount_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, "name;location\nx;GLO\n").unwrap();
        assert!(matches!(
            load_price_table(&path),
            Err(MacroLcaError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_f64_to_decimal_preserves_precision() {
        assert_eq!(f64_to_decimal(0.35), dec!(0.35));
        assert_eq!(f64_to_decimal(68.0), dec!(68));
    }
}
