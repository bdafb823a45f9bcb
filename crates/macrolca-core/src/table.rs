//! `;`-separated tables exchanged between stages, plus JSON snapshots.

use crate::error::MacroLcaError;
use crate::model::{ActivityRecord, ClassCode, ScoreRecord, ScoreTable, Unit};
use crate::process::{ProcessedRecord, ProcessedTable, ScenarioLabel};
use csv::StringRecord;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const DELIMITER: u8 = b';';

pub const ACTIVITY_COLUMNS: &[&str] = &[
    "code",
    "name",
    "unit",
    "location",
    "activity type",
    "reference product",
    "database",
    "production amount",
    "price",
    "ISIC_num",
    "ISIC_name",
    "CPC_num",
    "CPC_name",
    "prod_category",
    "prod_sub_category",
];

pub const SCORE_META_COLUMNS: &[&str] = &[
    "code",
    "name",
    "database",
    "unit",
    "location",
    "reference product",
];

pub const PROCESSED_META_COLUMNS: &[&str] = &[
    "Code",
    "Name",
    "Reference product",
    "Unit",
    "Location",
    "Product category",
    "Product subcategory",
];

pub const PROCESSED_LABEL_COLUMNS: &[&str] = &["Year", "Database", "Database - Ssp", "Database - Rcp"];

pub const PRICE_COLUMN: &str = "Price (EUR2005)";

/// Header name to column index, for one file.
struct Columns {
    index: HashMap<String, usize>,
    path: PathBuf,
}

impl Columns {
    fn new(headers: &StringRecord, path: &Path) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();
        Columns {
            index,
            path: path.to_path_buf(),
        }
    }

    fn require(&self, name: &str) -> Result<usize, MacroLcaError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| MacroLcaError::MissingColumn {
                column: name.to_string(),
                path: self.path.clone(),
            })
    }

    fn optional(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

fn field(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn owned(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    field(record, idx).map(str::to_string)
}

fn parse_f64_field(value: Option<&str>, column: &str) -> Result<Option<f64>, MacroLcaError> {
    match value {
        None => Ok(None),
        Some(v) => v
            .parse::<f64>()
            .map(Some)
            .map_err(|_| MacroLcaError::Table(format!("invalid number '{v}' in column '{column}'"))),
    }
}

/// Parse a decimal, accepting scientific notation.
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let v = value.trim();
    v.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(v).ok())
}

fn opt_str(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("")
}

fn opt_display<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map(|x| x.to_string()).unwrap_or_default()
}

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>, MacroLcaError> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)?)
}

fn writer(path: &Path) -> Result<csv::Writer<std::fs::File>, MacroLcaError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)?)
}

// ---------------------------------------------------------------------------
// Activity lists
// ---------------------------------------------------------------------------

pub fn write_activities(path: &Path, records: &[ActivityRecord]) -> Result<(), MacroLcaError> {
    let mut w = writer(path)?;
    w.write_record(ACTIVITY_COLUMNS)?;
    for r in records {
        let (isic_num, isic_name) = class_fields(&r.isic);
        let (cpc_num, cpc_name) = class_fields(&r.cpc);
        let unit = r.unit.to_string();
        let amount = opt_display(&r.production_amount);
        let price = opt_display(&r.price);
        w.write_record([
            r.code.as_str(),
            r.name.as_str(),
            unit.as_str(),
            r.location.as_str(),
            opt_str(&r.activity_type),
            opt_str(&r.reference_product),
            r.database.as_str(),
            amount.as_str(),
            price.as_str(),
            isic_num.as_str(),
            isic_name.as_str(),
            cpc_num.as_str(),
            cpc_name.as_str(),
            opt_str(&r.category),
            opt_str(&r.subcategory),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn class_fields(code: &Option<ClassCode>) -> (String, String) {
    match code {
        Some(c) => (c.num.to_string(), c.name.clone()),
        None => (String::new(), String::new()),
    }
}

pub fn read_activities(path: &Path) -> Result<Vec<ActivityRecord>, MacroLcaError> {
    let mut rdr = reader(path)?;
    let cols = Columns::new(rdr.headers()?, path);
    let code = cols.require("code")?;
    let name = cols.require("name")?;
    let database = cols.require("database")?;
    let unit = cols.require("unit")?;
    let location = cols.require("location")?;
    let activity_type = cols.optional("activity type");
    let reference_product = cols.optional("reference product");
    let production_amount = cols.optional("production amount");
    let price = cols.optional("price");
    let isic_num = cols.optional("ISIC_num");
    let isic_name = cols.optional("ISIC_name");
    let cpc_num = cols.optional("CPC_num");
    let cpc_name = cols.optional("CPC_name");
    let category = cols.optional("prod_category");
    let subcategory = cols.optional("prod_sub_category");

    let mut out = Vec::new();
    for row in rdr.records() {
        let row = row?;
        out.push(ActivityRecord {
            code: owned(&row, Some(code)).unwrap_or_default(),
            name: owned(&row, Some(name)).unwrap_or_default(),
            unit: Unit::from_str_loose(field(&row, Some(unit)).unwrap_or("")),
            location: owned(&row, Some(location)).unwrap_or_default(),
            activity_type: owned(&row, activity_type),
            reference_product: owned(&row, reference_product),
            database: owned(&row, Some(database)).unwrap_or_default(),
            production_amount: parse_f64_field(field(&row, production_amount), "production amount")?,
            price: field(&row, price).and_then(parse_decimal),
            isic: read_class(&row, isic_num, isic_name)?,
            cpc: read_class(&row, cpc_num, cpc_name)?,
            category: owned(&row, category),
            subcategory: owned(&row, subcategory),
        });
    }
    Ok(out)
}

fn read_class(
    row: &StringRecord,
    num: Option<usize>,
    name: Option<usize>,
) -> Result<Option<ClassCode>, MacroLcaError> {
    match field(row, num) {
        None => Ok(None),
        Some(n) => {
            let num = n
                .parse::<i64>()
                .map_err(|_| MacroLcaError::Table(format!("invalid classification code '{n}'")))?;
            Ok(Some(ClassCode {
                num,
                name: owned(row, name).unwrap_or_default(),
            }))
        }
    }
}

// ---------------------------------------------------------------------------
// Raw scores
// ---------------------------------------------------------------------------

pub fn write_scores(path: &Path, table: &ScoreTable) -> Result<(), MacroLcaError> {
    let mut w = writer(path)?;
    let header: Vec<&str> = SCORE_META_COLUMNS
        .iter()
        .copied()
        .chain(table.methods.iter().map(String::as_str))
        .collect();
    w.write_record(&header)?;

    for r in &table.records {
        let mut row = vec![
            r.code.clone(),
            r.name.clone(),
            r.database.clone(),
            r.unit.to_string(),
            r.location.clone(),
            r.reference_product.clone().unwrap_or_default(),
        ];
        row.extend(table.methods.iter().map(|m| opt_display(&r.scores.get(m).copied())));
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_scores(path: &Path) -> Result<ScoreTable, MacroLcaError> {
    let mut rdr = reader(path)?;
    let headers = rdr.headers()?.clone();
    let cols = Columns::new(&headers, path);
    let code = cols.require("code")?;
    let name = cols.require("name")?;
    let database = cols.require("database")?;
    let unit = cols.optional("unit");
    let location = cols.optional("location");
    let reference_product = cols.optional("reference product");

    let methods: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !SCORE_META_COLUMNS.contains(&h.trim()))
        .map(|(i, h)| (i, h.trim().to_string()))
        .collect();

    let mut table = ScoreTable {
        methods: methods.iter().map(|(_, m)| m.clone()).collect(),
        records: Vec::new(),
    };

    for row in rdr.records() {
        let row = row?;
        let mut scores = BTreeMap::new();
        for (i, m) in &methods {
            if let Some(v) = parse_f64_field(field(&row, Some(*i)), m)? {
                scores.insert(m.clone(), v);
            }
        }
        table.records.push(ScoreRecord {
            code: owned(&row, Some(code)).unwrap_or_default(),
            name: owned(&row, Some(name)).unwrap_or_default(),
            database: owned(&row, Some(database)).unwrap_or_default(),
            unit: Unit::from_str_loose(field(&row, unit).unwrap_or("")),
            location: owned(&row, location).unwrap_or_default(),
            reference_product: owned(&row, reference_product),
            scores,
        });
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Processed results
// ---------------------------------------------------------------------------

pub fn write_processed(path: &Path, table: &ProcessedTable) -> Result<(), MacroLcaError> {
    let mut w = writer(path)?;
    let mut header: Vec<&str> = PROCESSED_META_COLUMNS.to_vec();
    header.extend(table.indicators.iter().map(String::as_str));
    header.extend_from_slice(PROCESSED_LABEL_COLUMNS);
    if table.priced {
        header.push(PRICE_COLUMN);
    }
    w.write_record(&header)?;

    for r in &table.records {
        let mut row = vec![
            r.code.clone(),
            r.name.clone(),
            r.reference_product.clone().unwrap_or_default(),
            r.unit.clone(),
            r.location.clone(),
            r.category.clone().unwrap_or_default(),
            r.subcategory.clone().unwrap_or_default(),
        ];
        row.extend(table.indicators.iter().map(|m| opt_display(&r.values.get(m).copied())));
        row.push(opt_display(&r.label.year));
        row.push(r.label.database.clone());
        row.push(r.label.ssp.clone());
        row.push(r.label.rcp.clone());
        if table.priced {
            row.push(opt_display(&r.price));
        }
        w.write_record(&row)?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_processed(path: &Path) -> Result<ProcessedTable, MacroLcaError> {
    let mut rdr = reader(path)?;
    let headers = rdr.headers()?.clone();
    let cols = Columns::new(&headers, path);
    let meta: Vec<usize> = PROCESSED_META_COLUMNS
        .iter()
        .map(|c| cols.require(c))
        .collect::<Result<_, _>>()?;
    let year = cols.optional("Year");
    let database = cols.require("Database")?;
    let ssp = cols.optional("Database - Ssp");
    let rcp = cols.optional("Database - Rcp");
    let price = cols.optional(PRICE_COLUMN);

    let indicators: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (i, h.trim().to_string()))
        .filter(|(_, h)| {
            !PROCESSED_META_COLUMNS.contains(&h.as_str())
                && !PROCESSED_LABEL_COLUMNS.contains(&h.as_str())
                && h != PRICE_COLUMN
        })
        .collect();

    let mut table = ProcessedTable {
        indicators: indicators.iter().map(|(_, h)| h.clone()).collect(),
        records: Vec::new(),
        priced: price.is_some(),
    };

    for row in rdr.records() {
        let row = row?;
        let mut values = BTreeMap::new();
        for (i, h) in &indicators {
            if let Some(v) = parse_f64_field(field(&row, Some(*i)), h)? {
                values.insert(h.clone(), v);
            }
        }
        let year = match field(&row, year) {
            Some(y) => Some(
                y.parse::<u16>()
                    .map_err(|_| MacroLcaError::Table(format!("invalid year '{y}'")))?,
            ),
            None => None,
        };
        table.records.push(ProcessedRecord {
            code: owned(&row, Some(meta[0])).unwrap_or_default(),
            name: owned(&row, Some(meta[1])).unwrap_or_default(),
            reference_product: owned(&row, Some(meta[2])),
            unit: owned(&row, Some(meta[3])).unwrap_or_default(),
            location: owned(&row, Some(meta[4])).unwrap_or_default(),
            category: owned(&row, Some(meta[5])),
            subcategory: owned(&row, Some(meta[6])),
            label: ScenarioLabel {
                database: owned(&row, Some(database)).unwrap_or_default(),
                year,
                ssp: owned(&row, ssp).unwrap_or_default(),
                rcp: owned(&row, rcp).unwrap_or_default(),
            },
            price: field(&row, price).and_then(parse_decimal),
            values,
        });
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// JSON snapshots
// ---------------------------------------------------------------------------

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), MacroLcaError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, MacroLcaError> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record() -> ActivityRecord {
        ActivityRecord {
            code: "abc".into(),
            name: "market for wooden board".into(),
            unit: Unit::CubicMeter,
            location: "GLO".into(),
            activity_type: Some("market activity".into()),
            reference_product: Some("wooden board".into()),
            database: "ecoinvent-3.9.1-cutoff".into(),
            production_amount: Some(2.5e6),
            price: Some(dec!(307.5)),
            isic: Some(ClassCode { num: 16210, name: "Manufacture of veneer sheets; plywood".into() }),
            cpc: Some(ClassCode { num: 31400, name: "Boards".into() }),
            category: Some("ProcBio".into()),
            subcategory: None,
        }
    }

    #[test]
    fn test_activity_csv_keeps_semicolons_in_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acts.csv");
        write_activities(&path, &[record()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("code;name;unit;location;activity type"));
        assert!(text.contains("\"Manufacture of veneer sheets; plywood\""));

        let back = read_activities(&path).unwrap();
        assert_eq!(back, vec![record()]);
    }

    #[test]
    fn test_missing_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "code;name;unit\na;b;kilogram\n").unwrap();
        match read_activities(&path) {
            Err(MacroLcaError::MissingColumn { column, .. }) => assert_eq!(column, "database"),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_scores_keep_method_order_and_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        let mut scores = BTreeMap::new();
        scores.insert("Total (kg)".to_string(), 0.25);
        let table = ScoreTable {
            methods: vec!["Total (kg)".into(), "ecosystem quality".into()],
            records: vec![ScoreRecord {
                code: "abc".into(),
                name: "market for wooden board".into(),
                database: "db".into(),
                unit: Unit::Kilogram,
                location: "GLO".into(),
                reference_product: None,
                scores,
            }],
        };
        write_scores(&path, &table).unwrap();
        let back = read_scores(&path).unwrap();
        assert_eq!(back.methods, table.methods);
        assert_eq!(back.records[0].scores.len(), 1);
        assert_eq!(back.records[0].scores["Total (kg)"], 0.25);
    }

    #[test]
    fn test_decimal_accepts_scientific() {
        assert_eq!(parse_decimal("1.5e-3"), Some(dec!(0.0015)));
        assert_eq!(parse_decimal("12.40"), Some(dec!(12.40)));
        assert_eq!(parse_decimal("n/a"), None);
    }
}
