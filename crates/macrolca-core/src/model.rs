use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reference unit of an activity, as labelled by ecoinvent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Unit {
    Kilogram,
    CubicMeter,
    Unit,
    Other(String),
}

impl Unit {
    pub fn from_str_loose(s: &str) -> Unit {
        match s.trim().to_lowercase().as_str() {
            "kilogram" | "kg" => Unit::Kilogram,
            "cubic meter" | "cubic metre" | "m3" => Unit::CubicMeter,
            "unit" => Unit::Unit,
            _ => Unit::Other(s.trim().to_string()),
        }
    }

    pub fn is_volume(&self) -> bool {
        matches!(self, Unit::CubicMeter)
    }

    /// Short label used in processed tables ("kg", "m3").
    pub fn short_label(&self) -> String {
        match self {
            Unit::Kilogram => "kg".to_string(),
            Unit::CubicMeter => "m3".to_string(),
            Unit::Unit => "unit".to_string(),
            Unit::Other(s) => s.clone(),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Kilogram => write!(f, "kilogram"),
            Unit::CubicMeter => write!(f, "cubic meter"),
            Unit::Unit => write!(f, "unit"),
            Unit::Other(s) => write!(f, "{s}"),
        }
    }
}

impl From<String> for Unit {
    fn from(s: String) -> Self {
        Unit::from_str_loose(&s)
    }
}

impl From<Unit> for String {
    fn from(u: Unit) -> Self {
        u.to_string()
    }
}

/// A parsed classification code, e.g. CPC `(38100, "Furniture")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCode {
    pub num: i64,
    pub name: String,
}

impl ClassCode {
    /// Sentinel used when an activity carries no usable entry.
    pub fn missing() -> Self {
        ClassCode {
            num: -1,
            name: "missing".to_string(),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.num == -1
    }
}

/// A raw classification entry as stored on the activity, e.g.
/// `("CPC", "381: Furniture")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub system: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Production,
    Technosphere,
    Biosphere,
}

/// Where an exchange points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExchangeTarget {
    Activity { database: String, code: String },
    Flow { code: String },
    Unlinked { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uncertainty {
    pub distribution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

/// A flow edge. Consumed opaquely by the impact solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub input: ExchangeTarget,
    pub amount: f64,
    pub kind: ExchangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<Uncertainty>,
}

impl Exchange {
    pub fn is_unlinked(&self) -> bool {
        matches!(self.input, ExchangeTarget::Unlinked { .. })
    }
}

/// A process record inside a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub code: String,
    pub name: String,
    pub unit: Unit,
    pub location: String,
    #[serde(default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub reference_product: Option<String>,
    /// `None` when the source database has no classification column at all.
    #[serde(default)]
    pub classifications: Option<Vec<Classification>>,
    #[serde(default)]
    pub production_amount: Option<f64>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    #[serde(default)]
    pub depends: Vec<String>,
    pub activities: Vec<Activity>,
}

impl Database {
    pub fn get(&self, code: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.code == code)
    }

    pub fn unlinked_exchanges(&self) -> usize {
        self.activities
            .iter()
            .flat_map(|a| a.exchanges.iter())
            .filter(|e| e.is_unlinked())
            .count()
    }
}

/// Impact assessment method identifier: (family, category, indicator).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImpactMethod(pub String, pub String, pub String);

impl ImpactMethod {
    pub fn family(&self) -> &str {
        &self.0
    }

    pub fn category(&self) -> &str {
        &self.1
    }

    pub fn indicator(&self) -> &str {
        &self.2
    }

    /// Column header used for this method in result tables.
    pub fn column_label(&self) -> &str {
        &self.2
    }
}

impl fmt::Display for ImpactMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} | {}", self.0, self.1, self.2)
    }
}

/// One row of the filtered activity list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub code: String,
    pub name: String,
    pub unit: Unit,
    pub location: String,
    pub activity_type: Option<String>,
    pub reference_product: Option<String>,
    pub database: String,
    pub production_amount: Option<f64>,
    pub price: Option<Decimal>,
    pub isic: Option<ClassCode>,
    pub cpc: Option<ClassCode>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

impl ActivityRecord {
    pub fn from_activity(activity: &Activity, database: &str) -> Self {
        ActivityRecord {
            code: activity.code.clone(),
            name: activity.name.clone(),
            unit: activity.unit.clone(),
            location: activity.location.clone(),
            activity_type: activity.activity_type.clone(),
            reference_product: activity.reference_product.clone(),
            database: database.to_string(),
            production_amount: activity.production_amount,
            price: activity.price,
            isic: None,
            cpc: None,
            category: None,
            subcategory: None,
        }
    }

    /// Join key shared by the activity list and the calculation output.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.code, &self.database, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub code: String,
    pub database: String,
    pub name: String,
}

impl RecordKey {
    pub fn new(code: &str, database: &str, name: &str) -> Self {
        RecordKey {
            code: code.to_string(),
            database: database.to_string(),
            name: name.to_string(),
        }
    }
}

/// One row of raw calculation output: activity metadata plus one score per method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub code: String,
    pub name: String,
    pub database: String,
    pub unit: Unit,
    pub location: String,
    pub reference_product: Option<String>,
    pub scores: BTreeMap<String, f64>,
}

impl ScoreRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.code, &self.database, &self.name)
    }
}

/// Raw results: method columns in calculation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    pub methods: Vec<String>,
    pub records: Vec<ScoreRecord>,
}

impl ScoreTable {
    /// Concatenate tables, keeping the first-seen method order.
    pub fn concat(tables: Vec<ScoreTable>) -> ScoreTable {
        let mut out = ScoreTable::default();
        for t in tables {
            for m in t.methods {
                if !out.methods.contains(&m) {
                    out.methods.push(m);
                }
            }
            out.records.extend(t.records);
        }
        out
    }
}
