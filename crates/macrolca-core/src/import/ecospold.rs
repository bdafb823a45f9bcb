use crate::error::MacroLcaError;
use crate::model::{Classification, Uncertainty};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rust_decimal::Decimal;

/// Output group of the reference product in an intermediate exchange.
pub const REFERENCE_OUTPUT_GROUP: u8 = 0;
/// Input group of technosphere inputs ("from technosphere").
pub const TECHNOSPHERE_INPUT_GROUP: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawExchangeKind {
    Intermediate,
    Elementary,
}

/// One exchange as written in the dataset, before linking.
#[derive(Debug, Clone, PartialEq)]
pub struct RawExchange {
    pub kind: RawExchangeKind,
    /// `intermediateExchangeId` or `elementaryExchangeId`.
    pub flow_id: String,
    pub amount: f64,
    pub name: String,
    pub unit: String,
    pub activity_link: Option<String>,
    pub input_group: Option<u8>,
    pub output_group: Option<u8>,
    pub production_volume: Option<f64>,
    pub price: Option<Decimal>,
    pub uncertainty: Option<Uncertainty>,
}

impl RawExchange {
    fn new(kind: RawExchangeKind) -> Self {
        RawExchange {
            kind,
            flow_id: String::new(),
            amount: 0.0,
            name: String::new(),
            unit: String::new(),
            activity_link: None,
            input_group: None,
            output_group: None,
            production_volume: None,
            price: None,
            uncertainty: None,
        }
    }

    pub fn is_reference_product(&self) -> bool {
        self.kind == RawExchangeKind::Intermediate
            && self.output_group == Some(REFERENCE_OUTPUT_GROUP)
    }

    pub fn is_technosphere_input(&self) -> bool {
        self.kind == RawExchangeKind::Intermediate
            && self.input_group == Some(TECHNOSPHERE_INPUT_GROUP)
    }
}

/// One EcoSpold2 activity dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDataset {
    pub activity_id: String,
    pub name: String,
    pub special_activity_type: Option<u32>,
    pub location: String,
    pub classifications: Vec<Classification>,
    pub exchanges: Vec<RawExchange>,
}

impl RawDataset {
    pub fn reference_product(&self) -> Option<&RawExchange> {
        self.exchanges.iter().find(|e| e.is_reference_product())
    }
}

/// Activity type label for an EcoSpold2 `specialActivityType`.
pub fn activity_type_label(special: u32) -> &'static str {
    match special {
        0 => "ordinary transforming activity",
        1 => "market activity",
        2 => "IO activity",
        3 => "Residual activity",
        4 => "production mix",
        5 => "import activity",
        6 => "supply mix",
        7 => "export activity",
        8 => "re-export activity",
        9 => "correction activity",
        10 => "market group",
        _ => "unknown",
    }
}

struct PendingProperty {
    name: String,
    amount: Option<String>,
}

/// Parse one `.spold` document.
pub fn parse_dataset(xml: &str) -> Result<RawDataset, MacroLcaError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut ds = RawDataset::default();
    let mut stack: Vec<String> = Vec::new();
    let mut exchange: Option<RawExchange> = None;
    let mut classification: Option<Classification> = None;
    let mut property: Option<PendingProperty> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                open_element(&e, &name, &stack, &mut ds, &mut exchange, &mut classification, &mut property)?;
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                open_element(&e, &name, &stack, &mut ds, &mut exchange, &mut classification, &mut property)?;
                close_element(&name, &mut ds, &mut exchange, &mut classification, &mut property);
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                let text = text.trim();
                let current = stack.last().map(String::as_str).unwrap_or("");
                let parent = stack
                    .len()
                    .checked_sub(2)
                    .map(|i| stack[i].as_str())
                    .unwrap_or("");

                match (parent, current) {
                    ("activity", "activityName") => ds.name = text.to_string(),
                    ("geography", "shortname") => ds.location = text.to_string(),
                    ("classification", "classificationSystem") => {
                        if let Some(c) = classification.as_mut() {
                            c.system = text.to_string();
                        }
                    }
                    ("classification", "classificationValue") => {
                        if let Some(c) = classification.as_mut() {
                            c.value = text.to_string();
                        }
                    }
                    ("property", "name") => {
                        if let Some(p) = property.as_mut() {
                            p.name = text.to_string();
                        }
                    }
                    (_, field) if is_exchange(parent) => {
                        if let Some(ex) = exchange.as_mut() {
                            match field {
                                "name" => ex.name = text.to_string(),
                                "unitName" => ex.unit = text.to_string(),
                                "inputGroup" => ex.input_group = text.parse().ok(),
                                "outputGroup" => ex.output_group = text.parse().ok(),
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                if let Some(name) = stack.pop() {
                    close_element(&name, &mut ds, &mut exchange, &mut classification, &mut property);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if ds.activity_id.is_empty() {
        return Err(MacroLcaError::Table(
            "dataset has no <activity id=...> element".into(),
        ));
    }

    Ok(ds)
}

fn is_exchange(name: &str) -> bool {
    name == "intermediateExchange" || name == "elementaryExchange"
}

#[allow(clippy::too_many_arguments)]
fn open_element(
    e: &BytesStart<'_>,
    name: &str,
    stack: &[String],
    ds: &mut RawDataset,
    exchange: &mut Option<RawExchange>,
    classification: &mut Option<Classification>,
    property: &mut Option<PendingProperty>,
) -> Result<(), MacroLcaError> {
    let parent = stack.last().map(String::as_str).unwrap_or("");
    match name {
        "activity" if parent == "activityDescription" => {
            ds.activity_id = attr(e, b"id")?.unwrap_or_default();
            ds.special_activity_type = attr(e, b"specialActivityType")?.and_then(|s| s.parse().ok());
        }
        "classification" => {
            *classification = Some(Classification {
                system: String::new(),
                value: String::new(),
            });
        }
        "intermediateExchange" | "elementaryExchange" => {
            let (kind, id_key) = if name == "intermediateExchange" {
                (RawExchangeKind::Intermediate, &b"intermediateExchangeId"[..])
            } else {
                (RawExchangeKind::Elementary, &b"elementaryExchangeId"[..])
            };
            let mut ex = RawExchange::new(kind);
            ex.flow_id = attr(e, id_key)?.unwrap_or_default();
            ex.amount = parse_f64(attr(e, b"amount")?.as_deref(), "amount")?.unwrap_or(0.0);
            ex.activity_link = attr(e, b"activityLinkId")?;
            ex.production_volume =
                parse_f64(attr(e, b"productionVolumeAmount")?.as_deref(), "productionVolumeAmount")?;
            *exchange = Some(ex);
        }
        "property" if exchange.is_some() => {
            *property = Some(PendingProperty {
                name: String::new(),
                amount: attr(e, b"amount")?,
            });
        }
        "lognormal" | "normal" | "triangular" | "uniform" | "undefined" if parent == "uncertainty" => {
            if let Some(ex) = exchange.as_mut() {
                let (loc, scale) = match name {
                    "lognormal" => (
                        parse_f64(attr(e, b"mu")?.as_deref(), "mu")?,
                        parse_f64(attr(e, b"variance")?.as_deref(), "variance")?.map(f64::sqrt),
                    ),
                    "normal" => (
                        parse_f64(attr(e, b"meanValue")?.as_deref(), "meanValue")?,
                        parse_f64(attr(e, b"variance")?.as_deref(), "variance")?.map(f64::sqrt),
                    ),
                    "triangular" => (
                        parse_f64(attr(e, b"mostLikelyValue")?.as_deref(), "mostLikelyValue")?,
                        None,
                    ),
                    _ => (None, None),
                };
                ex.uncertainty = Some(Uncertainty {
                    distribution: name.to_string(),
                    loc,
                    scale,
                    minimum: parse_f64(attr(e, b"minValue")?.as_deref(), "minValue")?,
                    maximum: parse_f64(attr(e, b"maxValue")?.as_deref(), "maxValue")?,
                });
            }
        }
        _ => {}
    }
    Ok(())
}

fn close_element(
    name: &str,
    ds: &mut RawDataset,
    exchange: &mut Option<RawExchange>,
    classification: &mut Option<Classification>,
    property: &mut Option<PendingProperty>,
) {
    match name {
        "classification" => {
            if let Some(c) = classification.take() {
                ds.classifications.push(c);
            }
        }
        "property" => {
            if let (Some(p), Some(ex)) = (property.take(), exchange.as_mut()) {
                if p.name.eq_ignore_ascii_case("price") {
                    ex.price = p.amount.and_then(|a| a.parse::<Decimal>().ok());
                }
            }
        }
        "intermediateExchange" | "elementaryExchange" => {
            if let Some(ex) = exchange.take() {
                ds.exchanges.push(ex);
            }
        }
        _ => {}
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, MacroLcaError> {
    for a in e.attributes() {
        let a = a.map_err(quick_xml::Error::from)?;
        if a.key.local_name().as_ref() == key {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parse_f64(value: Option<&str>, field: &str) -> Result<Option<f64>, MacroLcaError> {
    match value {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| MacroLcaError::Table(format!("invalid {field} '{v}'"))),
    }
}
