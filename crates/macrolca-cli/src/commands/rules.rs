use macrolca_core::config::PipelineConfig;
use macrolca_core::error::MacroLcaError;
use macrolca_core::rules::{self, builtin};
use std::path::Path;

pub fn list() -> Result<(), MacroLcaError> {
    println!("Filter presets:\n");
    for name in builtin::PRESETS {
        let rs = builtin::load_preset(name)?;
        println!("  {:<16} {} (v{})", name, rs.name, rs.version);
        if let Some(ref desc) = rs.description {
            println!("                   {}", desc);
        }
        println!();
    }

    println!("Processing profiles:\n");
    for name in builtin::PROFILES {
        let profile = builtin::load_profile(name)?;
        println!("  {:<16} {} (v{})", name, profile.name, profile.version);
        if let Some(ref desc) = profile.description {
            println!("                   {}", desc);
        }
        println!();
    }
    Ok(())
}

fn or_any(values: &[String]) -> String {
    if values.is_empty() {
        "any".to_string()
    } else {
        values.join(", ")
    }
}

pub fn explain(preset: &str) -> Result<(), MacroLcaError> {
    let rs = builtin::load_preset(preset)?;

    println!("{} (version {})\n", rs.name, rs.version);
    if let Some(ref desc) = rs.description {
        println!("{}\n", desc);
    }

    println!("An activity is kept when all of the following hold:\n");
    println!("  Name starts with:     {}", or_any(&rs.names));
    println!("  Location is one of:   {}", or_any(&rs.locations));
    println!("  Unit is one of:       {}", or_any(&rs.units));
    println!("  Activity type:        {}", or_any(&rs.activity_types));
    let codes = |c: &[i64]| {
        if c.is_empty() {
            "any".to_string()
        } else {
            format!("{} listed code(s)", c.len())
        }
    };
    println!("  CPC code:             {}", codes(&rs.cpc_num));
    println!("  ISIC code:            {}", codes(&rs.isic_num));
    println!();

    if !rs.exclude.is_empty() {
        println!("An activity is dropped when its name, CPC name or ISIC name contains");
        println!("any of these keywords (case-insensitive):\n");
        for kw in &rs.exclude {
            println!("  - {kw}");
        }
        println!();
    }

    println!("Kept activities get a product category from their CPC code;");
    println!("see `macrolca rules categories`.");
    Ok(())
}

pub fn schema() -> Result<(), MacroLcaError> {
    println!(
        r#"Filter rule set (--config "ruleset"):

{{
  "name": "My markets",                // required
  "description": "...",                // optional
  "version": "1",                      // required
  "names": ["market for"],             // accepted name prefixes
  "cpc_num": [38100, 38110],           // accepted five-digit CPC codes; -1 = missing
  "isic_num": [],                      // accepted five-digit ISIC codes
  "exclude": ["waste", "treatment"],   // keywords rejected in any name
  "locations": ["GLO", "RoW"],
  "units": ["kilogram", "cubic meter"],
  "activity_types": ["market activity"]
}}

Empty lists do not constrain. Codes are padded with trailing zeros to five
digits before comparison ("381" becomes 38100).

Category table (--config "categories"):

{{
  "name": "...", "version": "1",
  "rules": [
    {{ "start": 38100, "end": 38200, "category": "ProcBio", "subcategory": "Furniture" }}
  ]
}}

Ranges are [start, end). When ranges overlap, the narrowest wins.

Processing profile (--config "profile_path"):

{{
  "name": "...", "version": "1",
  "baseline": {{ "from": "ecoinvent-3.9.1-cutoff", "to": "ecoinvent-default-2020" }},
  "density": 1000.0,                   // kg per cubic meter
  "keep_units": ["kilogram", "cubic meter"],
  "combined": [{{ "output": "Total waste (kg)", "mass": "Total (kg)", "volume": "Total (m3)" }}],
  "ratios": [{{ "output": "Hazardous waste (%)", "numerators": ["Hazardous waste (kg)"],
               "denominator": "Total waste (kg)" }}],
  "drop": ["parameters full"],         // columns containing these are removed
  "rename": {{ "human health": "Human health damage (DALY/kg)" }}
}}
"#
    );
    Ok(())
}

/// Kind of rule file, told apart by its top-level keys.
enum RuleFileKind {
    Filter,
    Categories,
    Profile,
}

const PROFILE_KEYS: &[&str] = &["baseline", "density", "keep_units", "combined", "ratios", "drop", "rename"];

fn detect_kind(file: &Path) -> Result<RuleFileKind, MacroLcaError> {
    let content = std::fs::read_to_string(file)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let obj = value.as_object().ok_or_else(|| MacroLcaError::RulesetLoad {
        kind: "rule file",
        path: file.to_path_buf(),
        reason: "expected a JSON object".into(),
    })?;
    if obj.contains_key("rules") {
        Ok(RuleFileKind::Categories)
    } else if PROFILE_KEYS.iter().any(|k| obj.contains_key(*k)) {
        Ok(RuleFileKind::Profile)
    } else {
        Ok(RuleFileKind::Filter)
    }
}

pub fn validate(file: &Path) -> Result<(), MacroLcaError> {
    match detect_kind(file)? {
        RuleFileKind::Filter => {
            let rs = rules::load_ruleset(file)?;
            println!("Filter rule set '{}' (v{}) is valid.", rs.name, rs.version);
            println!("  Name prefixes: {}", or_any(&rs.names));
            println!("  Locations:     {}", or_any(&rs.locations));
            println!("  Exclusions:    {}", rs.exclude.len());

            let mut warnings = Vec::new();
            for code in rs.cpc_num.iter().chain(&rs.isic_num) {
                if *code != -1 && !(10000..100000).contains(code) {
                    warnings.push(format!("code {code} is not five digits and will never match"));
                }
            }
            if rs.names.is_empty() && rs.cpc_num.is_empty() && rs.isic_num.is_empty() {
                warnings.push("no name prefixes or codes; every activity passes those checks".into());
            }
            print_warnings(&warnings);
        }
        RuleFileKind::Categories => {
            let table = rules::load_category_table(file)?;
            println!("Category table '{}' (v{}) is valid.", table.name(), table.version());
            println!("  Ranges: {}", table.len());
            let warnings: Vec<String> = table
                .overlaps()
                .iter()
                .filter(|o| o.conflicting)
                .map(|o| format!("ranges #{} and #{} overlap on [{}, {})", o.first, o.second, o.start, o.end))
                .collect();
            print_warnings(&warnings);
        }
        RuleFileKind::Profile => {
            let profile = rules::load_profile(file)?;
            println!("Processing profile '{}' (v{}) is valid.", profile.name, profile.version);
            println!("  Combined indicators: {}", profile.combined.len());
            println!("  Ratio indicators:    {}", profile.ratios.len());
            println!("  Renamed columns:     {}", profile.rename.len());
        }
    }
    Ok(())
}

fn print_warnings(warnings: &[String]) {
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in warnings {
            println!("  - {}", w);
        }
    }
}

pub fn categories(config: &PipelineConfig) -> Result<(), MacroLcaError> {
    let table = config.category_table()?;
    println!("{} (version {})\n", table.name(), table.version());
    if let Some(desc) = table.description() {
        println!("{}\n", desc);
    }

    let width = table
        .rules()
        .iter()
        .map(|r| r.category.len())
        .max()
        .unwrap_or(8);
    println!("  {:<13}  {:<width$}  Subcategory", "CPC range", "Category");
    println!("  {}", "-".repeat(13 + width + 16));
    for r in table.rules() {
        println!(
            "  {:<13}  {:<width$}  {}",
            format!("{}-{}", r.start, r.end),
            r.category,
            r.subcategory
        );
    }

    let overlaps = table.overlaps();
    if !overlaps.is_empty() {
        println!("\nOverlapping ranges (narrowest wins):");
        for o in &overlaps {
            let kind = if o.nested { "nested" } else { "partial" };
            let marker = if o.conflicting { " (different categories)" } else { "" };
            println!("  #{} and #{}: [{}, {}) {kind}{marker}", o.first, o.second, o.start, o.end);
        }
    }
    Ok(())
}
