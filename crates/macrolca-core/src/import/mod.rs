//! Database provisioning from an extracted EcoSpold2 datasets directory.

pub mod ecospold;

use crate::error::MacroLcaError;
use crate::model::{Activity, Database, Exchange, ExchangeKind, ExchangeTarget, Unit};
use crate::store::Project;
use ecospold::{activity_type_label, RawDataset, RawExchangeKind};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Link-integrity summary of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStatistics {
    pub datasets: usize,
    pub exchanges: usize,
    pub unlinked: usize,
}

#[derive(Debug, Clone)]
pub struct ImportedDatabase {
    pub database: Database,
    pub statistics: ImportStatistics,
}

/// Derive a database name from an archive file name:
/// `"ecoinvent 3.9.1_cutoff_ecoSpold02.7z"` becomes `"ecoinvent-3.9.1-cutoff"`.
pub fn database_name_from_archive(file_name: &str) -> String {
    file_name
        .replace(".7z", "")
        .replace(['_', ' '], "-")
        .replace("-ecoSpold02", "")
}

/// Import every `.spold` file in `dir` into a database named `name`.
///
/// `dir` is either the extracted archive root or its `datasets/` directory.
pub fn import_datasets(dir: &Path, name: &str) -> Result<ImportedDatabase, MacroLcaError> {
    let datasets_dir = if dir.join("datasets").is_dir() {
        dir.join("datasets")
    } else {
        dir.to_path_buf()
    };

    let files = spold_files(&datasets_dir)?;
    if files.is_empty() {
        return Err(MacroLcaError::Import {
            path: datasets_dir,
            reason: "no .spold files found".into(),
        });
    }
    tracing::info!(files = files.len(), dir = %datasets_dir.display(), "parsing datasets");

    let raw: Vec<RawDataset> = files
        .par_iter()
        .map(|path| {
            let xml = std::fs::read_to_string(path)?;
            ecospold::parse_dataset(&xml).map_err(|e| MacroLcaError::Import {
                path: path.clone(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<_, _>>()?;

    link_datasets(name, &raw)
}

fn spold_files(dir: &Path) -> Result<Vec<PathBuf>, MacroLcaError> {
    if !dir.is_dir() {
        return Err(MacroLcaError::Import {
            path: dir.to_path_buf(),
            reason: "not a directory".into(),
        });
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "spold") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Turn parsed datasets into a linked database.
///
/// Activity codes are `"<activity id>_<reference product id>"`. Technosphere
/// inputs link through `activityLinkId`; inputs without a usable link fall
/// back to the single activity producing a product of that name, and are
/// left unlinked otherwise.
pub fn link_datasets(name: &str, raw: &[RawDataset]) -> Result<ImportedDatabase, MacroLcaError> {
    let mut by_link: HashMap<(&str, &str), String> = HashMap::new();
    let mut by_product: HashMap<&str, Vec<String>> = HashMap::new();

    for ds in raw {
        let reference = ds.reference_product().ok_or_else(|| MacroLcaError::Import {
            path: PathBuf::from(&ds.activity_id),
            reason: format!("dataset '{}' has no reference product", ds.name),
        })?;
        let code = format!("{}_{}", ds.activity_id, reference.flow_id);
        by_link.insert((ds.activity_id.as_str(), reference.flow_id.as_str()), code.clone());
        by_product.entry(reference.name.as_str()).or_default().push(code);
    }

    let mut stats = ImportStatistics {
        datasets: raw.len(),
        ..Default::default()
    };
    let mut activities = Vec::with_capacity(raw.len());

    for ds in raw {
        // Checked in the indexing pass above.
        let Some(reference) = ds.reference_product() else {
            continue;
        };
        let code = format!("{}_{}", ds.activity_id, reference.flow_id);
        let mut exchanges = vec![Exchange {
            input: ExchangeTarget::Activity {
                database: name.to_string(),
                code: code.clone(),
            },
            amount: reference.amount,
            kind: ExchangeKind::Production,
            uncertainty: reference.uncertainty.clone(),
        }];

        for ex in &ds.exchanges {
            let (input, kind) = match ex.kind {
                RawExchangeKind::Elementary => (
                    ExchangeTarget::Flow {
                        code: ex.flow_id.clone(),
                    },
                    ExchangeKind::Biosphere,
                ),
                RawExchangeKind::Intermediate if ex.is_technosphere_input() => {
                    let linked = ex
                        .activity_link
                        .as_deref()
                        .and_then(|link| by_link.get(&(link, ex.flow_id.as_str())))
                        .or_else(|| match by_product.get(ex.name.as_str()) {
                            Some(codes) if codes.len() == 1 => codes.first(),
                            _ => None,
                        });
                    let input = match linked {
                        Some(code) => ExchangeTarget::Activity {
                            database: name.to_string(),
                            code: code.clone(),
                        },
                        None => {
                            tracing::debug!(activity = %ds.name, input = %ex.name, "unlinked exchange");
                            ExchangeTarget::Unlinked {
                                name: ex.name.clone(),
                            }
                        }
                    };
                    (input, ExchangeKind::Technosphere)
                }
                RawExchangeKind::Intermediate => continue,
            };
            exchanges.push(Exchange {
                input,
                amount: ex.amount,
                kind,
                uncertainty: ex.uncertainty.clone(),
            });
        }

        stats.exchanges += exchanges.len();
        stats.unlinked += exchanges.iter().filter(|e| e.is_unlinked()).count();

        activities.push(Activity {
            code,
            name: ds.name.clone(),
            unit: Unit::from_str_loose(&reference.unit),
            location: ds.location.clone(),
            activity_type: ds
                .special_activity_type
                .map(|t| activity_type_label(t).to_string()),
            reference_product: Some(reference.name.clone()),
            classifications: Some(ds.classifications.clone()),
            production_amount: reference.production_volume,
            price: reference.price,
            exchanges,
        });
    }

    tracing::info!(
        database = name,
        datasets = stats.datasets,
        exchanges = stats.exchanges,
        unlinked = stats.unlinked,
        "import statistics"
    );

    Ok(ImportedDatabase {
        database: Database {
            name: name.to_string(),
            depends: vec!["biosphere3".to_string()],
            activities,
        },
        statistics: stats,
    })
}

/// Write an imported database into the project. Refused while unlinked
/// exchanges remain, unless `allow_unlinked` is set.
pub fn write_imported(
    project: &Project,
    imported: &ImportedDatabase,
    allow_unlinked: bool,
) -> Result<PathBuf, MacroLcaError> {
    let unlinked = imported.statistics.unlinked;
    if unlinked > 0 {
        if !allow_unlinked {
            return Err(MacroLcaError::UnlinkedExchanges {
                database: imported.database.name.clone(),
                unlinked,
            });
        }
        tracing::warn!(
            database = %imported.database.name,
            unlinked,
            "writing database with unlinked exchanges"
        );
    }
    project.write_database(&imported.database)
}
