use macrolca_core::config::PipelineConfig;
use macrolca_core::error::MacroLcaError;
use macrolca_core::import;
use macrolca_core::model::ImpactMethod;
use std::path::Path;

pub fn database(
    config: &PipelineConfig,
    dir: &Path,
    name: Option<String>,
    allow_unlinked: bool,
) -> Result<(), MacroLcaError> {
    let name = match name {
        Some(n) => n,
        None => {
            let file_name = dir
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .ok_or_else(|| MacroLcaError::Import {
                    path: dir.to_path_buf(),
                    reason: "cannot derive a database name; pass --name".into(),
                })?;
            import::database_name_from_archive(&file_name)
        }
    };

    let project = config.store().open_or_create(&config.project)?;
    if project.has_database(&name) {
        println!("Database '{name}' already exists in '{}'; nothing to do.", project.name());
        return Ok(());
    }

    let imported = import::import_datasets(dir, &name)?;
    let stats = imported.statistics;
    let path = import::write_imported(&project, &imported, allow_unlinked)?;
    println!("Imported '{name}' into '{}'", project.name());
    println!("  Datasets:  {}", stats.datasets);
    println!("  Exchanges: {}", stats.exchanges);
    println!("  Unlinked:  {}", stats.unlinked);
    println!("  Written:   {}", path.display());
    Ok(())
}

pub fn methods(config: &PipelineConfig, file: &Path) -> Result<(), MacroLcaError> {
    let bytes = std::fs::read(file)?;
    let methods: Vec<ImpactMethod> = serde_json::from_slice(&bytes)?;
    let project = config.store().open_or_create(&config.project)?;
    let added = project.import_methods(&methods)?;
    println!(
        "Imported {added} new method(s) into '{}' ({} in file)",
        project.name(),
        methods.len()
    );
    Ok(())
}
