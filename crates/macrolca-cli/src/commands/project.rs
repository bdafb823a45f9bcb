use macrolca_core::config::PipelineConfig;
use macrolca_core::error::MacroLcaError;

pub fn list(config: &PipelineConfig) -> Result<(), MacroLcaError> {
    let store = config.store();
    let projects = store.list_projects()?;
    if projects.is_empty() {
        println!("No projects in {}", store.root().display());
        return Ok(());
    }
    for name in projects {
        let marker = if name == config.project { " *" } else { "" };
        println!("  {name}{marker}");
    }
    Ok(())
}

pub fn create(config: &PipelineConfig, name: &str) -> Result<(), MacroLcaError> {
    let project = config.store().create_project(name)?;
    println!("Created project '{}' in {}", project.name(), project.dir().display());
    Ok(())
}

pub fn delete(config: &PipelineConfig, name: &str) -> Result<(), MacroLcaError> {
    config.store().delete_project(name)?;
    println!("Deleted project '{name}'");
    Ok(())
}

pub fn copy(config: &PipelineConfig, source: &str, target: &str) -> Result<(), MacroLcaError> {
    let project = config.store().copy_project(source, target)?;
    println!("Copied '{source}' to '{}'", project.name());
    Ok(())
}

pub fn show(config: &PipelineConfig, name: Option<&str>) -> Result<(), MacroLcaError> {
    let project = config.store().open(name.unwrap_or(&config.project))?;
    let meta = project.meta();
    println!("{} (created {})", meta.name, meta.created.format("%Y-%m-%d %H:%M"));
    if let Some(ref source) = meta.copied_from {
        println!("  copied from: {source}");
    }

    let selected = config.selected_databases(&project).unwrap_or_default();
    println!("\n  Databases:");
    for db in project.database_names()? {
        let marker = if selected.contains(&db) { "" } else { " (excluded)" };
        println!("    {db}{marker}");
    }
    println!("\n  Methods: {}", project.methods()?.len());
    Ok(())
}
