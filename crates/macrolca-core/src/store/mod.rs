//! On-disk project store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<project>/project.json
//! <root>/<project>/methods.json
//! <root>/<project>/databases/<database>.json
//! ```
//!
//! There is no "current project". Stages receive an opened [`Project`].

use crate::error::MacroLcaError;
use crate::model::{Database, ImpactMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Databases skipped when no explicit selection is given.
pub const DEFAULT_EXCLUDED_DATABASES: &[&str] = &["biosphere3", "biosphere_T-reX"];

const PROJECT_FILE: &str = "project.json";
const METHODS_FILE: &str = "methods.json";
const DATABASES_DIR: &str = "databases";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub name: String,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copied_from: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.project_dir(name).join(PROJECT_FILE).is_file()
    }

    /// Names of all projects, sorted.
    pub fn list_projects(&self) -> Result<Vec<String>, MacroLcaError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().join(PROJECT_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn create_project(&self, name: &str) -> Result<Project, MacroLcaError> {
        check_name("project", name)?;
        if self.exists(name) {
            return Err(MacroLcaError::ProjectExists(name.to_string()));
        }
        let meta = ProjectMeta {
            name: name.to_string(),
            created: Utc::now(),
            copied_from: None,
        };
        let dir = self.project_dir(name);
        std::fs::create_dir_all(dir.join(DATABASES_DIR))?;
        write_json_atomic(&dir.join(PROJECT_FILE), &meta)?;
        tracing::info!(project = name, "created project");
        Ok(Project { dir, meta })
    }

    /// Open an existing project, failing fast if it is absent.
    pub fn open(&self, name: &str) -> Result<Project, MacroLcaError> {
        let dir = self.project_dir(name);
        let path = dir.join(PROJECT_FILE);
        if !path.is_file() {
            return Err(MacroLcaError::ProjectNotFound(name.to_string()));
        }
        let meta: ProjectMeta = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        Ok(Project { dir, meta })
    }

    pub fn open_or_create(&self, name: &str) -> Result<Project, MacroLcaError> {
        if self.exists(name) {
            self.open(name)
        } else {
            self.create_project(name)
        }
    }

    pub fn delete_project(&self, name: &str) -> Result<(), MacroLcaError> {
        if !self.exists(name) {
            return Err(MacroLcaError::ProjectNotFound(name.to_string()));
        }
        std::fs::remove_dir_all(self.project_dir(name))?;
        tracing::info!(project = name, "deleted project");
        Ok(())
    }

    /// Copy every database and the method catalog of `source` into a new
    /// project `target`.
    pub fn copy_project(&self, source: &str, target: &str) -> Result<Project, MacroLcaError> {
        check_name("project", target)?;
        let src = self.open(source)?;
        if self.exists(target) {
            return Err(MacroLcaError::ProjectExists(target.to_string()));
        }
        let dir = self.project_dir(target);
        copy_dir_recursive(src.dir(), &dir)?;

        let meta = ProjectMeta {
            name: target.to_string(),
            created: Utc::now(),
            copied_from: Some(source.to_string()),
        };
        write_json_atomic(&dir.join(PROJECT_FILE), &meta)?;
        tracing::info!(source, target, "copied project");
        Ok(Project { dir, meta })
    }
}

/// An opened project. Every stage works on one of these.
#[derive(Debug, Clone)]
pub struct Project {
    dir: PathBuf,
    meta: ProjectMeta,
}

impl Project {
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn meta(&self) -> &ProjectMeta {
        &self.meta
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn database_path(&self, name: &str) -> PathBuf {
        self.dir.join(DATABASES_DIR).join(format!("{name}.json"))
    }

    /// All database names, sorted.
    pub fn database_names(&self) -> Result<Vec<String>, MacroLcaError> {
        let dir = self.dir.join(DATABASES_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.database_path(name).is_file()
    }

    pub fn load_database(&self, name: &str) -> Result<Database, MacroLcaError> {
        let path = self.database_path(name);
        if !path.is_file() {
            return Err(MacroLcaError::DatabaseNotFound {
                project: self.name().to_string(),
                database: name.to_string(),
            });
        }
        let file = std::fs::File::open(&path)?;
        let db: Database = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(db)
    }

    /// Write (or replace) a database.
    pub fn write_database(&self, db: &Database) -> Result<PathBuf, MacroLcaError> {
        check_name("database", &db.name)?;
        std::fs::create_dir_all(self.dir.join(DATABASES_DIR))?;
        let path = self.database_path(&db.name);
        write_json_atomic(&path, db)?;
        tracing::info!(
            project = self.name(),
            database = %db.name,
            activities = db.activities.len(),
            "wrote database"
        );
        Ok(path)
    }

    pub fn delete_database(&self, name: &str) -> Result<(), MacroLcaError> {
        let path = self.database_path(name);
        if !path.is_file() {
            return Err(MacroLcaError::DatabaseNotFound {
                project: self.name().to_string(),
                database: name.to_string(),
            });
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Database names minus any containing one of `exclude` as a substring.
    pub fn selected_databases(&self, exclude: &[String]) -> Result<Vec<String>, MacroLcaError> {
        Ok(self
            .database_names()?
            .into_iter()
            .filter(|name| !exclude.iter().any(|e| name.contains(e.as_str())))
            .collect())
    }

    /// The project's method catalog. Empty if none was imported.
    pub fn methods(&self) -> Result<Vec<ImpactMethod>, MacroLcaError> {
        let path = self.dir.join(METHODS_FILE);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    /// Merge methods into the catalog. Returns the number newly added.
    pub fn import_methods(&self, methods: &[ImpactMethod]) -> Result<usize, MacroLcaError> {
        let mut catalog = self.methods()?;
        let before = catalog.len();
        for m in methods {
            if !catalog.contains(m) {
                catalog.push(m.clone());
            }
        }
        catalog.sort();
        write_json_atomic(&self.dir.join(METHODS_FILE), &catalog)?;
        Ok(catalog.len() - before)
    }
}

fn check_name(kind: &str, name: &str) -> Result<(), MacroLcaError> {
    if name.trim().is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(MacroLcaError::Config(format!("invalid {kind} name '{name}'")));
    }
    Ok(())
}

/// Serialize to a temp file next to `path`, then rename over it.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), MacroLcaError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = std::io::BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| MacroLcaError::Io(e.error))?;
    Ok(())
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), MacroLcaError> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activity, Unit};

    fn db(name: &str) -> Database {
        Database {
            name: name.into(),
            depends: vec![],
            activities: vec![Activity {
                code: "a1".into(),
                name: "market for steel".into(),
                unit: Unit::Kilogram,
                location: "GLO".into(),
                activity_type: Some("market activity".into()),
                reference_product: Some("steel".into()),
                classifications: None,
                production_amount: Some(1.0),
                price: None,
                exchanges: vec![],
            }],
        }
    }

    #[test]
    fn test_create_open_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        store.create_project("b").unwrap();
        store.create_project("a").unwrap();
        assert_eq!(store.list_projects().unwrap(), vec!["a", "b"]);
        assert_eq!(store.open("a").unwrap().name(), "a");
        assert!(matches!(
            store.create_project("a"),
            Err(MacroLcaError::ProjectExists(_))
        ));
    }

    #[test]
    fn test_open_missing_project_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        assert!(matches!(
            store.open("nope"),
            Err(MacroLcaError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_database_round_trip_and_selection() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectStore::new(dir.path()).create_project("p").unwrap();
        project.write_database(&db("ecoinvent-3.9.1-cutoff")).unwrap();
        project.write_database(&db("biosphere3")).unwrap();
        project.write_database(&db("SSP1-PkBudg500-2030")).unwrap();

        let loaded = project.load_database("ecoinvent-3.9.1-cutoff").unwrap();
        assert_eq!(loaded.activities.len(), 1);

        let exclude: Vec<String> = DEFAULT_EXCLUDED_DATABASES.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            project.selected_databases(&exclude).unwrap(),
            vec!["SSP1-PkBudg500-2030", "ecoinvent-3.9.1-cutoff"]
        );
        assert!(matches!(
            project.load_database("missing"),
            Err(MacroLcaError::DatabaseNotFound { .. })
        ));
    }

    #[test]
    fn test_copy_project_carries_databases() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path());
        let src = store.create_project("default").unwrap();
        src.write_database(&db("ecoinvent-3.9.1-cutoff")).unwrap();

        let copy = store.copy_project("default", "default-premise").unwrap();
        assert!(copy.has_database("ecoinvent-3.9.1-cutoff"));
        assert_eq!(copy.meta().copied_from.as_deref(), Some("default"));
        assert!(store.copy_project("default", "default-premise").is_err());
    }

    #[test]
    fn test_import_methods_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectStore::new(dir.path()).create_project("p").unwrap();
        let m = ImpactMethod("Waste".into(), "Waste: Total combined".into(), "Total (kg)".into());
        assert_eq!(project.import_methods(&[m.clone()]).unwrap(), 1);
        assert_eq!(project.import_methods(&[m]).unwrap(), 0);
        assert_eq!(project.methods().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_database_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectStore::new(dir.path()).create_project("p").unwrap();
        assert!(project.write_database(&db("../escape")).is_err());
    }
}
