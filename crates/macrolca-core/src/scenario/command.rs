use crate::error::MacroLcaError;
use crate::model::Database;
use crate::scenario::{GenerationRequest, ScenarioGenerator};
use std::io::Write;
use std::process::Command;

/// Scenario backend that runs an external program.
///
/// The program is called as `<program> <args...> <request.json>` and must
/// write one `<database>.json` export per expected database into the
/// request's `output_dir`.
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        CommandGenerator {
            program: program.into(),
            args,
        }
    }
}

impl ScenarioGenerator for CommandGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Vec<Database>, MacroLcaError> {
        let mut request_file = tempfile::Builder::new()
            .prefix("scenario-request-")
            .suffix(".json")
            .tempfile()?;
        serde_json::to_writer_pretty(request_file.as_file_mut(), request)?;
        request_file.as_file_mut().flush()?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(request_file.path())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MacroLcaError::GeneratorNotFound(self.program.clone())
                } else {
                    MacroLcaError::Io(e)
                }
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(MacroLcaError::GeneratorFailed { code, stderr });
        }

        let mut databases = Vec::new();
        for name in request.expected_databases() {
            let path = request.output_dir.join(format!("{name}.json"));
            if !path.is_file() {
                tracing::warn!(database = %name, path = %path.display(), "no export written");
                continue;
            }
            let file = std::fs::File::open(&path)?;
            let mut db: Database = serde_json::from_reader(std::io::BufReader::new(file))?;
            db.name = name;
            databases.push(db);
        }
        Ok(databases)
    }

    fn backend_name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioSpec;

    fn request(dir: &std::path::Path) -> GenerationRequest {
        GenerationRequest {
            source_database: "ecoinvent-3.9.1-cutoff".into(),
            source_path: dir.join("source.json"),
            scenarios: vec![ScenarioSpec::new("remind", "SSP1-PkBudg500", 2030)],
            output_dir: dir.to_path_buf(),
            superstructure: None,
        }
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let generator = CommandGenerator::new("definitely-not-a-scenario-tool-xyz", vec![]);
        assert!(matches!(
            generator.generate(&request(dir.path())),
            Err(MacroLcaError::GeneratorNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_reads_back_exports() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("SSP1-PkBudg500-2030.json");
        let script = format!(
            r#"echo '{{"name":"x","activities":[]}}' > '{}'"#,
            export.display()
        );
        let generator = CommandGenerator::new("sh", vec!["-c".into(), script, "sh".into()]);
        let dbs = generator.generate(&request(dir.path())).unwrap();
        assert_eq!(dbs.len(), 1);
        assert_eq!(dbs[0].name, "SSP1-PkBudg500-2030");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program() {
        let dir = tempfile::tempdir().unwrap();
        let generator = CommandGenerator::new(
            "sh",
            vec!["-c".into(), "echo boom >&2; exit 3".into(), "sh".into()],
        );
        match generator.generate(&request(dir.path())) {
            Err(MacroLcaError::GeneratorFailed { code, stderr }) => {
                assert_eq!(code, 3);
                assert!(stderr.contains("boom"));
            }
            other => panic!("expected GeneratorFailed, got {other:?}"),
        }
    }
}
