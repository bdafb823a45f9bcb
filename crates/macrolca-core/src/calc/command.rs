use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::calc::{ImpactSolver, SolverFactory};
use crate::error::MacroLcaError;
use crate::model::ImpactMethod;
use crate::store::Project;

/// Solver backend that runs an external program per database.
///
/// The program is started as `<program> <args...> <project_dir> <database>`
/// and answers one JSON request per line on stdin with one JSON response per
/// line on stdout:
///
/// ```text
/// {"op":"factorize","code":"..."}          -> {"ok":true}
/// {"op":"score","method":["f","c","i"]}    -> {"ok":true,"score":1.5e-3}
/// ```
pub struct CommandSolverFactory {
    program: String,
    args: Vec<String>,
}

impl CommandSolverFactory {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        CommandSolverFactory {
            program: program.into(),
            args,
        }
    }
}

impl SolverFactory for CommandSolverFactory {
    fn open(&self, project: &Project, database: &str) -> Result<Box<dyn ImpactSolver>, MacroLcaError> {
        let solver = CommandSolver::spawn(&self.program, &self.args, project, database)?;
        Ok(Box::new(solver))
    }

    fn backend_name(&self) -> &str {
        &self.program
    }
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum SolverRequest<'a> {
    Factorize { code: &'a str },
    Score { method: &'a ImpactMethod },
}

#[derive(Deserialize)]
struct SolverResponse {
    ok: bool,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

pub struct CommandSolver {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl CommandSolver {
    pub fn spawn(
        program: &str,
        args: &[String],
        project: &Project,
        database: &str,
    ) -> Result<Self, MacroLcaError> {
        let mut child = Command::new(program)
            .args(args)
            .arg(project.dir())
            .arg(database)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MacroLcaError::SolverNotFound(program.to_string())
                } else {
                    MacroLcaError::Io(e)
                }
            })?;
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| MacroLcaError::Solver("solver stdout unavailable".into()))?;
        Ok(CommandSolver {
            child,
            stdin,
            stdout,
        })
    }

    fn request(&mut self, request: &SolverRequest<'_>) -> Result<SolverResponse, MacroLcaError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MacroLcaError::Solver("solver stdin closed".into()))?;
        let line = serde_json::to_string(request)?;
        writeln!(stdin, "{line}")?;
        stdin.flush()?;

        let mut reply = String::new();
        if self.stdout.read_line(&mut reply)? == 0 {
            return Err(MacroLcaError::Solver("solver process exited".into()));
        }
        let response: SolverResponse = serde_json::from_str(reply.trim())?;
        if !response.ok {
            return Err(MacroLcaError::Solver(
                response.error.unwrap_or_else(|| "unspecified solver error".into()),
            ));
        }
        Ok(response)
    }
}

impl ImpactSolver for CommandSolver {
    fn factorize(&mut self, code: &str) -> Result<(), MacroLcaError> {
        self.request(&SolverRequest::Factorize { code })?;
        Ok(())
    }

    fn score(&mut self, method: &ImpactMethod) -> Result<f64, MacroLcaError> {
        self.request(&SolverRequest::Score { method })?
            .score
            .ok_or_else(|| MacroLcaError::Solver(format!("no score returned for {method}")))
    }
}

impl Drop for CommandSolver {
    fn drop(&mut self) {
        // closing stdin ends the solver's read loop
        self.stdin.take();
        if let Err(e) = self.child.wait() {
            tracing::warn!(error = %e, "failed to reap solver process");
        }
    }
}
