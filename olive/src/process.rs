//! Running Python modules and snippets as subprocesses

use std::ffi::OsStr;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::error::{OliveError, Result};

/// Bytes of stderr kept in error messages
const STDERR_TAIL: usize = 4096;

/// How to start the Python interpreter
///
/// `leading_args` go before `-m`, e.g. `["-3.10"]` for the Windows `py`
/// launcher or `["run", "-n", "olive", "python"]` with `conda`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonCommand {
    pub program: String,
    #[serde(default)]
    pub leading_args: Vec<String>,
}

impl Default for PythonCommand {
    fn default() -> Self {
        Self::new("python")
    }
}

impl PythonCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Run `python -m <module> <args...>` to completion and return stdout
    pub fn run_module<I, S>(&self, module: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run("-m", module, module, args)
    }

    /// Run `python -c <code> <args...>`; `label` names it in logs and errors
    pub fn run_code<I, S>(&self, label: &str, code: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run("-c", code, label, args)
    }

    fn run<I, S>(&self, flag: &str, target: &str, label: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg(flag)
            .arg(target)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let display = format!("{} {} {}", self.program, flag, label);
        log::info!("Running {}", display);

        let output = command.output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            log::debug!("[{}] {}", label, line);
        }

        if !output.status.success() {
            return Err(OliveError::Process {
                command: display,
                status: output.status.to_string(),
                stderr: tail(&stderr, STDERR_TAIL).to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s.trim_end();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].trim_end()
}
