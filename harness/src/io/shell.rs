//! Runner seam for downloaded bootstrap scripts.
//!
//! The [`ShellRunner`] trait decouples the creation workflow from the actual
//! interpreter. Tests use recording runners that never spawn processes.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument, warn};

use crate::io::config::CommandConfig;
use crate::io::process::run_command_with_timeout;

/// Parameters for one script execution.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub script_path: PathBuf,
    /// Path to write the script's stdout/stderr log.
    pub log_path: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl ScriptRequest {
    /// Request for `script_path` using the limits from `cfg`; the log lands
    /// next to the script with a `.log` extension.
    pub fn for_script(script_path: &Path, cfg: &CommandConfig) -> Self {
        Self {
            script_path: script_path.to_path_buf(),
            log_path: script_path.with_extension("log"),
            timeout: Duration::from_secs(cfg.timeout_secs),
            output_limit_bytes: cfg.output_limit_bytes,
        }
    }
}

/// Classified result of a script execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOutcome {
    Succeeded,
    Failed { code: Option<i32> },
    TimedOut,
}

impl fmt::Display for ScriptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed { code: Some(code) } => write!(f, "failed with exit code {code}"),
            Self::Failed { code: None } => f.write_str("terminated by signal"),
            Self::TimedOut => f.write_str("timed out"),
        }
    }
}

pub trait ShellRunner {
    fn run(&self, request: &ScriptRequest) -> Result<ScriptOutcome>;
}

/// Runs scripts through a configured interpreter (`bash` by default).
pub struct InterpreterShellRunner {
    interpreter: Vec<String>,
}

impl InterpreterShellRunner {
    pub fn new(interpreter: Vec<String>) -> Self {
        Self { interpreter }
    }

    pub fn from_config(cfg: &CommandConfig) -> Self {
        Self::new(cfg.interpreter.clone())
    }
}

impl ShellRunner for InterpreterShellRunner {
    #[instrument(skip_all, fields(script = %request.script_path.display()))]
    fn run(&self, request: &ScriptRequest) -> Result<ScriptOutcome> {
        let (program, args) = self
            .interpreter
            .split_first()
            .ok_or_else(|| anyhow!("interpreter must not be empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(args).arg(&request.script_path);
        if let Some(dir) = request.script_path.parent() {
            cmd.current_dir(dir);
        }

        info!("running script");
        let output = run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes)
            .with_context(|| format!("run script {}", request.script_path.display()))?;
        write_script_log(
            &request.log_path,
            &output.render_log("script"),
            request.output_limit_bytes,
        )?;

        let outcome = if output.timed_out {
            ScriptOutcome::TimedOut
        } else if output.status.success() {
            ScriptOutcome::Succeeded
        } else {
            ScriptOutcome::Failed {
                code: output.status.code(),
            }
        };
        if outcome != ScriptOutcome::Succeeded {
            warn!(%outcome, log = %request.log_path.display(), "script did not succeed");
        }
        Ok(outcome)
    }
}

fn write_script_log(path: &Path, log: &str, output_limit: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create script log dir {}", parent.display()))?;
    }
    let contents = if log.len() > output_limit {
        let mut cut = output_limit;
        while !log.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}\n[truncated {} bytes]\n", &log[..cut], log.len() - cut)
    } else {
        log.to_string()
    };
    fs::write(path, contents).with_context(|| format!("write script log {}", path.display()))
}
