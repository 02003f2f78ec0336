//! Subprocess execution with an environment overlay.
//!
//! Commands run synchronously with inherited stdio. Failures are returned as
//! [`ProcessError`] so the caller decides whether to terminate; nothing in
//! this module exits the process.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use crate::output;

/// Errors from running an external command.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The command could not be started at all (e.g. program not on `PATH`).
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited with a non-zero code.
    #[error("command above failed with exit code {code}: {command}")]
    Failed { command: String, code: i32 },

    /// The command was terminated without an exit code (killed by a signal).
    #[error("command above was terminated by a signal: {command}")]
    Terminated { command: String },
}

impl ProcessError {
    /// Exit code the whole run should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessError::Failed { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}

/// Environment variables layered over the inherited environment for a single
/// invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this overlay with `key` set to `value`.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Build the full environment for a child: `inherited` with every overlay
    /// entry replacing or adding to it.
    pub fn merged_over<I>(&self, inherited: I) -> BTreeMap<OsString, OsString>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut env: BTreeMap<OsString, OsString> = inherited.into_iter().collect();
        for (k, v) in &self.vars {
            env.insert(OsString::from(k), OsString::from(v));
        }
        env
    }

    /// Render as `KEY=value KEY2=value2` for display.
    pub fn display(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: EnvOverlay,
    /// Working directory for the child.
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn new(program: &str, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: EnvOverlay::new(),
            cwd: cwd.into(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, env: EnvOverlay) -> Self {
        self.env = env;
        self
    }

    /// `program arg1 arg2 ...`, as echoed before execution.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs invocations. The packaging flow is written against this trait so it
/// can be driven without a real toolchain.
pub trait Executor {
    fn run(&self, invocation: &Invocation) -> Result<(), ProcessError>;
}

/// Executes commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, invocation: &Invocation) -> Result<(), ProcessError> {
        output::command(&invocation.display());
        if !invocation.env.is_empty() {
            output::verbose_detail(&invocation.env.display());
        }

        let env = invocation.env.merged_over(std::env::vars_os());
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .env_clear()
            .envs(&env)
            .status()
            .map_err(|source| ProcessError::Spawn {
                command: invocation.display(),
                source,
            })?;

        if status.success() {
            return Ok(());
        }
        match status.code() {
            Some(code) => Err(ProcessError::Failed {
                command: invocation.display(),
                code,
            }),
            None => Err(ProcessError::Terminated {
                command: invocation.display(),
            }),
        }
    }
}
