//! Subprocess execution
//!
//! Every external program the provisioner touches (package managers, git,
//! cargo, uv, python) goes through a [`CommandRunner`]. The real
//! implementation is [`SystemRunner`]; tests use [`crate::fakes::FakeRunner`].

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::HostEnvError;
use crate::Result;

/// A fully described command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program name (resolved on the search path) or absolute path
    pub program: String,
    /// Arguments, passed verbatim
    pub args: Vec<String>,
    /// Working directory (inherits the caller's when unset)
    pub cwd: Option<PathBuf>,
    /// Directories searched before the inherited `PATH`
    pub path_prepend: Vec<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            path_prepend: Vec::new(),
        }
    }

    /// Run a line through `sh -c`, for installer pipelines like `curl ... | sh`.
    pub fn shell(line: impl Into<String>) -> Self {
        CommandSpec::new("sh").arg("-c").arg(line)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn with_search_path(mut self, dirs: &[PathBuf]) -> Self {
        self.path_prepend.extend(dirs.iter().cloned());
        self
    }

    /// The bare program name, without any directory component.
    pub fn program_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }

    /// Effective `PATH` value for this command.
    pub fn search_path(&self) -> Option<OsString> {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        if self.path_prepend.is_empty() {
            return Some(inherited);
        }
        let dirs = self
            .path_prepend
            .iter()
            .cloned()
            .chain(std::env::split_paths(&inherited));
        std::env::join_paths(dirs).ok()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Executes external commands on behalf of the provisioning stages.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run with inherited stdio and return the exit code.
    ///
    /// Errors only when the process could not be started.
    async fn status(&self, cmd: &CommandSpec) -> Result<i32>;

    /// Run quietly; `true` iff the command started and exited with 0.
    async fn probe(&self, cmd: &CommandSpec) -> bool;

    /// Resolve `program` on the search path extended with `extra`.
    fn locate(&self, program: &str, extra: &[PathBuf]) -> Option<PathBuf>;
}

/// Run a command and turn a non-zero exit into [`HostEnvError::ExternalProcessFailure`].
pub async fn run_checked(runner: &dyn CommandRunner, cmd: &CommandSpec) -> Result<()> {
    let code = runner.status(cmd).await?;
    if code != 0 {
        return Err(HostEnvError::ExternalProcessFailure {
            command: cmd.to_string(),
            code,
        });
    }
    Ok(())
}

/// [`CommandRunner`] backed by real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        SystemRunner
    }

    fn command(cmd: &CommandSpec) -> Command {
        // Resolve against the extended PATH ourselves: the child's PATH
        // override does not affect how the parent looks up the program.
        let program = if cmd.path_prepend.is_empty() {
            OsString::from(&cmd.program)
        } else {
            SystemRunner
                .locate(&cmd.program, &cmd.path_prepend)
                .map(PathBuf::into_os_string)
                .unwrap_or_else(|| OsString::from(&cmd.program))
        };
        let mut command = Command::new(program);
        command.args(&cmd.args);
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }
        if !cmd.path_prepend.is_empty() {
            if let Some(path) = cmd.search_path() {
                command.env("PATH", path);
            }
        }
        command
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn status(&self, cmd: &CommandSpec) -> Result<i32> {
        debug!(command = %cmd, "spawning");
        let status = Self::command(cmd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| HostEnvError::Spawn {
                command: cmd.to_string(),
                source,
            })?;

        // Killed by a signal: no code, report a generic failure.
        let code = status.code().unwrap_or(1);
        debug!(command = %cmd, code, "exited");
        Ok(code)
    }

    async fn probe(&self, cmd: &CommandSpec) -> bool {
        let output = Self::command(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match output {
            Ok(status) => status.success(),
            Err(err) => {
                debug!(command = %cmd, error = %err, "probe could not start");
                false
            }
        }
    }

    fn locate(&self, program: &str, extra: &[PathBuf]) -> Option<PathBuf> {
        let spec = CommandSpec::new(program).with_search_path(extra);
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(program, spec.search_path(), cwd).ok()
    }
}
