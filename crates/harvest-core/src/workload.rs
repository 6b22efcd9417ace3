//! Command lines for the orchestrator entry point.

use std::path::PathBuf;

use host_env_manager::CommandSpec;

/// Challenge selection policy passed to `run`.
pub const CHALLENGE_SELECTION: &str = "first";

/// The orchestrator, invoked as `uv run <entry_point> <subcommand> ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub runtime_path: PathBuf,
    pub entry_point: String,
    pub search_path: Vec<PathBuf>,
}

impl Workload {
    fn command(&self, subcommand: &str) -> CommandSpec {
        CommandSpec::new("uv")
            .args(["run", self.entry_point.as_str(), subcommand])
            .current_dir(&self.runtime_path)
            .with_search_path(&self.search_path)
    }

    /// `init <files...>`: load challenge files into the database.
    pub fn init_command(&self, files: &[PathBuf]) -> CommandSpec {
        self.command("init")
            .args(files.iter().map(|f| f.display().to_string()))
    }

    /// `run [--max-solvers N] --challenge-selection first`
    pub fn run_command(&self, max_solvers: Option<u32>) -> CommandSpec {
        let mut cmd = self.command("run");
        if let Some(n) = max_solvers {
            cmd = cmd.arg("--max-solvers").arg(n.to_string());
        }
        cmd.args(["--challenge-selection", CHALLENGE_SELECTION])
    }
}
