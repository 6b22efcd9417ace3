//! Build driver for the solver and the orchestrator runtime.

use std::path::{Path, PathBuf};

use host_env_manager::{run_checked, CommandRunner, CommandSpec};
use tracing::info;

use crate::error::{HarvestError, Result};

fn require_dir(path: &Path, what: &str) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    Err(HarvestError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("{what} directory not found: {}", path.display()),
    )))
}

/// `cargo build --release` in the solver crate.
pub async fn build(runner: &dyn CommandRunner, solver_path: &Path, search: &[PathBuf]) -> Result<()> {
    require_dir(solver_path, "solver")?;
    info!("Building solver in {}", solver_path.display());

    let cmd = CommandSpec::new("cargo")
        .args(["build", "--release"])
        .current_dir(solver_path)
        .with_search_path(search);
    run_checked(runner, &cmd)
        .await
        .map_err(HarvestError::from_process)
}

/// `uv sync` in the orchestrator directory.
pub async fn setup_runtime(runner: &dyn CommandRunner, py_path: &Path, search: &[PathBuf]) -> Result<()> {
    require_dir(py_path, "runtime")?;
    info!("Syncing Python environment in {}", py_path.display());

    let cmd = CommandSpec::new("uv")
        .arg("sync")
        .current_dir(py_path)
        .with_search_path(search);
    run_checked(runner, &cmd)
        .await
        .map_err(HarvestError::from_process)
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_env_manager::fakes::FakeRunner;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_release_build_runs_in_solver_dir() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::new();
        let search = vec![PathBuf::from("/home/miner/.cargo/bin")];

        build(&runner, dir.path(), &search).await.unwrap();

        let specs = runner.executed_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].to_string(), "cargo build --release");
        assert_eq!(specs[0].cwd.as_deref(), Some(dir.path()));
        assert_eq!(specs[0].path_prepend, search);
    }

    #[tokio::test]
    async fn test_build_failure_is_fatal() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::new();
        runner.fail_command("cargo build", 101);

        let err = build(&runner, dir.path(), &[]).await.unwrap_err();
        assert_eq!(err.exit_code(), 101);
    }

    #[tokio::test]
    async fn test_missing_runtime_dir_is_reported() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::new();

        let err = setup_runtime(&runner, &dir.path().join("nope"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Io(_)));
        assert!(runner.executed().is_empty());
    }
}
