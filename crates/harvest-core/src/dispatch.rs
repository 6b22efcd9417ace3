//! Run dispatcher: hands the terminal over to the orchestrator.

use host_env_manager::CommandRunner;
use tracing::info;

use crate::error::{HarvestError, Result};
use crate::workload::Workload;

/// Start the orchestrator and block until it exits.
///
/// A non-zero exit is reported as [`HarvestError::ExternalProcessFailure`]
/// carrying the orchestrator's own exit code.
pub async fn run(runner: &dyn CommandRunner, workload: &Workload, max_solvers: Option<u32>) -> Result<()> {
    let cmd = workload.run_command(max_solvers);
    info!("Starting orchestrator: {}", cmd);

    let code = runner
        .status(&cmd)
        .await
        .map_err(HarvestError::from_process)?;
    if code != 0 {
        return Err(HarvestError::ExternalProcessFailure {
            command: cmd.to_string(),
            code,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_env_manager::fakes::FakeRunner;
    use std::path::PathBuf;

    fn workload() -> Workload {
        Workload {
            runtime_path: PathBuf::from("/srv/harvest/shadow-harvester"),
            entry_point: "main.py".to_string(),
            search_path: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_run_forwards_max_solvers() {
        let runner = FakeRunner::new();
        run(&runner, &workload(), Some(3)).await.unwrap();
        assert_eq!(
            runner.executed(),
            vec!["uv run main.py run --max-solvers 3 --challenge-selection first"]
        );
    }

    #[tokio::test]
    async fn test_exit_code_is_inherited() {
        let runner = FakeRunner::new();
        runner.fail_command("main.py run", 130);

        let err = run(&runner, &workload(), None).await.unwrap_err();
        assert_eq!(err.exit_code(), 130);
    }
}
