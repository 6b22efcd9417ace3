//! Working copy synchronisation.
//!
//! Keeps a local clone of the harvester repository on a given branch. An
//! existing clone is only ever fast-forwarded: if the local branch has
//! commits upstream does not, we stop before touching the working tree.

use std::path::{Path, PathBuf};

use host_env_manager::{run_checked, CommandRunner, CommandSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{HarvestError, Result};

/// Where the working copy lives and what it should track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryState {
    pub url: String,
    pub branch: String,
    pub local_path: PathBuf,
    /// Discard any existing copy and clone from scratch
    pub force: bool,
}

impl RepositoryState {
    pub fn new(url: impl Into<String>, branch: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        RepositoryState {
            url: url.into(),
            branch: branch.into(),
            local_path: local_path.into(),
            force: false,
        }
    }

    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Whether version-control metadata is present at `local_path`.
    pub fn exists(&self) -> bool {
        self.local_path.join(".git").exists()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    Cloned,
    Updated,
}

fn git_in(dir: &Path) -> CommandSpec {
    CommandSpec::new("git").arg("-C").arg(dir.display().to_string())
}

async fn git(runner: &dyn CommandRunner, cmd: CommandSpec) -> Result<()> {
    run_checked(runner, &cmd)
        .await
        .map_err(HarvestError::from_process)
}

/// Bring `repo.local_path` to the tip of `repo.branch`.
pub async fn sync(runner: &dyn CommandRunner, repo: &RepositoryState) -> Result<SyncOutcome> {
    if repo.force && repo.local_path.exists() {
        info!("Removing {} for a fresh clone", repo.local_path.display());
        std::fs::remove_dir_all(&repo.local_path)?;
    }

    if repo.exists() {
        update(runner, repo).await?;
        Ok(SyncOutcome::Updated)
    } else {
        clone(runner, repo).await?;
        Ok(SyncOutcome::Cloned)
    }
}

async fn clone(runner: &dyn CommandRunner, repo: &RepositoryState) -> Result<()> {
    info!("Cloning {} into {}", repo.url, repo.local_path.display());
    if let Some(parent) = repo.local_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    git(
        runner,
        CommandSpec::new("git")
            .arg("clone")
            .arg(repo.url.as_str())
            .arg(repo.local_path.display().to_string()),
    )
    .await?;
    git(runner, git_in(&repo.local_path).args(["checkout", repo.branch.as_str()])).await
}

async fn update(runner: &dyn CommandRunner, repo: &RepositoryState) -> Result<()> {
    let dir = &repo.local_path;
    info!("Updating {} ({})", dir.display(), repo.branch);

    git(runner, git_in(dir).args(["fetch", "--all", "--prune"])).await?;

    let local_ref = format!("refs/heads/{}", repo.branch);
    let has_branch = git_in(dir).args(["rev-parse", "--verify", "--quiet", local_ref.as_str()]);
    if runner.status(&has_branch).await? == 0 {
        ensure_fast_forward(runner, repo, &local_ref).await?;
    } else {
        debug!(branch = %repo.branch, "no local branch yet, checkout will create it");
    }

    git(runner, git_in(dir).args(["checkout", repo.branch.as_str()])).await?;
    git(runner, git_in(dir).args(["pull", "--ff-only"])).await
}

/// Refuse to continue when the local branch is not an ancestor of upstream.
async fn ensure_fast_forward(
    runner: &dyn CommandRunner,
    repo: &RepositoryState,
    local_ref: &str,
) -> Result<()> {
    let upstream = format!("refs/remotes/origin/{}", repo.branch);
    let check = git_in(&repo.local_path).args([
        "merge-base",
        "--is-ancestor",
        local_ref,
        upstream.as_str(),
    ]);

    match runner.status(&check).await? {
        0 => Ok(()),
        1 => Err(HarvestError::RepositoryDivergence {
            path: repo.local_path.clone(),
            branch: repo.branch.clone(),
        }),
        code => Err(HarvestError::ExternalProcessFailure {
            command: check.to_string(),
            code,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_env_manager::fakes::FakeRunner;
    use tempfile::tempdir;

    const URL: &str = "https://example.org/shadow-harvester.git";

    fn with_git_dir(path: &Path) {
        std::fs::create_dir_all(path.join(".git")).unwrap();
    }

    #[tokio::test]
    async fn test_absent_copy_is_cloned() {
        let root = tempdir().unwrap();
        let repo = RepositoryState::new(URL, "main", root.path().join("copy"));
        let runner = FakeRunner::new();

        assert_eq!(sync(&runner, &repo).await.unwrap(), SyncOutcome::Cloned);

        let cmds = runner.executed();
        assert_eq!(cmds.len(), 2);
        assert!(cmds[0].starts_with(&format!("git clone {URL}")));
        assert!(cmds[1].ends_with("checkout main"));
    }

    #[tokio::test]
    async fn test_present_copy_is_fetched_and_fast_forwarded() {
        let root = tempdir().unwrap();
        let path = root.path().join("copy");
        with_git_dir(&path);
        let repo = RepositoryState::new(URL, "main", &path);
        let runner = FakeRunner::new();

        assert_eq!(sync(&runner, &repo).await.unwrap(), SyncOutcome::Updated);

        let cmds = runner.executed();
        assert!(cmds[0].ends_with("fetch --all --prune"));
        assert!(cmds[1].contains("rev-parse --verify --quiet refs/heads/main"));
        assert!(cmds[2].contains("merge-base --is-ancestor refs/heads/main refs/remotes/origin/main"));
        assert!(cmds[3].ends_with("checkout main"));
        assert!(cmds[4].ends_with("pull --ff-only"));
        assert!(!cmds.iter().any(|c| c.contains("clone")));
    }

    #[tokio::test]
    async fn test_divergence_stops_before_checkout() {
        let root = tempdir().unwrap();
        let path = root.path().join("copy");
        with_git_dir(&path);
        let repo = RepositoryState::new(URL, "main", &path);
        let runner = FakeRunner::new();
        runner.fail_command("merge-base --is-ancestor", 1);

        let err = sync(&runner, &repo).await.unwrap_err();
        assert!(matches!(err, HarvestError::RepositoryDivergence { .. }));
        assert!(!runner.executed().iter().any(|c| c.contains("checkout") || c.contains("pull")));
    }

    #[tokio::test]
    async fn test_missing_local_branch_skips_ancestry_check() {
        let root = tempdir().unwrap();
        let path = root.path().join("copy");
        with_git_dir(&path);
        let repo = RepositoryState::new(URL, "release", &path);
        let runner = FakeRunner::new();
        runner.fail_command("rev-parse --verify", 1);

        sync(&runner, &repo).await.unwrap();
        assert!(!runner.executed().iter().any(|c| c.contains("merge-base")));
    }

    #[tokio::test]
    async fn test_forced_reset_discards_existing_copy() {
        let root = tempdir().unwrap();
        let path = root.path().join("copy");
        with_git_dir(&path);
        std::fs::write(path.join("stale.txt"), "old").unwrap();
        let repo = RepositoryState::new(URL, "main", &path).forced(true);
        let runner = FakeRunner::new();

        assert_eq!(sync(&runner, &repo).await.unwrap(), SyncOutcome::Cloned);
        assert!(!path.join("stale.txt").exists());
        assert!(runner.executed()[0].starts_with("git clone"));
    }

    #[tokio::test]
    async fn test_clone_failure_is_fatal() {
        let root = tempdir().unwrap();
        let repo = RepositoryState::new(URL, "main", root.path().join("copy"));
        let runner = FakeRunner::new();
        runner.fail_command("git clone", 128);

        let err = sync(&runner, &repo).await.unwrap_err();
        assert!(matches!(
            err,
            HarvestError::ExternalProcessFailure { code: 128, .. }
        ));
        assert_eq!(runner.executed().len(), 1);
    }
}
