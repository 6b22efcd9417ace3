//! Stage sequencing for `setup`, `init` and `run`.
//!
//! Each stage returns a `Result` and the chain stops at the first error;
//! the only recovered condition is a thread-count patch that cannot be
//! applied, which is reported as a warning.

use std::path::PathBuf;
use std::sync::Arc;

use host_env_manager::{
    default_aliases, default_requirements, detect, mutation, CommandRunner, HostProfile,
    Installer, UserLayout,
};
use tracing::info;

use crate::build;
use crate::config::HarvestConfig;
use crate::dispatch;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::import::{DataImporter, ImportReport, ImportRequest};
use crate::invocation::{Action, CliInvocation};
use crate::patch::{patch_threads, ConstPattern, PatchOutcome};
use crate::source_sync::{self, RepositoryState, SyncOutcome};
use crate::status;
use crate::workload::Workload;

/// Summary of a completed `setup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupReport {
    pub profile: HostProfile,
    pub installed: Vec<String>,
    pub sync: SyncOutcome,
    pub patch: PatchOutcome,
}

pub struct Pipeline {
    config: HarvestConfig,
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn Fetcher>,
    layout: UserLayout,
    host: Option<HostProfile>,
    search_path: Vec<PathBuf>,
}

impl Pipeline {
    pub fn new(config: HarvestConfig, runner: Arc<dyn CommandRunner>, fetcher: Arc<dyn Fetcher>) -> Self {
        let search_path = config.extra_search_dirs.clone();
        Pipeline {
            config,
            runner,
            fetcher,
            layout: UserLayout::detect(),
            host: None,
            search_path,
        }
    }

    /// Use this home layout instead of the current user's.
    pub fn with_layout(mut self, layout: UserLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Skip host detection and assume `profile`.
    pub fn with_host(mut self, profile: HostProfile) -> Self {
        self.host = Some(profile);
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Directories prepended to `PATH` for workload commands.
    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    fn workload(&self) -> Workload {
        Workload {
            runtime_path: self.config.runtime_path(),
            entry_point: self.config.entry_point.clone(),
            search_path: self.search_path.clone(),
        }
    }

    pub async fn dispatch(&mut self, invocation: &CliInvocation) -> Result<()> {
        info!(action = invocation.action.name(), "dispatching");
        match &invocation.action {
            Action::Setup { force, threads } => self.setup(*force, *threads).await.map(|_| ()),
            Action::Init {
                json_dir,
                sync,
                sync_source,
            } => self
                .init(json_dir.clone(), *sync, sync_source.clone())
                .await
                .map(|_| ()),
            Action::Run { max_solvers } => self.run(*max_solvers).await,
        }
    }

    /// Install dependencies, sync the working copy, patch and build.
    pub async fn setup(&mut self, force: bool, threads: Option<u32>) -> Result<SetupReport> {
        let profile = self.host.unwrap_or_else(detect);
        status::info(format!("Host: {profile}"));

        let requirements = default_requirements(self.layout.home.as_deref());
        let report = Installer::new(self.runner.as_ref(), profile)
            .with_aliases(default_aliases(), self.layout.clone())
            .ensure(&requirements)
            .await?;
        if report.installed.is_empty() {
            status::success("All dependencies present");
        } else {
            status::success(format!("Installed: {}", report.installed.join(", ")));
        }

        let applied = mutation::apply(&report.mutation)?;
        for link in &applied.linked {
            status::info(format!("Linked {}", link.display()));
        }
        for file in &applied.appended {
            status::info(format!("Updated PATH in {}", file.display()));
        }
        for dir in report.mutation.search_path.iter().rev() {
            if !self.search_path.contains(dir) {
                self.search_path.insert(0, dir.clone());
            }
        }

        let repo = RepositoryState::new(
            self.config.repo_url.as_str(),
            self.config.branch.as_str(),
            self.config.repo_path(),
        )
        .forced(force);
        let sync = source_sync::sync(self.runner.as_ref(), &repo).await?;
        match sync {
            SyncOutcome::Cloned => status::success(format!("Cloned {} ({})", repo.url, repo.branch)),
            SyncOutcome::Updated => status::success(format!("Updated {} ({})", repo.url, repo.branch)),
        }

        let pattern = ConstPattern::new(&self.config.thread_constant);
        let thread_file = self.config.thread_file_path();
        let patch = patch_threads(&thread_file, &pattern, threads);
        match (patch, threads) {
            (PatchOutcome::Applied, Some(n)) => status::success(format!("{} set to {n}", pattern.name())),
            (PatchOutcome::SkippedMissingFile, _) => status::warn(format!(
                "{} not found, building with the default thread count",
                thread_file.display()
            )),
            (PatchOutcome::PatternNotFound, _) => status::warn(format!(
                "No {} constant in {}, building with the default thread count",
                pattern.name(),
                thread_file.display()
            )),
            (PatchOutcome::Failed, _) => status::warn(format!(
                "Could not update {}, building with the default thread count",
                thread_file.display()
            )),
            _ => {}
        }

        build::build(self.runner.as_ref(), &self.config.solver_path(), &self.search_path).await?;
        status::success("Solver built (release)");
        build::setup_runtime(self.runner.as_ref(), &self.config.runtime_path(), &self.search_path)
            .await?;
        status::success("Python environment ready");

        Ok(SetupReport {
            profile,
            installed: report.installed,
            sync,
            patch,
        })
    }

    /// Stage challenge files, optionally sync them, and initialise the database.
    pub async fn init(
        &self,
        json_dir: PathBuf,
        sync: bool,
        sync_source: Option<PathBuf>,
    ) -> Result<ImportReport> {
        let request = ImportRequest {
            source_dir: json_dir,
            sync_enabled: sync,
            sync_source,
            target_dir: self.config.data_path(),
        };
        let workload = self.workload();
        let report = DataImporter::new(
            self.runner.as_ref(),
            self.fetcher.as_ref(),
            &self.config,
            &workload,
        )
        .import_and_init(&request)
        .await?;

        status::success(format!(
            "Staged {} file(s) into {}",
            report.staged.len(),
            request.target_dir.display()
        ));
        if report.synced {
            status::success("Challenge queue synced");
        }
        status::success(format!(
            "Database initialised from {} file(s)",
            report.initialized.len()
        ));
        Ok(report)
    }

    /// Hand over to the orchestrator until it exits.
    pub async fn run(&self, max_solvers: Option<u32>) -> Result<()> {
        dispatch::run(self.runner.as_ref(), &self.workload(), max_solvers).await
    }
}
