//! Dependency installer
//!
//! Brings the host up to the [`ToolRequirement`] list. The whole plan is
//! checked before anything is installed: if any missing tool has no recipe
//! for this host, nothing runs. Every install is followed by a re-probe, so a
//! tool only counts as installed once it can actually be invoked.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::HostEnvError;
use crate::mutation::{path_export_line, AliasLink, EnvironmentMutation};
use crate::process::{run_checked, CommandRunner, CommandSpec};
use crate::profile::HostProfile;
use crate::requirements::{AliasRequirement, ToolRequirement};
use crate::Result;

/// Per-user locations the installer may write to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLayout {
    pub home: Option<PathBuf>,
    /// Where alias links are created.
    pub bin_dir: PathBuf,
    /// Shell start-up files that receive the `PATH` export.
    pub shell_profiles: Vec<PathBuf>,
}

impl UserLayout {
    /// Layout rooted at the given home directory.
    pub fn for_home(home: &Path) -> Self {
        UserLayout {
            home: Some(home.to_path_buf()),
            bin_dir: home.join(".local").join("bin"),
            shell_profiles: vec![home.join(".bashrc"), home.join(".zshrc")],
        }
    }

    /// Layout for the current user; falls back to `./.local/bin` without a home.
    pub fn detect() -> Self {
        match dirs::home_dir() {
            Some(home) => Self::for_home(&home),
            None => UserLayout {
                home: None,
                bin_dir: PathBuf::from(".local").join("bin"),
                shell_profiles: Vec::new(),
            },
        }
    }
}

/// Outcome of [`Installer::ensure`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Requirements that were installed during this run, in order.
    pub installed: Vec<String>,
    /// Host changes still to be applied with [`crate::mutation::apply`].
    pub mutation: EnvironmentMutation,
}

impl InstallReport {
    pub fn install_count(&self) -> usize {
        self.installed.len()
    }
}

/// Installs missing tools through the host's package manager.
pub struct Installer<'a> {
    runner: &'a dyn CommandRunner,
    profile: HostProfile,
    aliases: Vec<AliasRequirement>,
    layout: Option<UserLayout>,
}

impl<'a> Installer<'a> {
    pub fn new(runner: &'a dyn CommandRunner, profile: HostProfile) -> Self {
        Installer {
            runner,
            profile,
            aliases: Vec::new(),
            layout: None,
        }
    }

    /// Also provide these aliases, linking them under `layout.bin_dir`.
    pub fn with_aliases(mut self, aliases: Vec<AliasRequirement>, layout: UserLayout) -> Self {
        self.aliases = aliases;
        self.layout = Some(layout);
        self
    }

    /// Make every requirement usable, in order.
    pub async fn ensure(&self, requirements: &[ToolRequirement]) -> Result<InstallReport> {
        let mut report = InstallReport::default();

        let mut missing = Vec::new();
        for req in requirements {
            match self.locate_requirement(req, &report.mutation.search_path).await {
                Some(extra) => {
                    debug!(tool = %req.name, "already satisfied");
                    if let Some(dir) = extra {
                        report.mutation.add_search_dir(dir);
                    }
                }
                None => missing.push(req),
            }
        }

        if !missing.is_empty() {
            let plan = self.plan(&missing)?;
            for (req, commands) in plan {
                self.install(req, &commands, &mut report).await?;
            }
        }

        let aliases = self.plan_aliases(&report.mutation.search_path).await;
        report.mutation.merge(aliases);

        Ok(report)
    }

    fn plan<'r>(
        &self,
        missing: &[&'r ToolRequirement],
    ) -> Result<Vec<(&'r ToolRequirement, Vec<CommandSpec>)>> {
        let names: Vec<&str> = missing.iter().map(|r| r.name.as_str()).collect();

        if !self.profile.is_supported() {
            return Err(HostEnvError::UnsupportedHost(format!(
                "{} on {}; missing: {}",
                std::env::consts::OS,
                self.profile,
                names.join(", ")
            )));
        }

        missing
            .iter()
            .map(|req| match req.install_commands(self.profile.family) {
                Some(commands) => Ok((*req, commands)),
                None => Err(HostEnvError::MissingDependency {
                    tool: req.name.clone(),
                    family: self.profile.family.to_string(),
                }),
            })
            .collect()
    }

    async fn install(
        &self,
        req: &ToolRequirement,
        commands: &[CommandSpec],
        report: &mut InstallReport,
    ) -> Result<()> {
        info!("Installing {} via {}", req.name, self.profile);
        for cmd in commands {
            let cmd = cmd.clone().with_search_path(&report.mutation.search_path);
            run_checked(self.runner, &cmd).await?;
        }

        match self.locate_requirement(req, &report.mutation.search_path).await {
            Some(extra) => {
                if let Some(dir) = extra {
                    warn!(
                        "{} installed to {} which is not on PATH yet",
                        req.name,
                        dir.display()
                    );
                    report.mutation.add_search_dir(dir);
                }
                report.installed.push(req.name.clone());
                Ok(())
            }
            None => Err(HostEnvError::PostInstallUnavailable {
                tool: req.name.clone(),
                hint: req
                    .remediation
                    .clone()
                    .unwrap_or_else(|| "open a new shell and re-run setup".to_string()),
            }),
        }
    }

    /// `Some(None)` when usable on the current search path, `Some(Some(dir))`
    /// when only usable from one of the requirement's fallback dirs.
    async fn locate_requirement(
        &self,
        req: &ToolRequirement,
        search: &[PathBuf],
    ) -> Option<Option<PathBuf>> {
        if self.checks_pass(req, search).await {
            return Some(None);
        }
        for dir in &req.fallback_dirs {
            let mut extended = search.to_vec();
            extended.push(dir.clone());
            if self.checks_pass(req, &extended).await {
                return Some(Some(dir.clone()));
            }
        }
        None
    }

    async fn checks_pass(&self, req: &ToolRequirement, search: &[PathBuf]) -> bool {
        for check in &req.checks {
            let check = check.clone().with_search_path(search);
            if !self.runner.probe(&check).await {
                debug!(tool = %req.name, check = %check, "check failed");
                return false;
            }
        }
        true
    }

    async fn plan_aliases(&self, search: &[PathBuf]) -> EnvironmentMutation {
        let mut mutation = EnvironmentMutation::default();
        let Some(layout) = &self.layout else {
            return mutation;
        };

        for alias in &self.aliases {
            let probe = CommandSpec::new(alias.alias.as_str())
                .arg("--version")
                .with_search_path(search);
            if self.runner.probe(&probe).await {
                continue;
            }

            let Some(target) = self.runner.locate(&alias.target, search) else {
                warn!(
                    "Cannot alias {} -> {}: target not found",
                    alias.alias, alias.target
                );
                continue;
            };

            mutation.links.push(AliasLink {
                link: layout.bin_dir.join(&alias.alias),
                target,
            });
            mutation.add_search_dir(layout.bin_dir.clone());
            let line = path_export_line(&layout.bin_dir, layout.home.as_deref());
            for profile in &layout.shell_profiles {
                mutation.add_profile_line(profile, line.clone());
            }
        }

        mutation
    }
}
