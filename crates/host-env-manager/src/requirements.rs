//! Tool requirements
//!
//! The ordered list of tools the harvester needs on the host, how to tell
//! whether each one is usable, and how to install it per [`HostFamily`].
//! Install tables are exhaustive matches so a new family cannot be added
//! without deciding what happens for every tool.

use std::path::{Path, PathBuf};

use crate::process::CommandSpec;
use crate::profile::HostFamily;

/// Per-family install recipe. `None` means "no way to install here".
pub type InstallTable = fn(HostFamily) -> Option<Vec<CommandSpec>>;

/// A tool that must be usable before the workload can be built.
#[derive(Debug, Clone)]
pub struct ToolRequirement {
    pub name: String,
    /// All of these must exit 0 for the tool to count as present.
    pub checks: Vec<CommandSpec>,
    pub install: InstallTable,
    /// Where installers drop binaries that may not be on `PATH` yet.
    pub fallback_dirs: Vec<PathBuf>,
    /// Shown when the tool is still missing after installation.
    pub remediation: Option<String>,
}

impl ToolRequirement {
    pub fn new(name: impl Into<String>, install: InstallTable) -> Self {
        ToolRequirement {
            name: name.into(),
            checks: Vec::new(),
            install,
            fallback_dirs: Vec::new(),
            remediation: None,
        }
    }

    /// Require `<program> --version` to succeed.
    pub fn check_version(self, program: &str) -> Self {
        self.check(CommandSpec::new(program).arg("--version"))
    }

    pub fn check(mut self, cmd: CommandSpec) -> Self {
        self.checks.push(cmd);
        self
    }

    pub fn fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dirs.push(dir.into());
        self
    }

    pub fn remediation(mut self, hint: impl Into<String>) -> Self {
        self.remediation = Some(hint.into());
        self
    }

    pub fn install_commands(&self, family: HostFamily) -> Option<Vec<CommandSpec>> {
        (self.install)(family)
    }
}

/// A convenience name that should resolve to an existing binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRequirement {
    pub alias: String,
    pub target: String,
}

const RUSTUP_INSTALL: &str = "curl --proto '=https' --tlsv1.2 -sSf https://sh.rustup.rs | sh -s -- -y";
const UV_INSTALL: &str = "curl -LsSf https://astral.sh/uv/install.sh | sh";

fn sudo(program: &str, args: &[&str]) -> CommandSpec {
    CommandSpec::new("sudo").arg(program).args(args.iter().copied())
}

fn build_tools(family: HostFamily) -> Option<Vec<CommandSpec>> {
    match family {
        HostFamily::Debian => Some(vec![
            sudo("apt-get", &["update"]),
            sudo("apt-get", &["install", "-y", "build-essential", "curl"]),
        ]),
        HostFamily::Fedora => Some(vec![sudo(
            "dnf",
            &["install", "-y", "curl", "gcc", "gcc-c++", "make"],
        )]),
        HostFamily::Arch => Some(vec![sudo(
            "pacman",
            &["-Sy", "--noconfirm", "--needed", "curl", "base-devel"],
        )]),
        HostFamily::Mac => Some(vec![
            CommandSpec::new("xcode-select").arg("--install"),
            CommandSpec::new("brew").args(["install", "curl"]),
        ]),
        HostFamily::GenericLinux | HostFamily::Unknown => None,
    }
}

fn git(family: HostFamily) -> Option<Vec<CommandSpec>> {
    match family {
        HostFamily::Debian => Some(vec![sudo("apt-get", &["install", "-y", "git"])]),
        HostFamily::Fedora => Some(vec![sudo("dnf", &["install", "-y", "git"])]),
        HostFamily::Arch => Some(vec![sudo(
            "pacman",
            &["-S", "--noconfirm", "--needed", "git"],
        )]),
        HostFamily::Mac => Some(vec![CommandSpec::new("brew").args(["install", "git"])]),
        HostFamily::GenericLinux | HostFamily::Unknown => None,
    }
}

fn python(family: HostFamily) -> Option<Vec<CommandSpec>> {
    match family {
        HostFamily::Debian => Some(vec![sudo(
            "apt-get",
            &["install", "-y", "python3", "python3-pip", "python3-venv"],
        )]),
        HostFamily::Fedora => Some(vec![sudo(
            "dnf",
            &["install", "-y", "python3", "python3-pip"],
        )]),
        HostFamily::Arch => Some(vec![sudo(
            "pacman",
            &["-S", "--noconfirm", "--needed", "python", "python-pip"],
        )]),
        HostFamily::Mac => Some(vec![CommandSpec::new("brew").args(["install", "python"])]),
        HostFamily::GenericLinux | HostFamily::Unknown => None,
    }
}

fn rust_toolchain(family: HostFamily) -> Option<Vec<CommandSpec>> {
    match family {
        HostFamily::Debian
        | HostFamily::Fedora
        | HostFamily::Arch
        | HostFamily::GenericLinux
        | HostFamily::Mac => Some(vec![CommandSpec::shell(RUSTUP_INSTALL)]),
        HostFamily::Unknown => None,
    }
}

fn uv(family: HostFamily) -> Option<Vec<CommandSpec>> {
    match family {
        HostFamily::Debian | HostFamily::Fedora | HostFamily::Arch | HostFamily::GenericLinux => {
            Some(vec![CommandSpec::shell(UV_INSTALL)])
        }
        HostFamily::Mac => Some(vec![CommandSpec::new("brew").args(["install", "uv"])]),
        HostFamily::Unknown => None,
    }
}

/// The harvester's tool list, in install order.
///
/// `home` locates the per-user install directories used by the toolchain
/// installers; without it no fallback lookup happens.
pub fn default_requirements(home: Option<&Path>) -> Vec<ToolRequirement> {
    let mut rust = ToolRequirement::new("rust", rust_toolchain)
        .check_version("cargo")
        .check_version("rustc")
        .remediation("source \"$HOME/.cargo/env\" and re-run setup");
    let mut uv_req = ToolRequirement::new("uv", uv)
        .check_version("uv")
        .remediation("add \"$HOME/.local/bin\" to PATH and re-run setup");

    if let Some(home) = home {
        rust = rust.fallback_dir(home.join(".cargo").join("bin"));
        uv_req = uv_req.fallback_dir(home.join(".local").join("bin"));
    }

    vec![
        ToolRequirement::new("curl+build-tools", build_tools)
            .check_version("curl")
            .check_version("cc")
            .remediation("finish installing the system compiler toolchain and re-run setup"),
        ToolRequirement::new("git", git).check_version("git"),
        ToolRequirement::new("python3+pip", python)
            .check_version("python3")
            .check(CommandSpec::new("python3").args(["-m", "pip", "--version"])),
        rust,
        uv_req,
    ]
}

/// Convenience aliases expected by the workload's scripts.
pub fn default_aliases() -> Vec<AliasRequirement> {
    vec![AliasRequirement {
        alias: "python".to_string(),
        target: "python3".to_string(),
    }]
}
