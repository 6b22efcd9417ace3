//! Host profiling
//!
//! Works out which operating system family we are running on and which
//! native package manager goes with it. Recomputed on every invocation.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Operating system family, as far as package installation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostFamily {
    Debian,
    Fedora,
    Arch,
    GenericLinux,
    Mac,
    Unknown,
}

impl HostFamily {
    pub fn package_manager(self) -> PackageManager {
        match self {
            HostFamily::Debian => PackageManager::Apt,
            HostFamily::Fedora => PackageManager::Dnf,
            HostFamily::Arch => PackageManager::Pacman,
            HostFamily::Mac => PackageManager::Homebrew,
            HostFamily::GenericLinux | HostFamily::Unknown => PackageManager::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HostFamily::Debian => "debian",
            HostFamily::Fedora => "fedora",
            HostFamily::Arch => "arch",
            HostFamily::GenericLinux => "generic-linux",
            HostFamily::Mac => "mac",
            HostFamily::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HostFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Native package manager matching a [`HostFamily`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManager {
    Apt,
    Dnf,
    Pacman,
    Homebrew,
    None,
}

impl PackageManager {
    /// Executable name, if there is one.
    pub fn binary(self) -> Option<&'static str> {
        match self {
            PackageManager::Apt => Some("apt-get"),
            PackageManager::Dnf => Some("dnf"),
            PackageManager::Pacman => Some("pacman"),
            PackageManager::Homebrew => Some("brew"),
            PackageManager::None => None,
        }
    }
}

/// Snapshot of the running host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostProfile {
    pub family: HostFamily,
    pub package_manager: PackageManager,
}

impl HostProfile {
    pub fn new(family: HostFamily) -> Self {
        HostProfile {
            family,
            package_manager: family.package_manager(),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.family != HostFamily::Unknown
    }
}

impl std::fmt::Display for HostProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.package_manager.binary() {
            Some(pm) => write!(f, "{} ({})", self.family, pm),
            None => write!(f, "{} (no package manager)", self.family),
        }
    }
}

/// Profile the current host.
pub fn detect() -> HostProfile {
    detect_with(std::env::consts::OS, |bin| which::which(bin).is_ok())
}

/// Profile a host given its OS name and a binary lookup.
///
/// Never fails: anything unrecognised becomes [`HostFamily::Unknown`].
pub fn detect_with(os: &str, has_binary: impl Fn(&str) -> bool) -> HostProfile {
    let family = match os {
        "macos" => HostFamily::Mac,
        "linux" => {
            if has_binary("apt-get") {
                HostFamily::Debian
            } else if has_binary("dnf") {
                HostFamily::Fedora
            } else if has_binary("pacman") {
                HostFamily::Arch
            } else {
                HostFamily::GenericLinux
            }
        }
        _ => HostFamily::Unknown,
    };

    let profile = HostProfile::new(family);
    debug!(os, %profile, "host profiled");
    profile
}
