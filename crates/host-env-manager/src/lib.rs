//! Host-Env-Manager: host provisioning for Harvest
//!
//! This crate prepares a machine to build and run the harvester workload.
//! It knows how to recognise the host, which tools are required, how to
//! install them with the native package manager, and which lasting changes
//! (alias links, `PATH` exports) the installation leaves behind.
//!
//! ## Key Components
//!
//! - [`profile::detect`]: OS family and package manager
//! - [`requirements::default_requirements`]: the ordered tool list
//! - [`Installer`]: idempotent install with post-install verification
//! - [`EnvironmentMutation`] / [`mutation::apply`]: auditable host edits
//! - [`CommandRunner`]: the single seam for spawning subprocesses

mod error;
pub mod fakes;
pub mod installer;
pub mod mutation;
pub mod process;
pub mod profile;
pub mod requirements;

pub use error::HostEnvError;
pub use installer::{InstallReport, Installer, UserLayout};
pub use mutation::{AliasLink, AppliedMutation, EnvironmentMutation, ProfileLine};
pub use process::{run_checked, CommandRunner, CommandSpec, SystemRunner};
pub use profile::{detect, detect_with, HostFamily, HostProfile, PackageManager};
pub use requirements::{default_aliases, default_requirements, AliasRequirement, ToolRequirement};

/// Result type for host-env-manager operations
pub type Result<T> = std::result::Result<T, HostEnvError>;
