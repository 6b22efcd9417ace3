//! Error types for host-env-manager

use thiserror::Error;

/// Errors that can occur while profiling or provisioning the host
#[derive(Error, Debug)]
pub enum HostEnvError {
    /// The operating system or its package manager is not recognised
    #[error("unsupported host: {0} (install the required tools manually)")]
    UnsupportedHost(String),

    /// A required tool is absent and this host has no install recipe for it
    #[error("missing dependency '{tool}': no install recipe for {family}, install it manually")]
    MissingDependency { tool: String, family: String },

    /// The install step succeeded but the tool still cannot be resolved
    #[error("'{tool}' was installed but is not available on PATH; try: {hint}")]
    PostInstallUnavailable { tool: String, hint: String },

    /// A subprocess exited with a non-zero status
    #[error("command failed with exit code {code}: {command}")]
    ExternalProcessFailure { command: String, code: i32 },

    /// A subprocess could not be started at all
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostEnvError {
    /// Exit code a wrapper process should terminate with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            HostEnvError::ExternalProcessFailure { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}
