//! Error taxonomy for the provisioning pipeline.

use std::path::PathBuf;

use host_env_manager::HostEnvError;

/// Fatal pipeline errors. Any of these aborts the remaining stages.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("local branch '{branch}' in {path} cannot be fast-forwarded to origin/{branch}; resolve the divergence manually")]
    RepositoryDivergence { path: PathBuf, branch: String },

    #[error("no .json files found in {0}")]
    NoInputFiles(PathBuf),

    #[error("download of {url} failed: {reason}")]
    DownloadFailure { url: String, reason: String },

    #[error("challenge sync failed: {0}")]
    SyncToolFailure(String),

    #[error("command failed with exit code {code}: {command}")]
    ExternalProcessFailure { command: String, code: i32 },

    #[error("{0}")]
    ArgumentError(String),

    #[error(transparent)]
    Host(#[from] HostEnvError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            HarvestError::ExternalProcessFailure { code, .. } if *code != 0 => *code,
            HarvestError::ArgumentError(_) => 2,
            HarvestError::Host(err) => err.exit_code(),
            _ => 1,
        }
    }

    /// Lift a host-level subprocess failure into the pipeline's own variant.
    pub(crate) fn from_process(err: HostEnvError) -> Self {
        match err {
            HostEnvError::ExternalProcessFailure { command, code } => {
                HarvestError::ExternalProcessFailure { command, code }
            }
            other => HarvestError::Host(other),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, HarvestError>;
