//! Validated command-line invocations.
//!
//! The CLI layer parses tokens; this module decides whether the result is
//! acceptable. Nothing here has side effects, so a rejected invocation never
//! reaches a stage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HarvestError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Setup {
        force: bool,
        threads: Option<u32>,
    },
    Init {
        json_dir: PathBuf,
        sync: bool,
        sync_source: Option<PathBuf>,
    },
    Run {
        max_solvers: Option<u32>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Setup { .. } => "setup",
            Action::Init { .. } => "init",
            Action::Run { .. } => "run",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliInvocation {
    pub action: Action,
}

impl CliInvocation {
    pub fn setup(force: bool, threads: Option<&str>) -> Result<Self> {
        Ok(CliInvocation {
            action: Action::Setup {
                force,
                threads: parse_count("--threads", threads)?,
            },
        })
    }

    pub fn init(json_dir: Option<PathBuf>, sync: bool, sync_source: Option<PathBuf>) -> Result<Self> {
        let json_dir = json_dir
            .filter(|d| !d.as_os_str().is_empty())
            .ok_or_else(|| {
                HarvestError::ArgumentError("init requires a directory of .json files".to_string())
            })?;

        if sync_source.is_some() && !sync {
            debug!("--sync-source given without --sync, sync stays disabled");
        }

        Ok(CliInvocation {
            action: Action::Init {
                json_dir,
                sync,
                sync_source,
            },
        })
    }

    pub fn run(max_solvers: Option<&str>) -> Result<Self> {
        Ok(CliInvocation {
            action: Action::Run {
                max_solvers: parse_count("--max-solvers", max_solvers)?,
            },
        })
    }
}

/// Parse a count flag. A flag given without a value (or with an empty one)
/// means "not set"; anything else must be a positive integer.
pub fn parse_count(flag: &str, raw: Option<&str>) -> Result<Option<u32>> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    match raw.parse::<u32>() {
        Ok(0) | Err(_) => Err(HarvestError::ArgumentError(format!(
            "{flag} expects a positive integer, got '{raw}'"
        ))),
        Ok(n) => Ok(Some(n)),
    }
}
