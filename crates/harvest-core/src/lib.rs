//! Harvest Core Library
//!
//! The stages behind the `harvest` command: synchronise the harvester
//! working copy, patch and build the solver, stage challenge data and hand
//! control to the Python orchestrator.

pub mod build;
pub mod config;
pub mod dispatch;
mod error;
pub mod fakes;
pub mod fetch;
pub mod import;
pub mod invocation;
pub mod patch;
pub mod pipeline;
pub mod source_sync;
pub mod status;
pub mod telemetry;
pub mod workload;

pub use config::HarvestConfig;
pub use error::{HarvestError, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use import::{find_json_files, DataImporter, ImportReport, ImportRequest};
pub use invocation::{Action, CliInvocation};
pub use patch::{patch_threads, ConstPattern, PatchOutcome};
pub use pipeline::{Pipeline, SetupReport};
pub use source_sync::{RepositoryState, SyncOutcome};
pub use telemetry::{default_level, init_tracing};
pub use workload::Workload;
