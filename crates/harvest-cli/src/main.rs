//! Harvest - Scavenger Mine harvester CLI
//!
//! Provisions a host for the harvester, keeps its working copy current and
//! drives the orchestrator.
//!
//! ## Commands
//!
//! - `setup`: install dependencies, sync the repository, build the solver
//! - `init`: stage challenge exports and initialise the database
//! - `run`: start mining

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use harvest_core::{status, CliInvocation, HarvestConfig, HarvestError, HttpFetcher, Pipeline};
use host_env_manager::SystemRunner;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Provision, sync, build and run the Scavenger Mine harvester", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory that holds the working copy (default: current directory)
    #[arg(long, global = true, env = "HARVEST_ROOT", value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install dependencies, sync the harvester repository and build the solver
    Setup {
        /// Delete the existing working copy and clone again
        #[arg(long)]
        force: bool,

        /// Solver thread count compiled into the binary
        #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "")]
        threads: Option<String>,
    },

    /// Stage challenge exports and initialise the orchestrator database
    Init {
        /// Directory containing exported .json challenge files
        json_dir: Option<PathBuf>,

        /// Merge the latest published challenge queue into the staged files
        #[arg(long)]
        sync: bool,

        /// Challenge queue to merge instead of the published one (requires --sync)
        #[arg(long, value_name = "FILE")]
        sync_source: Option<PathBuf>,
    },

    /// Start mining until interrupted
    Run {
        /// Upper bound on concurrently running solvers
        #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "")]
        max_solvers: Option<String>,
    },
}

impl Commands {
    fn invocation(self) -> harvest_core::Result<CliInvocation> {
        match self {
            Commands::Setup { force, threads } => CliInvocation::setup(force, threads.as_deref()),
            Commands::Init {
                json_dir,
                sync,
                sync_source,
            } => CliInvocation::init(json_dir, sync, sync_source),
            Commands::Run { max_solvers } => CliInvocation::run(max_solvers.as_deref()),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    harvest_core::init_tracing(cli.json, harvest_core::default_level(cli.verbose));

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code(&err);
            status::error(format!("{err:#}"));
            if code == 2 {
                eprintln!("{}", Cli::command().render_usage());
            }
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let invocation = cli.command.invocation()?;
    debug!(?invocation, "parsed invocation");

    let mut config = HarvestConfig::from_env();
    if let Some(root) = cli.root {
        config.root = root;
    }

    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let mut pipeline = Pipeline::new(config, Arc::new(SystemRunner), Arc::new(fetcher));
    pipeline.dispatch(&invocation).await?;

    status::success(format!("{} complete", invocation.action.name()));
    Ok(())
}

/// Map a failure to the process exit status.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<HarvestError>())
        .map(HarvestError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use harvest_core::Action;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_action_prints_help() {
        let err = Cli::try_parse_from(["harvest"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = Cli::try_parse_from(["harvest", "mine"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_setup_flags() {
        let cli = parse(&["harvest", "setup", "--force", "--threads", "12"]);
        let inv = cli.command.invocation().unwrap();
        assert_eq!(
            inv.action,
            Action::Setup {
                force: true,
                threads: Some(12)
            }
        );
    }

    #[test]
    fn test_threads_without_value_is_unset() {
        let cli = parse(&["harvest", "setup", "--threads"]);
        let inv = cli.command.invocation().unwrap();
        assert_eq!(
            inv.action,
            Action::Setup {
                force: false,
                threads: None
            }
        );
    }

    #[test]
    fn test_bad_thread_count_exits_with_usage_code() {
        let cli = parse(&["harvest", "setup", "--threads", "many"]);
        let err: anyhow::Error = cli.command.invocation().unwrap_err().into();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_init_requires_directory() {
        let cli = parse(&["harvest", "init", "--sync"]);
        let err: anyhow::Error = cli.command.invocation().unwrap_err().into();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_init_with_sync_source() {
        let cli = parse(&[
            "harvest",
            "init",
            "exports",
            "--sync",
            "--sync-source",
            "queue.json",
        ]);
        let inv = cli.command.invocation().unwrap();
        assert_eq!(
            inv.action,
            Action::Init {
                json_dir: PathBuf::from("exports"),
                sync: true,
                sync_source: Some(PathBuf::from("queue.json")),
            }
        );
    }

    #[test]
    fn test_global_flags_after_action() {
        let cli = parse(&["harvest", "run", "--max-solvers", "3", "--verbose", "--json"]);
        assert!(cli.verbose);
        assert!(cli.json);
        let inv = cli.command.invocation().unwrap();
        assert_eq!(inv.action, Action::Run { max_solvers: Some(3) });
    }

    #[test]
    fn test_exit_code_follows_child_process() {
        let err = anyhow::Error::from(HarvestError::ExternalProcessFailure {
            command: "uv run main.py run --challenge-selection first".to_string(),
            code: 130,
        })
        .context("run failed");
        assert_eq!(exit_code(&err), 130);

        let other = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&other), 1);
    }
}
