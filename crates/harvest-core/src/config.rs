//! Pipeline configuration
//!
//! Defaults describe the harvester layout; each can be overridden from the
//! environment so operators can point the wrapper at a fork or a mirror.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_REPO_URL: &str = "https://github.com/ADA-Markets/shadow-harvester.git";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_SYNC_TOOL_URL: &str =
    "https://raw.githubusercontent.com/ADA-Markets/scavenger-tools/main/sync_challenges.py";
pub const DEFAULT_SYNC_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/ADA-Markets/scavenger-tools/main/challenges_from_the_last_24_hours.json";

/// Where everything lives and where the auxiliary artifacts come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Directory holding the working copy and the auxiliary dir
    pub root: PathBuf,
    pub repo_url: String,
    pub branch: String,
    /// Working copy directory name under `root`
    pub repo_dir: String,
    /// Solver crate, relative to the working copy
    pub solver_dir: String,
    /// File carrying the thread-count constant, relative to the solver crate
    pub thread_file: String,
    pub thread_constant: String,
    /// Imported challenge files, relative to the working copy
    pub data_dir: String,
    /// Orchestrator entry point, relative to the working copy
    pub entry_point: String,
    pub aux_dir: String,
    pub sync_tool_url: String,
    pub sync_source_url: String,
    /// File name pattern of the orchestrator's exported state files
    pub export_pattern: String,
    /// Extra directories put in front of `PATH` for workload commands
    pub extra_search_dirs: Vec<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let home = dirs::home_dir();
        let extra_search_dirs = match std::env::var_os("HARVEST_EXTRA_PATH") {
            Some(raw) => std::env::split_paths(&raw).collect(),
            None => home
                .iter()
                .flat_map(|h| [h.join(".cargo").join("bin"), h.join(".local").join("bin")])
                .collect(),
        };

        HarvestConfig {
            root: std::env::var_os("HARVEST_ROOT")
                .map(PathBuf::from)
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from(".")),
            repo_url: std::env::var("HARVEST_REPO_URL")
                .unwrap_or_else(|_| DEFAULT_REPO_URL.to_string()),
            branch: std::env::var("HARVEST_BRANCH").unwrap_or_else(|_| DEFAULT_BRANCH.to_string()),
            repo_dir: "shadow-harvester".to_string(),
            solver_dir: "solver".to_string(),
            thread_file: "src/main.rs".to_string(),
            thread_constant: "NUM_THREADS".to_string(),
            data_dir: "challenges".to_string(),
            entry_point: "main.py".to_string(),
            aux_dir: ".harvest-aux".to_string(),
            sync_tool_url: std::env::var("HARVEST_SYNC_TOOL_URL")
                .unwrap_or_else(|_| DEFAULT_SYNC_TOOL_URL.to_string()),
            sync_source_url: std::env::var("HARVEST_SYNC_SOURCE_URL")
                .unwrap_or_else(|_| DEFAULT_SYNC_SOURCE_URL.to_string()),
            export_pattern: "*scavenger-mine-export-*.json".to_string(),
            extra_search_dirs,
        }
    }
}

impl HarvestConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config rooted at `root`, no extra search dirs.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        HarvestConfig {
            root: root.into(),
            extra_search_dirs: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_repo(mut self, url: &str, branch: &str) -> Self {
        self.repo_url = url.to_string();
        self.branch = branch.to_string();
        self
    }

    pub fn with_sync_urls(mut self, tool: &str, source: &str) -> Self {
        self.sync_tool_url = tool.to_string();
        self.sync_source_url = source.to_string();
        self
    }

    pub fn repo_path(&self) -> PathBuf {
        self.root.join(&self.repo_dir)
    }

    pub fn solver_path(&self) -> PathBuf {
        self.repo_path().join(&self.solver_dir)
    }

    pub fn thread_file_path(&self) -> PathBuf {
        self.solver_path().join(&self.thread_file)
    }

    /// Directory `uv` commands run in.
    pub fn runtime_path(&self) -> PathBuf {
        self.repo_path()
    }

    pub fn data_path(&self) -> PathBuf {
        self.repo_path().join(&self.data_dir)
    }

    pub fn aux_path(&self) -> PathBuf {
        self.root.join(&self.aux_dir)
    }

    /// File name of a download, taken from the last URL segment.
    pub fn artifact_name(url: &str) -> &str {
        let trimmed = url.split(['?', '#']).next().unwrap_or(url);
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    pub fn sync_tool_path(&self) -> PathBuf {
        self.aux_path().join(Self::artifact_name(&self.sync_tool_url))
    }

    pub fn default_sync_source_path(&self) -> PathBuf {
        self.aux_path().join(Self::artifact_name(&self.sync_source_url))
    }

    /// Resolve a `--sync-source` override.
    ///
    /// Absolute paths are kept; a relative name that exists in the auxiliary
    /// dir wins over one relative to the current directory.
    pub fn resolve_sync_source(&self, source: &Path) -> PathBuf {
        if source.is_absolute() {
            return source.to_path_buf();
        }
        let in_aux = self.aux_path().join(source);
        if in_aux.exists() {
            in_aux
        } else {
            source.to_path_buf()
        }
    }
}
