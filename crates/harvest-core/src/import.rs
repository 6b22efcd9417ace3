//! Challenge data import
//!
//! Stages exported challenge files into the orchestrator's data directory,
//! optionally merges the latest published challenge queue into them, and
//! then initialises the orchestrator database from everything staged.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher};
use host_env_manager::{run_checked, CommandRunner, CommandSpec};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};
use crate::fetch::Fetcher;
use crate::workload::Workload;

/// One `init` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Directory holding the `*.json` files to stage
    pub source_dir: PathBuf,
    pub sync_enabled: bool,
    /// Overrides the downloaded default source; only used with `sync_enabled`
    pub sync_source: Option<PathBuf>,
    pub target_dir: PathBuf,
}

/// What [`DataImporter::import_and_init`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub staged: Vec<PathBuf>,
    pub synced: bool,
    /// Files handed to the database initialisation
    pub initialized: Vec<PathBuf>,
}

fn json_matcher() -> GlobMatcher {
    GlobBuilder::new("*.json")
        .literal_separator(true)
        .build()
        .map(|g: Glob| g.compile_matcher())
        .expect("static glob is valid")
}

/// Regular files directly inside `dir` whose name matches `*.json`, sorted.
pub fn find_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(HarvestError::NoInputFiles(dir.to_path_buf()));
    }

    let matcher = json_matcher();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && matcher.is_match(entry.file_name()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Whether `dest` already is `src`. Copying a file onto itself would
/// truncate it.
fn same_file(src: &Path, dest: &Path) -> Result<bool> {
    if !dest.exists() {
        return Ok(false);
    }
    Ok(src.canonicalize()? == dest.canonicalize()?)
}

pub struct DataImporter<'a> {
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn Fetcher,
    config: &'a HarvestConfig,
    workload: &'a Workload,
}

impl<'a> DataImporter<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn Fetcher,
        config: &'a HarvestConfig,
        workload: &'a Workload,
    ) -> Self {
        DataImporter {
            runner,
            fetcher,
            config,
            workload,
        }
    }

    pub async fn import_and_init(&self, request: &ImportRequest) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        std::fs::create_dir_all(&request.target_dir)?;

        let sources = find_json_files(&request.source_dir)?;
        if sources.is_empty() {
            return Err(HarvestError::NoInputFiles(request.source_dir.clone()));
        }

        for src in &sources {
            let Some(name) = src.file_name() else {
                continue;
            };
            let dest = request.target_dir.join(name);
            if same_file(src, &dest)? {
                debug!(path = %dest.display(), "already staged");
            } else {
                std::fs::copy(src, &dest)?;
                debug!(from = %src.display(), to = %dest.display(), "staged");
            }
            report.staged.push(dest);
        }
        info!(
            "Staged {} file(s) into {}",
            report.staged.len(),
            request.target_dir.display()
        );

        if request.sync_enabled {
            self.sync_challenges(request).await?;
            report.synced = true;
        }

        let files = find_json_files(&request.target_dir)?;
        let cmd = self.workload.init_command(&files);
        run_checked(self.runner, &cmd)
            .await
            .map_err(HarvestError::from_process)?;
        report.initialized = files;

        Ok(report)
    }

    async fn sync_challenges(&self, request: &ImportRequest) -> Result<()> {
        let tool = self.config.sync_tool_path();
        let default_source = self.config.default_sync_source_path();
        std::fs::create_dir_all(self.config.aux_path())?;

        self.fetcher
            .download(&self.config.sync_tool_url, &tool)
            .await?;
        self.fetcher
            .download(&self.config.sync_source_url, &default_source)
            .await?;

        let source = match &request.sync_source {
            Some(custom) => self.config.resolve_sync_source(custom),
            None => default_source,
        };
        if !source.is_file() {
            return Err(HarvestError::SyncToolFailure(format!(
                "sync source not found: {}",
                source.display()
            )));
        }

        let targets = request.target_dir.join(&self.config.export_pattern);
        let cmd = CommandSpec::new("python3")
            .arg(tool.display().to_string())
            .arg("--source")
            .arg(source.display().to_string())
            .arg("--targets")
            .arg(targets.display().to_string())
            .arg("--no-backup")
            .current_dir(&request.target_dir)
            .with_search_path(&self.workload.search_path);

        info!("Syncing challenge queue from {}", source.display());
        run_checked(self.runner, &cmd)
            .await
            .map_err(|e| HarvestError::SyncToolFailure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_find_json_files_filters_and_sorts() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::write(dir.path().join("upper.JSON"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let files = find_json_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.json", "b.json"]);
    }

    #[test]
    fn test_same_file_detects_aliased_paths() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("scavenger-mine-export-1.json");
        std::fs::write(&file, "{}").unwrap();
        let aliased = dir.path().join(".").join("scavenger-mine-export-1.json");

        assert!(same_file(&file, &aliased).unwrap());
        assert!(!same_file(&file, &dir.path().join("other.json")).unwrap());
    }

    #[test]
    fn test_missing_source_dir_has_no_input_files() {
        let dir = tempdir().unwrap();
        let err = find_json_files(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, HarvestError::NoInputFiles(_)));
    }
}
