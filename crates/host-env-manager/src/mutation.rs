//! Environment mutation
//!
//! Installation can leave the host needing a few lasting tweaks: an alias
//! symlink in a user bin directory, that directory on the search path, and
//! the `PATH` export persisted in shell start-up files. The installer only
//! describes these as an [`EnvironmentMutation`]; [`apply`] is the single
//! place that touches the filesystem.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;

/// A symlink `link -> target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasLink {
    pub link: PathBuf,
    pub target: PathBuf,
}

/// A line to append to a shell start-up file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLine {
    pub file: PathBuf,
    pub line: String,
}

/// Everything setup wants changed in the host environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentMutation {
    pub links: Vec<AliasLink>,
    /// Directories later stages must add in front of `PATH`.
    pub search_path: Vec<PathBuf>,
    pub profile_lines: Vec<ProfileLine>,
}

impl EnvironmentMutation {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.search_path.is_empty() && self.profile_lines.is_empty()
    }

    pub fn add_search_dir(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.search_path.contains(&dir) {
            self.search_path.push(dir);
        }
    }

    pub fn add_profile_line(&mut self, file: impl Into<PathBuf>, line: impl Into<String>) {
        let entry = ProfileLine {
            file: file.into(),
            line: line.into(),
        };
        if !self.profile_lines.contains(&entry) {
            self.profile_lines.push(entry);
        }
    }

    pub fn merge(&mut self, other: EnvironmentMutation) {
        for link in other.links {
            if !self.links.contains(&link) {
                self.links.push(link);
            }
        }
        for dir in other.search_path {
            self.add_search_dir(dir);
        }
        for line in other.profile_lines {
            self.add_profile_line(line.file, line.line);
        }
    }
}

/// What [`apply`] actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedMutation {
    pub linked: Vec<PathBuf>,
    pub appended: Vec<PathBuf>,
    /// Start-up files that did not exist and were left alone.
    pub skipped_profiles: Vec<PathBuf>,
}

/// Shell line putting `dir` in front of `PATH`, written relative to `$HOME`
/// when possible so the start-up file stays portable.
pub fn path_export_line(dir: &Path, home: Option<&Path>) -> String {
    let shown = match home.and_then(|h| dir.strip_prefix(h).ok()) {
        Some(rel) => format!("$HOME/{}", rel.display()),
        None => dir.display().to_string(),
    };
    format!("export PATH=\"{shown}:$PATH\"")
}

/// Apply a mutation to the host.
///
/// Existing links are kept, missing start-up files are tolerated, and lines
/// already present in a start-up file are not appended again.
pub fn apply(mutation: &EnvironmentMutation) -> Result<AppliedMutation> {
    let mut applied = AppliedMutation::default();

    for alias in &mutation.links {
        if let Some(parent) = alias.link.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if alias.link.symlink_metadata().is_ok() {
            debug!(link = %alias.link.display(), "alias already present");
            continue;
        }
        link(&alias.target, &alias.link)?;
        info!(
            "Linked {} -> {}",
            alias.link.display(),
            alias.target.display()
        );
        applied.linked.push(alias.link.clone());
    }

    for entry in &mutation.profile_lines {
        if !entry.file.is_file() {
            debug!(file = %entry.file.display(), "start-up file missing, skipping");
            applied.skipped_profiles.push(entry.file.clone());
            continue;
        }

        let content = std::fs::read_to_string(&entry.file)?;
        if content.lines().any(|l| l.trim() == entry.line.trim()) {
            debug!(file = %entry.file.display(), "line already present");
            continue;
        }

        let mut file = OpenOptions::new().append(true).open(&entry.file)?;
        if !content.is_empty() && !content.ends_with('\n') {
            writeln!(file)?;
        }
        writeln!(file, "{}", entry.line)?;
        info!("Appended PATH export to {}", entry.file.display());
        applied.appended.push(entry.file.clone());
    }

    Ok(applied)
}

#[cfg(unix)]
fn link(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn link(target: &Path, link: &Path) -> std::io::Result<()> {
    std::fs::copy(target, link).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_export_line_relative_to_home() {
        let home = Path::new("/home/miner");
        assert_eq!(
            path_export_line(&home.join(".local/bin"), Some(home)),
            "export PATH=\"$HOME/.local/bin:$PATH\""
        );
        assert_eq!(
            path_export_line(Path::new("/opt/bin"), Some(home)),
            "export PATH=\"/opt/bin:$PATH\""
        );
    }

    #[test]
    fn test_merge_deduplicates() {
        let mut a = EnvironmentMutation::default();
        a.add_search_dir("/home/miner/.local/bin");
        let mut b = EnvironmentMutation::default();
        b.add_search_dir("/home/miner/.local/bin");
        b.add_search_dir("/home/miner/.cargo/bin");
        a.merge(b);
        assert_eq!(a.search_path.len(), 2);
        assert!(!a.is_empty());
        assert!(EnvironmentMutation::default().is_empty());
    }

    #[test]
    fn test_apply_appends_once_and_tolerates_missing_files() {
        let home = tempdir().unwrap();
        let bashrc = home.path().join(".bashrc");
        let zshrc = home.path().join(".zshrc");
        std::fs::write(&bashrc, "alias ll='ls -l'").unwrap();

        let line = path_export_line(&home.path().join(".local/bin"), Some(home.path()));
        let mut mutation = EnvironmentMutation::default();
        mutation.add_profile_line(&bashrc, line.clone());
        mutation.add_profile_line(&zshrc, line.clone());

        let first = apply(&mutation).unwrap();
        assert_eq!(first.appended, vec![bashrc.clone()]);
        assert_eq!(first.skipped_profiles, vec![zshrc.clone()]);
        assert!(!zshrc.exists());

        let second = apply(&mutation).unwrap();
        assert!(second.appended.is_empty());

        let content = std::fs::read_to_string(&bashrc).unwrap();
        assert_eq!(content, format!("alias ll='ls -l'\n{line}\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_apply_creates_alias_link() {
        let home = tempdir().unwrap();
        let target = home.path().join("python3");
        std::fs::write(&target, "#!/bin/sh\n").unwrap();
        let link_path = home.path().join(".local/bin/python");

        let mutation = EnvironmentMutation {
            links: vec![AliasLink {
                link: link_path.clone(),
                target: target.clone(),
            }],
            ..Default::default()
        };

        let applied = apply(&mutation).unwrap();
        assert_eq!(applied.linked, vec![link_path.clone()]);
        assert_eq!(std::fs::read_link(&link_path).unwrap(), target);

        // Re-applying keeps the existing link.
        assert!(apply(&mutation).unwrap().linked.is_empty());
    }
}
