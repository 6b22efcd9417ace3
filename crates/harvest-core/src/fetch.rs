//! Auxiliary artifact downloads
//!
//! The challenge sync helper and its default data source are fetched over
//! HTTPS on demand. Transport is trusted as-is; no checksum is verified.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{HarvestError, Result};

/// Downloads a URL to a local file, replacing any previous copy.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// [`Fetcher`] over `reqwest`.
pub struct HttpFetcher {
    http_client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("harvest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HarvestError::DownloadFailure {
                url: String::new(),
                reason: format!("cannot create HTTP client: {e}"),
            })?;
        Ok(HttpFetcher { http_client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let failure = |reason: String| HarvestError::DownloadFailure {
            url: url.to_string(),
            reason,
        };

        debug!(url, dest = %dest.display(), "downloading");
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| failure(e.to_string()))?;
        let body = response.bytes().await.map_err(|e| failure(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        store(dest, &body)?;

        info!("Downloaded {} ({} bytes)", url, body.len());
        Ok(())
    }
}

/// Write `body` beside `dest`, then rename it over `dest`. The partial file
/// never outlives a failed write or rename.
fn store(dest: &Path, body: &[u8]) -> Result<()> {
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let written = std::fs::write(&partial, body).and_then(|()| std::fs::rename(&partial, dest));
    if let Err(err) = written {
        if let Err(cleanup) = std::fs::remove_file(&partial) {
            debug!(path = %partial.display(), error = %cleanup, "partial download not removed");
        }
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_replaces_previous_copy() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("challenges_from_the_last_24_hours.json");
        std::fs::write(&dest, "old").unwrap();

        store(&dest, b"{\"challenge_queue\":[]}").unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "{\"challenge_queue\":[]}");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_rename_removes_partial_file() {
        let dir = tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file.
        let dest = dir.path().join("sync_challenges.py");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("keep"), "").unwrap();

        let err = store(&dest, b"print('sync')").unwrap_err();

        assert!(matches!(err, HarvestError::Io(_)));
        assert!(!dir.path().join("sync_challenges.py.part").exists());
        assert!(dest.join("keep").is_file());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_download_failure() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("sync_challenges.py");
        let fetcher = HttpFetcher::new().unwrap();

        let err = fetcher
            .download("http://127.0.0.1:9/sync_challenges.py", &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::DownloadFailure { .. }));
        assert!(!dest.exists());
    }
}
