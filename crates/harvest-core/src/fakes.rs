//! In-memory fakes for [`Fetcher`] (testing only)

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{HarvestError, Result};
use crate::fetch::Fetcher;

/// Records requested URLs and writes a placeholder body instead of
/// touching the network.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    requests: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make downloads of `url` fail as if the server answered 404.
    pub fn fail_url(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        self.requests.lock().unwrap().push(url.to_string());

        if self.failing.lock().unwrap().contains(url) {
            return Err(HarvestError::DownloadFailure {
                url: url.to_string(),
                reason: "HTTP status client error (404 Not Found)".to_string(),
            });
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, format!("downloaded from {url}\n"))?;
        Ok(())
    }
}
