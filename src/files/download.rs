use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info};

/// Timeout for a single download request.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetches one remote file into a local path.
///
/// Implementations never fail: errors are logged and reported as `false`,
/// and the caller treats the file as still absent.
pub trait Fetch {
    fn fetch(&self, url: &str, dest: &Path) -> bool;
}

/// Blocking HTTP downloader.
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                error!("failed to build http client with timeout, using defaults: {e}");
                reqwest::blocking::Client::new()
            });
        Self { client }
    }

    fn try_fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        if let Some(dir) = dest.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        let body = response.bytes().context("reading response body")?;
        std::fs::write(dest, &body).with_context(|| format!("writing {}", dest.display()))?;
        Ok(body.len() as u64)
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for HttpDownloader {
    fn fetch(&self, url: &str, dest: &Path) -> bool {
        match self.try_fetch(url, dest) {
            Ok(n_bytes) => {
                info!("downloaded {n_bytes} bytes from {url} to {}", dest.display());
                true
            }
            Err(err) => {
                error!("Error downloading url={url:?}\nto file_path={:?}.\n{err:?}", dest);
                false
            }
        }
    }
}
