//! Byte transport with ordered download fallbacks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use wheelman_core::{Result, WheelmanError};

use crate::chain::{Attempt, first_success};

/// Realistic browser user-agent; some mirrors reject default client UAs.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36 Edg/136.0.3240.64";

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

#[cfg(windows)]
const SYSTEM_DOWNLOADER: &str = "curl.exe";
#[cfg(not(windows))]
const SYSTEM_DOWNLOADER: &str = "curl";

/// Fetches bytes over the network.
///
/// The resolver and the version probe only talk to this trait, so tests
/// can substitute a scripted transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read a small resource fully into memory. Returns failure, never
    /// partial data, when the connection cannot be opened.
    async fn read(&self, url: &str) -> Result<Vec<u8>>;

    /// Download `url` to `dest`, trying each transport strategy in order.
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Production transport: system downloader first, HTTP client fallback.
pub struct HttpTransport {
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| WheelmanError::Download(e.to_string()))
    }

    /// Strategy 1: the platform's own downloader, judged by exit status.
    async fn download_via_system(&self, url: &str, dest: &Path) -> anyhow::Result<Option<PathBuf>> {
        let status = tokio::process::Command::new(SYSTEM_DOWNLOADER)
            .arg("-fsSL")
            .arg("--output")
            .arg(dest)
            .arg(url)
            .status()
            .await?;

        if status.success() && dest.exists() {
            Ok(Some(dest.to_path_buf()))
        } else {
            anyhow::bail!("{SYSTEM_DOWNLOADER} exited with {status}")
        }
    }

    /// Strategy 2: HTTP client with browser headers, streaming to disk.
    async fn download_via_http(&self, url: &str, dest: &Path) -> anyhow::Result<Option<PathBuf>> {
        let mut response = self
            .client()?
            .get(url)
            .header(reqwest::header::ACCEPT, HTML_ACCEPT)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(Some(dest.to_path_buf()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn read(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "Transport read");

        let mut response = self
            .client()?
            .get(url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .header(reqwest::header::PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| WheelmanError::Download(format!("could not open {url}: {e}")))?
            .error_for_status()
            .map_err(|e| WheelmanError::Download(e.to_string()))?;

        // Accumulate chunk by chunk until the stream signals end-of-body.
        // The connection is released on every exit path when `response`
        // drops.
        let mut data = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| WheelmanError::Download(e.to_string()))?
        {
            data.extend_from_slice(&chunk);
        }

        info!(url, bytes = data.len(), "Read complete");
        Ok(data)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        info!(url, dest = %dest.display(), "Downloading");

        let attempts: Vec<Attempt<'_, PathBuf>> = vec![
            ("system downloader", Box::pin(self.download_via_system(url, dest))),
            ("http client", Box::pin(self.download_via_http(url, dest))),
        ];

        first_success("download", attempts)
            .await
            .map(|_| ())
            .ok_or(WheelmanError::ChainExhausted { chain: "download" })
    }
}
