//! Archive extraction with payload verification.
//!
//! Neither extraction mechanism guarantees synchronous completion (the
//! shell integration in particular is fire-and-forget), so both
//! implementations finish with the same polled verification step.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use wheelman_core::config::{Config, ExtractorKind};
use wheelman_core::{Result, WheelmanError};

const VERIFY_ATTEMPTS: u32 = 10;
const VERIFY_INTERVAL: Duration = Duration::from_millis(200);

/// Expands a driver archive into a destination directory and verifies the
/// payload arrived.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Build the configured extractor.
pub fn default_extractor(config: &Config) -> Arc<dyn Extractor> {
    match config.extractor {
        ExtractorKind::Shell => Arc::new(ShellExtractor::new(
            config.payload_name.clone(),
            config.extract_timeout(),
        )),
        ExtractorKind::Zip => Arc::new(ZipExtractor::new(config.payload_name.clone())),
    }
}

/// Search `dir` and its subdirectories for `name`, case-insensitively.
///
/// Entries are visited in sorted order, files before directories, so the
/// first match is deterministic when duplicates exist.
pub fn find_payload(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in &entries {
        if path.is_file()
            && path
                .file_name()
                .is_some_and(|f| f.to_string_lossy().eq_ignore_ascii_case(name))
        {
            return Some(path.clone());
        }
    }
    for path in &entries {
        if path.is_dir() {
            if let Some(found) = find_payload(path, name) {
                return Some(found);
            }
        }
    }
    None
}

/// Poll the destination until the payload shows up or the budget runs out.
async fn verify_payload(dest: &Path, payload_name: &str) -> Result<PathBuf> {
    for attempt in 0..VERIFY_ATTEMPTS {
        if let Some(found) = find_payload(dest, payload_name) {
            debug!(path = %found.display(), attempt, "Payload present after extraction");
            return Ok(found);
        }
        tokio::time::sleep(VERIFY_INTERVAL).await;
    }
    Err(WheelmanError::Extract(format!(
        "{payload_name} not found under {}",
        dest.display()
    )))
}

fn ensure_dest(dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .map_err(|e| WheelmanError::Environment(format!("could not create {}: {e}", dest.display())))
}

/// OS shell integration: `Expand-Archive` on Windows, `unzip` elsewhere,
/// with flags suppressing prompts and progress output.
pub struct ShellExtractor {
    payload_name: String,
    timeout: Duration,
}

impl ShellExtractor {
    pub fn new(payload_name: String, timeout: Duration) -> Self {
        Self { payload_name, timeout }
    }
}

#[cfg(windows)]
fn shell_unzip_command(archive: &Path, dest: &Path) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("powershell");
    cmd.args(["-NoProfile", "-NonInteractive", "-Command"]).arg(format!(
        "Expand-Archive -LiteralPath '{}' -DestinationPath '{}' -Force",
        archive.display(),
        dest.display()
    ));
    cmd
}

#[cfg(not(windows))]
fn shell_unzip_command(archive: &Path, dest: &Path) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("unzip");
    cmd.arg("-o").arg("-qq").arg(archive).arg("-d").arg(dest);
    cmd
}

#[async_trait]
impl Extractor for ShellExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        ensure_dest(dest)?;
        info!(archive = %archive.display(), dest = %dest.display(), "Extracting via shell integration");

        let status = tokio::time::timeout(self.timeout, shell_unzip_command(archive, dest).status())
            .await
            .map_err(|_| WheelmanError::Extract("shell extraction timed out".into()))??;

        if !status.success() {
            // The copy is advisory only; verification below is what decides.
            warn!(%status, "Shell extraction returned nonzero status");
        }

        verify_payload(dest, &self.payload_name).await.map(|_| ())
    }
}

/// Library-based deterministic extraction.
pub struct ZipExtractor {
    payload_name: String,
}

impl ZipExtractor {
    pub fn new(payload_name: String) -> Self {
        Self { payload_name }
    }
}

#[async_trait]
impl Extractor for ZipExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        ensure_dest(dest)?;
        info!(archive = %archive.display(), dest = %dest.display(), "Extracting via zip library");

        let archive = archive.to_path_buf();
        let target = dest.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let file = std::fs::File::open(&archive)?;
            let mut zip =
                zip::ZipArchive::new(file).map_err(|e| WheelmanError::Extract(e.to_string()))?;
            zip.extract(&target)
                .map_err(|e| WheelmanError::Extract(e.to_string()))
        })
        .await
        .map_err(|e| WheelmanError::Extract(format!("extraction task failed: {e}")))??;

        verify_payload(dest, &self.payload_name).await.map(|_| ())
    }
}
