//! Driver resolution orchestration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use wheelman_core::config::Config;
use wheelman_core::{Result, WheelmanError};

use crate::extract::{Extractor, find_payload};
use crate::probe::VersionProbe;
use crate::transport::Transport;

/// Orchestrates cache check, acquisition, extraction, and reconciliation.
///
/// The happy path is CacheCheck → hit → done. On a miss: probe the browser
/// version, download the matching archive into a scoped workspace, extract
/// into the canonical directory, then reconcile the payload into its
/// canonical location. The workspace and archive are removed before
/// returning, success or failure.
pub struct DriverResolver {
    config: Arc<Config>,
    probe: Arc<dyn VersionProbe>,
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn Extractor>,
    force: bool,
}

impl DriverResolver {
    pub fn new(
        config: Arc<Config>,
        probe: Arc<dyn VersionProbe>,
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self { config, probe, transport, extractor, force: false }
    }

    /// Re-acquire even when a cached payload exists.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Resolve a usable driver path, or `None` when acquisition fails.
    ///
    /// The process never aborts on an acquisition failure: every error is
    /// logged here and collapsed into an absence.
    pub async fn resolve(&self) -> Option<PathBuf> {
        match self.try_resolve().await {
            Ok(path) => {
                info!(path = %path.display(), "Driver ready");
                Some(path)
            }
            Err(e) => {
                error!(%e, "Driver resolution failed");
                None
            }
        }
    }

    async fn try_resolve(&self) -> Result<PathBuf> {
        if self.force {
            info!("Forced re-acquisition, skipping cache check");
        } else if let Some(cached) = self.cache_check() {
            info!(path = %cached.display(), "Driver found in cache");
            return Ok(cached);
        } else {
            debug!("No cached driver in candidate locations");
        }

        let version = self.probe.detect().await?;
        info!(%version, "Detected browser version");

        // One scoped workspace per attempt; the guard removes it on every
        // exit path, including the early error returns below.
        let workspace = self.create_workspace()?;
        let archive = workspace.path().join(&self.config.archive_name);
        let url = self.config.download_url(&version);

        let outcome = self.acquire(&url, &archive).await;

        if archive.exists() {
            if let Err(e) = std::fs::remove_file(&archive) {
                warn!(%e, "Could not remove downloaded archive");
            }
        }
        if let Err(e) = workspace.close() {
            warn!(%e, "Could not remove temporary workspace");
        }

        outcome
    }

    /// Acquiring → Extracting → Reconciling.
    async fn acquire(&self, url: &str, archive: &Path) -> Result<PathBuf> {
        self.transport.download(url, archive).await?;

        let target = self.config.canonical_dir();
        if self.force {
            // Reconciliation trusts an existing canonical file, so the
            // stale copy has to go before the fresh archive is expanded.
            let canonical = target.join(&self.config.payload_name);
            if canonical.exists() {
                std::fs::remove_file(&canonical)?;
                debug!(path = %canonical.display(), "Removed stale driver before extraction");
            }
        }
        self.extractor.extract(archive, &target).await?;

        self.reconcile(&target)
    }

    /// First payload found at a candidate canonical path wins.
    fn cache_check(&self) -> Option<PathBuf> {
        self.config
            .canonical_candidates()
            .into_iter()
            .find(|path| path.exists())
    }

    /// Move a stray payload into the canonical location. If the move
    /// cannot be completed the found path is still usable and returned.
    fn reconcile(&self, target: &Path) -> Result<PathBuf> {
        let canonical = target.join(&self.config.payload_name);
        if canonical.exists() {
            return Ok(canonical);
        }

        match find_payload(target, &self.config.payload_name) {
            Some(found) => match std::fs::rename(&found, &canonical) {
                Ok(()) => {
                    info!(from = %found.display(), to = %canonical.display(), "Moved driver to canonical path");
                    Ok(canonical)
                }
                Err(e) => {
                    warn!(%e, "Could not move driver to canonical path, using found location");
                    Ok(found)
                }
            },
            None => Err(WheelmanError::Extract(format!(
                "{} not found after extraction",
                self.config.payload_name
            ))),
        }
    }

    fn create_workspace(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("wheelman-");
        let workspace = match &self.config.workspace_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| {
                    WheelmanError::Environment(format!("could not create {}: {e}", dir.display()))
                })?;
                builder.tempdir_in(dir)?
            }
            None => builder.tempdir()?,
        };
        debug!(path = %workspace.path().display(), "Created temporary workspace");
        Ok(workspace)
    }
}
