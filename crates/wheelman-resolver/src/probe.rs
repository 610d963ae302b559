//! Browser version detection.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use wheelman_core::config::Config;
use wheelman_core::{BrowserVersion, Result, WheelmanError};

use crate::chain::{Attempt, first_success};
use crate::transport::Transport;

/// Determines the installed browser's version.
#[async_trait]
pub trait VersionProbe: Send + Sync {
    async fn detect(&self) -> Result<BrowserVersion>;
}

/// Nested manifest shape: `{"product": {"version": "…"}}`.
#[derive(Deserialize)]
struct VersionManifest {
    product: ProductField,
}

#[derive(Deserialize)]
struct ProductField {
    version: String,
}

/// Probes the local Edge installation through an ordered strategy chain:
/// installed-app metadata, registry beacon, version manifest, remote
/// latest-stable marker, configured fallback constant. The terminal
/// fallback means detection cannot exhaust unless it is configured empty.
pub struct EdgeVersionProbe {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
}

impl EdgeVersionProbe {
    pub fn new(config: Arc<Config>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Run an OS utility and capture stdout, bounded by the probe timeout.
    /// A hung or erroring subprocess must not abort the chain.
    async fn run_probe(&self, program: &str, args: Vec<String>) -> anyhow::Result<String> {
        let output = tokio::time::timeout(
            self.config.probe_timeout(),
            tokio::process::Command::new(program).args(&args).output(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("{program} timed out"))??;

        if !output.status.success() {
            anyhow::bail!("{program} exited with {}", output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Strategy 1: the OS installed-application metadata store, per
    /// configured browser path in priority order.
    async fn from_app_metadata(&self) -> anyhow::Result<Option<BrowserVersion>> {
        for path in &self.config.browser_paths {
            if !path.exists() {
                continue;
            }

            let result = if cfg!(windows) {
                let query = format!(
                    r#"name="{}""#,
                    path.display().to_string().replace('\\', r"\\")
                );
                self.run_probe(
                    "wmic",
                    vec![
                        "datafile".into(),
                        "where".into(),
                        query,
                        "get".into(),
                        "Version".into(),
                        "/value".into(),
                    ],
                )
                .await
            } else {
                // No wmic off Windows; the browser reports its own version.
                self.run_probe(&path.display().to_string(), vec!["--version".into()])
                    .await
            };

            match result {
                Ok(text) => {
                    if let Some(version) = BrowserVersion::scan(&text) {
                        debug!(path = %path.display(), %version, "Version from app metadata");
                        return Ok(Some(version));
                    }
                }
                Err(e) => warn!(path = %path.display(), %e, "App metadata query failed"),
            }
        }
        Ok(None)
    }

    /// Strategy 2: the version the browser recorded in the registry when
    /// it last ran. A clean miss on platforms without a registry.
    async fn from_registry(&self) -> anyhow::Result<Option<BrowserVersion>> {
        if !cfg!(windows) {
            return Ok(None);
        }
        let text = self
            .run_probe(
                "reg",
                vec![
                    "query".into(),
                    self.config.registry_key.clone(),
                    "/v".into(),
                    self.config.registry_value.clone(),
                ],
            )
            .await?;
        Ok(BrowserVersion::scan(&text))
    }

    /// Strategy 3: the version manifest beside the browser installation.
    /// An unreadable or malformed manifest only skips that candidate.
    async fn from_manifest(&self) -> anyhow::Result<Option<BrowserVersion>> {
        for manifest in self.config.manifest_candidates() {
            if !manifest.exists() {
                continue;
            }
            let result = async {
                let raw = tokio::fs::read_to_string(&manifest).await?;
                let parsed: VersionManifest = serde_json::from_str(&raw)?;
                anyhow::Ok(BrowserVersion::parse(&parsed.product.version))
            }
            .await;

            match result {
                Ok(Some(version)) => {
                    debug!(manifest = %manifest.display(), %version, "Version from manifest");
                    return Ok(Some(version));
                }
                Ok(None) => {}
                Err(e) => warn!(manifest = %manifest.display(), %e, "Manifest read failed"),
            }
        }
        Ok(None)
    }

    /// Strategy 4: the remote latest-stable marker, one network round
    /// trip. The marker is staged to a temp file that is removed on every
    /// exit path by its guard.
    async fn from_remote_latest(&self) -> anyhow::Result<Option<BrowserVersion>> {
        let bytes = self.transport.read(&self.config.latest_stable_url).await?;

        let marker = match &self.config.workspace_dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
            None => tempfile::NamedTempFile::new()?,
        };
        tokio::fs::write(marker.path(), &bytes).await?;

        Ok(BrowserVersion::parse(&String::from_utf8_lossy(&bytes)))
    }

    /// Strategy 5: the configured fallback constant.
    async fn from_fallback(&self) -> anyhow::Result<Option<BrowserVersion>> {
        let version = BrowserVersion::parse(&self.config.fallback_version);
        if let Some(v) = &version {
            info!(version = %v, "Using configured fallback version");
        }
        Ok(version)
    }
}

#[async_trait]
impl VersionProbe for EdgeVersionProbe {
    async fn detect(&self) -> Result<BrowserVersion> {
        let attempts: Vec<Attempt<'_, BrowserVersion>> = vec![
            ("installed-app metadata", Box::pin(self.from_app_metadata())),
            ("registry", Box::pin(self.from_registry())),
            ("version manifest", Box::pin(self.from_manifest())),
            ("remote latest-stable", Box::pin(self.from_remote_latest())),
            ("configured fallback", Box::pin(self.from_fallback())),
        ];

        first_success("version", attempts)
            .await
            .ok_or(WheelmanError::ChainExhausted { chain: "version" })
    }
}
