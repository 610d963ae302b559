//! Configuration loading and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WheelmanError};
use crate::version::BrowserVersion;

/// Top-level Wheelman configuration.
///
/// Every field has a default so the zero-config invocation works; a
/// `wheelman.json` (JSON5) beside the binary can override any of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Candidate browser executable paths, most specific first.
    pub browser_paths: Vec<PathBuf>,

    /// Registry key where the browser records its version when it last ran.
    pub registry_key: String,

    /// Value name under `registry_key`.
    pub registry_value: String,

    /// Version manifest filename co-located with the browser installation.
    pub manifest_name: String,

    /// Plaintext endpoint returning the latest stable driver version.
    pub latest_stable_url: String,

    /// Archive endpoint template; `{version}` is replaced verbatim.
    pub download_url_template: String,

    /// Version used when every detection strategy fails. An empty string
    /// disables the terminal fallback and lets the version chain exhaust.
    pub fallback_version: String,

    /// Driver executable filename, matched case-insensitively.
    pub payload_name: String,

    /// Name of the downloaded archive inside the temporary workspace.
    pub archive_name: String,

    /// Subprocess timeout for version probes, milliseconds.
    pub probe_timeout_ms: u64,

    /// Subprocess timeout for shell extraction, milliseconds.
    pub extract_timeout_ms: u64,

    /// Request timeout for the HTTP download fallback, milliseconds.
    pub http_timeout_ms: u64,

    /// Which extraction mechanism to use.
    pub extractor: ExtractorKind,

    /// Override for the canonical driver directory. Defaults to the
    /// directory containing the running binary.
    pub driver_dir: Option<PathBuf>,

    /// Override for the parent of per-attempt temporary workspaces.
    /// Defaults to the OS temp directory.
    pub workspace_dir: Option<PathBuf>,
}

/// Extraction mechanism selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// OS shell integration (`Expand-Archive` / `unzip`).
    Shell,
    /// Library-based deterministic extraction.
    Zip,
}

impl Default for ExtractorKind {
    fn default() -> Self {
        if cfg!(windows) { Self::Shell } else { Self::Zip }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_paths: default_browser_paths(),
            registry_key: r"HKCU\Software\Microsoft\Edge\BLBeacon".into(),
            registry_value: "version".into(),
            manifest_name: "product_versions.json".into(),
            latest_stable_url: "https://msedgedriver.azureedge.net/LATEST_STABLE".into(),
            download_url_template: default_download_url_template(),
            fallback_version: "136.0.3240.64".into(),
            payload_name: default_payload_name(),
            archive_name: "edgedriver.zip".into(),
            probe_timeout_ms: 10_000,
            extract_timeout_ms: 60_000,
            http_timeout_ms: 30_000,
            extractor: ExtractorKind::default(),
            driver_dir: None,
            workspace_dir: None,
        }
    }
}

impl Config {
    /// Load config from a JSON5 file. An absent file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        json5::from_str(&raw).map_err(|e| WheelmanError::Config(e.to_string()))
    }

    /// Default config location: `wheelman.json` beside the binary.
    pub fn default_path() -> PathBuf {
        exe_dir().join("wheelman.json")
    }

    /// The canonical driver directory.
    pub fn canonical_dir(&self) -> PathBuf {
        self.driver_dir.clone().unwrap_or_else(exe_dir)
    }

    /// Candidate canonical payload paths, checked in order: the configured
    /// driver directory first, then the running binary's own directory.
    pub fn canonical_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = vec![self.canonical_dir().join(&self.payload_name)];
        let beside_exe = exe_dir().join(&self.payload_name);
        if !candidates.contains(&beside_exe) {
            candidates.push(beside_exe);
        }
        candidates
    }

    /// Version manifest candidates, derived from the browser install dirs.
    pub fn manifest_candidates(&self) -> Vec<PathBuf> {
        let mut manifests = Vec::new();
        for path in &self.browser_paths {
            if let Some(dir) = path.parent() {
                let manifest = dir.join(&self.manifest_name);
                if !manifests.contains(&manifest) {
                    manifests.push(manifest);
                }
            }
        }
        manifests
    }

    /// Download URL for a concrete browser version.
    pub fn download_url(&self, version: &BrowserVersion) -> String {
        self.download_url_template.replace("{version}", version.as_str())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_millis(self.extract_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

fn default_browser_paths() -> Vec<PathBuf> {
    #[cfg(windows)]
    {
        vec![
            PathBuf::from(r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe"),
            PathBuf::from(r"C:\Program Files\Microsoft\Edge\Application\msedge.exe"),
        ]
    }
    #[cfg(not(windows))]
    {
        vec![
            PathBuf::from("/opt/microsoft/msedge/msedge"),
            PathBuf::from("/usr/bin/microsoft-edge"),
        ]
    }
}

fn default_payload_name() -> String {
    if cfg!(windows) {
        "msedgedriver.exe".into()
    } else {
        "msedgedriver".into()
    }
}

fn default_download_url_template() -> String {
    format!(
        "https://msedgedriver.azureedge.net/{{version}}/edgedriver_{}.zip",
        platform_suffix()
    )
}

/// Platform suffix matching the driver archive naming convention.
fn platform_suffix() -> &'static str {
    #[cfg(windows)]
    return "win64";

    #[cfg(target_os = "macos")]
    return "mac64";

    #[cfg(not(any(windows, target_os = "macos")))]
    return "linux64";
}

/// Directory containing the running binary; `.` when it cannot be resolved.
fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
