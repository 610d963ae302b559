//! Resolver integration tests: fake collaborators, real filesystem.
//!
//! Run with: `cargo test -p wheelman-resolver --test resolve`

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use wheelman_core::config::Config;
use wheelman_core::{BrowserVersion, Result, WheelmanError};
use wheelman_resolver::{
    DriverResolver, EdgeVersionProbe, Transport, VersionProbe, ZipExtractor,
};

const PAYLOAD: &str = "msedgedriver.exe";

/// Scripted version probe with a call counter.
struct FakeProbe {
    version: Option<&'static str>,
    calls: AtomicUsize,
}

impl FakeProbe {
    fn returning(version: &'static str) -> Arc<Self> {
        Arc::new(Self { version: Some(version), calls: AtomicUsize::new(0) })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { version: None, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl VersionProbe for FakeProbe {
    async fn detect(&self) -> Result<BrowserVersion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.version {
            Some(v) => Ok(BrowserVersion::parse(v).expect("test version")),
            None => Err(WheelmanError::ChainExhausted { chain: "version" }),
        }
    }
}

/// Scripted transport: serves a fixed archive body (or fails), records
/// call counts and the last download URL.
struct FakeTransport {
    archive: Option<Vec<u8>>,
    marker: Option<&'static str>,
    downloads: AtomicUsize,
    reads: AtomicUsize,
    last_url: Mutex<Option<String>>,
}

impl FakeTransport {
    fn serving(archive: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            archive: Some(archive),
            marker: None,
            downloads: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        })
    }

    fn offline() -> Arc<Self> {
        Arc::new(Self {
            archive: None,
            marker: None,
            downloads: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        })
    }

    fn with_marker(archive: Vec<u8>, marker: &'static str) -> Arc<Self> {
        Arc::new(Self {
            archive: Some(archive),
            marker: Some(marker),
            downloads: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn read(&self, _url: &str) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.marker {
            Some(marker) => Ok(marker.as_bytes().to_vec()),
            None => Err(WheelmanError::Download("offline".into())),
        }
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(url.to_string());
        match &self.archive {
            Some(bytes) => {
                std::fs::write(dest, bytes)?;
                Ok(())
            }
            None => Err(WheelmanError::ChainExhausted { chain: "download" }),
        }
    }
}

/// Build a zip archive body from (entry name, bytes) pairs.
fn zip_body(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// Test sandbox: canonical driver dir and workspace parent both live
/// inside one tempdir so leftovers are observable.
struct Sandbox {
    _root: tempfile::TempDir,
    driver_dir: PathBuf,
    workspace_dir: PathBuf,
    config: Arc<Config>,
}

impl Sandbox {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let driver_dir = root.path().join("driver");
        let workspace_dir = root.path().join("scratch");
        std::fs::create_dir_all(&driver_dir).unwrap();
        std::fs::create_dir_all(&workspace_dir).unwrap();

        let config = Arc::new(Config {
            browser_paths: vec![root.path().join("msedge.exe")],
            registry_key: r"HKCU\Software\WheelmanTests\DoesNotExist".into(),
            payload_name: PAYLOAD.into(),
            driver_dir: Some(driver_dir.clone()),
            workspace_dir: Some(workspace_dir.clone()),
            ..Config::default()
        });

        Self { _root: root, driver_dir, workspace_dir, config }
    }

    fn canonical(&self) -> PathBuf {
        self.driver_dir.join(PAYLOAD)
    }

    fn resolver(
        &self,
        probe: Arc<dyn VersionProbe>,
        transport: Arc<dyn Transport>,
    ) -> DriverResolver {
        DriverResolver::new(
            self.config.clone(),
            probe,
            transport,
            Arc::new(ZipExtractor::new(PAYLOAD.into())),
        )
    }

    fn leftover_workspaces(&self) -> usize {
        std::fs::read_dir(&self.workspace_dir).unwrap().count()
    }
}

#[tokio::test]
async fn test_cache_hit_skips_probe_and_transport() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.canonical(), b"cached driver").unwrap();

    let probe = FakeProbe::returning("136.0.3240.64");
    let transport = FakeTransport::serving(zip_body(&[(PAYLOAD, b"fresh driver")]));
    let resolver = sandbox.resolver(probe.clone(), transport.clone());

    let resolved = resolver.resolve().await.unwrap();

    assert_eq!(resolved, sandbox.canonical());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    assert_eq!(transport.downloads.load(Ordering::SeqCst), 0);
    assert_eq!(transport.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_probe_failure_skips_download() {
    let sandbox = Sandbox::new();

    let probe = FakeProbe::failing();
    let transport = FakeTransport::serving(zip_body(&[(PAYLOAD, b"driver")]));
    let resolver = sandbox.resolver(probe, transport.clone());

    assert!(resolver.resolve().await.is_none());
    assert_eq!(transport.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_download_failure_cleans_workspace() {
    let sandbox = Sandbox::new();

    let resolver = sandbox.resolver(FakeProbe::returning("136.0.3240.64"), FakeTransport::offline());

    assert!(resolver.resolve().await.is_none());
    assert_eq!(sandbox.leftover_workspaces(), 0);
    assert!(!sandbox.canonical().exists());
}

#[tokio::test]
async fn test_archive_without_payload_is_absence() {
    let sandbox = Sandbox::new();

    let transport = FakeTransport::serving(zip_body(&[("Driver_Notes/notes.txt", b"n/a")]));
    let resolver = sandbox.resolver(FakeProbe::returning("136.0.3240.64"), transport);

    assert!(resolver.resolve().await.is_none());
    assert!(!sandbox.canonical().exists());
    assert_eq!(sandbox.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_success_with_payload_at_archive_root() {
    let sandbox = Sandbox::new();

    let probe = FakeProbe::returning("136.0.3240.64");
    let transport = FakeTransport::serving(zip_body(&[(PAYLOAD, b"driver bytes")]));
    let resolver = sandbox.resolver(probe, transport.clone());

    let resolved = resolver.resolve().await.unwrap();

    assert_eq!(resolved, sandbox.canonical());
    assert_eq!(std::fs::read(&resolved).unwrap(), b"driver bytes");
    assert_eq!(sandbox.leftover_workspaces(), 0);
    let url = transport.last_url.lock().unwrap().clone().unwrap();
    assert!(url.contains("/136.0.3240.64/"));
}

#[tokio::test]
async fn test_payload_in_subdirectory_is_moved_to_canonical() {
    let sandbox = Sandbox::new();

    let transport =
        FakeTransport::serving(zip_body(&[("edgedriver_win64/msedgedriver.exe", b"nested")]));
    let resolver = sandbox.resolver(FakeProbe::returning("136.0.3240.64"), transport);

    let resolved = resolver.resolve().await.unwrap();

    assert_eq!(resolved, sandbox.canonical());
    assert_eq!(std::fs::read(&resolved).unwrap(), b"nested");
}

#[tokio::test]
async fn test_second_resolve_is_a_cache_hit() {
    let sandbox = Sandbox::new();

    let probe = FakeProbe::returning("136.0.3240.64");
    let transport = FakeTransport::serving(zip_body(&[(PAYLOAD, b"driver")]));
    let resolver = sandbox.resolver(probe.clone(), transport.clone());

    assert!(resolver.resolve().await.is_some());
    assert!(resolver.resolve().await.is_some());

    // The second call never left the cache-check state.
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.downloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remote_latest_version_drives_download_url() {
    let sandbox = Sandbox::new();

    // Real probe, scripted transport: every local strategy misses in the
    // sandbox, so the version comes from the remote marker.
    let transport =
        FakeTransport::with_marker(zip_body(&[(PAYLOAD, b"driver")]), "137.0.0.1\n");
    let probe = Arc::new(EdgeVersionProbe::new(sandbox.config.clone(), transport.clone()));
    let resolver = sandbox.resolver(probe, transport.clone());

    let resolved = resolver.resolve().await.unwrap();

    assert_eq!(resolved, sandbox.canonical());
    assert_eq!(transport.reads.load(Ordering::SeqCst), 1);
    let url = transport.last_url.lock().unwrap().clone().unwrap();
    assert!(url.contains("/137.0.0.1/"));
    // Neither the marker staging file nor the workspace survive.
    assert_eq!(sandbox.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_force_replaces_stale_driver_from_nested_archive() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.canonical(), b"stale driver").unwrap();

    let transport = FakeTransport::serving(zip_body(&[(
        "edgedriver_win64/msedgedriver.exe",
        b"fresh driver",
    )]));
    let resolver = sandbox
        .resolver(FakeProbe::returning("136.0.3240.64"), transport)
        .force(true);

    let resolved = resolver.resolve().await.unwrap();

    assert_eq!(resolved, sandbox.canonical());
    assert_eq!(std::fs::read(&resolved).unwrap(), b"fresh driver");
}

#[tokio::test]
async fn test_force_reacquires_over_cache() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.canonical(), b"stale driver").unwrap();

    let probe = FakeProbe::returning("136.0.3240.64");
    let transport = FakeTransport::serving(zip_body(&[(PAYLOAD, b"fresh driver")]));
    let resolver = sandbox.resolver(probe.clone(), transport.clone()).force(true);

    let resolved = resolver.resolve().await.unwrap();

    assert_eq!(resolved, sandbox.canonical());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(&resolved).unwrap(), b"fresh driver");
}
