use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use wheelman_core::config::Config;
use wheelman_resolver::{DriverResolver, EdgeVersionProbe, HttpTransport, default_extractor};

const LOG_FILE_NAME: &str = "wheelman.log";

#[derive(Parser)]
#[command(
    name = "wheelman",
    about = "Self-healing Edge WebDriver provisioning: keeps a msedgedriver matched to the installed browser",
    version
)]
struct Cli {
    /// Config file path (default: wheelman.json beside the binary)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Override the canonical driver directory
    #[arg(long)]
    driver_dir: Option<PathBuf>,

    /// Re-acquire the driver even if a cached copy exists
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)?;
    if let Some(dir) = cli.driver_dir.clone() {
        config.driver_dir = Some(dir);
    }

    let level = if cli.verbose { "debug" } else { "info" };
    let _guard = setup_logging(level, &config.canonical_dir().join(LOG_FILE_NAME));
    tracing::debug!(config = %config_path.display(), "Wheelman starting");

    let config = Arc::new(config);
    let transport = Arc::new(HttpTransport::new(config.http_timeout()));
    let probe = Arc::new(EdgeVersionProbe::new(config.clone(), transport.clone()));
    let extractor = default_extractor(&config);

    let resolver =
        DriverResolver::new(config, probe, transport, extractor).force(cli.force);

    let exit_code = match resolver.resolve().await {
        Some(path) => {
            println!("Edge driver is ready at: {}", path.display());
            0
        }
        None => {
            println!("Failed to set up Edge driver.");
            1
        }
    };

    // Flush the file writer before exiting.
    drop(_guard);
    std::process::exit(exit_code);
}

/// Initialize logging once at process start: compact console output plus a
/// fixed-name append-only log file beside the driver. The returned guard
/// keeps the file writer flushing until the process exits.
fn setup_logging(
    level: &str,
    log_file: &std::path::Path,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let dir = log_file.parent().unwrap_or_else(|| std::path::Path::new("."));
    let filename = log_file
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new(LOG_FILE_NAME));

    if let Err(e) = std::fs::create_dir_all(dir) {
        // A bad log path shouldn't take the tool down with it.
        eprintln!(
            "warn: could not create log directory '{}': {e}; logging to console only",
            dir.display()
        );
        tracing_subscriber::fmt().with_env_filter(filter).compact().init();
        return None;
    }

    let appender = tracing_appender::rolling::never(dir, filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    Some(guard)
}
