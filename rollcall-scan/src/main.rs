//! rollcall-scan - headless attendance pipeline runner
//!
//! Reads decoded QR payloads (`StudentID|Name|Class`) one per line on stdin,
//! runs each through the attendance pipeline, and writes one JSON feedback
//! line per non-suppressed scan on stdout.
//!
//! Control lines:
//! - `:reload` rebuilds today's ledger from the attendance file
//! - `:quit` exits

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rollcall_common::config::{LoggingConfig, RootFolderInitializer, RootFolderResolver};
use rollcall_common::events::{EventBus, Feedback};
use rollcall_common::time::millis_to_duration;
use rollcall_common::{Clock, SystemClock};
use rollcall_scan::{AttendanceLedger, CsvDirectory, CsvLog, ScanPipeline};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::task;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const MODULE_NAME: &str = "rollcall-scan";

/// Command-line arguments for rollcall-scan
#[derive(Parser, Debug)]
#[command(name = "rollcall-scan")]
#[command(about = "Attendance pipeline fed by decoded QR payloads on stdin")]
#[command(version)]
struct Args {
    /// Root folder holding attendance and student files
    #[arg(short, long, env = "ROLLCALL_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Attendance log (absolute, or relative to the root folder)
    #[arg(long, env = "ROLLCALL_ATTENDANCE_FILE")]
    attendance_file: Option<PathBuf>,

    /// Student directory (absolute, or relative to the root folder)
    #[arg(long, env = "ROLLCALL_STUDENTS_FILE")]
    students_file: Option<PathBuf>,

    /// Cooldown for repeated identical payloads, in milliseconds
    #[arg(long, env = "ROLLCALL_COOLDOWN_MS")]
    cooldown_ms: Option<u64>,
}

/// One stdout line: the feedback plus its display text
#[derive(Serialize)]
struct FeedbackLine<'a> {
    #[serde(flatten)]
    feedback: &'a Feedback,
    message: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = RootFolderResolver::new(MODULE_NAME).with_cli_override(args.root_folder.clone());
    let config_result = resolver.try_load_config();
    let config = config_result.as_ref().ok().cloned().flatten().unwrap_or_default();

    init_tracing(&config.logging)?;

    // Build identification immediately after tracing init
    info!(
        "Starting rollcall-scan v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if let Err(e) = &config_result {
        warn!("Ignoring config file, using defaults: {}", e);
    }

    let root_folder = resolver.resolve_with(&config);
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let students_path = initializer.students_path(
        args.students_file.as_deref().or(config.students_file.as_deref()),
    );
    let attendance_path = initializer.attendance_path(
        args.attendance_file.as_deref().or(config.attendance_file.as_deref()),
    );

    let directory = CsvDirectory::load(&students_path)
        .with_context(|| format!("Failed to load students from {}", students_path.display()))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = CsvLog::open(&attendance_path).context("Failed to open attendance log")?;
    let ledger = Arc::new(
        AttendanceLedger::open(store, clock.clone())
            .context("Failed to load today's attendance")?,
    );

    let cooldown_ms = args.cooldown_ms.unwrap_or_else(|| config.cooldown_ms());
    info!("Scan cooldown: {} ms", cooldown_ms);

    let bus = Arc::new(EventBus::new(100));
    let mut pipeline = ScanPipeline::new(ledger, Arc::new(directory), millis_to_duration(cooldown_ms))
        .with_event_bus(bus);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Ready: one decoded payload per line, ':reload' or ':quit'");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = shutdown_signal() => {
                info!("Shutdown signal received");
                break;
            }
        };
        let Some(line) = line else {
            info!("Input closed");
            break;
        };

        match line.trim() {
            "" => continue,
            ":quit" => break,
            ":reload" => match task::block_in_place(|| pipeline.reload()) {
                Ok(count) => info!("Reloaded today's attendance ({} present)", count),
                // Previous cache stays in place; next scans keep using it
                Err(e) => error!("Reload failed: {}", e),
            },
            payload => {
                // Marks wait on sync_data; keep that off the async workers
                let outcome = task::block_in_place(|| pipeline.process(payload, clock.now()));
                if let Some(feedback) = outcome {
                    let out = FeedbackLine {
                        message: feedback.message(),
                        feedback: &feedback,
                    };
                    println!("{}", serde_json::to_string(&out)?);
                }
            }
        }
    }

    info!("rollcall-scan stopped");
    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr, or to the
/// configured file, so stdout carries feedback only.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let (stderr_layer, file_layer) = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file));
            (None, Some(layer))
        }
        None => (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
