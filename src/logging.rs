use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fs;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Where and how much to log
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Directory for daily-rotated log files
    pub log_dir: Utf8PathBuf,
    /// File name prefix (e.g. "modops" gives `modops.2026-10-18`)
    pub log_prefix: String,
    /// Debug level instead of info; `RUST_LOG` overrides both
    pub debug_mode: bool,
    /// Also log to stderr
    pub console_output: bool,
    /// Write the file layer as JSON lines
    pub json: bool,
}

impl LoggingOptions {
    pub fn new<P: Into<Utf8PathBuf>>(log_dir: P) -> Self {
        Self {
            log_dir: log_dir.into(),
            log_prefix: "modops".to_string(),
            debug_mode: false,
            console_output: false,
            json: false,
        }
    }

    fn filter(&self) -> EnvFilter {
        let level = if self.debug_mode { "debug" } else { "info" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    }
}

/// Setup logging with a rotating file appender and optional console output.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(options: &LoggingOptions) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    if !options.log_dir.exists() {
        fs::create_dir_all(&options.log_dir)
            .with_context(|| format!("Failed to create log directory: {}", options.log_dir))?;
    }

    let file_appender = rolling::daily(&options.log_dir, &options.log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);
    let file_layer = if options.json {
        file_layer.json().boxed()
    } else {
        file_layer.boxed()
    };

    let console_layer = options.console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(options.filter())
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Logging is already initialized")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}",
        options.log_dir,
        options.log_prefix,
        options.debug_mode,
        options.console_output
    );

    Ok(guard)
}
