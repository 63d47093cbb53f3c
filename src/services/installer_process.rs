//! Launching the external installer executable.
//!
//! The installer takes one positional argument, the package path, and reports only
//! through its exit code. A code of `-1` (or its unsigned form `4294967295`) means
//! the user closed its window.

use crate::models::ModOpError;
use camino::Utf8Path;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tokio::process::Command;

/// Exit codes the installer uses when its UI is cancelled
pub const CANCEL_EXIT_CODES: [i64; 2] = [-1, 4_294_967_295];

/// Largest stdout/stderr excerpt written to the log
const OUTPUT_LOG_LIMIT: usize = 2000;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Seam over running the installer; returns its exit code
pub trait InstallerRunner: Send + Sync {
    fn run<'a>(&'a self, exe: &'a Utf8Path, package: &'a Utf8Path) -> BoxFuture<'a, Result<i64, ModOpError>>;
}

pub fn is_cancel_exit_code(code: i64) -> bool {
    CANCEL_EXIT_CODES.contains(&code)
}

/// Runs the installer as a child process; the child is killed if the future is dropped
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl InstallerRunner for ProcessRunner {
    fn run<'a>(&'a self, exe: &'a Utf8Path, package: &'a Utf8Path) -> BoxFuture<'a, Result<i64, ModOpError>> {
        Box::pin(async move {
            tracing::info!("Launching installer: {} {}", exe, package);
            let start = Instant::now();

            let child = Command::new(exe.as_std_path())
                .arg(package.as_std_path())
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| ModOpError::Io(format!("Failed to spawn {}: {}", exe, e)))?;

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| ModOpError::Io(format!("Failed to wait for {}: {}", exe, e)))?;

            log_output("stdout", &output.stdout);
            log_output("stderr", &output.stderr);

            let exit_code = output.status.code().map(i64::from).unwrap_or(-1);
            tracing::info!(
                "Installer exited in {:.2}s with code {}",
                start.elapsed().as_secs_f32(),
                exit_code
            );
            Ok(exit_code)
        })
    }
}

fn log_output(stream: &str, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(bytes);
    let excerpt: String = text.chars().take(OUTPUT_LOG_LIMIT).collect();
    tracing::debug!("Installer {}: {}", stream, excerpt.trim_end());
}
