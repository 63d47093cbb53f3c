//! Package retrieval: HTTP download to a scratch file and zip extraction.

use crate::models::ModOpError;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;

pub const USER_AGENT: &str = concat!("modops/", env!("CARGO_PKG_VERSION"));

/// Blocking download seam; called from `spawn_blocking`
#[cfg_attr(test, mockall::automock)]
pub trait PackageDownloader: Send + Sync {
    fn download(&self, url: &str, dest: &Utf8Path) -> Result<(), ModOpError>;
}

/// `ureq`-backed downloader
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(120))
            .timeout_write(Duration::from_secs(60))
            .build();
        Self { agent }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Utf8Path) -> Result<(), ModOpError> {
        tracing::debug!("GET {} -> {}", url, dest);

        let response = self
            .agent
            .get(url)
            .set("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => {
                    ModOpError::DownloadFailed(format!("HTTP {} for {}", code, url))
                }
                other => ModOpError::DownloadFailed(other.to_string()),
            })?;

        let mut reader = response.into_reader();
        let mut file = File::create(dest)
            .map_err(|e| ModOpError::Io(format!("Failed to create {}: {}", dest, e)))?;
        let bytes = io::copy(&mut reader, &mut file)
            .map_err(|e| ModOpError::DownloadFailed(format!("Failed to write {}: {}", dest, e)))?;

        tracing::info!("Downloaded {} bytes from {}", bytes, url);
        Ok(())
    }
}

/// Download `url` to a fresh scratch file named `<prefix>-XXXX<suffix>`.
///
/// The returned [`TempPath`] deletes the file when dropped.
pub async fn download_to_temp(
    downloader: Arc<dyn PackageDownloader>,
    url: &str,
    prefix: &str,
    suffix: &str,
    temp_dir: Option<&Utf8Path>,
) -> Result<TempPath, ModOpError> {
    if url.trim().is_empty() {
        return Err(ModOpError::DownloadFailed("Missing download URL".to_string()));
    }

    let prefix = format!("{}-", if prefix.trim().is_empty() { "mod" } else { prefix.trim() });
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(suffix);
    let file = match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| ModOpError::Io(format!("Failed to create scratch file: {}", e)))?;

    let temp_path = file.into_temp_path();
    let dest = Utf8PathBuf::try_from(temp_path.to_path_buf())
        .map_err(|e| ModOpError::Io(format!("Scratch path is not UTF-8: {}", e)))?;

    let url = url.to_string();
    tokio::task::spawn_blocking(move || downloader.download(&url, &dest))
        .await
        .map_err(|e| ModOpError::DownloadFailed(format!("Download task failed: {}", e)))??;

    Ok(temp_path)
}

/// Extract entries whose base name is one of `names` into `dest`.
///
/// Fails unless every name was found.
pub fn extract_named_files(
    zip_path: &Utf8Path,
    names: &[String],
    dest: &Utf8Path,
) -> Result<Vec<Utf8PathBuf>, ModOpError> {
    let file = File::open(zip_path)
        .map_err(|e| ModOpError::Io(format!("Failed to open {}: {}", zip_path, e)))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ModOpError::DownloadFailed(format!("Invalid archive {}: {}", zip_path, e)))?;

    fs::create_dir_all(dest)
        .map_err(|e| ModOpError::Io(format!("Failed to create {}: {}", dest, e)))?;

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ModOpError::Io(format!("Bad zip entry {}: {}", i, e)))?;
        if entry.is_dir() {
            continue;
        }
        let Some(enclosed) = entry.enclosed_name() else {
            continue;
        };
        let Some(base) = enclosed.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(wanted) = names.iter().find(|n| n.as_str() == base) else {
            continue;
        };

        let out_path = dest.join(wanted);
        if extracted.contains(&out_path) {
            continue;
        }
        let mut out = File::create(&out_path)
            .map_err(|e| ModOpError::Io(format!("Failed to create {}: {}", out_path, e)))?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| ModOpError::Io(format!("Failed to extract {}: {}", out_path, e)))?;
        tracing::debug!("Extracted {} -> {}", base, out_path);
        extracted.push(out_path);
    }

    if extracted.len() != names.len() {
        return Err(ModOpError::DownloadFailed(format!(
            "Not all required files found in zip: expected {}, found {}",
            names.join(", "),
            extracted.len()
        )));
    }

    Ok(extracted)
}
