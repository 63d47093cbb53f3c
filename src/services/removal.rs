//! Best-effort removal helpers used by uninstall.
//!
//! Failures are logged and reported as `false`; one undeletable file never aborts
//! the rest of an uninstall.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Remove a file if present
pub fn remove_file_if_exists(path: &Utf8Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Removed file {}", path);
            true
        }
        Err(e) => {
            tracing::warn!("Failed to remove {}: {}", path, e);
            false
        }
    }
}

/// Remove a file or a whole directory tree if present
pub fn remove_path_if_exists(path: &Utf8Path) -> bool {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        return false;
    };

    match result {
        Ok(()) => {
            tracing::debug!("Removed {}", path);
            true
        }
        Err(e) => {
            tracing::warn!("Failed to remove {}: {}", path, e);
            false
        }
    }
}

/// Entry names of a directory; an unreadable or missing directory is empty
pub fn list_dir(dir: &Utf8Path) -> Vec<String> {
    match dir.read_dir_utf8() {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string())
            .collect(),
        Err(e) => {
            if dir.exists() {
                tracing::warn!("Failed to list {}: {}", dir, e);
            }
            Vec::new()
        }
    }
}

/// Actual path of `name` inside `dir`, matched case-insensitively
pub fn find_in_dir(dir: &Utf8Path, name: &str) -> Option<Utf8PathBuf> {
    let target = name.to_lowercase();
    list_dir(dir)
        .into_iter()
        .find(|entry| entry.to_lowercase() == target)
        .map(|entry| dir.join(entry))
}

/// Remove the file in `dir` whose name matches `name` ignoring case
pub fn remove_in_dir_ignore_case(dir: &Utf8Path, name: &str) -> bool {
    match find_in_dir(dir, name) {
        Some(path) => remove_path_if_exists(&path),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8_dir(temp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_remove_in_dir_ignores_case() {
        let temp = TempDir::new().unwrap();
        let dir = utf8_dir(&temp);
        fs::write(dir.join("ColorfulClouds.DLL"), b"x").unwrap();

        assert!(remove_in_dir_ignore_case(&dir, "colorfulclouds.dll"));
        assert!(!dir.join("ColorfulClouds.DLL").exists());
        assert!(!remove_in_dir_ignore_case(&dir, "colorfulclouds.dll"));
    }

    #[test]
    fn test_remove_path_handles_dirs() {
        let temp = TempDir::new().unwrap();
        let dir = utf8_dir(&temp);
        let nested = dir.join("Clouds");
        fs::create_dir_all(nested.join("inner")).unwrap();
        fs::write(nested.join("inner/config.xml"), b"x").unwrap();

        assert!(remove_path_if_exists(&nested));
        assert!(!nested.exists());
        assert!(!remove_file_if_exists(&dir.join("missing.txt")));
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(list_dir(&utf8_dir(&temp).join("nope")).is_empty());
    }
}
