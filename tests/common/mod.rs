//! Shared fixtures: a temporary tooling folder and game install, plus fake
//! downloader and installer collaborators.

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use modops::models::{ModOpError, ModOpsConfig};
use modops::services::installer_process::BoxFuture;
use modops::services::paths::{INSTALLER_EXE, MANIFEST_FILE};
use modops::services::{InstallEngine, InstallerRunner, PackageDownloader};
use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub struct Fixture {
    _temp: TempDir,
    pub root: Utf8PathBuf,
    pub kit: Utf8PathBuf,
    /// Game data dir as the game's installer records it (ends in `DataEP1`)
    pub game_data: Utf8PathBuf,
    pub config: ModOpsConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();

        let kit = root.join("ModAPI");
        for dir in ["mLibs", "ModSettings", "ModConfigs"] {
            fs::create_dir_all(kit.join(dir)).unwrap();
        }
        fs::write(kit.join(INSTALLER_EXE), b"").unwrap();

        let install = root.join("Spore");
        let game_data = install.join("DataEP1");
        fs::create_dir_all(&game_data).unwrap();
        fs::create_dir_all(install.join("Data")).unwrap();
        fs::create_dir_all(game_data.join("Config")).unwrap();

        fs::create_dir_all(root.join("scratch")).unwrap();

        let config = ModOpsConfig {
            game_data_dir: Some(game_data.to_string()),
            kit_dir: Some(kit.to_string()),
            data_dir: Some(root.join("appdata").to_string()),
            temp_dir: Some(root.join("scratch").to_string()),
            settle_delay_ms: 0,
            emit_throttle_ms: 0,
            ..ModOpsConfig::default()
        };

        Self {
            _temp: temp,
            root,
            kit,
            game_data,
            config,
        }
    }

    pub fn mlibs(&self) -> Utf8PathBuf {
        self.kit.join("mLibs")
    }

    pub fn settings(&self) -> Utf8PathBuf {
        self.kit.join("ModSettings")
    }

    pub fn mod_configs(&self) -> Utf8PathBuf {
        self.kit.join("ModConfigs")
    }

    pub fn data(&self) -> Utf8PathBuf {
        self.root.join("Spore").join("Data")
    }

    pub fn data_ep1(&self) -> Utf8PathBuf {
        self.game_data.clone()
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.kit.join(MANIFEST_FILE)
    }

    pub fn write_manifest(&self, mods_xml: &str) {
        fs::write(
            self.manifest_path(),
            format!("<InstalledMods>{}</InstalledMods>", mods_xml),
        )
        .unwrap();
    }

    pub fn touch(&self, dir: &Utf8Path, name: &str) -> Utf8PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        path
    }

    /// Installer that registers `mods_xml` in the manifest and exits 0
    pub fn registering_installer(&self, mods_xml: &str) -> Arc<FakeInstaller> {
        let manifest = self.manifest_path();
        let contents = format!("<InstalledMods>{}</InstalledMods>", mods_xml);
        FakeInstaller::new(0, move |_| fs::write(&manifest, &contents).unwrap())
    }

    pub fn engine(&self, downloader: Arc<dyn PackageDownloader>, runner: Arc<dyn InstallerRunner>) -> Arc<InstallEngine> {
        Arc::new(InstallEngine::new(Arc::new(self.config.clone()), downloader, runner))
    }
}

/// Writes fixed bytes to the destination and records requested URLs
pub struct FakeDownloader {
    bytes: Vec<u8>,
    pub urls: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn new(bytes: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            bytes,
            urls: Mutex::new(Vec::new()),
        })
    }
}

impl PackageDownloader for FakeDownloader {
    fn download(&self, url: &str, dest: &Utf8Path) -> Result<(), ModOpError> {
        self.urls.lock().unwrap().push(url.to_string());
        fs::write(dest, &self.bytes).map_err(ModOpError::from)
    }
}

type InstallEffect = Box<dyn Fn(&Utf8Path) + Send + Sync>;

/// Stands in for the installer executable: applies `effect`, then exits with `exit_code`
pub struct FakeInstaller {
    exit_code: i64,
    delay: Option<Duration>,
    effect: InstallEffect,
    pub runs: Mutex<Vec<Utf8PathBuf>>,
}

impl FakeInstaller {
    pub fn new<F>(exit_code: i64, effect: F) -> Arc<Self>
    where
        F: Fn(&Utf8Path) + Send + Sync + 'static,
    {
        Arc::new(Self {
            exit_code,
            delay: None,
            effect: Box::new(effect),
            runs: Mutex::new(Vec::new()),
        })
    }

    /// Installer that waits `delay`, registers nothing and exits 0
    pub fn hanging(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            exit_code: 0,
            delay: Some(delay),
            effect: Box::new(|_| {}),
            runs: Mutex::new(Vec::new()),
        })
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

impl InstallerRunner for FakeInstaller {
    fn run<'a>(&'a self, _exe: &'a Utf8Path, package: &'a Utf8Path) -> BoxFuture<'a, Result<i64, ModOpError>> {
        Box::pin(async move {
            assert!(package.is_file(), "package must exist while the installer runs");
            self.runs.lock().unwrap().push(package.to_path_buf());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.effect)(package);
            Ok(self.exit_code)
        })
    }
}

/// Zip archive holding `files` at nested paths, as patch archives ship them
pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in files {
            zip.start_file(format!("patch/{}", name), options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    cursor.into_inner()
}
