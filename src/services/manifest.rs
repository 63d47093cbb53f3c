//! Cached access to the external installer's `InstalledMods.config`.
//!
//! Reads are served from memory while younger than the TTL. Concurrent reads that
//! miss the cache share one disk parse. Every write invalidates the cache and
//! detaches any read still in flight, so a stale parse can never repopulate it.
//! Missing or unparsable files read as an empty manifest.

use crate::models::manifest::EMPTY_MANIFEST;
use crate::models::{ManifestDocument, ModOpError};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;

type SharedRead = Arc<OnceCell<Arc<ManifestDocument>>>;

#[derive(Default)]
struct CacheState {
    cached: Option<(Instant, Arc<ManifestDocument>)>,
    inflight: Option<SharedRead>,
}

/// Cache counters, exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub waits: u64,
}

pub struct ManifestStore {
    path: Utf8PathBuf,
    ttl: Duration,
    /// Log cache statistics every N hits; 0 disables
    log_every: u64,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    waits: AtomicU64,
}

impl ManifestStore {
    pub fn new<P: Into<Utf8PathBuf>>(path: P, ttl: Duration, log_every: u64) -> Self {
        Self {
            path: path.into(),
            ttl,
            log_every,
            state: Mutex::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            waits: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn stats(&self) -> ManifestCacheStats {
        ManifestCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current manifest, from cache when fresh
    pub async fn read(&self) -> Arc<ManifestDocument> {
        let shared = {
            let mut state = self.lock();

            if let Some((_, doc)) = state.cached.as_ref().filter(|(at, _)| at.elapsed() < self.ttl) {
                let hits = self.hits.fetch_add(1, Ordering::Relaxed) + 1;
                if self.log_every > 0 && hits % self.log_every == 0 {
                    let stats = self.stats();
                    tracing::debug!(
                        "InstalledMods.config cache hit ({}): hits={} misses={} waits={}",
                        self.path,
                        stats.hits,
                        stats.misses,
                        stats.waits
                    );
                }
                return Arc::clone(doc);
            }

            match &state.inflight {
                Some(shared) => {
                    self.waits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("InstalledMods.config read in flight, waiting: {}", self.path);
                    Arc::clone(shared)
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    let shared: SharedRead = Arc::new(OnceCell::new());
                    state.inflight = Some(Arc::clone(&shared));
                    shared
                }
            }
        };

        let doc = shared
            .get_or_init(|| async { Arc::new(load(&self.path).await) })
            .await
            .clone();

        let mut state = self.lock();
        if state
            .inflight
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &shared))
        {
            state.inflight = None;
            state.cached = Some((Instant::now(), Arc::clone(&doc)));
            tracing::debug!(
                "InstalledMods.config cache miss ({}): {} entries, ttl {:?}",
                self.path,
                doc.entries.len(),
                self.ttl
            );
        }

        doc
    }

    /// Drop the cached document and detach any in-flight read
    pub fn invalidate(&self, reason: &str) {
        let mut state = self.lock();
        state.cached = None;
        state.inflight = None;
        tracing::debug!("InstalledMods.config cache invalidated: {}", reason);
    }

    /// Serialize and write the document; the cache is invalidated even on failure
    pub async fn write(&self, doc: &ManifestDocument) -> Result<(), ModOpError> {
        let result = match doc.to_xml() {
            Ok(xml) => tokio::fs::write(&self.path, xml)
                .await
                .map_err(|e| ModOpError::Io(format!("Failed to write {}: {}", self.path, e))),
            Err(e) => Err(ModOpError::from(e)),
        };
        self.invalidate("write");
        result
    }

    /// Make sure the file exists and parses, recreating it empty otherwise
    pub async fn ensure_valid(&self) -> Result<(), ModOpError> {
        let reason = match tokio::fs::read_to_string(&self.path).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some("create"),
            Err(e) => {
                tracing::warn!("Unreadable manifest {}: {}", self.path, e);
                Some("unreadable")
            }
            Ok(text) if text.trim().is_empty() => Some("empty"),
            Ok(text) => match ManifestDocument::parse(text.trim()) {
                Ok(_) => None,
                Err(e) => {
                    let malformed = ModOpError::ManifestMalformed(format!("{:#}", e));
                    tracing::warn!("Resetting {}: {}", self.path, malformed);
                    Some("invalid")
                }
            },
        };

        if let Some(reason) = reason {
            tokio::fs::write(&self.path, EMPTY_MANIFEST)
                .await
                .map_err(|e| ModOpError::Io(format!("Failed to write {}: {}", self.path, e)))?;
            self.invalidate(reason);
        }
        Ok(())
    }
}

async fn load(path: &Utf8Path) -> ManifestDocument {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => ManifestDocument::parse(&text).unwrap_or_else(|e| {
            tracing::warn!("Treating malformed {} as empty: {:#}", path, e);
            ManifestDocument::default()
        }),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read {}: {}", path, e);
            }
            ManifestDocument::default()
        }
    }
}
