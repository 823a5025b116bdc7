//! Content-addressed, deduplicating media fetcher.
//!
//! Every URL is resolved to a `LocalAsset` path under the media directory and
//! fetched at most once per run:
//! - the URL map (raw and canonical forms) is checked first, under a lock;
//! - a non-empty file already at the asset path is reused without a request;
//! - otherwise the asset is downloaded with two attempts under different
//!   browser identities.
//!
//! Check-fetch-record for one asset path runs under a lock keyed by the asset
//! stem, so two encodings of the same reference never download twice while
//! unrelated assets download in parallel.
//! Downloads land in `<name>.part` and are renamed into place when non-empty.

use crate::asset::{canonical_reference, LocalAsset};
use crate::progress::ProgressScope;
use crate::util::{create_with_backoff, file_len, remove_with_backoff, replace_file_atomic_backoff};
use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::ffi::OsString;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Request identity for one attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Identity {
    /// Desktop Chrome with an image Accept header and a referrer.
    Desktop,
    /// Linux Firefox, no referrer.
    Alternate,
}

impl Identity {
    pub fn user_agent(self) -> &'static str {
        match self {
            Identity::Desktop => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            Identity::Alternate => "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0",
        }
    }
    pub fn accept(self) -> Option<&'static str> {
        match self {
            Identity::Desktop => Some("image/webp,image/*,*/*;q=0.8"),
            Identity::Alternate => None,
        }
    }
    pub fn referer(self) -> Option<&'static str> {
        match self {
            Identity::Desktop => Some("https://www.reddit.com/"),
            Identity::Alternate => None,
        }
    }
}

/// Attempt order; the backoff sleep sits between consecutive entries.
pub const ATTEMPTS: [Identity; 2] = [Identity::Desktop, Identity::Alternate];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("empty response body")]
    Empty,

    #[error("local I/O: {0}")]
    Io(#[from] io::Error),

    #[error("could not move download into place: {0}")]
    Persist(String),
}

/// Where media bytes come from. `HttpSource` in production; tests script their own.
pub trait MediaSource: Send + Sync {
    /// Stream the body for `url` into `sink`, returning the byte count.
    /// Non-success statuses must be reported as `FetchError::Status`.
    fn fetch(&self, url: &str, identity: Identity, sink: &mut dyn Write) -> Result<u64, FetchError>;
}

/// Blocking `reqwest` transport with a fixed per-attempt timeout.
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build HTTP client")?;
        Ok(Self { client })
    }
}

impl MediaSource for HttpSource {
    fn fetch(&self, url: &str, identity: Identity, sink: &mut dyn Write) -> Result<u64, FetchError> {
        use reqwest::header::{ACCEPT, REFERER, USER_AGENT};

        let mut req = self.client.get(url).header(USER_AGENT, identity.user_agent());
        if let Some(accept) = identity.accept() {
            req = req.header(ACCEPT, accept);
        }
        if let Some(referer) = identity.referer() {
            req = req.header(REFERER, referer);
        }
        let mut resp = req.send().map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        io::copy(&mut resp, sink).map_err(|e| FetchError::Transport(e.to_string()))
    }
}

/// URL → local path, shared by all workers. Append-only while fetching.
#[derive(Default)]
pub struct MediaCache {
    inner: Mutex<AHashMap<String, PathBuf>>,
}

impl MediaCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, raw: &str, canonical: &str) -> Option<PathBuf> {
        let map = self.inner.lock();
        map.get(canonical).or_else(|| map.get(raw)).cloned()
    }

    fn record(&self, raw: &str, canonical: &str, path: &Path) {
        let mut map = self.inner.lock();
        map.insert(canonical.to_string(), path.to_path_buf());
        if raw != canonical {
            map.insert(raw.to_string(), path.to_path_buf());
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn snapshot(&self) -> AHashMap<String, PathBuf> {
        self.inner.lock().clone()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub downloaded: u64,   // network fetch succeeded
    pub reused: u64,       // non-empty file already on disk
    pub cached: u64,       // resolved from the URL map
    pub failed: u64,       // both attempts failed
}

/// Outcome of `fetch_all`.
#[derive(Clone, Debug, Default)]
pub struct FetchResults {
    /// One entry per distinct input URL; `None` when every attempt failed.
    pub outcomes: AHashMap<String, Option<PathBuf>>,
    /// Every form (raw and canonical) resolved so far by this fetcher.
    pub resolved: AHashMap<String, PathBuf>,
    pub stats: FetchStats,
}

impl FetchResults {
    pub fn get(&self, url: &str) -> Option<&Path> {
        self.outcomes.get(url).and_then(|p| p.as_deref())
    }
    pub fn present(&self) -> usize {
        self.outcomes.values().filter(|p| p.is_some()).count()
    }
    pub fn absent(&self) -> usize {
        self.outcomes.values().filter(|p| p.is_none()).count()
    }
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[derive(Default)]
struct Counters {
    downloaded: AtomicU64,
    reused: AtomicU64,
    cached: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> FetchStats {
        FetchStats {
            downloaded: self.downloaded.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

pub struct MediaFetcher<S: MediaSource> {
    source: S,
    media_dir: PathBuf,
    workers: usize,
    backoff: Duration,
    progress: bool,
    cache: MediaCache,
    in_flight: Mutex<AHashMap<String, Arc<Mutex<()>>>>,
}

impl<S: MediaSource> MediaFetcher<S> {
    pub fn new(source: S, media_dir: impl AsRef<Path>) -> Self {
        Self {
            source,
            media_dir: media_dir.as_ref().to_path_buf(),
            workers: crate::config::DEFAULT_WORKERS,
            backoff: Duration::from_millis(500),
            progress: false,
            cache: MediaCache::new(),
            in_flight: Mutex::new(AHashMap::new()),
        }
    }

    pub fn workers(mut self, n: usize) -> Self { self.workers = n.max(1); self }
    pub fn backoff(mut self, d: Duration) -> Self { self.backoff = d; self }
    pub fn progress(mut self, yes: bool) -> Self { self.progress = yes; self }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }

    /// Resolve every URL on a dedicated pool of `workers` threads and wait for all
    /// of them. A failing URL yields `None` and never affects the others.
    pub fn fetch_all(&self, urls: &[String]) -> Result<FetchResults> {
        fs::create_dir_all(&self.media_dir)
            .with_context(|| format!("create media dir {}", self.media_dir.display()))?;

        let mut seen = AHashSet::with_capacity(urls.len());
        let unique: Vec<&String> = urls.iter().filter(|u| seen.insert(u.as_str())).collect();
        if unique.is_empty() {
            return Ok(FetchResults { resolved: self.cache.snapshot(), ..Default::default() });
        }

        tracing::info!(urls = unique.len(), workers = self.workers, "fetching media");
        let started = Instant::now();
        let counters = Counters::default();
        let pb = ProgressScope::count("Fetching media", unique.len() as u64, self.progress);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("fetch-{i}"))
            .build()
            .context("build fetch pool")?;

        let pairs: Vec<(String, Option<PathBuf>)> = pool.install(|| {
            unique
                .par_iter()
                .map(|url| {
                    let out = self.fetch_one(url, &counters);
                    pb.inc(1);
                    ((*url).clone(), out)
                })
                .collect()
        });
        let outcomes: AHashMap<String, Option<PathBuf>> = pairs.into_iter().collect();

        let stats = counters.snapshot();
        pb.finish(format!("{} fetched, {} failed", stats.downloaded, stats.failed));
        tracing::info!(
            downloaded = stats.downloaded,
            reused = stats.reused,
            cached = stats.cached,
            failed = stats.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "media fetch complete"
        );

        Ok(FetchResults { outcomes, resolved: self.cache.snapshot(), stats })
    }

    /// Lock shared by every URL that maps to `asset`. The entry lives while any
    /// holder of the returned handle is still working on it.
    fn path_lock(&self, asset: &LocalAsset) -> Arc<Mutex<()>> {
        self.in_flight.lock().entry(asset.stem.clone()).or_default().clone()
    }

    fn release_path_lock(&self, asset: &LocalAsset, lock: &Arc<Mutex<()>>) {
        let mut map = self.in_flight.lock();
        // Map entry plus our handle: nobody else is waiting on this path.
        if Arc::strong_count(lock) == 2 {
            map.remove(&asset.stem);
        }
    }

    /// Resolve one URL to a local path.
    fn fetch_one(&self, url: &str, counters: &Counters) -> Option<PathBuf> {
        let canonical = canonical_reference(url);
        if let Some(p) = self.cache.lookup(url, &canonical) {
            self.cache.record(url, &canonical, &p);
            counters.cached.fetch_add(1, Ordering::Relaxed);
            return Some(p);
        }

        let asset = LocalAsset::for_reference(url);
        let dest = asset.path_in(&self.media_dir);
        let lock = self.path_lock(&asset);
        let out = {
            let _guard = lock.lock();
            self.resolve_locked(url, &canonical, &dest, counters)
        };
        self.release_path_lock(&asset, &lock);
        out
    }

    fn resolve_locked(&self, url: &str, canonical: &str, dest: &Path, counters: &Counters) -> Option<PathBuf> {
        // Another encoding of the same reference may have finished while we waited.
        if let Some(p) = self.cache.lookup(url, canonical) {
            self.cache.record(url, canonical, &p);
            counters.cached.fetch_add(1, Ordering::Relaxed);
            return Some(p);
        }
        if file_len(dest).is_some_and(|n| n > 0) {
            self.cache.record(url, canonical, dest);
            counters.reused.fetch_add(1, Ordering::Relaxed);
            return Some(dest.to_path_buf());
        }

        match self.download(canonical, dest) {
            Ok(bytes) => {
                tracing::debug!(url = %canonical, bytes, path = %dest.display(), "downloaded");
                self.cache.record(url, canonical, dest);
                counters.downloaded.fetch_add(1, Ordering::Relaxed);
                Some(dest.to_path_buf())
            }
            Err(e) => {
                tracing::warn!(url = %canonical, error = %e, "media fetch failed");
                counters.failed.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let part = part_path(dest);
        let mut last_err = FetchError::Empty;
        for (i, identity) in ATTEMPTS.iter().copied().enumerate() {
            if i > 0 {
                std::thread::sleep(self.backoff);
            }
            match self.attempt(url, identity, &part) {
                Ok(bytes) => {
                    replace_file_atomic_backoff(&part, dest).map_err(|e| FetchError::Persist(format!("{e:#}")))?;
                    return Ok(bytes);
                }
                Err(e) => {
                    tracing::debug!(url, attempt = i + 1, ?identity, error = %e, "attempt failed");
                    if let Err(rm) = remove_with_backoff(&part, 4, 25) {
                        tracing::debug!(path = %part.display(), error = %rm, "could not remove partial download");
                    }
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn attempt(&self, url: &str, identity: Identity, part: &Path) -> Result<u64, FetchError> {
        let file = create_with_backoff(part, 8, 25)?;
        let mut w = BufWriter::new(file);
        let bytes = self.source.fetch(url, identity, &mut w)?;
        w.flush()?;
        drop(w);
        if bytes == 0 || file_len(part).unwrap_or(0) == 0 {
            return Err(FetchError::Empty);
        }
        Ok(bytes)
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut s: OsString = dest.as_os_str().to_owned();
    s.push(".part");
    PathBuf::from(s)
}
