//! LRU cache module for offline asset storage.
//!
//! Content assets are downloaded once, stored under
//! `<cache_dir>/<content_id>/<sha256(url)>.<ext>` and evicted least recently
//! used first when the size cap is reached. Inline `data:` URLs are decoded
//! and stored the same way so surfaces only ever deal with local files.

use anyhow::{anyhow, bail, Context, Result};
use base64::Engine;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

const MAX_ENTRIES: usize = 10_000;

/// Metadata for a cached asset.
#[derive(Debug, Clone)]
struct CacheEntry {
    path: PathBuf,
    size: u64,
}

#[derive(Debug)]
struct CacheState {
    /// Current cache size in bytes.
    current_size: u64,
    /// LRU tracking (key: content_id:url_hash).
    lru: LruCache<String, CacheEntry>,
    /// Quick lookup of the file for a key.
    index: HashMap<String, PathBuf>,
}

impl CacheState {
    fn insert(&mut self, key: String, path: PathBuf, size: u64) {
        let entry = CacheEntry {
            path: path.clone(),
            size,
        };
        match self.lru.push(key.clone(), entry) {
            Some((old_key, old)) if old_key == key => {
                self.current_size = self.current_size.saturating_sub(old.size);
            }
            Some((evicted_key, evicted)) => {
                tracing::debug!("Entry limit reached, evicting {:?}", evicted.path);
                self.forget(&evicted_key, &evicted);
            }
            None => {}
        }
        self.index.insert(key, path);
        self.current_size += size;
    }

    fn forget(&mut self, key: &str, entry: &CacheEntry) {
        remove_entry_file(&entry.path);
        self.index.remove(key);
        self.current_size = self.current_size.saturating_sub(entry.size);
    }

    /// Evict the least recently used asset.
    fn evict_lru(&mut self) -> bool {
        let Some((key, entry)) = self.lru.pop_lru() else {
            return false;
        };
        tracing::debug!("Evicting {:?}", entry.path);
        self.forget(&key, &entry);
        true
    }
}

/// LRU cache for content assets.
///
/// Cheap to clone; clones share one index, so downloads can run as
/// independent futures while the surface keeps its own handle.
#[derive(Debug, Clone)]
pub struct AssetCache {
    /// Base directory for cached files.
    cache_dir: PathBuf,
    /// Maximum cache size in bytes.
    max_size: u64,
    state: Arc<Mutex<CacheState>>,
}

impl AssetCache {
    /// Create a cache rooted at `cache_dir`, indexing files already on disk.
    pub fn new(cache_dir: PathBuf, max_size: u64) -> Result<Self> {
        Self::with_capacity(cache_dir, max_size, MAX_ENTRIES)
    }

    /// Like [`new`](Self::new) with an explicit entry limit.
    pub fn with_capacity(cache_dir: PathBuf, max_size: u64, max_entries: usize) -> Result<Self> {
        fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

        let capacity =
            NonZeroUsize::new(max_entries).ok_or_else(|| anyhow!("zero cache capacity"))?;
        let cache = Self {
            cache_dir,
            max_size,
            state: Arc::new(Mutex::new(CacheState {
                current_size: 0,
                lru: LruCache::new(capacity),
                index: HashMap::new(),
            })),
        };
        cache.scan_existing();

        tracing::info!(
            "Asset cache ready: {:.2} MB / {:.2} MB used",
            cache.lock().current_size as f64 / 1024.0 / 1024.0,
            max_size as f64 / 1024.0 / 1024.0
        );
        Ok(cache)
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-index files left over from a previous run.
    fn scan_existing(&self) {
        let mut state = self.lock();
        for entry in WalkDir::new(&self.cache_dir)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_path_buf();
            let Ok(metadata) = fs::metadata(&path) else {
                continue;
            };
            let content_id = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str());
            let hash = path.file_stem().and_then(|n| n.to_str());
            if let (Some(content_id), Some(hash)) = (content_id, hash) {
                let key = format!("{}:{}", content_id, hash);
                state.insert(key, path.clone(), metadata.len());
            }
        }
    }

    fn url_hash(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        digest.iter().take(16).map(|b| format!("{:02x}", b)).collect()
    }

    fn dir_name(content_id: &str) -> String {
        content_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    }

    /// Cache key for a content asset.
    fn cache_key(content_id: &str, url: &str) -> String {
        format!("{}:{}", Self::dir_name(content_id), Self::url_hash(url))
    }

    fn cache_path(&self, content_id: &str, url: &str, extension: &str) -> PathBuf {
        self.cache_dir
            .join(Self::dir_name(content_id))
            .join(format!("{}.{}", Self::url_hash(url), extension))
    }

    /// Path of a cached asset, if present.
    pub fn get_cached_path(&self, content_id: &str, url: &str) -> Option<PathBuf> {
        self.lock().index.get(&Self::cache_key(content_id, url)).cloned()
    }

    /// Return the local file for `url`, downloading or decoding it if needed.
    ///
    /// The index is never locked across an await.
    pub async fn fetch(
        &self,
        client: &reqwest::Client,
        content_id: &str,
        url: &str,
    ) -> Result<PathBuf> {
        let key = Self::cache_key(content_id, url);
        {
            let mut state = self.lock();
            if let Some(path) = state.index.get(&key).cloned() {
                if path.exists() {
                    let _ = state.lru.get(&key);
                    return Ok(path);
                }
            }
        }

        let (bytes, extension) = if url.starts_with("data:") {
            let (mime, bytes) = decode_data_url(url)?;
            (bytes, extension_for_mime(&mime).to_string())
        } else {
            tracing::debug!("Downloading {}", url);
            let response = client
                .get(url)
                .send()
                .await
                .context("Failed to send request")?
                .error_for_status()
                .context("Server returned error")?;
            let bytes = response.bytes().await.context("Failed to read response")?;
            (bytes.to_vec(), extension_for_url(url).to_string())
        };

        self.store(key, content_id, url, &extension, &bytes).await
    }

    async fn store(
        &self,
        key: String,
        content_id: &str,
        url: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let path = self.cache_path(content_id, url, extension);
        let size = bytes.len() as u64;

        {
            let mut state = self.lock();
            while state.current_size + size > self.max_size {
                if !state.evict_lru() {
                    tracing::warn!("Cache full and cannot evict, continuing anyway");
                    break;
                }
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create content cache directory")?;
        }
        let mut file = tokio::fs::File::create(&path)
            .await
            .context("Failed to create cache file")?;
        file.write_all(bytes)
            .await
            .context("Failed to write cache file")?;
        file.flush().await.context("Failed to flush cache file")?;

        let mut state = self.lock();
        state.insert(key, path.clone(), size);
        tracing::debug!(
            "Cached {} ({:.2} KB), total: {:.2} MB",
            content_id,
            size as f64 / 1024.0,
            state.current_size as f64 / 1024.0 / 1024.0
        );
        Ok(path)
    }

    /// Drop assets of content no longer referenced by the playlist.
    pub fn retain_content<'a>(&self, content_ids: impl IntoIterator<Item = &'a str>) {
        let keep: HashSet<String> = content_ids.into_iter().map(Self::dir_name).collect();
        let mut state = self.lock();
        let orphans: Vec<(String, CacheEntry)> = state
            .lru
            .iter()
            .filter(|(key, _)| {
                key.split(':')
                    .next()
                    .map(|id| !keep.contains(id))
                    .unwrap_or(false)
            })
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();

        for (key, entry) in orphans {
            tracing::debug!("Removing orphaned cache entry: {}", key);
            state.lru.pop(&key);
            state.forget(&key, &entry);
        }
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            current_size: state.current_size,
            max_size: self.max_size,
            item_count: state.lru.len(),
        }
    }
}

/// HTTP client for asset downloads.
///
/// Connecting and each read are bounded by `timeout`; the transfer as a
/// whole is not, so large videos on slow links still complete.
pub fn asset_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .context("Failed to build asset client")
}

fn remove_entry_file(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to remove cached file: {}", e);
        }
    }
    if let Some(parent) = path.parent() {
        let _ = fs::remove_dir(parent); // only succeeds when empty
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub current_size: u64,
    pub max_size: u64,
    pub item_count: usize,
}

/// Decode a `data:` URL into its MIME type and payload.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| anyhow!("not a data URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("data URL without payload"))?;

    let (mime, is_base64) = match meta.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (meta, false),
    };
    let mime = mime.split(';').next().unwrap_or("").to_string();

    let bytes = if is_base64 {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .context("Invalid base64 in data URL")?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };
    if bytes.is_empty() {
        bail!("empty data URL");
    }
    Ok((mime, bytes))
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => "bin",
    }
}

fn extension_for_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_base64_and_plain_data_urls() {
        let (mime, bytes) = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"hello");

        let (mime, bytes) = decode_data_url("data:text/plain,hi%20there").unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(bytes, b"hi there");

        assert!(decode_data_url("data:image/png;base64").is_err());
    }

    #[test]
    fn picks_extension_from_url_path() {
        assert_eq!(extension_for_url("http://h/uploads/a.PNG?v=2"), "PNG");
        assert_eq!(extension_for_url("http://h/media/clip.mp4#t=3"), "mp4");
        assert_eq!(extension_for_url("http://h/stream"), "bin");
    }

    #[tokio::test]
    async fn entry_limit_evicts_oldest_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = AssetCache::with_capacity(dir.path().to_path_buf(), 1024, 2).unwrap();
        let client = reqwest::Client::new();

        let first = cache.fetch(&client, "a", "data:text/plain,one").await.unwrap();
        cache.fetch(&client, "b", "data:text/plain,two").await.unwrap();
        cache.fetch(&client, "c", "data:text/plain,six").await.unwrap();

        assert!(!first.exists());
        assert_eq!(cache.get_cached_path("a", "data:text/plain,one"), None);
        assert_eq!(
            cache.stats(),
            CacheStats {
                current_size: 6,
                max_size: 1024,
                item_count: 2
            }
        );
    }

    #[test]
    fn dir_names_are_filesystem_safe() {
        assert_eq!(AssetCache::dir_name("../c1:x"), "___c1_x");
    }
}
