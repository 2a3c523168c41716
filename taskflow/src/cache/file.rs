//! Directory-backed task cache.
//!
//! Each entry lives in `<root>/<first two hex chars>/<fingerprint>.json`.
//! Writes go to a temporary file that is renamed into place, so concurrent
//! stores to one fingerprint leave exactly one complete entry behind.

use super::{CacheEntry, Fingerprint, TaskCache};
use crate::errors::CacheUnavailableError;
use crate::utils::Timestamp;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use uuid::Uuid;

const BACKEND: &str = "file";

/// Task cache persisted as JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct FileTaskCache {
    root: PathBuf,
}

impl FileTaskCache {
    /// Creates a cache rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        let digest = fingerprint.as_str();
        let shard = &digest[..2.min(digest.len())];
        self.root.join(shard).join(format!("{digest}.json"))
    }

    async fn read_entry(&self, path: &Path) -> Result<Option<CacheEntry>, CacheUnavailableError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(unavailable(format!("reading {}: {e}", path.display())));
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| unavailable(format!("decoding {}: {e}", path.display())))
    }

    async fn remove_entry(path: &Path) -> Result<(), CacheUnavailableError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable(format!("removing {}: {e}", path.display()))),
        }
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>, CacheUnavailableError> {
        let mut files = Vec::new();
        let mut shards = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(unavailable(format!("listing {}: {e}", self.root.display()))),
        };

        while let Some(shard) = shards.next_entry().await.map_err(listing_error)? {
            if !shard.file_type().await.map_err(listing_error)?.is_dir() {
                continue;
            }
            let mut entries = fs::read_dir(shard.path()).await.map_err(listing_error)?;
            while let Some(entry) = entries.next_entry().await.map_err(listing_error)? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    files.push(path);
                }
            }
        }
        Ok(files)
    }
}

fn unavailable(reason: String) -> CacheUnavailableError {
    CacheUnavailableError::new(BACKEND, reason)
}

fn listing_error(e: std::io::Error) -> CacheUnavailableError {
    unavailable(format!("listing entries: {e}"))
}

#[async_trait]
impl TaskCache for FileTaskCache {
    async fn lookup(
        &self,
        fingerprint: &Fingerprint,
        now: Timestamp,
    ) -> Result<Option<serde_json::Value>, CacheUnavailableError> {
        let path = self.entry_path(fingerprint);
        match self.read_entry(&path).await? {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value)),
            Some(_) => {
                Self::remove_entry(&path).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn store(
        &self,
        fingerprint: &Fingerprint,
        value: serde_json::Value,
        ttl: Duration,
        now: Timestamp,
    ) -> Result<(), CacheUnavailableError> {
        let path = self.entry_path(fingerprint);
        let dir = path
            .parent()
            .ok_or_else(|| unavailable(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(dir)
            .await
            .map_err(|e| unavailable(format!("creating {}: {e}", dir.display())))?;

        let entry = CacheEntry::new(value, ttl, now);
        let bytes = serde_json::to_vec(&entry)
            .map_err(|e| unavailable(format!("encoding entry: {e}")))?;

        let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, &bytes)
            .await
            .map_err(|e| unavailable(format!("writing {}: {e}", tmp.display())))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(unavailable(format!("renaming into {}: {e}", path.display())));
        }
        Ok(())
    }

    async fn sweep(&self, now: Timestamp) -> Result<usize, CacheUnavailableError> {
        let mut removed = 0;
        for path in self.entry_files().await? {
            match self.read_entry(&path).await {
                Ok(Some(entry)) if entry.is_expired(now) => {
                    Self::remove_entry(&path).await?;
                    removed += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Removing unreadable cache entry");
                    Self::remove_entry(&path).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), CacheUnavailableError> {
        for path in self.entry_files().await? {
            Self::remove_entry(&path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::saturating_add;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
    }

    fn fp(name: &str) -> Fingerprint {
        Fingerprint::compute("fetch", &json!({ "url": name })).unwrap()
    }

    #[tokio::test]
    async fn test_store_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTaskCache::new(dir.path());

        cache
            .store(&fp("a"), json!({"rows": 3}), Duration::from_secs(60), t0())
            .await
            .unwrap();

        let hit = cache.lookup(&fp("a"), t0()).await.unwrap();
        assert_eq!(hit, Some(json!({"rows": 3})));
        assert_eq!(cache.lookup(&fp("b"), t0()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_survive_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        FileTaskCache::new(dir.path())
            .store(&fp("a"), json!(7), Duration::from_secs(60), t0())
            .await
            .unwrap();

        let reopened = FileTaskCache::new(dir.path());
        assert_eq!(reopened.lookup(&fp("a"), t0()).await.unwrap(), Some(json!(7)));
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTaskCache::new(dir.path());
        cache
            .store(&fp("a"), json!(1), Duration::from_secs(10), t0())
            .await
            .unwrap();

        let late = saturating_add(t0(), Duration::from_secs(11));
        assert_eq!(cache.lookup(&fp("a"), late).await.unwrap(), None);
        assert!(!cache.entry_path(&fp("a")).exists());
    }

    #[tokio::test]
    async fn test_corrupt_entry_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTaskCache::new(dir.path());
        let path = cache.entry_path(&fp("a"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();

        let err = cache.lookup(&fp("a"), t0()).await.unwrap_err();
        assert_eq!(err.backend, "file");
        assert!(err.reason.contains("decoding"));
    }

    #[tokio::test]
    async fn test_unwritable_root_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"a file, not a directory").unwrap();

        let cache = FileTaskCache::new(&blocker);
        let err = cache
            .store(&fp("a"), json!(1), Duration::from_secs(10), t0())
            .await
            .unwrap_err();
        assert_eq!(err.backend, "file");
    }

    #[tokio::test]
    async fn test_sweep_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTaskCache::new(dir.path());
        cache.store(&fp("short"), json!(1), Duration::from_secs(10), t0()).await.unwrap();
        cache.store(&fp("long"), json!(2), Duration::from_secs(1000), t0()).await.unwrap();

        let removed = cache
            .sweep(saturating_add(t0(), Duration::from_secs(100)))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.lookup(&fp("long"), t0()).await.unwrap(), Some(json!(2)));

        cache.clear().await.unwrap();
        assert_eq!(cache.lookup(&fp("long"), t0()).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stores_same_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileTaskCache::new(dir.path()));
        let mut handles = Vec::new();

        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache
                    .store(&fp("shared"), json!(i), Duration::from_secs(60), t0())
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.entry_files().await.unwrap(), vec![cache.entry_path(&fp("shared"))]);
        let value = cache.lookup(&fp("shared"), t0()).await.unwrap().unwrap();
        assert!(value.as_i64().is_some_and(|v| (0..16).contains(&v)));

        let shard = cache.entry_path(&fp("shared"));
        let leftovers: Vec<_> = std::fs::read_dir(shard.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temporary files left: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_sweep_on_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTaskCache::new(dir.path().join("never-created"));
        assert_eq!(cache.sweep(t0()).await.unwrap(), 0);
    }
}
