//! On-disk cache of downloaded pack lists.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;

use super::CatalogError;
use crate::irc::decode_line_bytes;

/// Cached lists older than this are fetched again.
pub const CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Cached lists smaller than this are treated as broken.
pub const CACHE_MIN_SIZE: u64 = 4096;

/// Directory of `<bot>.xdcc.txt` files.
#[derive(Debug, Clone)]
pub struct ListCache {
    dir: PathBuf,
    max_age: Duration,
    min_size: u64,
}

impl Default for ListCache {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("xdcc_cache"))
    }
}

impl ListCache {
    /// Cache rooted at `dir` with the default freshness rules.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_age: CACHE_MAX_AGE,
            min_size: CACHE_MIN_SIZE,
        }
    }

    /// Overrides the freshness rules.
    #[must_use]
    pub fn with_rules(mut self, max_age: Duration, min_size: u64) -> Self {
        self.max_age = max_age;
        self.min_size = min_size;
        self
    }

    /// Cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `bot`'s list. `|` becomes `.` so the name is portable.
    #[must_use]
    pub fn path_for(&self, bot: &str) -> PathBuf {
        let name: String = bot
            .chars()
            .map(|c| match c {
                '|' => '.',
                '/' | '\\' => '_',
                c => c,
            })
            .collect();
        self.dir.join(format!("{name}.xdcc.txt"))
    }

    /// The cached list for `bot`, when it is recent and large enough.
    pub async fn load(&self, bot: &str) -> Option<String> {
        let path = self.path_for(bot);
        let meta = tokio::fs::metadata(&path).await.ok()?;
        let age = meta
            .modified()
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .unwrap_or_default();
        if age > self.max_age || meta.len() < self.min_size {
            debug!(
                path = %path.display(),
                age_secs = age.as_secs(),
                bytes = meta.len(),
                "cached pack list is stale"
            );
            return None;
        }
        let raw = tokio::fs::read(&path).await.ok()?;
        debug!(path = %path.display(), "using cached pack list");
        Some(decode_line_bytes(&raw))
    }

    /// Reads a list file written by a transfer.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Cache`] when the file cannot be read.
    pub async fn read(&self, path: &Path) -> Result<String, CatalogError> {
        let raw = tokio::fs::read(path).await.map_err(|source| CatalogError::Cache {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(decode_line_bytes(&raw))
    }

    /// Creates the cache directory.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Cache`] when the directory cannot be created.
    pub async fn ensure_dir(&self) -> Result<(), CatalogError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CatalogError::Cache {
                path: self.dir.clone(),
                source,
            })
    }

    /// Stores `bot`'s list.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Cache`] when the file cannot be written.
    pub async fn store(&self, bot: &str, contents: &[u8]) -> Result<PathBuf, CatalogError> {
        self.ensure_dir().await?;
        let path = self.path_for(bot);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| CatalogError::Cache {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_path_for_replaces_pipe() {
        let cache = ListCache::new("/tmp/xdcc_cache");
        assert_eq!(
            cache.path_for("ARUTHA-BATCH|1080p"),
            PathBuf::from("/tmp/xdcc_cache/ARUTHA-BATCH.1080p.xdcc.txt")
        );
    }

    #[tokio::test]
    async fn test_small_cached_list_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ListCache::new(dir.path());
        cache.store("bot", b"tiny").await.unwrap();
        assert!(cache.load("bot").await.is_none());
    }

    #[tokio::test]
    async fn test_recent_large_list_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ListCache::new(dir.path());
        let contents = "x".repeat(5000);
        cache.store("CR-HOLLAND|NEW", contents.as_bytes()).await.unwrap();
        assert_eq!(cache.load("CR-HOLLAND|NEW").await.as_deref(), Some(contents.as_str()));
    }

    #[tokio::test]
    async fn test_expired_list_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ListCache::new(dir.path()).with_rules(Duration::ZERO, 0);
        cache.store("bot", b"list").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.load("bot").await.is_none());
    }

    #[tokio::test]
    async fn test_missing_list_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ListCache::new(dir.path()).load("nobody").await.is_none());
    }
}
