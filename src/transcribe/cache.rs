//! Persistent transcription cache
//!
//! One self-contained JSON file per source URL, so entries are portable and
//! survive across runs. Entries expire after a TTL and the store is
//! size-bounded: when the count exceeds the cap, the oldest half is dropped.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::ReelCutResult;
use crate::model::Word;

const SCHEMA_VERSION: u32 = 1;

/// A cached transcription result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub schema_version: u32,
    pub source_url: String,
    pub words: Vec<Word>,
    pub duration: f64,
    pub created_at: DateTime<Utc>,
}

/// Durable, size-bounded transcription store
pub struct TranscriptCache {
    dir: PathBuf,
    ttl: Duration,
    max_entries: usize,
    /// Serialises lookups, stores, and eviction within this process
    guard: std::sync::Mutex<()>,
}

impl TranscriptCache {
    pub fn new(dir: PathBuf, ttl_days: i64, max_entries: usize) -> ReelCutResult<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            ttl: Duration::days(ttl_days),
            max_entries,
            guard: std::sync::Mutex::new(()),
        })
    }

    fn entry_path(&self, source_url: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(source_url.as_bytes());
        let digest = hasher.finalize();
        let name = digest
            .iter()
            .take(16)
            .map(|b| format!("{:02x}", b))
            .collect::<String>();
        self.dir.join(format!("{}.json", name))
    }

    /// Look up a live entry. Expired, corrupt, or foreign-schema entries are
    /// treated as misses and removed.
    pub fn get(&self, source_url: &str) -> Option<(Vec<Word>, f64)> {
        let _guard = self.guard.lock().ok()?;
        let path = self.entry_path(source_url);
        let raw = std::fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), "dropping unreadable cache entry: {}", e);
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };

        if entry.schema_version != SCHEMA_VERSION {
            let _ = std::fs::remove_file(&path);
            return None;
        }
        if Utc::now() - entry.created_at >= self.ttl {
            debug!(url = source_url, "cache entry expired");
            let _ = std::fs::remove_file(&path);
            return None;
        }

        Some((entry.words, entry.duration))
    }

    /// Store an entry under the source URL, then evict if over the cap
    pub fn put(&self, source_url: &str, words: &[Word], duration: f64) -> ReelCutResult<()> {
        let _guard = self
            .guard
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = CacheEntry {
            schema_version: SCHEMA_VERSION,
            source_url: source_url.to_string(),
            words: words.to_vec(),
            duration,
            created_at: Utc::now(),
        };
        let path = self.entry_path(source_url);
        let json = serde_json::to_string_pretty(&entry).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(&path, json)?;

        self.evict_if_needed()?;
        Ok(())
    }

    /// When the store exceeds the cap, drop the oldest half of all entries
    fn evict_if_needed(&self) -> ReelCutResult<()> {
        let mut entries: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
        for dirent in std::fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let created_at = std::fs::read_to_string(&path)
                .ok()
                .and_then(|raw| serde_json::from_str::<CacheEntry>(&raw).ok())
                .map(|e| e.created_at);
            match created_at {
                Some(at) => entries.push((path, at)),
                // Unreadable entries count as oldest
                None => entries.push((path, DateTime::<Utc>::MIN_UTC)),
            }
        }

        if entries.len() <= self.max_entries {
            return Ok(());
        }

        entries.sort_by_key(|(_, at)| *at);
        let drop_count = entries.len() / 2;
        debug!(total = entries.len(), dropping = drop_count, "evicting cache entries");
        for (path, _) in entries.into_iter().take(drop_count) {
            let _ = std::fs::remove_file(path);
        }
        Ok(())
    }

    /// Number of entries currently stored
    pub fn len(&self) -> usize {
        std::fs::read_dir(&self.dir)
            .map(|dir| {
                dir.filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_words() -> Vec<Word> {
        vec![
            Word::new("home", 0.5, 0.8, 0.99),
            Word::new("run", 0.8, 1.1, 0.97),
        ]
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = TranscriptCache::new(dir.path().to_path_buf(), 7, 50).unwrap();
        let url = "https://cdn.example.com/play1.mp4";

        assert!(cache.get(url).is_none());
        cache.put(url, &sample_words(), 10.0).unwrap();

        let (words, duration) = cache.get(url).unwrap();
        assert_eq!(words, sample_words());
        assert_eq!(duration, 10.0);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = TranscriptCache::new(dir.path().to_path_buf(), 0, 50).unwrap();
        let url = "https://cdn.example.com/play1.mp4";

        cache.put(url, &sample_words(), 10.0).unwrap();
        // TTL of zero days: the entry is born expired
        assert!(cache.get(url).is_none());
        // And the expired file was removed
        assert!(cache.is_empty());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = TranscriptCache::new(dir.path().to_path_buf(), 7, 50).unwrap();
        let url = "https://cdn.example.com/play1.mp4";

        cache.put(url, &sample_words(), 10.0).unwrap();
        let path = cache.entry_path(url);
        std::fs::write(&path, "not json").unwrap();
        assert!(cache.get(url).is_none());
    }

    #[test]
    fn test_eviction_drops_oldest_half() {
        let dir = TempDir::new().unwrap();
        let cache = TranscriptCache::new(dir.path().to_path_buf(), 7, 4).unwrap();

        for i in 0..5 {
            let url = format!("https://cdn.example.com/play{}.mp4", i);
            cache.put(&url, &sample_words(), 10.0).unwrap();
        }

        // Five entries tripped the cap of four; the oldest two were dropped
        assert_eq!(cache.len(), 3);
        assert!(cache.get("https://cdn.example.com/play4.mp4").is_some());
    }

    #[test]
    fn test_distinct_urls_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let cache = TranscriptCache::new(dir.path().to_path_buf(), 7, 50).unwrap();

        cache.put("https://cdn.example.com/a.mp4", &sample_words(), 5.0).unwrap();
        cache.put("https://cdn.example.com/b.mp4", &[], 7.5).unwrap();

        let (words_a, dur_a) = cache.get("https://cdn.example.com/a.mp4").unwrap();
        let (words_b, dur_b) = cache.get("https://cdn.example.com/b.mp4").unwrap();
        assert_eq!(words_a.len(), 2);
        assert_eq!(dur_a, 5.0);
        assert!(words_b.is_empty());
        assert_eq!(dur_b, 7.5);
    }
}
