//! Asset fetcher
//!
//! Downloads source media into a run's working directory. The upstream media
//! host rejects requests without browser-shaped headers, so a fixed set is
//! sent on every request. Proxy-wrapped URLs are unwrapped before download,
//! and completed downloads are cached within the destination directory by a
//! hash of the normalised URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use crate::error::{ReelCutError, ReelCutResult};

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const UPSTREAM_ORIGIN: &str = "https://www.mlb.com";
const UPSTREAM_REFERER: &str = "https://www.mlb.com/video/";

/// Asset fetcher with a shared HTTP client
pub struct AssetFetcher {
    client: reqwest::Client,
}

impl AssetFetcher {
    pub fn new() -> ReelCutResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| ReelCutError::Config {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    /// Download `source_url` into `dest_dir`, returning the local path.
    ///
    /// Already-local sources (an existing path, or a `file://` URL) pass
    /// through untouched; the upstream is only contacted for http(s)
    /// sources. Re-fetching the same URL within one destination directory
    /// returns the already-downloaded file.
    pub async fn fetch(&self, source_url: &str, dest_dir: &Path) -> ReelCutResult<PathBuf> {
        let local = Path::new(source_url);
        if local.is_file() {
            return Ok(local.to_path_buf());
        }

        let normalized = normalize_source_url(source_url)?;
        if normalized.scheme() == "file" {
            let path = normalized
                .to_file_path()
                .map_err(|_| ReelCutError::Network {
                    url: source_url.to_string(),
                    message: "invalid file URL".to_string(),
                })?;
            return Ok(path);
        }
        let dest = dest_dir.join(cached_file_name(&normalized));

        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            debug!(url = %normalized, "download cache hit");
            return Ok(dest);
        }

        info!(url = %normalized, "fetching asset");
        let response = self
            .client
            .get(normalized.as_str())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ORIGIN, UPSTREAM_ORIGIN)
            .header(reqwest::header::REFERER, UPSTREAM_REFERER)
            .send()
            .await
            .map_err(|e| ReelCutError::Network {
                url: normalized.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(ReelCutError::UpstreamRejected {
                url: normalized.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| ReelCutError::Network {
            url: normalized.to_string(),
            message: e.to_string(),
        })?;

        // Atomic write: temp name first, rename once complete
        let partial = dest.with_extension("part");
        tokio::fs::write(&partial, &body).await?;
        tokio::fs::rename(&partial, &dest).await?;

        debug!(url = %normalized, bytes = body.len(), path = %dest.display(), "asset stored");
        Ok(dest)
    }
}

/// Unwrap proxy-wrapped URLs and parse the result.
///
/// A URL of the form `…/video-proxy?url=<encoded>` carries the real source in
/// its query string; the inner URL is what gets fetched and cached.
pub fn normalize_source_url(source_url: &str) -> ReelCutResult<Url> {
    let parsed = Url::parse(source_url).map_err(|e| ReelCutError::Network {
        url: source_url.to_string(),
        message: format!("invalid URL: {}", e),
    })?;

    if parsed.path().ends_with("video-proxy") {
        if let Some((_, inner)) = parsed.query_pairs().find(|(k, _)| k == "url") {
            return Url::parse(&inner).map_err(|e| ReelCutError::Network {
                url: source_url.to_string(),
                message: format!("invalid proxied URL: {}", e),
            });
        }
    }

    Ok(parsed)
}

/// Stable local file name for a source URL: URL hash plus the source
/// extension, so downstream tooling still sees a recognisable container.
fn cached_file_name(url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_str().as_bytes());
    let digest = hasher.finalize();
    let hash = digest
        .iter()
        .take(12)
        .map(|b| format!("{:02x}", b))
        .collect::<String>();

    let extension = Path::new(url.path())
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    format!("{}.{}", hash, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_url_passes_through() {
        let url = normalize_source_url("https://cdn.example.com/clips/play1.mp4").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/clips/play1.mp4");
    }

    #[test]
    fn test_proxy_url_unwrapped() {
        let wrapped =
            "https://app.example.com/api/video-proxy?url=https%3A%2F%2Fcdn.example.com%2Fclips%2Fplay1.mp4";
        let url = normalize_source_url(wrapped).unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/clips/play1.mp4");
    }

    #[test]
    fn test_proxy_without_url_param_kept() {
        let url = normalize_source_url("https://app.example.com/api/video-proxy?id=42").unwrap();
        assert_eq!(url.path(), "/api/video-proxy");
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(normalize_source_url("not a url").is_err());
    }

    #[test]
    fn test_cached_file_name_stable_and_extension_aware() {
        let url = Url::parse("https://cdn.example.com/clips/play1.mp4").unwrap();
        let a = cached_file_name(&url);
        let b = cached_file_name(&url);
        assert_eq!(a, b);
        assert!(a.ends_with(".mp4"));

        let other = Url::parse("https://cdn.example.com/clips/play2.mp4").unwrap();
        assert_ne!(a, cached_file_name(&other));
    }

    #[tokio::test]
    async fn test_local_path_passes_through() {
        let dir = tempfile::TempDir::new().unwrap();
        let media = dir.path().join("clip.mp4");
        std::fs::write(&media, b"media").unwrap();

        let fetcher = AssetFetcher::new().unwrap();
        let fetched = fetcher
            .fetch(media.to_str().unwrap(), dir.path())
            .await
            .unwrap();
        assert_eq!(fetched, media);
    }

    #[test]
    fn test_cached_file_name_defaults_to_mp4() {
        let url = Url::parse("https://cdn.example.com/stream/play").unwrap();
        assert!(cached_file_name(&url).ends_with(".mp4"));
    }
}
