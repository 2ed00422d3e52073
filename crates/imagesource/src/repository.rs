//! Resolves image handles into on-disk paths the renderer can decode, hiding
//! the difference between local files and cached downloads from the caller.
//! Remote images are cached under the repository root keyed by a hash of the
//! URL, so repeated launches render without touching the network.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::client::ImageClient;
use crate::ImageHandle;

/// Image file ready for decoding, plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub path: PathBuf,
    pub origin: ImageOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOrigin {
    Local,
    Remote { url: String, refreshed: bool },
}

#[derive(Debug, Clone)]
pub struct ImageRepository {
    cache_root: PathBuf,
}

/// File extensions preserved in cache file names so the decoder can sniff by
/// suffix as well as by content.
const KNOWN_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "bmp"];

impl ImageRepository {
    pub fn new(cache_root: PathBuf) -> Self {
        Self { cache_root }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Resolves a handle into a readable file, downloading and caching remote
    /// images when a client is available. `refresh` forces a re-download even
    /// when a cached copy exists.
    pub fn resolve(
        &self,
        handle: &ImageHandle,
        client: Option<&ImageClient>,
        refresh: bool,
    ) -> Result<ResolvedImage> {
        match handle {
            ImageHandle::LocalPath(path) => {
                if path.as_os_str().is_empty() {
                    return Err(anyhow!("image path must not be empty"));
                }
                if !path.is_file() {
                    bail!("image file not found at {}", path.display());
                }
                debug!(path = %path.display(), "resolved local image");
                Ok(ResolvedImage {
                    path: path.clone(),
                    origin: ImageOrigin::Local,
                })
            }
            ImageHandle::Url(url) => self.resolve_remote(url, client, refresh),
        }
    }

    fn resolve_remote(
        &self,
        url: &str,
        client: Option<&ImageClient>,
        refresh: bool,
    ) -> Result<ResolvedImage> {
        let path = self.cache_path(url);
        let cached = path.is_file();

        if cached && !refresh {
            debug!(%url, path = %path.display(), "using cached image");
            return Ok(ResolvedImage {
                path,
                origin: ImageOrigin::Remote {
                    url: url.to_string(),
                    refreshed: false,
                },
            });
        }

        let Some(client) = client else {
            if cached {
                warn!(%url, "refresh requested but network access is disabled; using cache");
                return Ok(ResolvedImage {
                    path,
                    origin: ImageOrigin::Remote {
                        url: url.to_string(),
                        refreshed: false,
                    },
                });
            }
            bail!("image {url} is not cached and network access is disabled");
        };

        client
            .download(url, &path)
            .with_context(|| format!("caching image from {url}"))?;
        info!(%url, path = %path.display(), "cached remote image");
        Ok(ResolvedImage {
            path,
            origin: ImageOrigin::Remote {
                url: url.to_string(),
                refreshed: true,
            },
        })
    }

    /// Cache location for a URL: a hash of the full URL plus the original
    /// extension when it is one we recognise.
    pub fn cache_path(&self, url: &str) -> PathBuf {
        let digest = xxh3_64(url.as_bytes());
        let extension = url_extension(url).unwrap_or("img");
        self.cache_root.join(format!("{digest:016x}.{extension}"))
    }
}

fn url_extension(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let candidate = path.rsplit('.').next()?.to_ascii_lowercase();
    KNOWN_EXTENSIONS
        .iter()
        .find(|known| **known == candidate)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn cache_path_is_stable_and_distinct() {
        let repo = ImageRepository::new(PathBuf::from("/cache/images"));
        let first = repo.cache_path("https://example.com/a.jpg");
        let again = repo.cache_path("https://example.com/a.jpg");
        let other = repo.cache_path("https://example.com/b.jpg");
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(first.extension().and_then(|e| e.to_str()), Some("jpg"));
    }

    #[test]
    fn cache_path_ignores_query_and_defaults_extension() {
        let repo = ImageRepository::new(PathBuf::from("/cache/images"));
        let png = repo.cache_path("https://example.com/shot.png?size=large");
        assert_eq!(png.extension().and_then(|e| e.to_str()), Some("png"));

        let opaque = repo.cache_path("https://example.com/render");
        assert_eq!(opaque.extension().and_then(|e| e.to_str()), Some("img"));
    }

    #[test]
    fn resolves_existing_local_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("photo.png");
        fs::write(&file, b"not really a png").unwrap();

        let repo = ImageRepository::new(dir.path().join("cache"));
        let resolved = repo
            .resolve(&ImageHandle::LocalPath(file.clone()), None, false)
            .unwrap();
        assert_eq!(resolved.path, file);
        assert_eq!(resolved.origin, ImageOrigin::Local);
    }

    #[test]
    fn missing_local_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let repo = ImageRepository::new(dir.path().join("cache"));
        let missing = dir.path().join("nope.jpg");
        let err = repo
            .resolve(&ImageHandle::LocalPath(missing), None, false)
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn cached_remote_resolves_without_client() {
        let dir = TempDir::new().unwrap();
        let repo = ImageRepository::new(dir.path().to_path_buf());
        let url = "https://example.com/cat.jpg";
        let cache_file = repo.cache_path(url);
        fs::create_dir_all(cache_file.parent().unwrap()).unwrap();
        fs::write(&cache_file, b"jpeg bytes").unwrap();

        let resolved = repo
            .resolve(&ImageHandle::Url(url.to_string()), None, false)
            .unwrap();
        assert_eq!(resolved.path, cache_file);
        assert_eq!(
            resolved.origin,
            ImageOrigin::Remote {
                url: url.to_string(),
                refreshed: false,
            }
        );
    }

    #[test]
    fn uncached_remote_without_client_is_an_error() {
        let dir = TempDir::new().unwrap();
        let repo = ImageRepository::new(dir.path().to_path_buf());
        let err = repo
            .resolve(
                &ImageHandle::Url("https://example.com/new.png".into()),
                None,
                false,
            )
            .unwrap_err();
        assert!(err.to_string().contains("not cached"));
    }
}
