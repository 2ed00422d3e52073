mod client;
mod repository;

pub use client::ImageClient;
pub use repository::{ImageOrigin, ImageRepository, ResolvedImage};

use std::path::{Path, PathBuf};

/// Where the source image comes from: a file on disk or a remote URL that is
/// downloaded into the cache on first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageHandle {
    Url(String),
    LocalPath(PathBuf),
}

impl ImageHandle {
    pub fn from_input(input: &str) -> Self {
        if input.starts_with("http://") || input.starts_with("https://") {
            Self::Url(input.to_string())
        } else {
            Self::LocalPath(PathBuf::from(input))
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::LocalPath(_))
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::LocalPath(path) => Some(path.as_path()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_https_url() {
        assert_eq!(
            ImageHandle::from_input("https://example.com/picture.jpg"),
            ImageHandle::Url("https://example.com/picture.jpg".into())
        );
    }

    #[test]
    fn parses_http_url() {
        assert!(!ImageHandle::from_input("http://example.com/a.png").is_local());
    }

    #[test]
    fn parses_local_path() {
        assert!(matches!(
            ImageHandle::from_input("pictures/cat.png"),
            ImageHandle::LocalPath(path) if path == PathBuf::from("pictures/cat.png")
        ));
    }
}
