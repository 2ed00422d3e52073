use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::Url;
use tracing::debug;

/// Blocking HTTP client used to fetch remote source images.
///
/// Downloads happen once, before the event loop starts, so a blocking client
/// keeps the call path simple.
#[derive(Debug, Clone)]
pub struct ImageClient {
    http: Client,
}

impl ImageClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("chromaglass/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to construct HTTP client")?;
        Ok(Self { http })
    }

    /// Downloads `src` and writes the body to `destination`, creating parent
    /// directories as needed.
    pub fn download(&self, src: &str, destination: &Path) -> Result<()> {
        let url = Url::parse(src).with_context(|| format!("invalid image url '{src}'"))?;
        debug!(%url, path = %destination.display(), "downloading source image");
        let response = self
            .http
            .get(url.clone())
            .send()
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .with_context(|| format!("image request for {url} failed"))?;
        let bytes = response.bytes()?;
        if bytes.is_empty() {
            bail!("image at {url} has an empty body");
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating cache directory {}", parent.display()))?;
        }
        fs::write(destination, &bytes)
            .with_context(|| format!("writing cached image to {}", destination.display()))?;
        Ok(())
    }
}
