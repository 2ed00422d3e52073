use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories_next::ProjectDirs;
use tracing::debug;

pub const ENV_CONFIG_DIR: &str = "CHROMAGLASS_CONFIG_DIR";
pub const ENV_CACHE_DIR: &str = "CHROMAGLASS_CACHE_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Chromaglass";
const APPLICATION: &str = "chromaglass";

/// Resolved per-user directories the viewer reads and writes.
///
/// Defaults follow the platform conventions reported by `directories-next`;
/// each root can be overridden through its environment variable, which the
/// integration tests rely on to keep runs hermetic.
#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    cache_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;

        let config_dir = resolve_directory(ENV_CONFIG_DIR, project_dirs.config_dir(), "config")?;
        let cache_dir = resolve_directory(ENV_CACHE_DIR, project_dirs.cache_dir(), "cache")?;

        Ok(Self {
            config_dir,
            cache_dir,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("chromaglass.toml")
    }

    pub fn image_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("images")
    }
}

fn resolve_directory(env_key: &str, default: &Path, label: &str) -> Result<PathBuf> {
    let dir = match env::var_os(env_key) {
        Some(value) if !value.is_empty() => {
            debug!(key = env_key, "using {label} directory override");
            PathBuf::from(value)
        }
        _ => default.to_path_buf(),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {label} directory at {}", dir.display()))?;
    Ok(dir)
}
