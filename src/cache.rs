use color_eyre::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Registry of known cache files
pub const CACHE_FILES: &[&str] = &[LOG_FILE];

pub const LOG_FILE: &str = "gridlist.log";

/// Manages cache directory and cache file operations
#[derive(Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    /// Create a new CacheManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    /// Create a CacheManager with a custom cache directory (primarily for testing)
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get path to a specific cache file
    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Clear all registered cache files
    pub fn clear_all(&self) -> Result<()> {
        for filename in CACHE_FILES {
            let file_path = self.cache_file(filename);
            if file_path.exists() {
                if let Err(e) = fs::remove_file(&file_path) {
                    warn!(file = filename, error = %e, "could not remove cache file");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_all_removes_registered_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::with_dir(dir.path().to_path_buf());
        cache.ensure_cache_dir().unwrap();
        fs::write(cache.cache_file(LOG_FILE), "log").unwrap();
        fs::write(cache.cache_file("keep.txt"), "keep").unwrap();

        cache.clear_all().unwrap();

        assert!(!cache.cache_file(LOG_FILE).exists());
        assert!(cache.cache_file("keep.txt").exists());
    }
}
