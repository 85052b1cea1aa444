//! File logging. The terminal belongs to the TUI, so log lines go to
//! `<cache_dir>/gridlist.log` instead of stderr.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::cache::{CacheManager, LOG_FILE};

/// Filter precedence: `cli_level`, then `RUST_LOG`, then `config_level`.
pub fn build_filter(config_level: &str, cli_level: Option<&str>, debug: bool) -> Result<EnvFilter> {
    let mut filter = match cli_level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| eyre!("Invalid log level '{}': {}", level, e))?,
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(config_level))
            .map_err(|e| eyre!("Invalid log level '{}': {}", config_level, e))?,
    };
    if debug {
        filter = filter.add_directive(
            "gridlist=debug"
                .parse()
                .map_err(|e| eyre!("Invalid log directive: {}", e))?,
        );
    }
    Ok(filter)
}

/// Install the global subscriber writing to the cache directory log file.
pub fn init(cache: &CacheManager, filter: EnvFilter) -> Result<PathBuf> {
    cache.ensure_cache_dir()?;
    let path = cache.cache_file(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

    tracing::info!(log_file = %path.display(), "logging initialized");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_level_wins() {
        let filter = build_filter("info", Some("trace"), false).unwrap();
        assert_eq!(filter.to_string(), "trace");
    }

    #[test]
    fn test_invalid_level_is_an_error() {
        assert!(build_filter("info", Some("gridlist=notalevel"), false).is_err());
    }
}
