//! Engine configuration, with the environment-variable fallback §6
//! names for callers that construct no config struct of their own.

use std::path::PathBuf;

/// `ENGINE_DATA_DIR` — root path for persisted state.
const ENV_DATA_DIR: &str = "ENGINE_DATA_DIR";
/// `ENGINE_CACHE_BYTES` — soft memory budget of the Bitmap Cache.
const ENV_CACHE_BYTES: &str = "ENGINE_CACHE_BYTES";
/// `ENGINE_RESULT_CACHE_ENTRIES` — LRU size of the Result Cache.
const ENV_RESULT_CACHE_ENTRIES: &str = "ENGINE_RESULT_CACHE_ENTRIES";
/// `ENGINE_THREADS` — executor parallelism; default = hardware concurrency.
const ENV_THREADS: &str = "ENGINE_THREADS";

/// Default soft memory budget of the Bitmap Cache: 256 MiB.
const DEFAULT_CACHE_BYTES: usize = 256 * 1024 * 1024;
/// Default LRU size of the Result Cache.
const DEFAULT_RESULT_CACHE_ENTRIES: usize = 4096;

/// Engine-wide configuration (§6). A `data_dir` of `None` opens a purely
/// in-memory engine: nothing persists across process restarts, which is
/// appropriate for tests and for embedding without a filesystem.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for persisted bitmaps and catalog logs. `None`
    /// means in-memory only.
    pub data_dir: Option<PathBuf>,
    /// Soft byte budget for the decoded-bitmap cache (§4.3).
    pub cache_bytes: usize,
    /// Entry capacity of the result cache (§4.5).
    pub result_cache_entries: usize,
    /// Executor thread-pool size (§4.4 parallelism note).
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: None,
            cache_bytes: DEFAULT_CACHE_BYTES,
            result_cache_entries: DEFAULT_RESULT_CACHE_ENTRIES,
            threads: default_threads(),
        }
    }
}

impl Config {
    /// A config with no persistence: equivalent to `Config::default()`
    /// but named for call-site clarity in tests and embeddings.
    pub fn in_memory() -> Self {
        Config::default()
    }

    /// A config persisting bitmaps and catalogs under `data_dir`.
    pub fn persistent(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            data_dir: Some(data_dir.into()),
            ..Config::default()
        }
    }

    /// Build a config from the §6 environment-variable fallback,
    /// falling back to [`Config::default`] for any variable that is
    /// absent or fails to parse.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            data_dir: std::env::var(ENV_DATA_DIR).ok().map(PathBuf::from),
            cache_bytes: env_usize(ENV_CACHE_BYTES).unwrap_or(defaults.cache_bytes),
            result_cache_entries: env_usize(ENV_RESULT_CACHE_ENTRIES)
                .unwrap_or(defaults.result_cache_entries),
            threads: env_usize(ENV_THREADS).unwrap_or(defaults.threads),
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
