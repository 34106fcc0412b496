//! Configuration loading and parsing.
//!
//! Parses `mentions.toml` (or an override path provided by the binary). Only the
//! `[search]` table is consumed today:
//!
//! ```toml
//! [search]
//! debounce_ms = 300
//! max_candidates = 8
//! cache_capacity = 64
//! ```
//!
//! Missing files, missing fields and unknown fields all fall back to defaults
//! so older or newer config files keep working. The raw parsed values are
//! retained; `Config::effective` clamps them into supported ranges and logs
//! (target `config`) whenever a value had to be adjusted.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "mentions.toml";

/// Upper bound on the debounce window; anything longer stops feeling live.
pub const MAX_DEBOUNCE_MS: u64 = 5_000;
/// Upper bound on candidates kept per search response.
pub const MAX_CANDIDATES_LIMIT: usize = 50;

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "SearchConfig::default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "SearchConfig::default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "SearchConfig::default_cache_capacity")] // 0 disables the cache
    pub cache_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: Self::default_debounce_ms(),
            max_candidates: Self::default_max_candidates(),
            cache_capacity: Self::default_cache_capacity(),
        }
    }
}

impl SearchConfig {
    const fn default_debounce_ms() -> u64 {
        300
    }
    const fn default_max_candidates() -> usize {
        8
    }
    const fn default_cache_capacity() -> usize {
        64
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Clamped settings handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub debounce: Duration,
    pub max_candidates: usize,
    pub cache_capacity: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Config::default().effective()
    }
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("mentions").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config {
                raw: Some(content),
                file,
            }),
            Err(e) => {
                warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    /// Clamp raw values into supported ranges.
    pub fn effective(&self) -> SearchSettings {
        let raw = &self.file.search;
        let debounce_ms = raw.debounce_ms.min(MAX_DEBOUNCE_MS);
        let max_candidates = raw.max_candidates.clamp(1, MAX_CANDIDATES_LIMIT);

        if debounce_ms != raw.debounce_ms || max_candidates != raw.max_candidates {
            info!(
                target: "config",
                raw_debounce_ms = raw.debounce_ms,
                debounce_ms,
                raw_max_candidates = raw.max_candidates,
                max_candidates,
                "search_settings_clamped"
            );
        }
        SearchSettings {
            debounce: Duration::from_millis(debounce_ms),
            max_candidates,
            cache_capacity: raw.cache_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), body).unwrap();
        tmp
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert!(cfg.raw.is_none());
        let eff = cfg.effective();
        assert_eq!(eff.debounce, Duration::from_millis(300));
        assert_eq!(eff.max_candidates, 8);
        assert_eq!(eff.cache_capacity, 64);
    }

    #[test]
    fn parses_search_table() {
        let tmp = write_config("[search]\ndebounce_ms = 120\nmax_candidates = 5\ncache_capacity = 0\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let eff = cfg.effective();
        assert_eq!(eff.debounce, Duration::from_millis(120));
        assert_eq!(eff.max_candidates, 5);
        assert_eq!(eff.cache_capacity, 0);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let tmp = write_config("[search]\nmax_candidates = 3\n[unknown]\nfoo = 1\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.search.debounce_ms, 300);
        assert_eq!(cfg.file.search.max_candidates, 3);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = write_config("[search\ndebounce_ms = ");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.effective(), SearchSettings::default());
    }

    #[test]
    fn clamps_out_of_range_values() {
        let tmp = write_config("[search]\ndebounce_ms = 60000\nmax_candidates = 0\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let eff = cfg.effective();
        assert_eq!(eff.debounce, Duration::from_millis(MAX_DEBOUNCE_MS));
        assert_eq!(eff.max_candidates, 1);
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let tmp = write_config("[search]\nmax_candidates = 500\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let eff = with_default(subscriber, || cfg.effective());

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("search_settings_clamped"));
        assert_eq!(eff.max_candidates, MAX_CANDIDATES_LIMIT);
    }
}
