//! Persistent boot counter.
//!
//! Keeps a `{"count": <integer>}` JSON document in a file and bumps it once
//! per boot. On ESP32 the file lives on the SPIFFS partition mounted by
//! [`crate::persistence::mount_spiffs`]; on host it lives in the user's home
//! directory.
//!
//! # Usage
//!
//! ```ignore
//! use apsta_link::boot_counter::BootCounter;
//!
//! let counter = BootCounter::at_default_path()?;
//! let boot = counter.record_boot()?;
//! log::info!("Boot #{}", boot);
//! ```

use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Value of a freshly created counter.
const INITIAL_COUNT: u64 = 1;

/// File name of the counter document.
const COUNTER_FILE: &str = "counter.json";

fn initial_count() -> u64 {
    INITIAL_COUNT
}

/// On-disk document. Keys other than `count` are carried through untouched.
#[derive(Debug, Serialize, Deserialize)]
struct CounterDocument {
    #[serde(default = "initial_count")]
    count: u64,
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

impl Default for CounterDocument {
    fn default() -> Self {
        Self {
            count: INITIAL_COUNT,
            other: serde_json::Map::new(),
        }
    }
}

/// Errors that can occur while reading or writing the counter.
#[derive(Debug)]
pub enum CounterError {
    /// File could not be read or written.
    Io(io::Error),
    /// File contents are not a valid counter document.
    Json(serde_json::Error),
}

impl fmt::Display for CounterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "counter I/O error: {}", e),
            Self::Json(e) => write!(f, "counter file is not valid JSON: {}", e),
        }
    }
}

impl std::error::Error for CounterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
        }
    }
}

impl From<io::Error> for CounterError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for CounterError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Get the default counter file path.
///
/// Returns `/spiffs/counter.json` on ESP32.
#[cfg(feature = "esp32")]
pub fn default_counter_path() -> io::Result<PathBuf> {
    Ok(Path::new(crate::persistence::SPIFFS_BASE_PATH).join(COUNTER_FILE))
}

/// Get the default counter file path.
///
/// Returns `~/.apsta-link/counter.json` on host.
#[cfg(not(feature = "esp32"))]
pub fn default_counter_path() -> io::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home).join(".apsta-link").join(COUNTER_FILE))
}

/// A counter stored in a JSON file.
#[derive(Debug, Clone)]
pub struct BootCounter {
    path: PathBuf,
}

impl BootCounter {
    /// Counter backed by `path`. Nothing is touched until the first call.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Counter backed by [`default_counter_path`].
    pub fn at_default_path() -> io::Result<Self> {
        Ok(Self::new(default_counter_path()?))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current value, creating the file with the initial value if missing.
    pub fn current(&self) -> Result<u64, CounterError> {
        Ok(self.load_or_create()?.count)
    }

    /// Read the current value, store it incremented, and return what was read.
    pub fn record_boot(&self) -> Result<u64, CounterError> {
        let mut doc = self.load_or_create()?;
        let count = doc.count;
        info!("Boot count is {}", count);

        doc.count = count.saturating_add(1);
        self.store(&doc)?;
        Ok(count)
    }

    fn load_or_create(&self) -> Result<CounterDocument, CounterError> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(serde_json::from_str(&s)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("{:?} does not exist, creating it", self.path);
                let doc = CounterDocument::default();
                self.store(&doc)?;
                Ok(doc)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, doc: &CounterDocument) -> Result<(), CounterError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string(doc)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU32, Ordering};

    // Counter to ensure unique test files even in parallel execution
    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn unique_counter_path() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        env::temp_dir()
            .join(format!("apsta-link-test-{}-{}", pid, id))
            .join(COUNTER_FILE)
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_missing_file_is_created() {
        let path = unique_counter_path();
        let counter = BootCounter::new(&path);

        assert_eq!(counter.current().unwrap(), INITIAL_COUNT);
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, r#"{"count":1}"#);

        cleanup(&path);
    }

    #[test]
    fn test_record_boot_increments_and_persists() {
        let path = unique_counter_path();
        let counter = BootCounter::new(&path);

        assert_eq!(counter.record_boot().unwrap(), 1);
        assert_eq!(counter.record_boot().unwrap(), 2);

        // A fresh handle sees the persisted value
        let reopened = BootCounter::new(&path);
        assert_eq!(reopened.current().unwrap(), 3);

        cleanup(&path);
    }

    #[test]
    fn test_missing_count_key_starts_at_initial() {
        let path = unique_counter_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"device":"ap-01"}"#).unwrap();

        let counter = BootCounter::new(&path);
        assert_eq!(counter.record_boot().unwrap(), INITIAL_COUNT);

        // Unrelated keys survive the rewrite
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["count"], 2);
        assert_eq!(value["device"], "ap-01");

        cleanup(&path);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let path = unique_counter_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();

        let counter = BootCounter::new(&path);
        assert!(matches!(counter.record_boot(), Err(CounterError::Json(_))));
        // The corrupt file is left alone
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json");

        cleanup(&path);
    }
}
