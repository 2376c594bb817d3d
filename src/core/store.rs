use chrono::NaiveDate;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::models::day::DayRecord;
use crate::core::models::session::UsageLedger;

const DAILY_DIR: &str = "daily";
const LEDGER_FILE: &str = "usage.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Flat-file persistence: `<root>/daily/<YYYY-MM-DD>.json` per day plus
/// a cumulative `<root>/usage.json` session ledger.
///
/// Clones share one update lock, so read-modify-write sequences run one at a time.
#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
    update_lock: Arc<Mutex<()>>,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            update_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Hold this while loading, changing and saving records.
    pub fn lock_updates(&self) -> MutexGuard<'_, ()> {
        self.update_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn daily_dir(&self) -> PathBuf {
        self.root.join(DAILY_DIR)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    pub fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.daily_dir()
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// Load the record for `date`. A missing file is `Ok(None)`.
    pub fn load_day(&self, date: NaiveDate) -> Result<Option<DayRecord>, StoreError> {
        let path = self.day_path(date);
        match read_optional(&path)? {
            Some(content) => parse_day(&path, &content).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`DataStore::load_day`], but unreadable records are logged and treated as absent.
    pub fn day_or_none(&self, date: NaiveDate) -> Option<DayRecord> {
        match self.load_day(date) {
            Ok(day) => day,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable day record");
                None
            }
        }
    }

    /// Persist a record, replacing any previous one for the same date.
    /// The write goes through a temp file so a failure leaves the old record intact.
    pub fn save_day(&self, record: &DayRecord) -> Result<PathBuf, StoreError> {
        let path = self.day_path(record.date);
        let json = serde_json::to_string_pretty(record)?;
        write_atomic(&path, json.as_bytes())?;
        debug!(path = %path.display(), "Saved day record");
        Ok(path)
    }

    /// Dates that have a day file, oldest first.
    pub fn recorded_dates(&self) -> Vec<NaiveDate> {
        self.day_files()
            .iter()
            .filter_map(|path| path.file_stem()?.to_str())
            .filter_map(|stem| NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok())
            .collect()
    }

    /// Day files in directory-scan order (lexicographic, i.e. chronological).
    pub fn day_files(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(self.daily_dir()) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json")
            })
            .collect();
        files.sort();
        files
    }

    /// Every readable day record, oldest first. Corrupt files are skipped.
    pub fn load_all_days(&self) -> Vec<DayRecord> {
        let mut days = Vec::new();
        for path in self.day_files() {
            let parsed = std::fs::read_to_string(&path)
                .map_err(|source| StoreError::Read {
                    path: path.clone(),
                    source,
                })
                .and_then(|content| parse_day(&path, &content));
            match parsed {
                Ok(day) => days.push(day),
                Err(e) => warn!(error = %e, "Skipping unreadable day record"),
            }
        }
        days
    }

    /// Load the session ledger, or an empty one if it doesn't exist yet.
    pub fn load_ledger(&self) -> Result<UsageLedger, StoreError> {
        let path = self.ledger_path();
        match read_optional(&path)? {
            Some(content) => serde_json::from_str(&content)
                .map_err(|source| StoreError::Parse { path, source }),
            None => Ok(UsageLedger::default()),
        }
    }

    pub fn save_ledger(&self, ledger: &UsageLedger) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(ledger)?;
        write_atomic(&self.ledger_path(), json.as_bytes())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parse a stored record; totals are re-derived rather than trusted.
fn parse_day(path: &Path, content: &str) -> Result<DayRecord, StoreError> {
    let mut day: DayRecord = serde_json::from_str(content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    day.recompute_totals();
    Ok(day)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let write_err = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    // Removed on drop if anything below fails.
    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
