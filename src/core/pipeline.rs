use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::aggregator::aggregate;
use crate::core::cost::scanner::{latest_session_file, LogParser};
use crate::core::models::day::DayRecord;
use crate::core::store::DataStore;

/// Result of one extraction run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ExtractOutcome {
    /// The sessions directory is missing or holds no logs.
    NoSessionFiles { dir: PathBuf },
    /// The latest log had no usage-bearing lines.
    NoUsage { file: PathBuf, skipped_lines: usize },
    Updated(ExtractReport),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractReport {
    pub file: PathBuf,
    pub days: Vec<DayRecord>,
    pub skipped_lines: usize,
}

/// Parse the most recent session log and rewrite the record of every date it covers.
///
/// Each date's record is rebuilt from the full log, so repeated runs over a
/// growing log converge instead of double counting. A failed write aborts the
/// run; records already written for earlier dates stay written.
pub fn run_extract(
    sessions_dir: &Path,
    store: &DataStore,
    parser: &LogParser<'_>,
) -> Result<ExtractOutcome> {
    let file = match latest_session_file(sessions_dir) {
        Some(file) => file,
        None => {
            debug!(dir = %sessions_dir.display(), "No session files found");
            return Ok(ExtractOutcome::NoSessionFiles {
                dir: sessions_dir.to_path_buf(),
            });
        }
    };

    debug!(file = %file.display(), "Parsing session log");
    let parsed = parser.parse_file(&file)?;
    debug!(
        lines = parsed.lines,
        facts = parsed.facts.len(),
        skipped = parsed.skipped,
        "Parsed session log"
    );

    if parsed.facts.is_empty() {
        return Ok(ExtractOutcome::NoUsage {
            file,
            skipped_lines: parsed.skipped,
        });
    }

    let days = aggregate(parsed.facts);
    for day in &days {
        store
            .save_day(day)
            .with_context(|| format!("Failed to persist usage for {}", day.date))?;
    }
    info!(days = days.len(), file = %file.display(), "Usage extracted");

    Ok(ExtractOutcome::Updated(ExtractReport {
        file,
        days,
        skipped_lines: parsed.skipped,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cost::pricing::{CostModel, DEFAULT_MODEL};
    use chrono::NaiveDate;

    // Naive local timestamps are not RFC 3339, so they bucket by their date prefix.
    const LOG: &str = r#"{"type":"message","timestamp":"2024-01-01T10:00:00","message":{"model":"A","usage":{"input":100,"output":50}}}
{"type":"session","usage":{}}
not json at all
{"type":"message","timestamp":"2024-01-01T11:00:00","message":{"model":"A","usage":{"input":200,"output":100}}}
{"type":"message","timestamp":"2024-01-02","message":{"usage":{"input":1,"output":1,"cost":{"total":0.5}}}}
"#;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (tempfile::TempDir, PathBuf, DataStore) {
        let dir = tempfile::tempdir().unwrap();
        let sessions = dir.path().join("sessions");
        std::fs::create_dir_all(&sessions).unwrap();
        std::fs::write(sessions.join("a-old.jsonl"), "").unwrap();
        std::fs::write(sessions.join("b-new.jsonl"), LOG).unwrap();
        let store = DataStore::new(dir.path().join("data"));
        (dir, sessions, store)
    }

    #[test]
    fn missing_directory_is_nothing_to_do() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::new(dir.path());
        let costs = CostModel::default();
        let parser = LogParser::new(&costs, DEFAULT_MODEL);
        let outcome = run_extract(&dir.path().join("nope"), &store, &parser).unwrap();
        assert!(matches!(outcome, ExtractOutcome::NoSessionFiles { .. }));
        assert!(store.day_files().is_empty());
    }

    #[test]
    fn log_without_usage_is_nothing_to_do() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("s.jsonl"), "{\"type\":\"session\"}\n").unwrap();
        let store = DataStore::new(dir.path().join("data"));
        let costs = CostModel::default();
        let parser = LogParser::new(&costs, DEFAULT_MODEL);
        let outcome = run_extract(dir.path(), &store, &parser).unwrap();
        assert!(matches!(
            outcome,
            ExtractOutcome::NoUsage {
                skipped_lines: 1,
                ..
            }
        ));
    }

    #[test]
    fn extract_writes_one_record_per_date() {
        let (_dir, sessions, store) = setup();
        let costs = CostModel::default();
        let parser = LogParser::new(&costs, DEFAULT_MODEL);

        let report = match run_extract(&sessions, &store, &parser).unwrap() {
            ExtractOutcome::Updated(report) => report,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert!(report.file.ends_with("b-new.jsonl"));
        assert_eq!(report.skipped_lines, 2);
        assert_eq!(report.days.len(), 2);

        let first = store.load_day(date(2024, 1, 1)).unwrap().unwrap();
        assert_eq!(first.models["A"].input_tokens, 300);
        assert_eq!(first.models["A"].calls, 2);
        assert_eq!(first.total_tokens, 450);

        let second = store.load_day(date(2024, 1, 2)).unwrap().unwrap();
        assert_eq!(second.models[DEFAULT_MODEL].cost, 0.5);
    }

    #[test]
    fn rerunning_converges() {
        let (_dir, sessions, store) = setup();
        let costs = CostModel::default();
        let parser = LogParser::new(&costs, DEFAULT_MODEL);

        run_extract(&sessions, &store, &parser).unwrap();
        let once = store.load_all_days();
        run_extract(&sessions, &store, &parser).unwrap();
        run_extract(&sessions, &store, &parser).unwrap();
        assert_eq!(store.load_all_days(), once);
    }

    #[test]
    fn persistence_failure_is_fatal() {
        let (dir, sessions, _) = setup();
        // A plain file where the data directory should be makes every write fail.
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "").unwrap();
        let store = DataStore::new(&blocked);
        let costs = CostModel::default();
        let parser = LogParser::new(&costs, DEFAULT_MODEL);
        assert!(run_extract(&sessions, &store, &parser).is_err());
    }
}
