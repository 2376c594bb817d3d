use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::Deserialize;
use serde_json::Value;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::core::cost::pricing::CostModel;
use crate::core::models::usage::UsageFact;

/// Event type carried by usage-bearing log lines.
const USAGE_EVENT_TYPE: &str = "message";

// ── Session log structs ───────────────────────────────────────────────

#[derive(Deserialize)]
struct LogLine {
    #[serde(rename = "type")]
    line_type: Option<String>,
    timestamp: Option<String>,
    message: Option<LogMessage>,
}

#[derive(Deserialize)]
struct LogMessage {
    model: Option<String>,
    usage: Option<LogUsage>,
}

#[derive(Deserialize)]
struct LogUsage {
    #[serde(alias = "input_tokens", alias = "inputTokens")]
    input: Option<Value>,
    #[serde(alias = "output_tokens", alias = "outputTokens")]
    output: Option<Value>,
    cost: Option<Value>,
}

/// Precomputed cost carried by the log, either `{"total": x}` or a bare number.
fn precomputed_cost(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    value
        .as_f64()
        .or_else(|| value.get("total").and_then(Value::as_f64))
}

/// Read a token count leniently: missing, negative or non-numeric values count as 0.
pub(crate) fn token_count(value: Option<&Value>) -> u64 {
    match value {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        None => 0,
    }
}

/// Resolve the instant a line is bucketed by. Absent timestamps mean "now";
/// a timestamp that is neither RFC 3339 nor starts with `YYYY-MM-DD` is rejected.
fn resolve_timestamp(raw: Option<&str>, now: DateTime<Local>) -> Option<DateTime<Local>> {
    let ts = match raw {
        Some(ts) => ts.trim(),
        None => return Some(now),
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Local));
    }
    let date = NaiveDate::parse_from_str(ts.get(..10)?, "%Y-%m-%d").ok()?;
    // Midday keeps the bucket on `date` regardless of DST transitions.
    Local
        .from_local_datetime(&date.and_hms_opt(12, 0, 0)?)
        .earliest()
}

// ── Session file discovery ────────────────────────────────────────────

/// Pick the most recent session log: the lexicographically last `*.jsonl`
/// file that isn't a lock file. `None` when the directory is missing or empty.
pub fn latest_session_file(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => return false,
            };
            path.is_file() && name.ends_with(".jsonl") && !name.contains(".lock")
        })
        .collect();
    files.sort();
    files.pop()
}

// ── Parser ────────────────────────────────────────────────────────────

/// Turns session log lines into usage facts.
pub struct LogParser<'a> {
    cost_model: &'a CostModel,
    default_model: &'a str,
}

/// Facts and line counts from parsing one log file.
#[derive(Debug, Clone)]
pub struct ParsedLog {
    pub facts: Vec<UsageFact>,
    pub lines: usize,
    pub skipped: usize,
}

impl<'a> LogParser<'a> {
    pub fn new(cost_model: &'a CostModel, default_model: &'a str) -> Self {
        Self {
            cost_model,
            default_model,
        }
    }

    /// Parse a single line. Returns `None` for anything that isn't a
    /// well-formed message event with a usage payload.
    pub fn parse_line(&self, line: &str, now: DateTime<Local>) -> Option<UsageFact> {
        let line = line.trim();
        if line.is_empty() || !line.contains("\"usage\"") {
            return None;
        }

        let parsed: LogLine = serde_json::from_str(line).ok()?;
        if parsed.line_type.as_deref() != Some(USAGE_EVENT_TYPE) {
            return None;
        }

        let message = parsed.message?;
        let usage = message.usage?;
        let timestamp = resolve_timestamp(parsed.timestamp.as_deref(), now)?;

        let model = message
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.default_model.to_string());
        let input_tokens = token_count(usage.input.as_ref());
        let output_tokens = token_count(usage.output.as_ref());
        let precomputed = precomputed_cost(usage.cost.as_ref());
        let cost = self
            .cost_model
            .resolve(&model, input_tokens, output_tokens, precomputed);

        Some(UsageFact::new(
            model,
            input_tokens,
            output_tokens,
            cost,
            timestamp,
        ))
    }

    /// Lazily parse facts from a line reader. Each call starts a fresh pass.
    pub fn facts<R: BufRead>(&self, reader: R) -> UsageFacts<'_, 'a, R> {
        UsageFacts {
            parser: self,
            reader,
            now: Local::now(),
            buf: Vec::new(),
            lines: 0,
            skipped: 0,
            error: None,
        }
    }

    /// Parse a whole log file from the start.
    pub fn parse_file(&self, path: &Path) -> Result<ParsedLog> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut iter = self.facts(std::io::BufReader::new(file));
        let facts: Vec<UsageFact> = iter.by_ref().collect();
        if let Some(err) = iter.error.take() {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()));
        }
        Ok(ParsedLog {
            facts,
            lines: iter.lines,
            skipped: iter.skipped,
        })
    }
}

/// Iterator over the facts in a log. Malformed lines are counted and skipped;
/// an I/O error ends the iteration and is kept in [`UsageFacts::error`].
pub struct UsageFacts<'p, 'a, R> {
    parser: &'p LogParser<'a>,
    reader: R,
    now: DateTime<Local>,
    buf: Vec<u8>,
    lines: usize,
    skipped: usize,
    error: Option<std::io::Error>,
}

impl<R> UsageFacts<'_, '_, R> {
    /// Non-empty lines that did not produce a fact so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn error(&self) -> Option<&std::io::Error> {
        self.error.as_ref()
    }
}

impl<R: BufRead> Iterator for UsageFacts<'_, '_, R> {
    type Item = UsageFact;

    fn next(&mut self) -> Option<UsageFact> {
        if self.error.is_some() {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    self.error = Some(e);
                    return None;
                }
            }

            let line = String::from_utf8_lossy(&self.buf);
            if line.trim().is_empty() {
                continue;
            }
            self.lines += 1;

            match self.parser.parse_line(&line, self.now) {
                Some(fact) => return Some(fact),
                None => self.skipped += 1,
            }
        }
    }
}
