//! Prompt history reader
//!
//! The assistant appends one record per submitted prompt to
//! `<root>/history.jsonl`:
//!
//! ```text
//! {"display":"fix the tests","timestamp":1735725600000,"project":"/work/app","sessionId":"0b6c9f2e"}
//! ```
//!
//! Grouping the records by `sessionId` gives every known session with its
//! project and the first and last prompt times. This backs `--latest`,
//! `--date` and `--all`, and supplies the report's project when the history
//! knows the session.

use crate::error::Result;
use crate::ingest::reader::{SessionQuery, SourceKind, SourceReader};
use crate::ingest::SourceLayout;
use crate::types::Timestamp;
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One session as seen through the prompt history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEntry {
    pub id: String,
    /// Project path recorded with the prompts, empty when absent
    pub project: String,
    /// Epoch milliseconds of the first matching prompt
    pub first_timestamp: i64,
    /// Epoch milliseconds of the last matching prompt
    pub last_timestamp: i64,
}

/// Restricts which history records count.
///
/// Filters apply per record, so a session spanning midnight appears under
/// both dates with the bounds of that day's prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Exact project path
    pub project: Option<String>,
    /// Calendar day in local time
    pub date: Option<NaiveDate>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Whether a record passes, reading dates in local time.
    pub fn matches(&self, project: &str, timestamp_ms: i64) -> bool {
        self.matches_in(project, timestamp_ms, &Local)
    }

    /// Whether a record passes, reading dates in `tz`.
    pub fn matches_in<Tz: TimeZone>(&self, project: &str, timestamp_ms: i64, tz: &Tz) -> bool {
        if self.project.as_deref().is_some_and(|p| p != project) {
            return false;
        }
        match self.date {
            Some(date) => DateTime::from_timestamp_millis(timestamp_ms)
                .map(|dt| dt.with_timezone(tz).date_naive() == date)
                .unwrap_or(false),
            None => true,
        }
    }
}

/// Sessions found in the history, most recently active first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    pub sessions: Vec<SessionEntry>,
    pub skipped_lines: u64,
}

impl History {
    /// The most recently active session.
    pub fn latest(&self) -> Option<&SessionEntry> {
        self.sessions.first()
    }

    pub fn find(&self, session_id: &str) -> Option<&SessionEntry> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawHistoryRecord {
    session_id: Option<String>,
    project: Option<String>,
    timestamp: Option<serde_json::Value>,
}

/// Reader for the prompt history.
#[derive(Debug, Default, Clone)]
pub struct HistoryReader {
    filter: HistoryFilter,
}

impl HistoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: HistoryFilter) -> Self {
        Self { filter }
    }

    /// Read a history from any buffered source.
    pub fn read<R: BufRead>(&self, reader: R) -> History {
        let mut sessions: HashMap<String, SessionEntry> = HashMap::new();
        let mut skipped_lines = 0;

        for line_result in reader.split(b'\n') {
            let bytes = match line_result {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, "Read error in history, stopping early");
                    break;
                }
            };
            let Ok(line) = std::str::from_utf8(&bytes) else {
                skipped_lines += 1;
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }

            let record: RawHistoryRecord = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping malformed history record");
                    skipped_lines += 1;
                    continue;
                }
            };

            let Some(id) = record.session_id.filter(|id| !id.is_empty()) else {
                continue;
            };
            let project = record.project.unwrap_or_default();
            let timestamp = record
                .timestamp
                .as_ref()
                .and_then(Timestamp::from_json)
                .and_then(|ts| ts.instant())
                .map(|dt| dt.timestamp_millis())
                .unwrap_or(0);

            if !self.filter.matches(&project, timestamp) {
                continue;
            }

            sessions
                .entry(id.clone())
                .and_modify(|entry| {
                    entry.first_timestamp = entry.first_timestamp.min(timestamp);
                    entry.last_timestamp = entry.last_timestamp.max(timestamp);
                })
                .or_insert(SessionEntry {
                    id,
                    project,
                    first_timestamp: timestamp,
                    last_timestamp: timestamp,
                });
        }

        let mut sessions: Vec<SessionEntry> = sessions.into_values().collect();
        sessions.sort_by(|a, b| {
            b.last_timestamp
                .cmp(&a.last_timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });

        History {
            sessions,
            skipped_lines,
        }
    }
}

impl SourceReader for HistoryReader {
    type Output = History;

    fn kind(&self) -> SourceKind {
        SourceKind::History
    }

    fn locate(&self, layout: &SourceLayout, _query: &SessionQuery) -> Option<PathBuf> {
        let path = layout.history_file();
        path.is_file().then_some(path)
    }

    fn read_path(&self, path: &Path) -> Result<History> {
        let file = File::open(path)?;
        Ok(self.read(BufReader::new(file)))
    }
}
