//! Debug log reader
//!
//! Reads the free-text diagnostic log at `<root>/debug/<session_id>.txt`.
//! Three line shapes are recognized, tried in order with the first match
//! winning:
//!
//! ```text
//! [2025-01-01T10:00:00.000Z] [DEBUG] [SLOW OPERATION DETECTED] git status took 1200ms
//! [2025-01-01T10:00:01.000Z] [ERROR] MCP server "github" failed to start
//! [2025-01-01T10:00:02.000Z] [DEBUG] Tool Read completed in 35ms
//! ```
//!
//! Matching is case-insensitive. The older `Slow operation: <op> took <N>ms`
//! wording is accepted as well. Every other line is ignored.

use crate::error::Result;
use crate::ingest::reader::{SessionQuery, SourceKind, SourceReader};
use crate::ingest::SourceLayout;
use crate::types::{truncated_mean, ErrorRecord, SlowOperation, ToolTiming};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static SLOW_OPERATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\[(?P<ts>[^\]]+)\].*?(?:\[slow operation detected\]|slow operation:)\s*(?P<op>.+?)\s+took\s+(?P<ms>\d+)(?:\.\d+)?\s*ms",
    )
    .unwrap()
});

static ERROR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\[(?P<ts>[^\]]+)\]\s*(?:\[error\]|error\b:?)\s*(?P<msg>.*\S)").unwrap()
});

static TOOL_TIMING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\[(?P<ts>[^\]]+)\].*?\btool\s+(?P<tool>\S+)\s+completed\s+in\s+(?P<ms>\d+)(?:\.\d+)?\s*ms",
    )
    .unwrap()
});

/// Everything extracted from one debug log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugLogSummary {
    pub slow_operations: Vec<SlowOperation>,
    pub errors: Vec<ErrorRecord>,
    pub tool_timings: Vec<ToolTiming>,
}

impl DebugLogSummary {
    /// Truncated mean of the tool timing samples, 0 when there are none.
    pub fn average_tool_ms(&self) -> u64 {
        let samples: Vec<u64> = self.tool_timings.iter().map(|t| t.duration_ms).collect();
        truncated_mean(&samples)
    }

    pub fn has_timings(&self) -> bool {
        !self.tool_timings.is_empty()
    }
}

/// A recognized debug log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugLine {
    Slow(SlowOperation),
    Error(ErrorRecord),
    ToolTiming(ToolTiming),
}

/// Classify one line. Slow operations win over errors, errors over tool
/// timings.
pub fn classify_line(line: &str) -> Option<DebugLine> {
    if let Some(caps) = SLOW_OPERATION_REGEX.captures(line) {
        if let Ok(ms) = caps["ms"].parse() {
            return Some(DebugLine::Slow(SlowOperation {
                operation: caps["op"].to_string(),
                duration_ms: ms,
                timestamp: caps["ts"].to_string(),
            }));
        }
    }

    if let Some(caps) = ERROR_REGEX.captures(line) {
        return Some(DebugLine::Error(ErrorRecord {
            message: caps["msg"].to_string(),
            timestamp: caps["ts"].to_string(),
        }));
    }

    if let Some(caps) = TOOL_TIMING_REGEX.captures(line) {
        if let Ok(ms) = caps["ms"].parse() {
            return Some(DebugLine::ToolTiming(ToolTiming {
                tool: caps["tool"].to_string(),
                duration_ms: ms,
                timestamp: caps["ts"].to_string(),
            }));
        }
    }

    None
}

/// Reader for the free-text debug log.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugLogReader;

impl DebugLogReader {
    pub fn new() -> Self {
        Self
    }

    /// Read a debug log from any buffered source.
    pub fn read<R: BufRead>(&self, reader: R) -> DebugLogSummary {
        let mut summary = DebugLogSummary::default();

        for line_result in reader.split(b'\n') {
            let bytes = match line_result {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = %e, "Read error in debug log, stopping early");
                    break;
                }
            };
            let Ok(line) = std::str::from_utf8(&bytes) else {
                continue;
            };

            match classify_line(line.trim_end()) {
                Some(DebugLine::Slow(op)) => summary.slow_operations.push(op),
                Some(DebugLine::Error(err)) => summary.errors.push(err),
                Some(DebugLine::ToolTiming(t)) => summary.tool_timings.push(t),
                None => {}
            }
        }

        summary
    }
}

impl SourceReader for DebugLogReader {
    type Output = DebugLogSummary;

    fn kind(&self) -> SourceKind {
        SourceKind::DebugLog
    }

    fn locate(&self, layout: &SourceLayout, query: &SessionQuery) -> Option<PathBuf> {
        let path = layout.debug_log(&query.session_id);
        path.is_file().then_some(path)
    }

    fn read_path(&self, path: &Path) -> Result<DebugLogSummary> {
        let file = File::open(path)?;
        Ok(self.read(BufReader::new(file)))
    }
}
