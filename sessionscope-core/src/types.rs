//! Core domain types for sessionscope
//!
//! These are the values the readers produce and the aggregator consumes.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One bounded interactive run of the assistant, identified by an opaque id |
//! | **Token category** | One of input / output / cache-read / cache-creation |
//! | **Tool invocation** | One discrete action taken during a session (Read, Edit, Bash, ...) |
//! | **Slow operation** | A debug-log entry flagging an operation over an internal threshold |

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

// ============================================
// Tokens
// ============================================

/// Token counters for one session.
///
/// The total is always derived from the four categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_creation: u64,
}

impl TokenUsage {
    /// Sum of the four categories, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.input
            .saturating_add(self.output)
            .saturating_add(self.cache_read)
            .saturating_add(self.cache_creation)
    }

    /// Add another set of counters into this one, saturating per category.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input = self.input.saturating_add(other.input);
        self.output = self.output.saturating_add(other.output);
        self.cache_read = self.cache_read.saturating_add(other.cache_read);
        self.cache_creation = self.cache_creation.saturating_add(other.cache_creation);
    }
}

// ============================================
// Tallies
// ============================================

/// Invocation counts keyed by name.
///
/// Ordered so serialized output is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tally(BTreeMap<String, u64>);

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `name`.
    pub fn record(&mut self, name: &str) {
        *self.0.entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, name: &str) -> u64 {
        self.0.get(name).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

impl FromIterator<(String, u64)> for Tally {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Integer-truncated mean, 0 for no samples.
pub fn truncated_mean(samples: &[u64]) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    let sum: u128 = samples.iter().map(|s| *s as u128).sum();
    (sum / samples.len() as u128) as u64
}

// ============================================
// Debug log records
// ============================================

/// An operation the debug log flagged as slow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowOperation {
    pub operation: String,
    pub duration_ms: u64,
    pub timestamp: String,
}

/// An error line from the debug log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    pub timestamp: String,
}

/// One `Tool <name> completed in <N>ms` sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolTiming {
    pub tool: String,
    pub duration_ms: u64,
    pub timestamp: String,
}

// ============================================
// Timestamps
// ============================================

/// A record timestamp as it appeared in a log, decoded once at ingestion.
///
/// Numeric input (a JSON number or an all-digit string) is epoch
/// milliseconds; anything else is kept as text and resolved as ISO-8601,
/// assuming UTC when no offset is present. Serializes back to its original
/// shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    EpochMillis(i64),
    Text(String),
}

impl Timestamp {
    /// Decode a JSON timestamp value. Returns `None` for null, bools,
    /// containers and blank strings.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Timestamp::EpochMillis),
            serde_json::Value::String(s) => Self::from_text(s),
            _ => None,
        }
    }

    /// Decode a textual timestamp, sniffing numeric input as epoch millis.
    pub fn from_text(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(ms) = trimmed.parse::<i64>() {
            return Some(Timestamp::EpochMillis(ms));
        }
        if let Ok(ms) = trimmed.parse::<f64>() {
            if ms.is_finite() {
                return Some(Timestamp::EpochMillis(ms as i64));
            }
        }
        Some(Timestamp::Text(trimmed.to_string()))
    }

    /// Resolve to a UTC instant, `None` if the text is not a date-time.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::EpochMillis(ms) => DateTime::from_timestamp_millis(*ms),
            Timestamp::Text(s) => parse_iso8601(s),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::EpochMillis(ms) => write!(f, "{}", ms),
            Timestamp::Text(s) => f.write_str(s),
        }
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Ordering used for the timing window: resolvable timestamps by instant,
/// then unresolvable ones by text.
pub fn chronological(a: &Timestamp, b: &Timestamp) -> Ordering {
    match (a.instant(), b.instant()) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.to_string().cmp(&b.to_string())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_string().cmp(&b.to_string()),
    }
}
