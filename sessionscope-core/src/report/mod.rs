//! The normalized session report
//!
//! [`SessionReport`] is the aggregate root produced by the
//! [`Aggregator`](aggregate::Aggregator): built fresh on every run, written
//! once as JSON and once as rendered markdown.
//!
//! Maps inside the report are ordered and file lists sorted, so two runs
//! over unchanged sources serialize identically apart from
//! `metadata.generated_at`.

pub mod aggregate;
pub mod writer;

pub use aggregate::{
    build_report, duration_minutes, Aggregator, ResponseTimeSource, SessionSources,
};
pub use writer::{ReportWriter, TemplateSource, WrittenReport};

use crate::types::{ErrorRecord, SlowOperation, Tally, Timestamp, TokenUsage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Version of the JSON layout below.
pub const SCHEMA_VERSION: &str = "1.0";

/// Version string stamped into `metadata.generator_version`.
pub const GENERATOR_VERSION: &str = concat!("sessionscope ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub schema_version: String,
    pub session_id: String,
    pub project: Option<String>,
    pub timing: Timing,
    pub messages: MessageCounts,
    pub tokens: TokenReport,
    pub tools: ToolReport,
    pub agents: AgentReport,
    pub skills: SkillReport,
    pub files: FileReport,
    pub performance: Performance,
    pub sources: Sources,
    pub metadata: Metadata,
}

/// Session time window. Both bounds are null when the log had no timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub duration_minutes: f64,
    pub duration_formatted: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCounts {
    pub user: u64,
    pub assistant: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenReport {
    /// Primary model of the session
    pub model: Option<String>,
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_creation: u64,
    pub total: u64,
    pub cost_usd: f64,
}

impl TokenReport {
    /// Build from counters; `total` is always their sum.
    pub fn new(usage: TokenUsage, model: Option<String>, cost_usd: f64) -> Self {
        Self {
            model,
            input: usage.input,
            output: usage.output,
            cache_read: usage.cache_read,
            cache_creation: usage.cache_creation,
            total: usage.total(),
            cost_usd,
        }
    }

    pub fn usage(&self) -> TokenUsage {
        TokenUsage {
            input: self.input,
            output: self.output,
            cache_read: self.cache_read,
            cache_creation: self.cache_creation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolReport {
    pub total_calls: u64,
    pub by_type: Tally,
    /// Fraction of tool results that were not errors, 0..=1; 1 when no
    /// results were logged
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    pub total_calls: u64,
    pub by_type: Tally,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillReport {
    pub total_calls: u64,
    pub by_name: Tally,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    /// Entries of the session's file history
    pub modified: Vec<String>,
    /// Paths passed to Read
    pub read: Vec<String>,
    /// Paths passed to Write
    pub created: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub slow_operations: Vec<SlowOperation>,
    pub errors: Vec<ErrorRecord>,
    pub average_tool_response_ms: u64,
    pub response_time_source: ResponseTimeSource,
}

/// Absolute path of each source read, null when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sources {
    pub session_log: Option<PathBuf>,
    pub debug_log: Option<PathBuf>,
    pub file_history: Option<PathBuf>,
    /// Prompt history consulted for project and session discovery
    pub history: Option<PathBuf>,
    /// Usage stats cache, present when it exists under the data root
    pub stats_cache: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// RFC 3339 creation time of this report
    pub generated_at: String,
    pub generator_version: String,
}

impl SessionReport {
    /// The report as a JSON value, the shape templates are rendered against.
    pub fn to_value(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_report_total_is_derived() {
        let usage = TokenUsage {
            input: 300,
            output: 50,
            cache_read: 10,
            cache_creation: 0,
        };
        let report = TokenReport::new(usage, Some("model-a".to_string()), 0.0028);
        assert_eq!(report.total, 360);
        assert_eq!(report.usage(), usage);
    }

    #[test]
    fn test_generator_version() {
        assert!(GENERATOR_VERSION.starts_with("sessionscope "));
    }
}
