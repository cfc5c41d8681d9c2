//! Session log reader
//!
//! Reads `<root>/projects/<encoded-project>/<session_id>.jsonl`, one JSON
//! record per line.
//!
//! # Error Handling
//!
//! - **Malformed JSON lines**: skipped and counted in
//!   [`SessionLogSummary::skipped_lines`]. Partial lines at the tail of a log
//!   that is still being written are expected.
//! - **Missing fields**: every field is optional; missing token counters are
//!   zero and a tool invocation without a name is counted as `"unknown"`.
//! - **Unreadable lines** (invalid UTF-8): skipped like malformed JSON.

use crate::error::Result;
use crate::ingest::reader::{SessionQuery, SourceKind, SourceReader};
use crate::ingest::SourceLayout;
use crate::types::{chronological, truncated_mean, Tally, Timestamp, TokenUsage};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Placeholder model name the assistant writes for locally generated messages.
const SYNTHETIC_MODEL: &str = "<synthetic>";

const UNKNOWN: &str = "unknown";

/// Everything extracted from one session log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionLogSummary {
    pub user_messages: u64,
    pub assistant_messages: u64,
    pub tokens: TokenUsage,
    /// Tool invocations by tool name
    pub tools: Tally,
    /// Sub-agent launches by agent type
    pub agents: Tally,
    /// Skill invocations by skill name
    pub skills: Tally,
    pub tool_results: u64,
    pub tool_errors: u64,
    /// Durations reported on tool results, milliseconds
    pub tool_durations_ms: Vec<u64>,
    /// All record timestamps, in chronological order
    pub timestamps: Vec<Timestamp>,
    /// Model names in first-seen order with their record counts
    pub models: Vec<(String, u64)>,
    pub files_read: BTreeSet<String>,
    pub files_created: BTreeSet<String>,
    /// First working directory recorded in the log
    pub cwd: Option<String>,
    pub skipped_lines: u64,
}

impl SessionLogSummary {
    pub fn first_timestamp(&self) -> Option<&Timestamp> {
        self.timestamps.first()
    }

    pub fn last_timestamp(&self) -> Option<&Timestamp> {
        self.timestamps.last()
    }

    pub fn total_messages(&self) -> u64 {
        self.user_messages + self.assistant_messages
    }

    /// The most frequently seen model. Ties go to the model seen first.
    pub fn primary_model(&self) -> Option<&str> {
        let mut best: Option<&(String, u64)> = None;
        for entry in &self.models {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(name, _)| name.as_str())
    }

    /// Successful tool results over all tool results, 1 when none were seen.
    pub fn tool_success_rate(&self) -> f64 {
        if self.tool_results == 0 {
            return 1.0;
        }
        let ok = self.tool_results.saturating_sub(self.tool_errors);
        ok as f64 / self.tool_results as f64
    }

    /// Truncated mean of tool-result durations.
    pub fn average_tool_duration_ms(&self) -> u64 {
        truncated_mean(&self.tool_durations_ms)
    }

    fn record_model(&mut self, model: &str) {
        match self.models.iter_mut().find(|(name, _)| name == model) {
            Some(entry) => entry.1 += 1,
            None => self.models.push((model.to_string(), 1)),
        }
    }
}

// ============================================
// Raw JSONL record types (serde deserialization)
// ============================================

/// One line of the session log. Every field is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawRecord {
    #[serde(rename = "type")]
    record_type: Option<String>,
    timestamp: Option<serde_json::Value>,
    cwd: Option<String>,
    message: Option<RawMessage>,
    tool_use_result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMessage {
    model: Option<String>,
    usage: Option<RawUsage>,
    content: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
    cache_read_input_tokens: Option<u64>,
}

impl From<&RawUsage> for TokenUsage {
    fn from(raw: &RawUsage) -> Self {
        TokenUsage {
            input: raw.input_tokens.unwrap_or(0),
            output: raw.output_tokens.unwrap_or(0),
            cache_read: raw.cache_read_input_tokens.unwrap_or(0),
            cache_creation: raw.cache_creation_input_tokens.unwrap_or(0),
        }
    }
}

/// Reader for the structured session log.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionLogReader;

impl SessionLogReader {
    pub fn new() -> Self {
        Self
    }

    /// Read a session log from any buffered source.
    pub fn read<R: BufRead>(&self, reader: R) -> SessionLogSummary {
        let mut summary = SessionLogSummary::default();

        for (index, line_result) in reader.split(b'\n').enumerate() {
            let line_number = index + 1;
            let line = match line_result.map(String::from_utf8) {
                Ok(Ok(line)) => line,
                Ok(Err(e)) => {
                    tracing::debug!(line = line_number, error = %e, "Skipping non-UTF-8 line");
                    summary.skipped_lines += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(line = line_number, error = %e, "Read error, stopping early");
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let record: RawRecord = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(line = line_number, error = %e, "Skipping malformed record");
                    summary.skipped_lines += 1;
                    continue;
                }
            };

            Self::apply_record(&mut summary, &record);
        }

        summary.timestamps.sort_by(chronological);
        summary
    }

    fn apply_record(summary: &mut SessionLogSummary, record: &RawRecord) {
        if let Some(ts) = record.timestamp.as_ref().and_then(Timestamp::from_json) {
            summary.timestamps.push(ts);
        }

        if summary.cwd.is_none() {
            summary.cwd = record.cwd.clone().filter(|c| !c.is_empty());
        }

        match record.record_type.as_deref() {
            Some("user") => summary.user_messages += 1,
            Some("assistant") => summary.assistant_messages += 1,
            _ => {}
        }

        if let Some(message) = &record.message {
            if let Some(model) = message.model.as_deref() {
                if !model.is_empty() && model != SYNTHETIC_MODEL {
                    summary.record_model(model);
                }
            }

            if let Some(usage) = &message.usage {
                summary.tokens.add(&TokenUsage::from(usage));
            }

            if let Some(serde_json::Value::Array(blocks)) = &message.content {
                for block in blocks {
                    Self::apply_content_block(summary, block);
                }
            }
        }

        if let Some(duration) = record.tool_use_result.as_ref().and_then(result_duration_ms) {
            summary.tool_durations_ms.push(duration);
        }
    }

    fn apply_content_block(summary: &mut SessionLogSummary, block: &serde_json::Value) {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("tool_use") => {
                let name = block
                    .get("name")
                    .and_then(|n| n.as_str())
                    .filter(|n| !n.is_empty())
                    .unwrap_or(UNKNOWN);
                summary.tools.record(name);

                let input = block.get("input");
                let input_str = |key: &str| {
                    input
                        .and_then(|i| i.get(key))
                        .and_then(|v| v.as_str())
                        .filter(|s| !s.is_empty())
                };

                match name {
                    "Task" => summary
                        .agents
                        .record(input_str("subagent_type").unwrap_or(UNKNOWN)),
                    "Skill" => summary.skills.record(
                        input_str("skill")
                            .or_else(|| input_str("command"))
                            .unwrap_or(UNKNOWN),
                    ),
                    "Read" => {
                        if let Some(path) = input_str("file_path") {
                            summary.files_read.insert(path.to_string());
                        }
                    }
                    "Write" => {
                        if let Some(path) = input_str("file_path") {
                            summary.files_created.insert(path.to_string());
                        }
                    }
                    _ => {}
                }
            }
            Some("tool_result") => {
                summary.tool_results += 1;
                if block
                    .get("is_error")
                    .and_then(|e| e.as_bool())
                    .unwrap_or(false)
                {
                    summary.tool_errors += 1;
                }
            }
            _ => {}
        }
    }
}

/// Non-zero duration carried on a `toolUseResult` object, if any.
fn result_duration_ms(result: &serde_json::Value) -> Option<u64> {
    let obj = result.as_object()?;
    ["totalDurationMs", "durationMs", "duration_ms", "duration"]
        .iter()
        .find_map(|key| obj.get(*key))
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)))
        .filter(|ms| *ms > 0)
}

impl SourceReader for SessionLogReader {
    type Output = SessionLogSummary;

    fn kind(&self) -> SourceKind {
        SourceKind::SessionLog
    }

    fn locate(&self, layout: &SourceLayout, query: &SessionQuery) -> Option<PathBuf> {
        layout.find_session_log(&query.session_id, query.project.as_deref())
    }

    fn read_path(&self, path: &Path) -> Result<SessionLogSummary> {
        let file = File::open(path)?;
        let summary = self.read(BufReader::new(file));
        if summary.skipped_lines > 0 {
            tracing::info!(
                path = %path.display(),
                skipped = summary.skipped_lines,
                "Skipped malformed session log lines"
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(log: &str) -> SessionLogSummary {
        SessionLogReader::new().read(log.as_bytes())
    }

    #[test]
    fn test_empty_log() {
        let summary = read("");
        assert_eq!(summary, SessionLogSummary::default());
        assert!(summary.primary_model().is_none());
    }

    #[test]
    fn test_counts_messages_and_tokens() {
        let log = r#"{"type":"user","timestamp":"2025-01-01T10:00:00Z","message":{"role":"user","content":"hi"}}
{"type":"assistant","timestamp":"2025-01-01T10:00:05Z","message":{"model":"model-a","usage":{"input_tokens":100,"output_tokens":50}}}
{"type":"assistant","timestamp":"2025-01-01T10:01:00Z","message":{"model":"model-a","usage":{"input_tokens":200,"output_tokens":0,"cache_read_input_tokens":10}}}
"#;
        let summary = read(log);
        assert_eq!(summary.user_messages, 1);
        assert_eq!(summary.assistant_messages, 2);
        assert_eq!(summary.total_messages(), 3);
        assert_eq!(summary.tokens.input, 300);
        assert_eq!(summary.tokens.output, 50);
        assert_eq!(summary.tokens.cache_read, 10);
        assert_eq!(summary.tokens.cache_creation, 0);
        assert_eq!(summary.tokens.total(), 360);
        assert_eq!(summary.primary_model(), Some("model-a"));
        assert_eq!(summary.timestamps.len(), 3);
    }

    #[test]
    fn test_malformed_lines_do_not_change_totals() {
        let clean = r#"{"type":"assistant","message":{"usage":{"input_tokens":10,"output_tokens":5}}}
{"type":"user"}
"#;
        let noisy = r#"{"type":"assistant","message":{"usage":{"input_tokens":10,"output_tokens":5}}}
not json at all
{"type":"user"}
{"type":"assistant","message":{"usage":{"input_tok"#;

        let a = read(clean);
        let b = read(noisy);
        assert_eq!(a.tokens, b.tokens);
        assert_eq!(a.user_messages, b.user_messages);
        assert_eq!(a.assistant_messages, b.assistant_messages);
        assert_eq!(b.skipped_lines, 2);
    }

    #[test]
    fn test_non_utf8_line_is_skipped() {
        let mut bytes = b"{\"type\":\"user\"}\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(b"{\"type\":\"user\"}\n");
        let summary = SessionLogReader::new().read(bytes.as_slice());
        assert_eq!(summary.user_messages, 2);
        assert_eq!(summary.skipped_lines, 1);
    }

    #[test]
    fn test_tool_invocations() {
        let log = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"ok"},{"type":"tool_use","id":"1","name":"Read","input":{"file_path":"/a.rs"}},{"type":"tool_use","id":"2","name":"Bash","input":{"command":"ls"}}]}}
{"type":"assistant","message":{"content":[{"type":"tool_use","id":"3","input":{}},{"type":"tool_use","id":"4","name":"Read","input":{"file_path":"/a.rs"}}]}}
{"type":"assistant","message":{"content":[{"type":"tool_use","id":"5","name":"Write","input":{"file_path":"/new.rs"}}]}}
"#;
        let summary = read(log);
        assert_eq!(summary.tools.get("Read"), 2);
        assert_eq!(summary.tools.get("Bash"), 1);
        assert_eq!(summary.tools.get("unknown"), 1);
        assert_eq!(summary.tools.total(), 5);
        assert_eq!(summary.files_read.len(), 1);
        assert!(summary.files_created.contains("/new.rs"));
    }

    #[test]
    fn test_agents_and_skills() {
        let log = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Task","input":{"subagent_type":"Explore"}},{"type":"tool_use","name":"Task","input":{}}]}}
{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Skill","input":{"skill":"pdf"}},{"type":"tool_use","name":"Skill","input":{"command":"review"}}]}}
"#;
        let summary = read(log);
        assert_eq!(summary.agents.get("Explore"), 1);
        assert_eq!(summary.agents.get("unknown"), 1);
        assert_eq!(summary.skills.get("pdf"), 1);
        assert_eq!(summary.skills.get("review"), 1);
        assert_eq!(summary.tools.get("Task"), 2);
    }

    #[test]
    fn test_tool_results_and_durations() {
        let log = r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"1","content":"ok"}]},"toolUseResult":{"durationMs":120}}
{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"2","content":"boom","is_error":true}]},"toolUseResult":{"duration_ms":81}}
{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"3","content":"ok"}]},"toolUseResult":"plain text result"}
"#;
        let summary = read(log);
        assert_eq!(summary.tool_results, 3);
        assert_eq!(summary.tool_errors, 1);
        assert!((summary.tool_success_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.tool_durations_ms, vec![120, 81]);
        assert_eq!(summary.average_tool_duration_ms(), 100);
    }

    #[test]
    fn test_total_duration_field() {
        let log = r#"{"type":"user","toolUseResult":{"totalDurationMs":4200}}
{"type":"user","toolUseResult":{"totalDurationMs":1800,"durationMs":5}}
{"type":"user","toolUseResult":{"totalDurationMs":0}}
"#;
        let summary = read(log);
        assert_eq!(summary.tool_durations_ms, vec![4200, 1800]);
        assert_eq!(summary.average_tool_duration_ms(), 3000);
    }

    #[test]
    fn test_success_rate_without_results() {
        // Tool calls with no results recorded are assumed to have succeeded
        let log = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Read","input":{}}]}}"#;
        assert_eq!(read(log).tool_success_rate(), 1.0);
        assert_eq!(read("").tool_success_rate(), 1.0);
    }

    #[test]
    fn test_primary_model_tie_goes_to_first_seen() {
        let log = r#"{"type":"assistant","message":{"model":"model-b"}}
{"type":"assistant","message":{"model":"model-a"}}
{"type":"assistant","message":{"model":"model-a"}}
{"type":"assistant","message":{"model":"model-b"}}
{"type":"assistant","message":{"model":"<synthetic>"}}
{"type":"assistant","message":{"model":"<synthetic>"}}
{"type":"assistant","message":{"model":"<synthetic>"}}
"#;
        let summary = read(log);
        assert_eq!(summary.primary_model(), Some("model-b"));
        assert_eq!(
            summary.models,
            vec![("model-b".to_string(), 2), ("model-a".to_string(), 2)]
        );
    }

    #[test]
    fn test_timestamps_sorted_chronologically() {
        let log = r#"{"type":"user","timestamp":"2025-01-01T10:05:00Z"}
{"type":"user","timestamp":"2025-01-01T10:00:00Z"}
{"type":"user","timestamp":1735725900000}
{"type":"user"}
"#;
        let summary = read(log);
        assert_eq!(summary.timestamps.len(), 3);
        assert_eq!(
            summary.first_timestamp(),
            Some(&Timestamp::Text("2025-01-01T10:00:00Z".to_string()))
        );
        // 1735725900000 ms is 2025-01-01T10:05:00Z; equal instants order by text
        assert_eq!(
            summary.last_timestamp(),
            Some(&Timestamp::Text("2025-01-01T10:05:00Z".to_string()))
        );
    }

    #[test]
    fn test_first_cwd_is_kept() {
        let log = r#"{"type":"user","cwd":"/work/app"}
{"type":"user","cwd":"/work/app/sub"}
"#;
        assert_eq!(read(log).cwd.as_deref(), Some("/work/app"));
    }
}
