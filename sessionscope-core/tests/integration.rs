//! Integration tests for the sessionscope pipeline
//!
//! These tests use the data root in `tests/fixtures/claude-root/` to verify
//! the end-to-end flow from source files to written reports.

use chrono::{DateTime, Utc};
use sessionscope_core::ingest::{HistoryFilter, SessionLogReader, SourceReader};
use sessionscope_core::report::ResponseTimeSource;
use sessionscope_core::{
    Aggregator, ModelPricing, PricingTable, ReportWriter, SessionQuery, SessionReport,
    SourceLayout, Timestamp,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SESSION_ID: &str = "scenario-001";

/// Get the path to the fixture data root
fn fixture_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/claude-root")
}

/// Pricing with the fixture's model at 5 / 25 / 0.5 per million
fn scenario_pricing() -> PricingTable {
    let mut table = PricingTable::builtin();
    table.prepend("model-a", ModelPricing::new(5.0, 25.0, 0.5, 6.25));
    table
}

fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

fn aggregate_fixture() -> SessionReport {
    Aggregator::new(SourceLayout::new(fixture_root()), scenario_pricing())
        .aggregate(&SessionQuery::new(SESSION_ID))
}

/// Copy a file tree so tests can modify it
fn copy_tree(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), target).unwrap();
        }
    }
}

// ============================================
// Aggregation
// ============================================

#[test]
fn test_fixture_session_report() {
    let report = aggregate_fixture();

    assert_eq!(report.session_id, SESSION_ID);
    assert_eq!(report.project.as_deref(), Some("/work/app"));

    // Tokens from the two valid assistant records
    assert_eq!(report.tokens.input, 300);
    assert_eq!(report.tokens.output, 50);
    assert_eq!(report.tokens.cache_read, 10);
    assert_eq!(report.tokens.cache_creation, 0);
    assert_eq!(report.tokens.total, 360);
    assert_eq!(report.tokens.model.as_deref(), Some("model-a"));
    // round((300*5 + 50*25 + 10*0.5) / 1e6, 4)
    assert_eq!(report.tokens.cost_usd, 0.0028);

    assert_eq!(report.messages.user, 3);
    assert_eq!(report.messages.assistant, 2);
    assert_eq!(report.messages.total, 5);

    assert_eq!(report.tools.total_calls, 2);
    assert_eq!(report.tools.by_type.get("Read"), 1);
    assert_eq!(report.tools.by_type.get("Task"), 1);
    assert_eq!(report.tools.success_rate, 0.5);
    assert_eq!(report.tools.by_type.len(), 2);
    assert_eq!(report.agents.by_type.get("Explore"), 1);
    assert_eq!(report.skills.total_calls, 0);

    // Subdirectories of the file history are not touched files
    assert_eq!(report.files.modified, vec!["lib.rs", "main.rs"]);
    assert_eq!(report.files.read, vec!["/work/app/src/lib.rs"]);
    assert!(report.files.created.is_empty());

    assert_eq!(
        report.timing.start_time,
        Some(Timestamp::Text("2025-01-01T10:00:00.000Z".to_string()))
    );
    assert_eq!(
        report.timing.end_time,
        Some(Timestamp::Text("2025-01-01T10:02:05.000Z".to_string()))
    );
    assert_eq!(report.timing.duration_minutes, 2.08);
    assert_eq!(report.timing.duration_formatted, "2m 5s");

    assert_eq!(report.performance.slow_operations.len(), 1);
    assert_eq!(report.performance.slow_operations[0].operation, "git status");
    assert_eq!(report.performance.slow_operations[0].duration_ms, 1200);
    assert_eq!(report.performance.errors.len(), 1);
    // Debug log samples take precedence over session log durations
    assert_eq!(report.performance.average_tool_response_ms, 41);
    assert_eq!(
        report.performance.response_time_source,
        ResponseTimeSource::DebugLog
    );
}

#[test]
fn test_sources_are_absolute_paths() {
    let report = aggregate_fixture();

    let session_log = report.sources.session_log.expect("session log path");
    let debug_log = report.sources.debug_log.expect("debug log path");
    let file_history = report.sources.file_history.expect("file history path");
    let history = report.sources.history.expect("prompt history path");
    let stats_cache = report.sources.stats_cache.expect("stats cache path");

    for path in [&session_log, &debug_log, &file_history, &history, &stats_cache] {
        assert!(path.is_absolute(), "{} is not absolute", path.display());
    }
    assert!(session_log.ends_with("projects/-work-app/scenario-001.jsonl"));
    assert!(debug_log.ends_with("debug/scenario-001.txt"));
    assert!(file_history.ends_with("file-history/scenario-001"));
    assert!(history.ends_with("history.jsonl"));
    assert!(stats_cache.ends_with("stats-cache.json"));
}

#[test]
fn test_session_with_no_sources() {
    let dir = TempDir::new().unwrap();
    let report = Aggregator::new(SourceLayout::new(dir.path()), PricingTable::builtin())
        .aggregate(&SessionQuery::new("does-not-exist"));

    assert_eq!(report.tokens.total, 0);
    assert_eq!(report.tokens.cost_usd, 0.0);
    assert_eq!(report.messages.total, 0);
    assert_eq!(report.tools.total_calls, 0);
    assert!(report.tools.by_type.is_empty());
    assert_eq!(report.timing.start_time, None);
    assert_eq!(report.timing.end_time, None);
    assert_eq!(report.timing.duration_minutes, 0.0);
    assert!(report.files.modified.is_empty());
    assert!(report.files.read.is_empty());
    assert!(report.performance.slow_operations.is_empty());
    assert!(report.performance.errors.is_empty());
    assert_eq!(report.performance.average_tool_response_ms, 0);
    assert!(report.sources.session_log.is_none());
    assert!(report.sources.debug_log.is_none());
    assert!(report.sources.file_history.is_none());
    assert!(report.sources.history.is_none());
    assert!(report.sources.stats_cache.is_none());
}

#[test]
fn test_aggregation_is_idempotent() {
    let aggregator = Aggregator::new(SourceLayout::new(fixture_root()), scenario_pricing());
    let query = SessionQuery::new(SESSION_ID);

    let first = aggregator.aggregate_at(&query, at("2025-06-01T00:00:00Z"));
    let second = aggregator.aggregate_at(&query, at("2025-06-02T00:00:00Z"));
    assert_ne!(first.metadata.generated_at, second.metadata.generated_at);

    let mut first_json = serde_json::to_value(&first).unwrap();
    let mut second_json = serde_json::to_value(&second).unwrap();
    first_json["metadata"]["generated_at"] = serde_json::Value::Null;
    second_json["metadata"]["generated_at"] = serde_json::Value::Null;
    assert_eq!(
        serde_json::to_string(&first_json).unwrap(),
        serde_json::to_string(&second_json).unwrap()
    );

    // Same generation time gives an identical report
    let third = aggregator.aggregate_at(&query, at("2025-06-01T00:00:00Z"));
    assert_eq!(first, third);
}

#[test]
fn test_malformed_lines_do_not_affect_valid_ones() {
    let log = std::fs::read_to_string(
        fixture_root().join("projects/-work-app/scenario-001.jsonl"),
    )
    .unwrap();
    let clean: String = log
        .lines()
        .filter(|line| serde_json::from_str::<serde_json::Value>(line).is_ok())
        .map(|line| format!("{}\n", line))
        .collect();

    let reader = SessionLogReader::new();
    let with_noise = reader.read(log.as_bytes());
    let without_noise = reader.read(clean.as_bytes());

    assert_eq!(with_noise.skipped_lines, 2);
    assert_eq!(without_noise.skipped_lines, 0);
    assert_eq!(with_noise.tokens, without_noise.tokens);
    assert_eq!(with_noise.tools, without_noise.tools);
    assert_eq!(with_noise.timestamps, without_noise.timestamps);
    assert_eq!(with_noise.total_messages(), without_noise.total_messages());
}

#[test]
fn test_project_hint_locates_log() {
    let dir = TempDir::new().unwrap();
    copy_tree(&fixture_root(), dir.path());

    // A second log with the same id under another project sorts first
    let other = dir.path().join("projects/-a-other");
    std::fs::create_dir_all(&other).unwrap();
    std::fs::write(
        other.join("scenario-001.jsonl"),
        r#"{"type":"user","cwd":"/a/other"}"#,
    )
    .unwrap();

    let aggregator = Aggregator::new(SourceLayout::new(dir.path()), scenario_pricing());

    // The prompt history knows the session's project
    let from_history = aggregator.aggregate(&SessionQuery::new(SESSION_ID));
    assert_eq!(from_history.project.as_deref(), Some("/work/app"));
    assert_eq!(from_history.tokens.total, 360);

    std::fs::remove_file(dir.path().join("history.jsonl")).unwrap();

    let unhinted = aggregator.aggregate(&SessionQuery::new(SESSION_ID));
    assert_eq!(unhinted.project.as_deref(), Some("/a/other"));
    assert_eq!(unhinted.tokens.total, 0);
    assert!(unhinted.sources.history.is_none());

    let hinted = aggregator.aggregate(&SessionQuery::new(SESSION_ID).with_project("/work/app"));
    assert_eq!(hinted.project.as_deref(), Some("/work/app"));
    assert_eq!(hinted.tokens.total, 360);
}

#[test]
fn test_session_log_only_durations_fallback() {
    let dir = TempDir::new().unwrap();
    copy_tree(&fixture_root(), dir.path());
    std::fs::remove_file(dir.path().join("debug/scenario-001.txt")).unwrap();

    let report = Aggregator::new(SourceLayout::new(dir.path()), scenario_pricing())
        .aggregate(&SessionQuery::new(SESSION_ID));

    assert!(report.sources.debug_log.is_none());
    assert!(report.performance.slow_operations.is_empty());
    assert_eq!(report.performance.average_tool_response_ms, 120);
    assert_eq!(
        report.performance.response_time_source,
        ResponseTimeSource::SessionLog
    );
}

#[test]
fn test_latest_session_selects_fixture() {
    let layout = SourceLayout::new(fixture_root());
    assert_eq!(layout.latest_session(None).unwrap(), SESSION_ID);
    assert_eq!(
        layout.latest_session(Some(Path::new("/work/other"))).unwrap(),
        "scenario-000"
    );
}

#[test]
fn test_history_sessions() {
    let layout = SourceLayout::new(fixture_root());

    let all = layout.sessions(&HistoryFilter::new()).unwrap();
    let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![SESSION_ID, "scenario-000"]);
    assert_eq!(all[0].first_timestamp, 1735725600000);
    assert_eq!(all[0].last_timestamp, 1735725720000);

    let app_only = layout
        .sessions(&HistoryFilter::new().with_project("/work/app"))
        .unwrap();
    assert_eq!(app_only.len(), 1);
    assert_eq!(app_only[0].id, SESSION_ID);
}

#[test]
fn test_session_log_total_duration_fallback() {
    let dir = TempDir::new().unwrap();
    copy_tree(&fixture_root(), dir.path());
    std::fs::remove_file(dir.path().join("debug/scenario-001.txt")).unwrap();
    std::fs::write(
        dir.path().join("projects/-work-app/scenario-001.jsonl"),
        r#"{"type":"user","toolUseResult":{"totalDurationMs":4200}}
{"type":"user","toolUseResult":{"totalDurationMs":1801}}
"#,
    )
    .unwrap();

    let report = Aggregator::new(SourceLayout::new(dir.path()), scenario_pricing())
        .aggregate(&SessionQuery::new(SESSION_ID));

    assert_eq!(report.performance.average_tool_response_ms, 3000);
    assert_eq!(
        report.performance.response_time_source,
        ResponseTimeSource::SessionLog
    );
}

// ============================================
// Writing
// ============================================

#[test]
fn test_write_and_reload_report() {
    let out = TempDir::new().unwrap();
    let report = aggregate_fixture();

    let written = ReportWriter::new(out.path()).write(&report).unwrap();

    let reloaded: SessionReport =
        serde_json::from_str(&std::fs::read_to_string(&written.json_path).unwrap()).unwrap();
    assert_eq!(reloaded, report);

    let markdown = std::fs::read_to_string(written.markdown_path.unwrap()).unwrap();
    assert!(markdown.contains("# Session Report: scenario-001"));
    assert!(markdown.contains("| **Total** | **360** |"));
    assert!(markdown.contains("| Read | 1 |"));
    assert!(markdown.contains("| Explore | 1 |"));
    assert!(markdown.contains("| git status | 1,200 |"));
    assert!(markdown.contains("Duration | 2m 5s |"));
    assert!(markdown.contains("50.0% succeeded"));
    assert!(markdown.contains("- Prompt history: `"));
    assert!(!markdown.contains("{{"));
}

#[test]
fn test_rewrite_overwrites_previous_output() {
    let out = TempDir::new().unwrap();
    let writer = ReportWriter::new(out.path());

    let first = aggregate_fixture();
    writer.write(&first).unwrap();

    let empty_root = TempDir::new().unwrap();
    let second = Aggregator::new(SourceLayout::new(empty_root.path()), scenario_pricing())
        .aggregate(&SessionQuery::new(SESSION_ID));
    let written = writer.write(&second).unwrap();

    let reloaded: SessionReport =
        serde_json::from_str(&std::fs::read_to_string(written.json_path).unwrap()).unwrap();
    assert_eq!(reloaded.tokens.total, 0);
}
