//! Aggregation of reader outputs into a [`SessionReport`]
//!
//! The [`Aggregator`] runs the readers against a [`SourceLayout`] and hands
//! their outputs to [`build_report`], which is pure apart from the generation
//! timestamp it is given. Nothing in aggregation is fatal: a missing source
//! contributes its empty value and a null provenance path.
//!
//! The prompt history is read first. When it knows the session's project and
//! the caller gave no project, that project locates the session log.

use super::{
    AgentReport, FileReport, MessageCounts, Metadata, Performance, SessionReport, SkillReport,
    Sources, Timing, TokenReport, ToolReport, GENERATOR_VERSION, SCHEMA_VERSION,
};
use crate::format::format_duration_secs;
use crate::ingest::{
    absolute, DebugLogReader, DebugLogSummary, FileActivity, FileActivityLister, History,
    HistoryReader, SessionLogReader, SessionLogSummary, SessionQuery, SourceLayout, SourceReader,
    Sourced,
};
use crate::pricing::{round_to, PricingTable};
use crate::types::Timestamp;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where `performance.average_tool_response_ms` came from.
///
/// Checked in declaration order; the first source with samples wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTimeSource {
    /// Mean of the debug log's `Tool ... completed in` samples
    DebugLog,
    /// Mean of the session log's tool-result durations
    SessionLog,
    /// No samples anywhere; the average is 0
    None,
}

impl ResponseTimeSource {
    /// Pick the source for the average tool response time.
    pub fn select(debug: &DebugLogSummary, session: &SessionLogSummary) -> Self {
        if debug.has_timings() {
            ResponseTimeSource::DebugLog
        } else if !session.tool_durations_ms.is_empty() {
            ResponseTimeSource::SessionLog
        } else {
            ResponseTimeSource::None
        }
    }

    /// The average according to this source.
    pub fn average_ms(&self, debug: &DebugLogSummary, session: &SessionLogSummary) -> u64 {
        match self {
            ResponseTimeSource::DebugLog => debug.average_tool_ms(),
            ResponseTimeSource::SessionLog => session.average_tool_duration_ms(),
            ResponseTimeSource::None => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseTimeSource::DebugLog => "debug_log",
            ResponseTimeSource::SessionLog => "session_log",
            ResponseTimeSource::None => "none",
        }
    }
}

impl fmt::Display for ResponseTimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Milliseconds between two timestamps.
///
/// 0 when either bound is missing or does not resolve to an instant, or when
/// the window runs backwards.
fn elapsed_ms(start: Option<&Timestamp>, end: Option<&Timestamp>) -> u64 {
    let (Some(start), Some(end)) = (
        start.and_then(Timestamp::instant),
        end.and_then(Timestamp::instant),
    ) else {
        return 0;
    };
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}

/// Minutes between two timestamps, rounded to two decimals.
///
/// 0 when either bound is missing or does not resolve to an instant, or when
/// the window runs backwards.
pub fn duration_minutes(start: Option<&Timestamp>, end: Option<&Timestamp>) -> f64 {
    round_to(elapsed_ms(start, end) as f64 / 60_000.0, 2)
}

/// Everything read for one session.
#[derive(Debug, Clone, Default)]
pub struct SessionSources {
    pub session: Sourced<SessionLogSummary>,
    pub debug: Sourced<DebugLogSummary>,
    pub files: Sourced<FileActivity>,
    pub history: Sourced<History>,
    /// Usage stats cache, recorded for provenance only
    pub stats_cache: Option<PathBuf>,
}

/// Combine reader outputs into a report.
///
/// The project is the one the prompt history records for the session, else
/// the caller's hint, else the session log's working directory.
pub fn build_report(
    query: &SessionQuery,
    sources: SessionSources,
    pricing: &PricingTable,
    generated_at: DateTime<Utc>,
) -> SessionReport {
    let SessionSources {
        session,
        debug,
        files,
        history,
        stats_cache,
    } = sources;
    let log = &session.data;

    let start_time = log.first_timestamp().cloned();
    let end_time = log.last_timestamp().cloned();
    let elapsed = elapsed_ms(start_time.as_ref(), end_time.as_ref());

    let model = log.primary_model();
    let cost = pricing.cost(&log.tokens, model);

    let response_source = ResponseTimeSource::select(&debug.data, log);
    let average_tool_response_ms = response_source.average_ms(&debug.data, log);

    let project = history
        .data
        .find(&query.session_id)
        .map(|entry| entry.project.clone())
        .filter(|p| !p.is_empty())
        .or_else(|| {
            query
                .project
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
        })
        .or_else(|| log.cwd.clone());

    SessionReport {
        schema_version: SCHEMA_VERSION.to_string(),
        session_id: query.session_id.clone(),
        project,
        timing: Timing {
            start_time,
            end_time,
            duration_minutes: round_to(elapsed as f64 / 60_000.0, 2),
            // Whole seconds, truncated from the unrounded window
            duration_formatted: format_duration_secs(elapsed / 1000),
        },
        messages: MessageCounts {
            user: log.user_messages,
            assistant: log.assistant_messages,
            total: log.total_messages(),
        },
        tokens: TokenReport::new(log.tokens, model.map(str::to_string), cost),
        tools: ToolReport {
            total_calls: log.tools.total(),
            by_type: log.tools.clone(),
            success_rate: round_to(log.tool_success_rate(), 4),
        },
        agents: AgentReport {
            total_calls: log.agents.total(),
            by_type: log.agents.clone(),
        },
        skills: SkillReport {
            total_calls: log.skills.total(),
            by_name: log.skills.clone(),
        },
        files: FileReport {
            modified: files.data.files,
            read: log.files_read.iter().cloned().collect(),
            created: log.files_created.iter().cloned().collect(),
        },
        performance: Performance {
            slow_operations: debug.data.slow_operations,
            errors: debug.data.errors,
            average_tool_response_ms,
            response_time_source: response_source,
        },
        sources: Sources {
            session_log: session.path,
            debug_log: debug.path,
            file_history: files.path,
            history: history.path,
            stats_cache,
        },
        metadata: Metadata {
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            generator_version: GENERATOR_VERSION.to_string(),
        },
    }
}

/// Reads a session's sources and aggregates them.
#[derive(Debug, Clone)]
pub struct Aggregator {
    layout: SourceLayout,
    pricing: PricingTable,
}

impl Aggregator {
    pub fn new(layout: SourceLayout, pricing: PricingTable) -> Self {
        Self { layout, pricing }
    }

    pub fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Read every source for `query` once and build the report.
    pub fn aggregate(&self, query: &SessionQuery) -> SessionReport {
        self.aggregate_at(query, Utc::now())
    }

    /// Like [`aggregate`](Self::aggregate) with a fixed generation time.
    pub fn aggregate_at(&self, query: &SessionQuery, generated_at: DateTime<Utc>) -> SessionReport {
        let sources = self.read_sources(query);
        let report = build_report(query, sources, &self.pricing, generated_at);

        tracing::info!(
            session_id = %report.session_id,
            messages = report.messages.total,
            tokens = report.tokens.total,
            cost_usd = report.tokens.cost_usd,
            response_time_source = %report.performance.response_time_source,
            "Session aggregated"
        );

        report
    }

    /// Read each source once.
    pub fn read_sources(&self, query: &SessionQuery) -> SessionSources {
        let history = HistoryReader::new().collect(&self.layout, query);

        let known_project = history
            .data
            .find(&query.session_id)
            .map(|entry| entry.project.as_str())
            .filter(|p| !p.is_empty());
        let located = match (&query.project, known_project) {
            (None, Some(project)) => {
                tracing::debug!(project, "Locating session log through prompt history");
                query.clone().with_project(project)
            }
            _ => query.clone(),
        };

        let session = SessionLogReader::new().collect(&self.layout, &located);
        let debug = DebugLogReader::new().collect(&self.layout, query);
        let files = FileActivityLister::new().collect(&self.layout, query);

        if session.path.is_none() && debug.path.is_none() && files.path.is_none() {
            tracing::warn!(
                session_id = %query.session_id,
                root = %self.layout.root().display(),
                "No sources found for session"
            );
        }

        let stats_cache = Some(self.layout.stats_cache())
            .filter(|path| path.is_file())
            .map(|path| absolute(&path));

        SessionSources {
            session,
            debug,
            files,
            history,
            stats_cache,
        }
    }
}
