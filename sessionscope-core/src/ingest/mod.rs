//! Ingestion layer for reading a session's source files
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌─────────────────────┐     ┌───────────────┐
//! │    Source Files      │ ──► │    SourceReader     │ ──► │  Aggregator   │
//! │ (~/.claude/...)      │     │  ├─ SessionLogReader│     │ (SessionReport)│
//! └──────────────────────┘     │  ├─ DebugLogReader  │     └───────────────┘
//!                              │  └─ FileActivity... │
//!                              └─────────────────────┘
//! ```
//!
//! All sources live under one data root:
//!
//! | Source | Location |
//! |--------|----------|
//! | Session log | `<root>/projects/<encoded-project>/<session_id>.jsonl` |
//! | Debug log | `<root>/debug/<session_id>.txt` |
//! | File history | `<root>/file-history/<session_id>/` |
//! | Prompt history | `<root>/history.jsonl` |
//! | Usage stats cache | `<root>/stats-cache.json` (provenance only) |

mod reader;
pub mod readers;

pub use reader::{SessionQuery, SourceKind, SourceReader, Sourced};
pub use readers::{
    DebugLogReader, DebugLogSummary, FileActivity, FileActivityLister, History, HistoryFilter,
    HistoryReader, SessionEntry, SessionLogReader, SessionLogSummary,
};

pub(crate) use reader::absolute;

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Locations of session sources under an assistant data root.
#[derive(Debug, Clone)]
pub struct SourceLayout {
    root: PathBuf,
}

impl SourceLayout {
    /// Layout rooted at `root` (normally `~/.claude`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    /// Directory holding one project's session logs.
    pub fn project_dir(&self, project: &Path) -> PathBuf {
        self.projects_dir().join(encode_project_path(project))
    }

    pub fn debug_log(&self, session_id: &str) -> PathBuf {
        self.root.join("debug").join(format!("{}.txt", session_id))
    }

    pub fn file_history_dir(&self, session_id: &str) -> PathBuf {
        self.root.join("file-history").join(session_id)
    }

    pub fn history_file(&self) -> PathBuf {
        self.root.join("history.jsonl")
    }

    pub fn stats_cache(&self) -> PathBuf {
        self.root.join("stats-cache.json")
    }

    /// Sessions recorded in the prompt history that pass `filter`, most
    /// recently active first. Empty when there is no history file.
    pub fn sessions(&self, filter: &HistoryFilter) -> Result<Vec<SessionEntry>> {
        let path = self.history_file();
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "No prompt history");
            return Ok(Vec::new());
        }
        let history = HistoryReader::with_filter(filter.clone()).read_path(&path)?;
        Ok(history.sessions)
    }

    /// Find a session log, checking the hinted project directory first.
    ///
    /// Without a hint (or on a miss) every `projects/*/<id>.jsonl` is
    /// considered and the first in sorted path order wins.
    pub fn find_session_log(&self, session_id: &str, project: Option<&Path>) -> Option<PathBuf> {
        let file_name = format!("{}.jsonl", session_id);

        if let Some(project) = project {
            let hinted = self.project_dir(project).join(&file_name);
            if hinted.is_file() {
                return Some(hinted);
            }
            tracing::debug!(
                path = %hinted.display(),
                "Session log not under hinted project, searching all projects"
            );
        }

        let pattern = self
            .projects_dir()
            .join("*")
            .join(glob::Pattern::escape(&file_name));
        let mut matches: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
            .map(|paths| paths.flatten().filter(|p| p.is_file()).collect())
            .unwrap_or_default();
        matches.sort();
        matches.into_iter().next()
    }

    /// Session id of the most recently active session, optionally restricted
    /// to one project.
    ///
    /// The prompt history decides. When it is missing or has no matching
    /// session, the most recently modified session log is used instead.
    pub fn latest_session(&self, project: Option<&Path>) -> Result<String> {
        let mut filter = HistoryFilter::new();
        if let Some(p) = project {
            filter = filter.with_project(p.to_string_lossy());
        }
        if let Some(entry) = self.sessions(&filter)?.into_iter().next() {
            return Ok(entry.id);
        }
        tracing::debug!("No matching session in prompt history, using newest session log");
        self.latest_session_log(project)
    }

    /// Session id of the most recently modified session log.
    fn latest_session_log(&self, project: Option<&Path>) -> Result<String> {
        let dir_pattern = match project {
            Some(p) => glob::Pattern::escape(&self.project_dir(p).to_string_lossy()),
            None => format!(
                "{}/*",
                glob::Pattern::escape(&self.projects_dir().to_string_lossy())
            ),
        };
        let pattern = format!("{}/*.jsonl", dir_pattern);

        let entries = glob::glob(&pattern)
            .map_err(|e| Error::Config(format!("invalid source pattern: {}", e)))?;

        let mut latest: Option<(SystemTime, PathBuf)> = None;
        for path in entries.flatten() {
            let modified = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let newer = match &latest {
                Some((best, best_path)) => (modified, &path) > (*best, best_path),
                None => true,
            };
            if newer {
                latest = Some((modified, path));
            }
        }

        latest
            .and_then(|(_, path)| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_string())
            })
            .ok_or_else(|| {
                Error::SessionNotFound(match project {
                    Some(p) => format!("no session logs for project {}", p.display()),
                    None => format!("no session logs under {}", self.projects_dir().display()),
                })
            })
    }
}

/// Encode a project path the way the assistant names its project
/// directories: path separators, dots and underscores become `-`.
pub fn encode_project_path(project: &Path) -> String {
    project
        .to_string_lossy()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '.' | '_' => '-',
            other => other,
        })
        .collect()
}
