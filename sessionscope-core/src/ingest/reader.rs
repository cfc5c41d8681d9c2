//! Reader trait abstraction
//!
//! Each session source (session log, debug log, file history, prompt history) is read by a
//! type implementing [`SourceReader`], giving the aggregator one uniform way
//! to locate, read and degrade a source.
//!
//! ## Design Principles
//!
//! 1. **Best effort**: a missing source yields the reader's empty output, never an error
//! 2. **Resilience**: malformed records are skipped, not fatal
//! 3. **Provenance**: the absolute path of every source actually read is reported
//! 4. **Isolation**: readers share no state and can be tested with one crafted file

use crate::error::Result;
use crate::ingest::SourceLayout;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Which session source a reader handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Structured JSONL event log
    SessionLog,
    /// Free-text diagnostic log
    DebugLog,
    /// Per-session file history directory
    FileHistory,
    /// Prompt history across all sessions
    History,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::SessionLog => "session_log",
            SourceKind::DebugLog => "debug_log",
            SourceKind::FileHistory => "file_history",
            SourceKind::History => "history",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies the session being reported on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionQuery {
    /// Opaque session identifier
    pub session_id: String,
    /// Project path, used only to disambiguate the session log location
    pub project: Option<PathBuf>,
}

impl SessionQuery {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            project: None,
        }
    }

    pub fn with_project(mut self, project: impl Into<PathBuf>) -> Self {
        self.project = Some(project.into());
        self
    }
}

/// A reader's output together with the source it came from.
///
/// `path` is `None` when the source was absent or unreadable.
#[derive(Debug, Clone, Default)]
pub struct Sourced<T> {
    pub path: Option<PathBuf>,
    pub data: T,
}

impl<T: Default> Sourced<T> {
    /// The documented empty value for a missing source.
    pub fn missing() -> Self {
        Self {
            path: None,
            data: T::default(),
        }
    }
}

/// Trait implemented by all session source readers.
pub trait SourceReader {
    /// What this reader extracts; `Default` is the empty result.
    type Output: Default;

    /// Which source this reader handles
    fn kind(&self) -> SourceKind;

    /// Find the source for a session, `None` if it does not exist.
    fn locate(&self, layout: &SourceLayout, query: &SessionQuery) -> Option<PathBuf>;

    /// Read a source at a known path.
    ///
    /// ## Error Handling
    ///
    /// - Individual malformed records are skipped, not returned as errors
    /// - Only I/O failures on the source itself return `Err`
    fn read_path(&self, path: &Path) -> Result<Self::Output>;

    /// Locate and read a source, degrading to the empty output when the
    /// source is missing or cannot be read.
    fn collect(&self, layout: &SourceLayout, query: &SessionQuery) -> Sourced<Self::Output> {
        let Some(path) = self.locate(layout, query) else {
            tracing::debug!(
                source = %self.kind(),
                session_id = %query.session_id,
                "Source not found"
            );
            return Sourced::missing();
        };

        match self.read_path(&path) {
            Ok(data) => {
                tracing::debug!(source = %self.kind(), path = %path.display(), "Source read");
                Sourced {
                    path: Some(absolute(&path)),
                    data,
                }
            }
            Err(e) => {
                tracing::warn!(
                    source = %self.kind(),
                    path = %path.display(),
                    error = %e,
                    "Failed to read source, treating as missing"
                );
                Sourced::missing()
            }
        }
    }
}

/// Best-effort absolute form of a path.
pub(crate) fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_names() {
        assert_eq!(SourceKind::SessionLog.as_str(), "session_log");
        assert_eq!(SourceKind::DebugLog.to_string(), "debug_log");
        assert_eq!(
            serde_json::to_value(SourceKind::FileHistory).unwrap(),
            serde_json::json!("file_history")
        );
    }

    #[test]
    fn test_session_query_builder() {
        let query = SessionQuery::new("abc").with_project("/work/app");
        assert_eq!(query.session_id, "abc");
        assert_eq!(query.project, Some(PathBuf::from("/work/app")));
    }

    #[test]
    fn test_missing_is_empty() {
        let sourced: Sourced<Vec<String>> = Sourced::missing();
        assert!(sourced.path.is_none());
        assert!(sourced.data.is_empty());
    }
}
