//! Source-specific readers
//!
//! Each session source has a reader module that implements
//! the [`SourceReader`](super::SourceReader) trait.
//!
//! | Source | Module | Format |
//! |--------|--------|--------|
//! | Session log | [`session_log`] | JSON Lines |
//! | Debug log | [`debug_log`] | free text |
//! | File history | [`file_activity`] | directory listing |
//! | Prompt history | [`history`] | JSON Lines |

pub mod debug_log;
pub mod file_activity;
pub mod history;
pub mod session_log;

pub use debug_log::{DebugLogReader, DebugLogSummary};
pub use file_activity::{FileActivity, FileActivityLister};
pub use history::{History, HistoryFilter, HistoryReader, SessionEntry};
pub use session_log::{SessionLogReader, SessionLogSummary};
