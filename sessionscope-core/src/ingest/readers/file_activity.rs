//! File-activity lister
//!
//! The assistant keeps per-session file history under
//! `<root>/file-history/<session_id>/`; each regular file in it names a
//! touched file. Subdirectories are not listed.

use crate::error::Result;
use crate::ingest::reader::{SessionQuery, SourceKind, SourceReader};
use crate::ingest::SourceLayout;
use std::path::{Path, PathBuf};

/// File names recorded for a session, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileActivity {
    pub files: Vec<String>,
}

/// Lists the per-session file history directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileActivityLister;

impl FileActivityLister {
    pub fn new() -> Self {
        Self
    }
}

impl SourceReader for FileActivityLister {
    type Output = FileActivity;

    fn kind(&self) -> SourceKind {
        SourceKind::FileHistory
    }

    fn locate(&self, layout: &SourceLayout, query: &SessionQuery) -> Option<PathBuf> {
        let dir = layout.file_history_dir(&query.session_id);
        dir.is_dir().then_some(dir)
    }

    fn read_path(&self, path: &Path) -> Result<FileActivity> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();
        Ok(FileActivity { files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lists_sorted_file_names() {
        let dir = TempDir::new().unwrap();
        let history = dir.path().join("file-history/s1");
        std::fs::create_dir_all(&history).unwrap();
        std::fs::write(history.join("main.rs"), "").unwrap();
        std::fs::write(history.join("lib.rs"), "").unwrap();
        std::fs::create_dir(history.join("nested")).unwrap();
        std::fs::write(history.join("nested/inner.rs"), "").unwrap();

        let layout = SourceLayout::new(dir.path());
        let sourced = FileActivityLister::new().collect(&layout, &SessionQuery::new("s1"));

        assert!(sourced.path.is_some());
        assert_eq!(sourced.data.files, vec!["lib.rs", "main.rs"]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let layout = SourceLayout::new(dir.path());
        let sourced = FileActivityLister::new().collect(&layout, &SessionQuery::new("nope"));

        assert!(sourced.path.is_none());
        assert!(sourced.data.files.is_empty());
    }
}
