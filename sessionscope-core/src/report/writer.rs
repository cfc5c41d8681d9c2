//! Report persistence
//!
//! Writes `<output_dir>/<session_id>.json` and, unless disabled,
//! `<output_dir>/<session_id>.md`. Existing files are overwritten.

use super::SessionReport;
use crate::config::Config;
use crate::error::Result;
use crate::template::Template;
use std::fs;
use std::path::{Path, PathBuf};

/// Which template renders the markdown report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// A template file; failing to read it is an error
    File(PathBuf),
    /// The template compiled into the library
    Builtin,
}

impl TemplateSource {
    /// Pick a template: the explicit path if given, else the file at the
    /// default location if it exists, else the built-in one.
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        Self::resolve_with_default(explicit, &Config::default_template_path())
    }

    fn resolve_with_default(explicit: Option<PathBuf>, default: &Path) -> Self {
        match explicit {
            Some(path) => TemplateSource::File(path),
            None if default.is_file() => TemplateSource::File(default.to_path_buf()),
            None => TemplateSource::Builtin,
        }
    }

    pub fn load(&self) -> Result<Template> {
        match self {
            TemplateSource::File(path) => {
                let text = fs::read_to_string(path)?;
                tracing::debug!(path = %path.display(), "Loaded report template");
                Ok(Template::parse(&text))
            }
            TemplateSource::Builtin => Ok(Template::builtin()),
        }
    }
}

/// Paths written for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    pub json_path: PathBuf,
    pub markdown_path: Option<PathBuf>,
    /// The rendered markdown, when it was written
    pub markdown: Option<String>,
}

/// Writes reports into one output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
    template: Option<TemplateSource>,
}

impl ReportWriter {
    /// Writer producing JSON and markdown, rendered with the built-in
    /// template.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            template: Some(TemplateSource::Builtin),
        }
    }

    pub fn with_template(mut self, template: TemplateSource) -> Self {
        self.template = Some(template);
        self
    }

    /// Skip the markdown report.
    pub fn json_only(mut self) -> Self {
        self.template = None;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Base file name for a session: path separators become `_`.
    pub fn file_stem(session_id: &str) -> String {
        session_id.replace(['/', '\\'], "_")
    }

    pub fn write(&self, report: &SessionReport) -> Result<WrittenReport> {
        fs::create_dir_all(&self.output_dir)?;
        let stem = Self::file_stem(&report.session_id);

        let json_path = self.output_dir.join(format!("{}.json", stem));
        let mut json = serde_json::to_string_pretty(report)?;
        json.push('\n');
        fs::write(&json_path, json)?;
        tracing::info!(path = %json_path.display(), "Wrote JSON report");

        let Some(source) = &self.template else {
            return Ok(WrittenReport {
                json_path,
                markdown_path: None,
                markdown: None,
            });
        };

        let markdown = source.load()?.render_report(report)?;
        let markdown_path = self.output_dir.join(format!("{}.md", stem));
        fs::write(&markdown_path, &markdown)?;
        tracing::info!(path = %markdown_path.display(), "Wrote markdown report");

        Ok(WrittenReport {
            json_path,
            markdown_path: Some(markdown_path),
            markdown: Some(markdown),
        })
    }
}
