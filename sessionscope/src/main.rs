//! sessionscope - per-session telemetry reports
//!
//! Reads one or more assistant sessions' logs, aggregates them and writes a
//! JSON record plus a rendered markdown report per session.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{ArgGroup, Parser};
use sessionscope_core::{
    Aggregator, Config, HistoryFilter, ReportWriter, SessionQuery, SessionReport, SourceLayout,
    TemplateSource,
};

#[derive(Parser)]
#[command(name = "sessionscope")]
#[command(about = "Generate telemetry reports for AI assistant sessions")]
#[command(version)]
#[command(group(
    ArgGroup::new("selector")
        .required(true)
        .args(["session", "latest", "date", "all"])
))]
struct Args {
    /// Session ID to report on
    #[arg(short, long)]
    session: Option<String>,

    /// Report on the most recently active session
    #[arg(long)]
    latest: bool,

    /// Report on every session active on this day (YYYY-MM-DD, local time)
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Report on every session in the prompt history
    #[arg(long)]
    all: bool,

    /// Project path, used to locate session logs and to filter history
    #[arg(short, long)]
    project: Option<PathBuf>,

    /// Directory to write reports to
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Template used to render the markdown report
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Assistant data root (default: ~/.claude)
    #[arg(long)]
    claude_root: Option<PathBuf>,

    /// Write only the JSON report
    #[arg(long, conflicts_with_all = ["template", "print"])]
    json_only: bool,

    /// Print the JSON report to stdout instead of writing files
    #[arg(long, conflicts_with_all = ["json_only", "template", "print", "output"])]
    json: bool,

    /// Also print the rendered markdown to stdout
    #[arg(long)]
    print: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected a date like 2025-01-31: {}", e))
}

/// Resolve the selector to the session ids to report on.
fn select_sessions(args: &Args, layout: &SourceLayout) -> Result<Vec<String>> {
    if let Some(id) = &args.session {
        return Ok(vec![id.clone()]);
    }

    if args.latest {
        let id = layout
            .latest_session(args.project.as_deref())
            .context("failed to find the latest session")?;
        return Ok(vec![id]);
    }

    let mut filter = HistoryFilter::new();
    if let Some(project) = &args.project {
        filter = filter.with_project(project.to_string_lossy());
    }
    if let Some(date) = args.date {
        filter = filter.on_date(date);
    }

    let ids: Vec<String> = layout
        .sessions(&filter)
        .context("failed to read the prompt history")?
        .into_iter()
        .map(|entry| entry.id)
        .collect();
    if ids.is_empty() {
        bail!(
            "no sessions found to process in {}",
            layout.history_file().display()
        );
    }
    Ok(ids)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    match args.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }

    // Initialize logging
    let _log_guard = sessionscope_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    let claude_root = args.claude_root.clone().unwrap_or_else(|| config.claude_root());
    let layout = SourceLayout::new(&claude_root);

    let session_ids = select_sessions(&args, &layout)?;

    tracing::info!(
        sessions = session_ids.len(),
        root = %claude_root.display(),
        "Generating session reports"
    );

    let aggregator = Aggregator::new(layout, config.pricing.table());
    let reports: Vec<SessionReport> = session_ids
        .iter()
        .map(|id| {
            let mut query = SessionQuery::new(id);
            if let Some(project) = &args.project {
                query = query.with_project(project);
            }
            aggregator.aggregate(&query)
        })
        .collect();

    if args.json {
        let rendered = match reports.as_slice() {
            [single] => serde_json::to_string_pretty(single),
            many => serde_json::to_string_pretty(many),
        }
        .context("failed to serialize report")?;
        println!("{}", rendered);
        return Ok(());
    }

    let output_dir = args.output.clone().unwrap_or_else(|| config.output_dir());
    let mut writer = ReportWriter::new(&output_dir);
    writer = if args.json_only {
        writer.json_only()
    } else {
        writer.with_template(TemplateSource::resolve(
            args.template.clone().or_else(|| config.template_path()),
        ))
    };

    for report in &reports {
        let written = writer
            .write(report)
            .with_context(|| format!("failed to write report to {}", output_dir.display()))?;

        let mut summary = format!(
            "Session {}\n  JSON:     {}\n",
            report.session_id,
            written.json_path.display()
        );
        if let Some(path) = &written.markdown_path {
            summary.push_str(&format!("  Markdown: {}\n", path.display()));
        }
        if report.sources.session_log.is_none() {
            summary.push_str(&format!(
                "  (no session log found under {})\n",
                claude_root.display()
            ));
        }

        // With --print, stdout carries only the markdown
        match (&written.markdown, args.print) {
            (Some(markdown), true) => {
                eprint!("{}", summary);
                print!("{}", markdown);
            }
            _ => print!("{}", summary),
        }
    }

    if reports.len() > 1 {
        eprintln!("Processed {} sessions", reports.len());
    }

    Ok(())
}
