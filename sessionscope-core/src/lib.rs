//! # sessionscope-core
//!
//! Core library for sessionscope - per-session telemetry reports for an
//! AI coding assistant.
//!
//! This library provides:
//! - Readers for a session's event log, debug log, file history and the prompt history
//! - Aggregation into one normalized [`SessionReport`]
//! - A per-model pricing table for cost estimates
//! - A small template language for rendering the report as markdown
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows one way:
//!
//! ```text
//! Readers ──► Aggregator (+ PricingTable) ──► SessionReport ──► Template ──► ReportWriter
//! ```
//!
//! A missing source never fails a run; its part of the report is empty and
//! its provenance path is null. Only writing the report surfaces errors.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sessionscope_core::{Aggregator, Config, ReportWriter, SessionQuery, SourceLayout};
//!
//! let config = Config::load().expect("failed to load config");
//! let aggregator = Aggregator::new(
//!     SourceLayout::new(config.claude_root()),
//!     config.pricing.table(),
//! );
//!
//! let report = aggregator.aggregate(&SessionQuery::new("0b6c9f2e"));
//! ReportWriter::new(config.output_dir())
//!     .write(&report)
//!     .expect("failed to write report");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::{HistoryFilter, SessionQuery, SourceLayout};
pub use pricing::{ModelPricing, PricingTable};
pub use report::{Aggregator, ReportWriter, SessionReport, TemplateSource, WrittenReport};
pub use template::Template;
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod pricing;
pub mod report;
pub mod template;
pub mod types;
