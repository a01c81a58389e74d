//! Reconstructs call graphs from the text output of `simpleperf report`.
//!
//! [`parsers::parse_event_reports`] turns report lines into one
//! [`model::EventReport`] per profiled event. [`source`] obtains that text
//! from a report file or by running simpleperf.

pub mod model;
pub mod parsers;
pub mod source;

use thiserror::Error;

use crate::parsers::{ParsedReport, ReportParseError};
use crate::source::{ReportSource, SourceError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("parse error: {0}")]
    Parse(#[from] ReportParseError),
}

/// Read a report from `source` and parse it.
pub fn load_report(source: &ReportSource) -> Result<ParsedReport, Error> {
    let text = source.read_text()?;
    let parsed = parsers::parse_report_text(&text)?;
    tracing::debug!(
        event_reports = parsed.event_reports.len(),
        "parsed simpleperf report"
    );
    Ok(parsed)
}
