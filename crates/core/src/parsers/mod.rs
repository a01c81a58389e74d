mod callgraph;
pub mod report;

pub use callgraph::SKIPPED_CALLGRAPH_MARKER;
pub use report::{
    ParseDiagnostic, ParsedReport, ReportParseError, parse_event_reports, parse_report,
    parse_report_text,
};
