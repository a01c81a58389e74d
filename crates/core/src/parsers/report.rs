use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::callgraph::{CallGraphBuilder, DetailLine};
use crate::model::{CallTreeNode, EventReport, ReportItem, is_event_marker};

#[derive(Debug, Error)]
pub enum ReportParseError {
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("line {line}: call graph node at column {column} is left of every vertical connector")]
    MalformedCallGraph { line: usize, column: usize },
    #[error("line {line}: call graph node at depth {depth} has no open parent node")]
    DepthGap { line: usize, depth: usize },
    #[error("line {line}: call graph frame has no node to continue")]
    OrphanContinuation { line: usize },
    #[error("line {line}: call graph detail before the first report item")]
    DetailWithoutItem { line: usize },
    #[error("line {line}: invalid percentage {text:?}")]
    InvalidWeight { line: usize, text: String },
}

/// Non-fatal findings collected while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseDiagnostic {
    /// simpleperf elided some call graph branches in brief callgraph mode.
    SkippedCallgraphs { lines: usize },
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkippedCallgraphs { lines } => write!(
                f,
                "some callgraphs are skipped in brief callgraph mode ({lines} elided branches)"
            ),
        }
    }
}

/// Result of parsing a whole report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedReport {
    pub event_reports: Vec<EventReport>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

/// Parse simpleperf report output into one `EventReport` per event.
///
/// Lines must already have their terminators removed.
///
/// The report is a sequence of blank-line separated sections that alternate
/// between context and body:
///
/// ```text
/// Cmdline: /system/bin/simpleperf record -g ./app
/// Arch: arm64
/// Event: cpu-cycles (type 0, config 0)
/// Samples: 1024
///
/// Overhead  Command  Pid   Tid   Shared Object  Symbol
/// 59.38%    app      1234  1234  libc.so        memcpy
///        |
///        -- memcpy
///           |
///           |--62.50%-- copy_frame
///           |    main
///           |
///            --37.50%-- decode_chunk
/// ```
///
/// Lines before the first blank line or `Event:` line are shared by every
/// event. A body starts with a title line, unindented lines start report
/// items and indented lines draw the call graph of the latest item.
pub fn parse_event_reports<S: AsRef<str>>(
    lines: &[S],
) -> Result<ParsedReport, ReportParseError> {
    let common_len = lines
        .iter()
        .position(|line| {
            let line = line.as_ref();
            line.is_empty() || is_event_marker(line)
        })
        .unwrap_or(lines.len());
    let common_context: Vec<String> = lines[..common_len]
        .iter()
        .map(|line| line.as_ref().to_string())
        .collect();

    let mut parser = ReportParser::new(common_context);
    for (idx, line) in lines.iter().enumerate().skip(common_len) {
        parser.feed(line.as_ref(), idx + 1)?;
    }
    Ok(parser.finish())
}

/// Split report text into lines and parse it, logging any diagnostics.
pub fn parse_report_text(text: &str) -> Result<ParsedReport, ReportParseError> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let parsed = parse_event_reports(&lines)?;
    for diagnostic in &parsed.diagnostics {
        tracing::warn!("{diagnostic}");
    }
    Ok(parsed)
}

/// Parse raw report bytes, which must be UTF-8.
pub fn parse_report(data: &[u8]) -> Result<ParsedReport, ReportParseError> {
    parse_report_text(std::str::from_utf8(data)?)
}

/// How a line is handled, given the parser's current mode.
#[derive(Debug)]
enum ReportLine<'a> {
    Blank,
    Context(&'a str),
    Title(&'a str),
    Item(&'a str),
    Detail(&'a str),
}

struct OpenItem {
    item: ReportItem,
    graph: CallGraphBuilder,
}

struct ReportParser {
    common_context: Vec<String>,
    in_context: bool,
    current: EventReport,
    /// Whether `current` has seen its `Event:` line.
    registered: bool,
    item: Option<OpenItem>,
    event_reports: Vec<EventReport>,
    skipped_lines: usize,
}

impl ReportParser {
    fn new(common_context: Vec<String>) -> Self {
        Self {
            current: EventReport::new(&common_context),
            common_context,
            in_context: true,
            registered: false,
            item: None,
            event_reports: Vec::new(),
            skipped_lines: 0,
        }
    }

    fn classify<'a>(&self, line: &'a str) -> ReportLine<'a> {
        if line.is_empty() {
            ReportLine::Blank
        } else if self.in_context {
            ReportLine::Context(line)
        } else if self.current.title.is_none() {
            ReportLine::Title(line)
        } else if line.starts_with(char::is_whitespace) {
            ReportLine::Detail(line)
        } else {
            ReportLine::Item(line)
        }
    }

    fn feed(&mut self, line: &str, line_no: usize) -> Result<(), ReportParseError> {
        match self.classify(line) {
            ReportLine::Blank => {
                self.close_item();
                self.in_context = !self.in_context;
                if self.in_context {
                    self.start_event_report();
                }
            }
            ReportLine::Context(line) => {
                self.current.context.push(line.to_string());
                if is_event_marker(line) && !self.registered {
                    self.registered = true;
                    tracing::debug!(event_line = line, "found event report");
                }
            }
            ReportLine::Title(line) => self.current.title = Some(line.to_string()),
            ReportLine::Item(line) => {
                self.close_item();
                self.item = Some(OpenItem {
                    item: ReportItem::new(line),
                    graph: CallGraphBuilder::default(),
                });
            }
            ReportLine::Detail(line) => self.feed_detail(line, line_no)?,
        }
        Ok(())
    }

    fn feed_detail(&mut self, line: &str, line_no: usize) -> Result<(), ReportParseError> {
        if let Some(open) = self.item.as_mut() {
            open.graph.record_columns(line);
        }
        match DetailLine::classify(line, line_no)? {
            DetailLine::Connector => {}
            DetailLine::Skipped => self.skipped_lines += 1,
            DetailLine::Continuation(frame) => {
                let open = self.open_item(line_no)?;
                open.graph.extend_last(frame, line_no)?;
            }
            DetailLine::Node {
                dash_column,
                weight_percent,
                frame,
            } => {
                let open = self.open_item(line_no)?;
                let node = CallTreeNode::new(weight_percent, frame);
                open.graph.add_node(dash_column, node, line_no)?;
            }
        }
        Ok(())
    }

    fn open_item(&mut self, line_no: usize) -> Result<&mut OpenItem, ReportParseError> {
        self.item
            .as_mut()
            .ok_or(ReportParseError::DetailWithoutItem { line: line_no })
    }

    fn close_item(&mut self) {
        if let Some(OpenItem { mut item, graph }) = self.item.take() {
            item.call_tree = graph.finish();
            self.current.items.push(item);
        }
    }

    fn start_event_report(&mut self) {
        let next = EventReport::new(&self.common_context);
        let done = std::mem::replace(&mut self.current, next);
        if std::mem::take(&mut self.registered) {
            self.event_reports.push(done);
        }
    }

    fn finish(mut self) -> ParsedReport {
        self.close_item();
        if self.registered {
            self.event_reports.push(self.current);
        }
        let mut diagnostics = Vec::new();
        if self.skipped_lines > 0 {
            diagnostics.push(ParseDiagnostic::SkippedCallgraphs {
                lines: self.skipped_lines,
            });
        }
        ParsedReport {
            event_reports: self.event_reports,
            diagnostics,
        }
    }
}
