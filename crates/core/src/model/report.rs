use std::fmt;

use serde::{Deserialize, Serialize};

use super::CallTreeNode;

/// Prefix of the context line that names the profiled event.
pub const EVENT_MARKER: &str = "Event:";

/// One top-level row of a report body (a process, thread, or symbol line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportItem {
    /// The row exactly as printed.
    pub raw_line: String,
    /// Call graph printed below the row, if any.
    pub call_tree: Option<CallTreeNode>,
}

impl ReportItem {
    pub fn new(raw_line: impl Into<String>) -> Self {
        Self {
            raw_line: raw_line.into(),
            call_tree: None,
        }
    }
}

impl fmt::Display for ReportItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReportItem (raw_line {})", self.raw_line)?;
        if let Some(tree) = &self.call_tree {
            write!(f, "\n{tree}")?;
        }
        Ok(())
    }
}

/// Report for one event attribute: its context lines, column header and rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventReport {
    /// Lines shared by every event of the report followed by this event's own
    /// lines, including its `Event:` line.
    pub context: Vec<String>,
    /// Column header of the body. `None` when the event has no body.
    pub title: Option<String>,
    pub items: Vec<ReportItem>,
}

impl EventReport {
    pub fn new(common_context: &[String]) -> Self {
        Self {
            context: common_context.to_vec(),
            title: None,
            items: Vec::new(),
        }
    }

    /// The `Event:` line of this report, if it has been seen.
    pub fn event_line(&self) -> Option<&str> {
        self.context
            .iter()
            .rev()
            .find(|line| is_event_marker(line))
            .map(String::as_str)
    }
}

impl fmt::Display for EventReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.context {
            writeln!(f, "{line}")?;
        }
        writeln!(f)?;
        if let Some(title) = &self.title {
            writeln!(f, "{title}")?;
        }
        for item in &self.items {
            writeln!(f, "{item}")?;
        }
        Ok(())
    }
}

pub fn is_event_marker(line: &str) -> bool {
    line.starts_with(EVENT_MARKER)
}
