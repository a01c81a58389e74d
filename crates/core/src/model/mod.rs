pub mod call_tree;
pub mod report;

pub use call_tree::CallTreeNode;
pub use report::{EVENT_MARKER, EventReport, ReportItem, is_event_marker};
