use std::sync::LazyLock;

use regex::Regex;

use super::report::ReportParseError;
use crate::model::CallTreeNode;

/// Phrase simpleperf prints in place of a branch it did not expand.
pub const SKIPPED_CALLGRAPH_MARKER: &str = "skipped in brief callgraph mode";

#[allow(clippy::expect_used)]
static WEIGHTED_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\d.]+)%[-\s]+(.+)$").expect("valid frame regex"));

/// Shape of one indented call-graph line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DetailLine<'a> {
    /// Only connector glyphs.
    Connector,
    /// A branch elided by brief callgraph mode.
    Skipped,
    /// Next frame of the previous node's straight chain.
    Continuation(&'a str),
    /// A new branch, drawn with its first `-` at `dash_column`.
    Node {
        dash_column: usize,
        weight_percent: f64,
        frame: &'a str,
    },
}

impl<'a> DetailLine<'a> {
    /// Classify an indented line. `line_no` is only used for error reporting.
    pub(crate) fn classify(line: &'a str, line_no: usize) -> Result<Self, ReportParseError> {
        let content = line.trim_matches(|c| matches!(c, '|' | ' ' | '\t'));
        if content.is_empty() {
            return Ok(Self::Connector);
        }
        if line.contains(SKIPPED_CALLGRAPH_MARKER) {
            return Ok(Self::Skipped);
        }

        let Some(dash_column) = line.chars().position(|c| c == '-') else {
            return Ok(Self::Continuation(content));
        };

        let text = line.trim_matches(|c| matches!(c, '|' | '-' | ' ' | '\t'));
        let (weight_percent, frame) = match WEIGHTED_FRAME.captures(text) {
            Some(caps) => {
                let (_, [weight, frame]) = caps.extract();
                let weight_percent = weight.parse::<f64>().map_err(|_| {
                    ReportParseError::InvalidWeight {
                        line: line_no,
                        text: weight.to_string(),
                    }
                })?;
                (weight_percent, frame)
            }
            None => (100.0, text),
        };

        Ok(Self::Node {
            dash_column,
            weight_percent,
            frame,
        })
    }
}

/// Per-item state for rebuilding one call graph.
///
/// `open[d]` is the most recent node at depth `d` that may still receive
/// children. Recording a node at depth `d` closes every deeper node, folding
/// it into its parent, so the tree is assembled without parent pointers.
#[derive(Debug, Default)]
pub(crate) struct CallGraphBuilder {
    columns: Vec<usize>,
    open: Vec<CallTreeNode>,
    root: Option<CallTreeNode>,
}

impl CallGraphBuilder {
    /// Record every `|` that lies right of the last known column.
    pub(crate) fn record_columns(&mut self, line: &str) {
        for (pos, c) in line.chars().enumerate() {
            if c == '|' && self.columns.last().is_none_or(|&last| last < pos) {
                self.columns.push(pos);
            }
        }
    }

    /// Depth of a node whose dash sits at `dash_column`: the index of the last
    /// recorded column at or left of it.
    pub(crate) fn depth_of(&self, dash_column: usize) -> Option<usize> {
        self.columns
            .partition_point(|&column| column <= dash_column)
            .checked_sub(1)
    }

    pub(crate) fn add_node(
        &mut self,
        dash_column: usize,
        node: CallTreeNode,
        line_no: usize,
    ) -> Result<(), ReportParseError> {
        let depth = self
            .depth_of(dash_column)
            .ok_or(ReportParseError::MalformedCallGraph {
                line: line_no,
                column: dash_column,
            })?;
        if depth > self.open.len() {
            return Err(ReportParseError::DepthGap {
                line: line_no,
                depth,
            });
        }
        self.close_deeper_than(depth);
        self.open.push(node);
        Ok(())
    }

    pub(crate) fn extend_last(
        &mut self,
        frame: &str,
        line_no: usize,
    ) -> Result<(), ReportParseError> {
        let last = self
            .open
            .last_mut()
            .ok_or(ReportParseError::OrphanContinuation { line: line_no })?;
        last.push_frame(frame);
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Option<CallTreeNode> {
        self.close_deeper_than(0);
        self.root
    }

    fn close_deeper_than(&mut self, depth: usize) {
        while self.open.len() > depth {
            let Some(node) = self.open.pop() else { break };
            match self.open.last_mut() {
                Some(parent) => parent.push_child(node),
                // A second root replaces the first.
                None => self.root = Some(node),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_line_shapes() {
        let classify = |line| DetailLine::classify(line, 1).unwrap();

        assert_eq!(classify("       |"), DetailLine::Connector);
        assert_eq!(classify("    | \t |  "), DetailLine::Connector);
        assert_eq!(
            classify("          |--1.00%-- [skipped in brief callgraph mode]"),
            DetailLine::Skipped
        );
        assert_eq!(
            classify("          |    render_loop"),
            DetailLine::Continuation("render_loop")
        );
        assert_eq!(
            classify("          |--62.50%-- copy_frame"),
            DetailLine::Node {
                dash_column: 11,
                weight_percent: 62.5,
                frame: "copy_frame",
            }
        );
        assert_eq!(
            classify("       -- memcpy"),
            DetailLine::Node {
                dash_column: 7,
                weight_percent: 100.0,
                frame: "memcpy",
            }
        );
    }

    #[test]
    fn weight_needs_separator_before_frame() {
        // No dash or space after `%`, so the whole text is the frame name.
        assert_eq!(
            DetailLine::classify("    -- 5%x", 1).unwrap(),
            DetailLine::Node {
                dash_column: 4,
                weight_percent: 100.0,
                frame: "5%x",
            }
        );
    }

    #[test]
    fn unparsable_weight_is_an_error() {
        let err = DetailLine::classify("    |--1.2.3%-- f", 7).unwrap_err();
        assert!(matches!(
            err,
            ReportParseError::InvalidWeight { line: 7, ref text } if text == "1.2.3"
        ));
    }

    #[test]
    fn columns_only_grow_to_the_right() {
        let mut builder = CallGraphBuilder::default();
        builder.record_columns("    |    |");
        builder.record_columns("  |");
        builder.record_columns("    |    |    |");
        assert_eq!(builder.columns, vec![4, 9, 14]);

        assert_eq!(builder.depth_of(3), None);
        assert_eq!(builder.depth_of(4), Some(0));
        assert_eq!(builder.depth_of(10), Some(1));
        assert_eq!(builder.depth_of(40), Some(2));
    }

    #[test]
    fn builds_branches_by_depth() {
        let mut builder = CallGraphBuilder::default();
        builder.record_columns("    |    |");
        builder.add_node(4, CallTreeNode::new(100.0, "root"), 1).unwrap();
        builder.add_node(10, CallTreeNode::new(60.0, "a"), 2).unwrap();
        builder.extend_last("a_caller", 3).unwrap();
        builder.add_node(10, CallTreeNode::new(40.0, "b"), 4).unwrap();

        let root = builder.finish().unwrap();
        assert_eq!(root.frames, vec!["root"]);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].frames, vec!["a", "a_caller"]);
        assert_eq!(root.children[1].frames, vec!["b"]);
    }

    #[test]
    fn stale_parent_depth_is_rejected() {
        let mut builder = CallGraphBuilder::default();
        builder.record_columns("    |    |    |");
        builder.add_node(4, CallTreeNode::new(100.0, "root"), 1).unwrap();
        let err = builder
            .add_node(15, CallTreeNode::new(10.0, "too_deep"), 2)
            .unwrap_err();
        assert!(matches!(err, ReportParseError::DepthGap { line: 2, depth: 2 }));
    }

    #[test]
    fn continuation_without_node_is_rejected() {
        let mut builder = CallGraphBuilder::default();
        let err = builder.extend_last("main", 5).unwrap_err();
        assert!(matches!(err, ReportParseError::OrphanContinuation { line: 5 }));
    }
}
