use std::fmt;

use serde::{Deserialize, Serialize};

/// One node of a call graph reconstructed from report text.
///
/// A node covers a straight run of frames drawn without branching, so
/// `frames` holds the first frame followed by every continuation frame
/// printed underneath it. Branches taken after the last frame are `children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTreeNode {
    /// Share of samples attributed to this branch, in percent.
    pub weight_percent: f64,
    /// Collapsed frames, never empty.
    pub frames: Vec<String>,
    pub children: Vec<CallTreeNode>,
}

impl CallTreeNode {
    pub fn new(weight_percent: f64, frame: impl Into<String>) -> Self {
        Self {
            weight_percent,
            frames: vec![frame.into()],
            children: Vec::new(),
        }
    }

    /// Extend the collapsed frame run with the next frame of a straight chain.
    pub fn push_frame(&mut self, frame: impl Into<String>) {
        self.frames.push(frame.into());
    }

    pub fn push_child(&mut self, child: CallTreeNode) {
        self.children.push(child);
    }

    /// First frame of the run, the one the weight was printed next to.
    pub fn name(&self) -> &str {
        &self.frames[0]
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn dump(&self, out: &mut Vec<String>) {
        out.push(format!("CallTreeNode percentage = {:.2}", self.weight_percent));
        for frame in &self.frames {
            out.push(format!(" {frame}"));
        }
        for child in &self.children {
            let mut lines = Vec::new();
            child.dump(&mut lines);
            out.extend(lines.into_iter().map(|l| format!("  {l}")));
        }
    }
}

impl fmt::Display for CallTreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        self.dump(&mut lines);
        f.write_str(&lines.join("\n"))
    }
}
