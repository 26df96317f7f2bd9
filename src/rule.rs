//! Forwarding/filtering rules: `(link, rectangle, priority)`.

use crate::geometry::HyperRectangle;
use petgraph::graph::{EdgeIndex, NodeIndex};

/// A single forwarding or filtering rule.
///
/// For a FIB row, `rect` restricts the destination-IP axis to the prefix and is full on every
/// other axis; `priority` is the prefix length. For an ACL line, `rect` comes from the line's
/// match predicate and `priority` is `line_count - line_index` (the synthesized default-deny
/// line gets priority 0). `source` is the node the rule is installed at: the owner map is keyed
/// by this node, so that a router's FIB rules and an ACL node's two outgoing links each compete
/// independently for ownership of a given EC.
#[derive(Debug, Clone)]
pub struct Rule {
    /// The link this rule forwards matching traffic out of.
    pub link: EdgeIndex<u32>,
    /// Dense index of `link`, used to address the per-link label bitmap.
    pub link_index: usize,
    /// The node `link` originates from.
    pub source: NodeIndex,
    /// The rule's match rectangle.
    pub rect: HyperRectangle,
    /// Priority: higher wins. Ties keep the existing owner.
    pub priority: u32,
}

impl Rule {
    /// Whether `self` outranks the current owner `other` (`None` means unowned).
    pub fn outranks(&self, other: Option<&Rule>) -> bool {
        match other {
            None => true,
            Some(o) => self.priority > o.priority,
        }
    }
}
