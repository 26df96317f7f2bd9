//! Query dispositions and the answer a reachability query produces.

use bitflags::bitflags;
use petgraph::graph::{EdgeIndex, NodeIndex};

bitflags! {
    /// The set of dispositions a [`crate::EcEngine::reachable`] query is willing to accept.
    ///
    /// `DROP_ACL` matches either ACL direction; `DROP` matches any drop outcome at all. These are
    /// convenience unions, not outcomes the search can itself produce (the search always reports
    /// one of the five concrete dispositions).
    pub struct Disposition: u16 {
        /// Packet reaches a sink router over a real (non-null) interface.
        const ACCEPT = 0b0000_0001;
        /// Packet is dropped by an inbound ACL.
        const DROP_ACL_IN = 0b0000_0010;
        /// Packet is dropped by an outbound ACL.
        const DROP_ACL_OUT = 0b0000_0100;
        /// Packet is dropped by either ACL direction.
        const DROP_ACL = Self::DROP_ACL_IN.bits | Self::DROP_ACL_OUT.bits;
        /// Packet is forwarded onto a null route.
        const DROP_NULL_ROUTE = 0b0000_1000;
        /// Packet has no matching FIB entry at all.
        const DROP_NO_ROUTE = 0b0001_0000;
        /// Any of the above drop outcomes.
        const DROP = Self::DROP_ACL.bits | Self::DROP_NULL_ROUTE.bits | Self::DROP_NO_ROUTE.bits;
    }
}

/// The concrete disposition a found flow witnesses. Unlike [`Disposition`], every value here is
/// something the search can actually return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Reached a sink router over a real interface.
    Accepted,
    /// Dropped by an inbound ACL.
    DeniedIn,
    /// Dropped by an outbound ACL.
    DeniedOut,
    /// Forwarded onto a null route.
    NullRouted,
    /// No matching FIB entry.
    NoRoute,
}

impl Outcome {
    /// The single-bit [`Disposition`] this outcome corresponds to.
    pub fn as_flag(&self) -> Disposition {
        match self {
            Outcome::Accepted => Disposition::ACCEPT,
            Outcome::DeniedIn => Disposition::DROP_ACL_IN,
            Outcome::DeniedOut => Disposition::DROP_ACL_OUT,
            Outcome::NullRouted => Disposition::DROP_NULL_ROUTE,
            Outcome::NoRoute => Disposition::DROP_NO_ROUTE,
        }
    }
}

/// One hop of a reconstructed path: the node visited, and the link that was taken to leave the
/// previous hop and arrive here (`None` for the first hop, a source node).
#[derive(Debug, Clone)]
pub struct Hop {
    /// The node visited.
    pub node: NodeIndex,
    /// Display name of the node (the router name, the internal ACL-node name, or `"(none)"`).
    pub node_name: String,
    /// The link traversed to reach this hop, if any.
    pub via_link: Option<EdgeIndex>,
}

/// A single concrete flow witnessing a disposition, or the sentinel empty history.
#[derive(Debug, Clone)]
pub enum AnswerElement {
    /// A concrete witness.
    Flow {
        /// The disposition this flow witnesses.
        outcome: Outcome,
        /// One concrete header inside the queried equivalence class.
        header: Vec<u64>,
        /// Hops from a source to the terminating node, in traversal order.
        path: Vec<Hop>,
    },
    /// No flow exists satisfying the query.
    Empty,
}

impl AnswerElement {
    /// Whether this is a genuine witness (not the empty sentinel).
    pub fn is_found(&self) -> bool {
        matches!(self, AnswerElement::Flow { .. })
    }
}
