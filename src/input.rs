//! # External inputs
//!
//! The minimal contract this crate consumes from the upstream collaborators that are out of
//! scope here: the vendor-configuration parsers, the route-computation engine, and topology
//! discovery. Those produce the values in this module; this crate only consumes them.

use crate::acl::IpAccessList;

/// A single FIB row: a destination prefix and the interface it is forwarded out of.
///
/// `out_iface` is [`crate::graph::NULL_INTERFACE`] for a null route.
#[derive(Debug, Clone)]
pub struct FibRow {
    /// Destination network address (host bits zeroed).
    pub prefix_addr: u32,
    /// Prefix length, `0..=32`.
    pub prefix_len: u8,
    /// Outgoing interface name.
    pub out_iface: String,
}

/// One interface of a router: its name, and its optional outbound/inbound ACLs.
#[derive(Debug, Clone)]
pub struct InterfaceInput {
    /// Interface name.
    pub name: String,
    /// ACL applied to packets leaving this interface, if any.
    pub outbound_acl: Option<IpAccessList>,
    /// ACL applied to packets entering this interface, if any.
    pub inbound_acl: Option<IpAccessList>,
}

/// A router: its name, FIB, and interfaces.
#[derive(Debug, Clone)]
pub struct RouterInput {
    /// Router name, used as the node name and to key the FIB and ACLs.
    pub name: String,
    /// Interfaces, with their ACLs.
    pub interfaces: Vec<InterfaceInput>,
}

/// A directed topology edge, `source_router:source_iface -> target_router:target_iface`.
#[derive(Debug, Clone)]
pub struct TopologyEdge {
    /// Source router name.
    pub source_router: String,
    /// Source interface name.
    pub source_iface: String,
    /// Target router name.
    pub target_router: String,
    /// Target interface name.
    pub target_iface: String,
}

/// Per-router FIB, supplied alongside [`RouterInput`]/[`TopologyEdge`] to [`crate::EcEngine::build`].
#[derive(Debug, Clone, Default)]
pub struct Fib {
    /// Rows, in no particular order (priority is derived from `prefix_len`, not position).
    pub rows: Vec<FibRow>,
}

