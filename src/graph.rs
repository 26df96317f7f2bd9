//! The network graph: routers, ACL nodes, the drop sink, and the links between them.
//!
//! Built on `petgraph`: node weights are [`GraphNode`]s, edge weights are [`GraphLink`]s, and
//! the dense link index used by the label bitmaps is read back off the `EdgeIndex`, which stays
//! dense as long as no edge is ever removed (it never is).

use crate::error::EcError;
use crate::input::{RouterInput, TopologyEdge};
use log::{debug, trace};
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::Directed;
use std::collections::HashMap;

/// Reserved interface name for a null route / the edge into the drop sink.
pub const NULL_INTERFACE: &str = "null_interface";
/// Synthetic interface name: router side of the link into an outbound ACL node.
pub const ENTER_OUTBOUND_ACL: &str = "enter-outbound-acl";
/// Synthetic interface name: ACL side of the link leaving an outbound ACL node.
pub const EXIT_OUTBOUND_ACL: &str = "exit-outbound-acl";
/// Synthetic interface name: ACL side of the link entering an inbound ACL node.
pub const ENTER_INBOUND_ACL: &str = "enter-inbound-acl";
/// Synthetic interface name: router side of the link leaving an inbound ACL node.
pub const EXIT_INBOUND_ACL: &str = "exit-inbound-acl";

/// Which side of an interface an ACL node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclDirection {
    /// Applied to packets leaving the interface.
    Outbound,
    /// Applied to packets entering the interface.
    Inbound,
}

impl AclDirection {
    fn tag(&self) -> &'static str {
        match self {
            AclDirection::Outbound => "OUT",
            AclDirection::Inbound => "IN",
        }
    }
}

/// A node of the network graph.
#[derive(Debug, Clone)]
pub enum GraphNode {
    /// The distinguished sink every dropping edge leads to.
    DropSink,
    /// An internal router.
    Router {
        /// The router's name, as given by the caller.
        name: String,
    },
    /// A node representing one direction of one interface's ACL.
    Acl {
        /// Internal name, `ACL-{IN|OUT}-{router}-{iface}-{aclName}`.
        name: String,
        /// The router this ACL node belongs to.
        owner: NodeIndex,
        /// Which side of the interface this is.
        direction: AclDirection,
        /// The ACL's match lines.
        acl: crate::acl::IpAccessList,
    },
}

impl GraphNode {
    /// The router that owns this node: itself for a router node, the back-referenced router for
    /// an ACL node, and `None` for the drop sink.
    pub fn owner(&self, self_idx: NodeIndex) -> Option<NodeIndex> {
        match self {
            GraphNode::DropSink => None,
            GraphNode::Router { .. } => Some(self_idx),
            GraphNode::Acl { owner, .. } => Some(*owner),
        }
    }

    /// The internal name. `"(none)"` for the drop sink.
    pub fn name(&self) -> &str {
        match self {
            GraphNode::DropSink => "(none)",
            GraphNode::Router { name } => name,
            GraphNode::Acl { name, .. } => name,
        }
    }
}

/// A directed link between two [`GraphNode`]s.
#[derive(Debug, Clone)]
pub struct GraphLink {
    /// Interface name on the source side.
    pub source_iface: String,
    /// Interface name on the target side.
    pub target_iface: String,
    /// Dense, 0-based index assigned at construction; indexes the per-link label bitmap.
    pub link_index: usize,
}

/// The network graph type: `GraphNode` weighted nodes, `GraphLink` weighted edges.
pub type EcGraph = petgraph::Graph<GraphNode, GraphLink, Directed, u32>;

fn link_index_of(edge: EdgeIndex) -> usize {
    edge.index()
}

/// All the bookkeeping produced while building the graph, besides the graph itself.
pub struct BuiltGraph {
    /// The graph.
    pub graph: EcGraph,
    /// The drop sink's node index (always index 0).
    pub drop_sink: NodeIndex,
    /// Router name -> node index.
    pub router_nodes: HashMap<String, NodeIndex>,
    /// Total number of links created (equal to the graph's edge count).
    pub num_links: usize,
}

/// Build the network graph from the router/interface/ACL inputs and the topology edges.
///
/// Node creation order: drop sink, then one router node per `routers` entry (in iteration
/// order), then for each of that router's interfaces at most one outbound and one inbound ACL
/// node. Every ACL node immediately gets its link to the drop sink (`link 0`, interface
/// `null_interface`); the chain of links implementing each topology edge (and the synthetic
/// edges for neighborless interfaces and null routes) is then layered on top, giving every ACL
/// node its `link 1` to its real downstream neighbor.
pub fn build_graph(
    routers: &[RouterInput],
    topology: &[TopologyEdge],
) -> Result<BuiltGraph, EcError> {
    let mut graph = EcGraph::new();
    let drop_sink = graph.add_node(GraphNode::DropSink);
    debug!("drop sink created at {:?}", drop_sink);

    let mut router_nodes = HashMap::new();
    // (router name, iface name, direction) -> acl node index
    let mut acl_nodes: HashMap<(String, String, AclDirection), NodeIndex> = HashMap::new();

    for r in routers {
        let rid = graph.add_node(GraphNode::Router { name: r.name.clone() });
        router_nodes.insert(r.name.clone(), rid);
    }

    for r in routers {
        let rid = router_nodes[&r.name];
        for iface in &r.interfaces {
            if let Some(acl) = &iface.outbound_acl {
                let key = (r.name.clone(), iface.name.clone(), AclDirection::Outbound);
                if acl_nodes.contains_key(&key) {
                    return Err(EcError::DuplicateAcl(r.name.clone(), iface.name.clone(), AclDirection::Outbound));
                }
                let name = format!(
                    "ACL-{}-{}-{}-{}",
                    AclDirection::Outbound.tag(),
                    r.name,
                    iface.name,
                    acl.name
                );
                let idx = graph.add_node(GraphNode::Acl {
                    name,
                    owner: rid,
                    direction: AclDirection::Outbound,
                    acl: acl.clone(),
                });
                acl_nodes.insert(key, idx);
            }
            if let Some(acl) = &iface.inbound_acl {
                let key = (r.name.clone(), iface.name.clone(), AclDirection::Inbound);
                if acl_nodes.contains_key(&key) {
                    return Err(EcError::DuplicateAcl(r.name.clone(), iface.name.clone(), AclDirection::Inbound));
                }
                let name = format!(
                    "ACL-{}-{}-{}-{}",
                    AclDirection::Inbound.tag(),
                    r.name,
                    iface.name,
                    acl.name
                );
                let idx = graph.add_node(GraphNode::Acl {
                    name,
                    owner: rid,
                    direction: AclDirection::Inbound,
                    acl: acl.clone(),
                });
                acl_nodes.insert(key, idx);
            }
        }
    }

    // every ACL node unconditionally gets its link to the drop sink first.
    for idx in acl_nodes.values() {
        let e = graph.add_edge(
            *idx,
            drop_sink,
            GraphLink {
                source_iface: NULL_INTERFACE.to_string(),
                target_iface: NULL_INTERFACE.to_string(),
                link_index: 0,
            },
        );
        let li = link_index_of(e);
        graph.edge_weight_mut(e).unwrap().link_index = li;
        trace!("ACL node {:?} wired to drop sink as link {}", idx, li);
    }

    // every router also gets its direct null-route link to the drop sink.
    for r in routers {
        let rid = router_nodes[&r.name];
        let e = graph.add_edge(
            rid,
            drop_sink,
            GraphLink {
                source_iface: NULL_INTERFACE.to_string(),
                target_iface: NULL_INTERFACE.to_string(),
                link_index: 0,
            },
        );
        let li = link_index_of(e);
        graph.edge_weight_mut(e).unwrap().link_index = li;
    }

    // interfaces with a real neighbor, used to find which interfaces lack one.
    let mut has_neighbor: std::collections::HashSet<(String, String)> = Default::default();
    for edge in topology {
        has_neighbor.insert((edge.source_router.clone(), edge.source_iface.clone()));
    }

    for edge in topology {
        chain_link(
            &mut graph,
            &router_nodes,
            &acl_nodes,
            drop_sink,
            &edge.source_router,
            &edge.source_iface,
            Endpoint::Router(edge.target_router.clone(), edge.target_iface.clone()),
        )?;
    }

    for r in routers {
        for iface in &r.interfaces {
            if !has_neighbor.contains(&(r.name.clone(), iface.name.clone())) {
                chain_link(
                    &mut graph,
                    &router_nodes,
                    &acl_nodes,
                    drop_sink,
                    &r.name,
                    &iface.name,
                    Endpoint::Drop,
                )?;
            }
        }
    }

    let num_links = graph.edge_count();
    Ok(BuiltGraph { graph, drop_sink, router_nodes, num_links })
}

enum Endpoint {
    Router(String, String),
    Drop,
}

#[allow(clippy::too_many_arguments)]
fn chain_link(
    graph: &mut EcGraph,
    router_nodes: &HashMap<String, NodeIndex>,
    acl_nodes: &HashMap<(String, String, AclDirection), NodeIndex>,
    drop_sink: NodeIndex,
    src_router: &str,
    src_iface: &str,
    target: Endpoint,
) -> Result<(), EcError> {
    let src_rid = *router_nodes
        .get(src_router)
        .ok_or_else(|| EcError::UnknownRouter(src_router.to_string()))?;
    let out_acl = acl_nodes.get(&(src_router.to_string(), src_iface.to_string(), AclDirection::Outbound));

    let (target_rid, target_iface, in_acl) = match &target {
        Endpoint::Drop => (drop_sink, NULL_INTERFACE.to_string(), None),
        Endpoint::Router(tr, ti) => {
            let trid = *router_nodes.get(tr).ok_or_else(|| EcError::UnknownRouter(tr.clone()))?;
            let acl = acl_nodes.get(&(tr.clone(), ti.clone(), AclDirection::Inbound));
            (trid, ti.clone(), acl)
        }
    };

    let mut add_link = |graph: &mut EcGraph, from, to, source_iface: &str, target_iface: &str| {
        let e = graph.add_edge(
            from,
            to,
            GraphLink {
                source_iface: source_iface.to_string(),
                target_iface: target_iface.to_string(),
                link_index: 0,
            },
        );
        let li = link_index_of(e);
        graph.edge_weight_mut(e).unwrap().link_index = li;
    };

    match (out_acl, in_acl) {
        (Some(&out_idx), Some(&in_idx)) => {
            add_link(graph, src_rid, out_idx, src_iface, ENTER_OUTBOUND_ACL);
            add_link(graph, out_idx, in_idx, EXIT_OUTBOUND_ACL, ENTER_INBOUND_ACL);
            add_link(graph, in_idx, target_rid, EXIT_INBOUND_ACL, &target_iface);
        }
        (Some(&out_idx), None) => {
            add_link(graph, src_rid, out_idx, src_iface, ENTER_OUTBOUND_ACL);
            add_link(graph, out_idx, target_rid, EXIT_OUTBOUND_ACL, &target_iface);
        }
        (None, Some(&in_idx)) => {
            add_link(graph, src_rid, in_idx, src_iface, ENTER_INBOUND_ACL);
            add_link(graph, in_idx, target_rid, EXIT_INBOUND_ACL, &target_iface);
        }
        (None, None) => {
            add_link(graph, src_rid, target_rid, src_iface, &target_iface);
        }
    }

    Ok(())
}
