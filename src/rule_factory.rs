//! Turns FIB rows and ACL lines into [`Rule`]s over the already-built graph.

use crate::acl::AclAction;
use crate::error::EcError;
use crate::geometry::{GeometricSpaceFactory, HeaderSpace, PacketField};
use crate::graph::{EcGraph, GraphNode, NULL_INTERFACE};
use crate::input::{Fib, RouterInput};
use crate::rule::Rule;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Find the outgoing edge of `node` whose source-interface name is `iface`.
fn find_link_by_iface(
    graph: &EcGraph,
    node: NodeIndex,
    iface: &str,
) -> Option<(petgraph::graph::EdgeIndex, usize)> {
    graph.edges(node).find(|e| e.weight().source_iface == iface).map(|e| (e.id(), e.weight().link_index))
}

/// Build the FIB rule for one row, installed at `router_node`.
fn fib_rule(
    graph: &EcGraph,
    router_name: &str,
    router_node: NodeIndex,
    prefix_addr: u32,
    prefix_len: u8,
    out_iface: &str,
    factory: &GeometricSpaceFactory,
) -> Result<Rule, EcError> {
    let (link, link_index) = find_link_by_iface(graph, router_node, out_iface)
        .ok_or_else(|| EcError::UnknownInterface(router_name.to_string(), out_iface.to_string()))?;

    let dst_ip_axis = factory
        .fields()
        .iter()
        .position(|f| *f == PacketField::DstIp)
        .expect("destination IP is always an active field");

    let lo = prefix_addr as u64;
    let width = 1u64 << (32 - prefix_len as u32);
    let hi = lo + width;

    let mut bounds: Vec<(u64, u64)> = factory.fields().iter().map(|f| f.full_domain()).collect();
    bounds[dst_ip_axis] = (lo, hi);

    Ok(Rule {
        link,
        link_index,
        source: router_node,
        rect: crate::geometry::HyperRectangle::new(bounds, crate::geometry::NO_EC),
        priority: prefix_len as u32,
    })
}

/// Build every FIB-derived rule for every router.
pub fn fib_rules(
    graph: &EcGraph,
    router_nodes: &HashMap<String, NodeIndex>,
    routers: &[RouterInput],
    fibs: &HashMap<String, Fib>,
    factory: &GeometricSpaceFactory,
) -> Result<Vec<Rule>, EcError> {
    let mut out = Vec::new();
    for r in routers {
        let node = *router_nodes
            .get(&r.name)
            .ok_or_else(|| EcError::UnknownRouter(r.name.clone()))?;
        let fib = match fibs.get(&r.name) {
            Some(f) => f,
            None => continue,
        };
        for row in &fib.rows {
            out.push(fib_rule(
                graph,
                &r.name,
                node,
                row.prefix_addr,
                row.prefix_len,
                &row.out_iface,
                factory,
            )?);
        }
    }
    Ok(out)
}

/// The drop-facing and accept-facing outgoing links of an ACL node: `(drop_link, accept_link)`.
///
/// Construction always wires exactly these two outgoing edges per ACL node: one to the drop
/// sink, one to the downstream neighbor.
fn acl_node_links(
    graph: &EcGraph,
    acl_node: NodeIndex,
    drop_sink: NodeIndex,
) -> (petgraph::graph::EdgeIndex, usize, petgraph::graph::EdgeIndex, usize) {
    let mut drop = None;
    let mut accept = None;
    for e in graph.edges(acl_node) {
        if e.target() == drop_sink {
            drop = Some((e.id(), e.weight().link_index));
        } else {
            accept = Some((e.id(), e.weight().link_index));
        }
    }
    let (drop_link, drop_idx) = drop.expect("ACL node always has a drop link");
    let (accept_link, accept_idx) = accept.expect("ACL node always has a downstream link");
    (drop_link, drop_idx, accept_link, accept_idx)
}

/// Build every ACL-line-derived rule (plus the synthesized default-deny line) for every ACL node
/// in the graph.
///
/// Lines whose predicate fans out into more than one rectangle (negations, whitelist+blacklist
/// combinations) are truncated to their first rectangle -- an intentional underapproximation.
pub fn acl_rules(
    graph: &EcGraph,
    drop_sink: NodeIndex,
    factory: &GeometricSpaceFactory,
) -> Vec<Rule> {
    let mut out = Vec::new();
    for node_idx in graph.node_indices() {
        let acl = match graph.node_weight(node_idx) {
            Some(GraphNode::Acl { acl, owner, .. }) => Some((acl, *owner)),
            _ => None,
        };
        let (acl, _owner) = match acl {
            Some(v) => v,
            None => continue,
        };

        let (drop_link, drop_idx, accept_link, accept_idx) = acl_node_links(graph, node_idx, drop_sink);
        let n = acl.lines.len();

        for (i, line) in acl.lines.iter().enumerate() {
            let space = factory.from_header_space(&line.header_space);
            let rect = match space.rects().first() {
                Some(r) => r.clone(),
                None => continue,
            };
            let (link, link_index) = match line.action {
                AclAction::Accept => (accept_link, accept_idx),
                AclAction::Drop => (drop_link, drop_idx),
            };
            out.push(Rule {
                link,
                link_index,
                source: node_idx,
                rect,
                priority: (n - i) as u32,
            });
        }

        // synthesized default-deny line: priority 0, matches everything not already covered.
        out.push(Rule {
            link: drop_link,
            link_index: drop_idx,
            source: node_idx,
            rect: factory.full_space(),
            priority: 0,
        });
    }
    out
}

/// Every [`PacketField`] referenced by any ACL line across every router's interfaces, in
/// canonical order, always including [`PacketField::DstIp`].
pub fn active_fields(routers: &[RouterInput]) -> Vec<PacketField> {
    let mut referenced: std::collections::BTreeSet<PacketField> = Default::default();
    referenced.insert(PacketField::DstIp);
    for r in routers {
        for iface in &r.interfaces {
            for acl in iface.outbound_acl.iter().chain(iface.inbound_acl.iter()) {
                for line in &acl.lines {
                    referenced.extend(line.header_space.referenced_fields());
                }
            }
        }
    }
    PacketField::canonical_order().into_iter().filter(|f| referenced.contains(f)).collect()
}

/// Build a [`HeaderSpace`] restricting only [`PacketField::DstIp`] to a single value -- the
/// common case for a query keyed on one destination address.
pub fn dst_ip_header_space(addr: u32) -> HeaderSpace {
    let mut hs = HeaderSpace::new();
    hs.restrict_value(PacketField::DstIp, addr as u64);
    hs
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::acl::{AclAction, AclLine, IpAccessList};
    use crate::graph::build_graph;
    use crate::input::{FibRow, InterfaceInput, TopologyEdge};

    fn one_router_fib() -> (EcGraph, NodeIndex, NodeIndex, HashMap<String, NodeIndex>) {
        let routers = vec![RouterInput {
            name: "R1".into(),
            interfaces: vec![InterfaceInput {
                name: "ifA".into(),
                outbound_acl: None,
                inbound_acl: None,
            }],
        }];
        let built = build_graph(&routers, &[]).unwrap();
        let r1 = built.router_nodes["R1"];
        (built.graph, r1, built.drop_sink, built.router_nodes)
    }

    #[test]
    fn fib_row_restricts_only_dst_ip() {
        let (graph, r1, _drop, router_nodes) = one_router_fib();
        let factory = GeometricSpaceFactory::new(vec![PacketField::DstIp, PacketField::DstPort]);
        let mut fibs = HashMap::new();
        fibs.insert(
            "R1".to_string(),
            Fib { rows: vec![FibRow { prefix_addr: 0x0A000000, prefix_len: 8, out_iface: "ifA".into() }] },
        );
        let routers =
            vec![RouterInput { name: "R1".into(), interfaces: vec![InterfaceInput { name: "ifA".into(), outbound_acl: None, inbound_acl: None }] }];
        let rules = fib_rules(&graph, &router_nodes, &routers, &fibs, &factory).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].priority, 8);
        assert_eq!(rules[0].rect.bound(0), (0x0A000000, 0x0A000000 + (1 << 24)));
        assert_eq!(rules[0].rect.bound(1), PacketField::DstPort.full_domain());
        assert_eq!(rules[0].source, r1);
    }

    #[test]
    fn unknown_interface_is_an_error() {
        let (graph, _r1, _drop, router_nodes) = one_router_fib();
        let factory = GeometricSpaceFactory::new(vec![PacketField::DstIp]);
        let mut fibs = HashMap::new();
        fibs.insert(
            "R1".to_string(),
            Fib { rows: vec![FibRow { prefix_addr: 0, prefix_len: 0, out_iface: "ghost".into() }] },
        );
        let routers =
            vec![RouterInput { name: "R1".into(), interfaces: vec![InterfaceInput { name: "ifA".into(), outbound_acl: None, inbound_acl: None }] }];
        assert!(fib_rules(&graph, &router_nodes, &routers, &fibs, &factory).is_err());
    }

    #[test]
    fn acl_lines_get_default_deny_appended() {
        let acl = IpAccessList::new(
            "deny-10",
            vec![AclLine::new(AclAction::Drop, {
                let mut hs = HeaderSpace::new();
                hs.restrict(PacketField::DstIp, vec![(0x0A000000, 0x0B000000)]);
                hs
            })],
        );
        let routers = vec![RouterInput {
            name: "R1".into(),
            interfaces: vec![InterfaceInput {
                name: "ifA".into(),
                outbound_acl: Some(acl),
                inbound_acl: None,
            }],
        }];
        let built = build_graph(&routers, &[]).unwrap();
        let factory = GeometricSpaceFactory::new(vec![PacketField::DstIp]);
        let rules = acl_rules(&built.graph, built.drop_sink, &factory);
        // one explicit line + one synthesized default-deny
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].priority, 1);
        assert_eq!(rules[1].priority, 0);
    }

    #[test]
    fn null_route_fib_row_targets_the_null_interface_link() {
        let (graph, r1, _drop, router_nodes) = one_router_fib();
        let factory = GeometricSpaceFactory::new(vec![PacketField::DstIp]);
        let mut fibs = HashMap::new();
        fibs.insert(
            "R1".to_string(),
            Fib {
                rows: vec![FibRow {
                    prefix_addr: 0x0A000000,
                    prefix_len: 8,
                    out_iface: NULL_INTERFACE.to_string(),
                }],
            },
        );
        let routers =
            vec![RouterInput { name: "R1".into(), interfaces: vec![InterfaceInput { name: "ifA".into(), outbound_acl: None, inbound_acl: None }] }];
        let rules = fib_rules(&graph, &router_nodes, &routers, &fibs, &factory).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].source, r1);
    }
}
