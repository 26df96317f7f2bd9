//! Reachability search: relevant-EC selection followed by a per-EC BFS.

use crate::disposition::{AnswerElement, Disposition, Hop, Outcome};
use crate::ec::{Backend, EcStore};
use crate::geometry::{GeometricSpaceFactory, HeaderSpace, HyperRectangle, KdTree};
use crate::graph::{EcGraph, NULL_INTERFACE};
use crate::labels::LinkLabels;
use log::debug;
use num::BigUint;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};

/// Resolve a query into the (EC, overlap rectangle) pairs it is actually relevant to.
///
/// Classic: every EC the KD-tree reports intersecting any of `query_rects` is relevant. DoC:
/// additionally requires the overlap to have positive volume not already attributed to a
/// descendant, computed the same way insertion attributes a new rule's sliver, just without
/// mutating anything.
fn relevant_ecs(
    ec: &EcStore,
    tree: &KdTree,
    query_rects: &[HyperRectangle],
) -> Vec<(usize, HyperRectangle)> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for q in query_rects {
        let hits = tree.intersect(q);
        let hit_set: HashSet<usize> = hits.iter().map(|r| r.ec).collect();
        let mut cache = HashMap::new();

        for r in hits {
            let alpha = r.ec;
            if seen.contains(&alpha) {
                continue;
            }
            let o = match HyperRectangle::overlap(q, &r) {
                Some(o) => o,
                None => continue,
            };
            let is_relevant = match ec.backend() {
                Backend::Classic => true,
                Backend::Doc => {
                    doc_attributed_volume(ec, q, alpha, &hit_set, &mut cache) > BigUint::from(0u32)
                }
            };
            if is_relevant {
                seen.insert(alpha);
                out.push((alpha, o));
            }
        }
    }

    out
}

/// Volume of `other`'s region (within its overlap with `q`) not already attributed to one of its
/// DoC descendants. Read-only counterpart of `insert::add_rule_doc_rec`'s slice computation.
fn doc_attributed_volume(
    ec: &EcStore,
    q: &HyperRectangle,
    other: usize,
    hits: &HashSet<usize>,
    cache: &mut HashMap<usize, BigUint>,
) -> BigUint {
    if let Some(v) = cache.get(&other) {
        return v.clone();
    }
    let rect = ec.rect(other).clone();
    let o = match HyperRectangle::overlap(q, &rect) {
        Some(o) => o,
        None => {
            cache.insert(other, BigUint::from(0u32));
            return BigUint::from(0u32);
        }
    };

    let mut children_vol = BigUint::from(0u32);
    for child in ec.children(other).to_vec() {
        if hits.contains(&child) {
            children_vol += doc_attributed_volume(ec, q, child, hits, cache);
        }
    }
    let slice = o.volume() - children_vol;
    cache.insert(other, slice.clone());
    slice
}

/// Follow `predecessors` back from `terminal` to the source that started the BFS.
fn reconstruct_path(
    graph: &EcGraph,
    predecessors: &HashMap<NodeIndex, Option<(NodeIndex, EdgeIndex)>>,
    terminal: NodeIndex,
) -> Vec<Hop> {
    let mut hops = Vec::new();
    let mut current = Some(terminal);
    while let Some(node) = current {
        let pred = predecessors.get(&node).cloned().flatten();
        let via_link = pred.map(|(_, e)| e);
        let weight = graph.node_weight(node).expect("path only visits live nodes");
        hops.push(Hop { node, node_name: weight.name().to_string(), via_link });
        current = pred.map(|(p, _)| p);
    }
    hops.reverse();
    hops
}

/// Run a BFS over the graph for EC `alpha`, returning the first disposition among `actions` it
/// can witness.
fn bfs_for_ec(
    graph: &EcGraph,
    labels: &LinkLabels,
    drop_sink: NodeIndex,
    alpha: usize,
    actions: Disposition,
    sources: &[NodeIndex],
    sinks: &HashSet<NodeIndex>,
) -> Option<(Outcome, NodeIndex, HashMap<NodeIndex, Option<(NodeIndex, EdgeIndex)>>)> {
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut predecessors: HashMap<NodeIndex, Option<(NodeIndex, EdgeIndex)>> = HashMap::new();
    let mut queue: VecDeque<NodeIndex> = VecDeque::new();

    for &s in sources {
        if visited.insert(s) {
            predecessors.insert(s, None);
            queue.push_back(s);
        }
    }

    while let Some(u) = queue.pop_front() {
        let weight = graph.node_weight(u).expect("BFS only visits live nodes");
        let is_sink_owner = weight.owner(u).map(|o| sinks.contains(&o)).unwrap_or(false);
        let mut any_enabled = false;

        for e in graph.edges(u) {
            if !labels.get(e.weight().link_index, alpha) {
                continue;
            }
            any_enabled = true;
            let target = e.target();
            if visited.insert(target) {
                predecessors.insert(target, Some((u, e.id())));
                queue.push_back(target);
            }

            if is_sink_owner && target == drop_sink {
                let src_iface = &e.weight().source_iface;
                // every flag wider than the single-bit one below (DROP_ACL, DROP) already
                // carries that bit in its own mask, so testing the narrow flag alone is
                // equivalent to testing "any of the three" from the source algorithm.
                if actions.contains(Disposition::ACCEPT) && src_iface != NULL_INTERFACE {
                    return Some((Outcome::Accepted, target, predecessors));
                }
                if weight.name().starts_with("ACL-IN") && actions.intersects(Disposition::DROP_ACL_IN) {
                    return Some((Outcome::DeniedIn, target, predecessors));
                }
                if weight.name().starts_with("ACL-OUT") && actions.intersects(Disposition::DROP_ACL_OUT) {
                    return Some((Outcome::DeniedOut, target, predecessors));
                }
                if src_iface == NULL_INTERFACE && actions.intersects(Disposition::DROP_NULL_ROUTE) {
                    return Some((Outcome::NullRouted, target, predecessors));
                }
            }
        }

        if is_sink_owner && !any_enabled && actions.intersects(Disposition::DROP_NO_ROUTE) {
            return Some((Outcome::NoRoute, u, predecessors));
        }
    }

    None
}

/// The engine-level reachability query: resolve `header_space` into relevant ECs, run the BFS for
/// each until one witnesses a disposition in `actions`, and reconstruct its path.
#[allow(clippy::too_many_arguments)]
pub fn reachable(
    graph: &EcGraph,
    ec: &EcStore,
    tree: &KdTree,
    labels: &LinkLabels,
    drop_sink: NodeIndex,
    factory: &GeometricSpaceFactory,
    header_space: &HeaderSpace,
    actions: Disposition,
    sources: &[NodeIndex],
    sinks: &HashSet<NodeIndex>,
) -> AnswerElement {
    let space = factory.from_header_space(header_space);
    let candidates = relevant_ecs(ec, tree, space.into_rects().as_slice());
    debug!("reachability query resolved to {} relevant EC(s)", candidates.len());

    for (alpha, rep_rect) in candidates {
        if let Some((outcome, terminal, predecessors)) =
            bfs_for_ec(graph, labels, drop_sink, alpha, actions, sources, sinks)
        {
            let path = reconstruct_path(graph, &predecessors, terminal);
            let header = factory.example(&rep_rect);
            debug!("reachability query resolved to {:?} via EC {}", outcome, alpha);
            return AnswerElement::Flow { outcome, header, path };
        }
    }

    debug!("reachability query resolved to no witness");
    AnswerElement::Empty
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::acl::{AclAction, AclLine, IpAccessList};
    use crate::ec::Backend;
    use crate::geometry::PacketField;
    use crate::graph::build_graph;
    use crate::input::{FibRow, Fib, InterfaceInput, RouterInput, TopologyEdge};
    use crate::insert::insert_rule;
    use crate::rule_factory::{acl_rules, active_fields, dst_ip_header_space, fib_rules};
    use maplit::hashset;

    struct Built {
        graph: EcGraph,
        ec: EcStore,
        tree: KdTree,
        labels: LinkLabels,
        drop_sink: NodeIndex,
        router_nodes: HashMap<String, NodeIndex>,
        factory: GeometricSpaceFactory,
    }

    fn build(
        routers: Vec<RouterInput>,
        topo: Vec<TopologyEdge>,
        fibs: HashMap<String, Fib>,
        backend: Backend,
    ) -> Built {
        let built = build_graph(&routers, &topo).unwrap();
        let fields = active_fields(&routers);
        let factory = GeometricSpaceFactory::new(fields);
        let full = factory.full_space();
        let mut ec = EcStore::new(full.clone(), backend);
        let mut tree = KdTree::new(factory.fields().len());
        tree.insert(full.with_ec(0));
        let mut labels = LinkLabels::new(built.num_links);

        let mut rules = acl_rules(&built.graph, built.drop_sink, &factory);
        rules.extend(fib_rules(&built.graph, &built.router_nodes, &routers, &fibs, &factory).unwrap());
        rules.sort_by(|a, b| a.rect.bounds().cmp(b.rect.bounds()));
        for r in &rules {
            insert_rule(&mut ec, &mut tree, &mut labels, r);
        }

        Built {
            graph: built.graph,
            ec,
            tree,
            labels,
            drop_sink: built.drop_sink,
            router_nodes: built.router_nodes,
            factory,
        }
    }

    fn two_router_plain_topology() -> (Vec<RouterInput>, Vec<TopologyEdge>) {
        let routers = vec![
            RouterInput {
                name: "R1".into(),
                interfaces: vec![InterfaceInput { name: "ifA".into(), outbound_acl: None, inbound_acl: None }],
            },
            RouterInput {
                name: "R2".into(),
                interfaces: vec![InterfaceInput { name: "ifB".into(), outbound_acl: None, inbound_acl: None }],
            },
        ];
        let topo = vec![TopologyEdge {
            source_router: "R1".into(),
            source_iface: "ifA".into(),
            target_router: "R2".into(),
            target_iface: "ifB".into(),
        }];
        (routers, topo)
    }

    #[test]
    fn scenario_default_route_is_accepted() {
        let (routers, topo) = two_router_plain_topology();
        let mut fibs = HashMap::new();
        fibs.insert(
            "R1".to_string(),
            Fib { rows: vec![FibRow { prefix_addr: 0, prefix_len: 0, out_iface: "ifA".into() }] },
        );
        let b = build(routers, topo, fibs, Backend::Classic);

        let r1 = b.router_nodes["R1"];
        let r2 = b.router_nodes["R2"];
        let hs = dst_ip_header_space(0x01020304);
        let ans = reachable(
            &b.graph, &b.ec, &b.tree, &b.labels, b.drop_sink, &b.factory, &hs,
            Disposition::ACCEPT, &[r1], &hashset! {r2},
        );
        match ans {
            AnswerElement::Flow { outcome, path, .. } => {
                assert_eq!(outcome, Outcome::Accepted);
                assert_eq!(path.first().unwrap().node, r1);
                assert_eq!(path.last().unwrap().node, r2);
            }
            AnswerElement::Empty => panic!("expected a witness"),
        }
    }

    #[test]
    fn scenario_outbound_acl_denies() {
        let mut routers = two_router_plain_topology().0;
        let acl = IpAccessList::new("deny-10", vec![AclLine::new(AclAction::Drop, {
            let mut hs = HeaderSpace::new();
            hs.restrict(PacketField::DstIp, vec![(0x0A000000, 0x0B000000)]);
            hs
        })]);
        routers[0].interfaces[0].outbound_acl = Some(acl);
        let topo = two_router_plain_topology().1;

        let mut fibs = HashMap::new();
        fibs.insert(
            "R1".to_string(),
            Fib { rows: vec![FibRow { prefix_addr: 0, prefix_len: 0, out_iface: "ifA".into() }] },
        );
        let b = build(routers, topo, fibs, Backend::Classic);

        let r1 = b.router_nodes["R1"];
        let hs = dst_ip_header_space(0x0A010203);
        let ans = reachable(
            &b.graph, &b.ec, &b.tree, &b.labels, b.drop_sink, &b.factory, &hs,
            Disposition::DROP_ACL_OUT, &[r1], &hashset! {r1},
        );
        match ans {
            AnswerElement::Flow { outcome, .. } => assert_eq!(outcome, Outcome::DeniedOut),
            AnswerElement::Empty => panic!("expected a witness"),
        }
    }

    #[test]
    fn scenario_null_route_is_null_routed() {
        let routers = vec![RouterInput {
            name: "R1".into(),
            interfaces: vec![InterfaceInput { name: "ifA".into(), outbound_acl: None, inbound_acl: None }],
        }];
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
        let b = build(routers, vec![], fibs, Backend::Classic);
        let r1 = b.router_nodes["R1"];
        let hs = dst_ip_header_space(0x0A050505);
        let ans = reachable(
            &b.graph, &b.ec, &b.tree, &b.labels, b.drop_sink, &b.factory, &hs,
            Disposition::DROP_NULL_ROUTE, &[r1], &hashset! {r1},
        );
        match ans {
            AnswerElement::Flow { outcome, .. } => assert_eq!(outcome, Outcome::NullRouted),
            AnswerElement::Empty => panic!("expected a witness"),
        }
    }

    #[test]
    fn scenario_no_fib_entry_is_no_route() {
        let routers = vec![RouterInput {
            name: "R1".into(),
            interfaces: vec![InterfaceInput { name: "ifA".into(), outbound_acl: None, inbound_acl: None }],
        }];
        let b = build(routers, vec![], HashMap::new(), Backend::Classic);
        let r1 = b.router_nodes["R1"];
        let hs = dst_ip_header_space(0x01020304);
        let ans = reachable(
            &b.graph, &b.ec, &b.tree, &b.labels, b.drop_sink, &b.factory, &hs,
            Disposition::DROP_NO_ROUTE, &[r1], &hashset! {r1},
        );
        match ans {
            AnswerElement::Flow { outcome, .. } => assert_eq!(outcome, Outcome::NoRoute),
            AnswerElement::Empty => panic!("expected a witness"),
        }
    }

    #[test]
    fn scenario_longest_prefix_match_wins() {
        let routers = vec![
            RouterInput {
                name: "R1".into(),
                interfaces: vec![
                    InterfaceInput { name: "ifA".into(), outbound_acl: None, inbound_acl: None },
                    InterfaceInput { name: "ifB".into(), outbound_acl: None, inbound_acl: None },
                ],
            },
            RouterInput {
                name: "RA".into(),
                interfaces: vec![InterfaceInput { name: "up".into(), outbound_acl: None, inbound_acl: None }],
            },
            RouterInput {
                name: "RB".into(),
                interfaces: vec![InterfaceInput { name: "up".into(), outbound_acl: None, inbound_acl: None }],
            },
        ];
        let topo = vec![
            TopologyEdge { source_router: "R1".into(), source_iface: "ifA".into(), target_router: "RA".into(), target_iface: "up".into() },
            TopologyEdge { source_router: "R1".into(), source_iface: "ifB".into(), target_router: "RB".into(), target_iface: "up".into() },
        ];
        let mut fibs = HashMap::new();
        fibs.insert(
            "R1".to_string(),
            Fib {
                rows: vec![
                    FibRow { prefix_addr: 0, prefix_len: 0, out_iface: "ifA".into() },
                    FibRow { prefix_addr: 0x0A000000, prefix_len: 8, out_iface: "ifB".into() },
                ],
            },
        );
        let b = build(routers, topo, fibs, Backend::Classic);
        let r1 = b.router_nodes["R1"];
        let rb = b.router_nodes["RB"];
        let hs = dst_ip_header_space(0x0A010101);
        let ans = reachable(
            &b.graph, &b.ec, &b.tree, &b.labels, b.drop_sink, &b.factory, &hs,
            Disposition::ACCEPT, &[r1], &hashset! {rb},
        );
        match ans {
            AnswerElement::Flow { outcome, path, .. } => {
                assert_eq!(outcome, Outcome::Accepted);
                assert_eq!(path.last().unwrap().node, rb);
            }
            AnswerElement::Empty => panic!("expected the more specific route to win"),
        }
    }

    #[test]
    fn doc_backend_answers_the_same_scenario() {
        let (routers, topo) = two_router_plain_topology();
        let mut fibs = HashMap::new();
        fibs.insert(
            "R1".to_string(),
            Fib { rows: vec![FibRow { prefix_addr: 0, prefix_len: 0, out_iface: "ifA".into() }] },
        );
        let b = build(routers, topo, fibs, Backend::Doc);
        let r1 = b.router_nodes["R1"];
        let r2 = b.router_nodes["R2"];
        let hs = dst_ip_header_space(0x01020304);
        let ans = reachable(
            &b.graph, &b.ec, &b.tree, &b.labels, b.drop_sink, &b.factory, &hs,
            Disposition::ACCEPT, &[r1], &hashset! {r2},
        );
        assert!(matches!(ans, AnswerElement::Flow { outcome: Outcome::Accepted, .. }));
    }
}
