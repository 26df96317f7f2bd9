#![deny(missing_docs)]

//! # ecreach: forwarding-equivalence-class reachability engine
//!
//! Given a network's FIBs, interface ACLs and topology, this crate maintains an edge-labelled
//! multigraph in which every link is annotated with the set of packet equivalence classes (ECs)
//! that would be forwarded out of it, and answers reachability queries ("can traffic matching
//! this header space reach router X from router Y, and if not, why not") against it.
//!
//! ## Structure
//!
//! - **[`geometry`]**: the header-space side of the engine -- [`geometry::HyperRectangle`]
//!   algebra, the [`geometry::GeometricSpaceFactory`] that turns predicates into rectangles, and
//!   the [`geometry::KdTree`] spatial index over the live ECs.
//! - **[`ec`]**: the [`ec::EcStore`], the alpha-indexed parallel arrays holding every EC's
//!   rectangle, owner map, and (difference-of-cubes only) DAG state.
//! - **[`graph`]**: the network graph -- routers, ACL nodes, the drop sink, and the links between
//!   them, built on `petgraph`.
//! - **[`labels`]**: the per-link edge-label bitmaps.
//! - **[`insert`]**: the rule insertion protocol: classic splitting or difference-of-cubes DAG
//!   growth, followed by the shared owner-map maintenance.
//! - **[`search`]**: the reachability query: relevant-EC selection followed by a per-EC BFS
//!   with disposition detection and path reconstruction.
//! - **[`input`]**: the plain value types a caller assembles from its own FIB/ACL/topology data
//!   to hand to [`EcEngine::build`]. Parsing vendor configuration into these is out of scope.
//!
//! [`EcEngine`] is the single entry point: [`EcEngine::build`] constructs it,
//! [`EcEngine::reachable`] queries it.

pub mod acl;
pub mod disposition;
pub mod ec;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod input;
mod insert;
pub mod labels;
pub mod rule;
mod rule_factory;
mod search;

pub use disposition::{AnswerElement, Disposition, Hop, Outcome};
pub use ec::Backend as BackendType;
pub use error::EcError;

use ec::EcStore;
use geometry::{GeometricSpaceFactory, HeaderSpace, KdTree};
use graph::EcGraph;
use input::{Fib, RouterInput, TopologyEdge};
use labels::LinkLabels;
use log::{debug, info};
use petgraph::graph::NodeIndex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rule::Rule;
use std::collections::{HashMap, HashSet};

/// Fixed PRNG seed bulk loading shuffles rule order with, for reproducible KD-tree balance.
const BULK_LOAD_SHUFFLE_SEED: u64 = 7;

/// The forwarding-equivalence-class reachability engine.
///
/// Built once from a network's FIBs, ACLs and topology via [`EcEngine::build`]; thereafter
/// read-only, answering [`EcEngine::reachable`] queries against the EC partition/DAG and edge
/// labels constructed at build time. The engine is meant for single-threaded, sequential use:
/// callers that want to interleave queries across threads must serialize externally.
pub struct EcEngine {
    graph: EcGraph,
    ec: EcStore,
    tree: KdTree,
    labels: LinkLabels,
    drop_sink: NodeIndex,
    router_nodes: HashMap<String, NodeIndex>,
    factory: GeometricSpaceFactory,
}

impl EcEngine {
    /// Build the engine from a network's routers (with their interfaces and ACLs), topology
    /// edges, and per-router FIBs, maintaining ECs in the given representation.
    ///
    /// Construction proceeds in one bulk phase: build the graph, pick the active packet
    /// fields, derive every FIB- and ACL-line rule, then insert them all in a deterministic
    /// order (ACL rules first, each bucket sorted by rectangle and shuffled with a fixed seed
    /// for KD-tree balance).
    pub fn build(
        routers: Vec<RouterInput>,
        topology: Vec<TopologyEdge>,
        fibs: HashMap<String, Fib>,
        backend: BackendType,
    ) -> Result<Self, EcError> {
        info!("building EC engine over {} router(s), backend {:?}", routers.len(), backend);

        let built = graph::build_graph(&routers, &topology)?;
        debug!("graph built: {} nodes, {} links", built.graph.node_count(), built.num_links);

        let fields = rule_factory::active_fields(&routers);
        debug!("active packet fields: {:?}", fields);
        let factory = GeometricSpaceFactory::new(fields);

        let full_space = factory.full_space();
        let mut ec = EcStore::new(full_space.clone(), backend);
        let mut tree = KdTree::new(factory.fields().len());
        tree.insert(full_space.with_ec(0));
        let mut labels = LinkLabels::new(built.num_links);

        let mut acl_bucket = rule_factory::acl_rules(&built.graph, built.drop_sink, &factory);
        let mut fib_bucket =
            rule_factory::fib_rules(&built.graph, &built.router_nodes, &routers, &fibs, &factory)?;

        let mut rng = StdRng::seed_from_u64(BULK_LOAD_SHUFFLE_SEED);
        sort_then_shuffle(&mut acl_bucket, &mut rng);
        sort_then_shuffle(&mut fib_bucket, &mut rng);

        debug!(
            "bulk-loading {} ACL rule(s) then {} FIB rule(s)",
            acl_bucket.len(),
            fib_bucket.len()
        );
        for rule in acl_bucket.iter().chain(fib_bucket.iter()) {
            insert::insert_rule(&mut ec, &mut tree, &mut labels, rule);
        }

        info!("engine built: {} live EC(s)", ec.len());
        Ok(Self {
            graph: built.graph,
            ec,
            tree,
            labels,
            drop_sink: built.drop_sink,
            router_nodes: built.router_nodes,
            factory,
        })
    }

    /// The node index of a named router, if it exists.
    pub fn router_node(&self, name: &str) -> Option<NodeIndex> {
        self.router_nodes.get(name).copied()
    }

    /// Number of live equivalence classes.
    pub fn num_ecs(&self) -> usize {
        self.ec.len()
    }

    /// Run a reachability query: does traffic matching `header_space`, leaving from any of
    /// `sources`, reach one of `sinks` with one of the dispositions in `actions`?
    ///
    /// Returns one concrete witnessing flow, or [`AnswerElement::Empty`] if none exists.
    pub fn reachable(
        &self,
        header_space: &HeaderSpace,
        actions: Disposition,
        sources: &[NodeIndex],
        sinks: &HashSet<NodeIndex>,
    ) -> AnswerElement {
        search::reachable(
            &self.graph,
            &self.ec,
            &self.tree,
            &self.labels,
            self.drop_sink,
            &self.factory,
            header_space,
            actions,
            sources,
            sinks,
        )
    }
}

/// Sort `rules` lexicographically by rectangle bounds, then shuffle with `rng`: a deterministic
/// starting order followed by a reproducible shuffle, so KD-tree balance is
/// reproducible across runs without depending on whatever order the caller happened to supply
/// rules in.
fn sort_then_shuffle(rules: &mut [Rule], rng: &mut StdRng) {
    rules.sort_by(|a, b| a.rect.bounds().cmp(b.rect.bounds()));
    rules.shuffle(rng);
}
