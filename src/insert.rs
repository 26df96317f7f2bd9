//! Rule insertion: refines the live ECs and keeps edge labels in sync.

use crate::ec::{Backend, EcStore};
use crate::geometry::{HyperRectangle, KdTree};
use crate::labels::LinkLabels;
use crate::rule::Rule;
use log::trace;
use num::BigUint;
use std::collections::{HashMap, HashSet};

/// Insert `rule`, refining ECs (classic) or growing the DAG (DoC) as needed, then apply it.
pub fn insert_rule(ec: &mut EcStore, tree: &mut KdTree, labels: &mut LinkLabels, rule: &Rule) {
    match ec.backend() {
        Backend::Classic => add_rule_classic(ec, tree, labels, rule),
        Backend::Doc => add_rule_doc(ec, tree, labels, rule),
    }
}

/// Classic `addRule`: physically splits every intersecting EC around the rule's rectangle.
fn add_rule_classic(ec: &mut EcStore, tree: &mut KdTree, labels: &mut LinkLabels, rule: &Rule) {
    let hits = tree.intersect(&rule.rect);
    let mut deltas: Vec<(usize, usize)> = Vec::new();
    let mut overlapping: Vec<usize> = Vec::new();

    for r in hits {
        let alpha = r.ec;
        let o = HyperRectangle::overlap(&rule.rect, &r).expect("KD-tree reported a false hit");

        if o.bounds() == r.bounds() {
            overlapping.push(alpha);
            continue;
        }

        let slabs = HyperRectangle::subtract(&r, &o);
        debug_assert!(!slabs.is_empty(), "o != r must leave at least one slab");
        tree.delete(&r);

        let reused = slabs[0].with_ec(alpha);
        ec.set_rect(alpha, reused.clone());
        tree.insert(reused);

        for slab in &slabs[1..] {
            let child = ec.alloc(slab.clone(), BigUint::from(0u32));
            tree.insert(slab.with_ec(child));
            deltas.push((alpha, child));
        }

        let o_idx = ec.alloc(o.clone(), BigUint::from(0u32));
        tree.insert(o.with_ec(o_idx));
        deltas.push((alpha, o_idx));
        overlapping.push(o_idx);
    }

    trace!(
        "classic insertion at priority {}: {} new ECs, {} overlapping",
        rule.priority,
        deltas.len(),
        overlapping.len()
    );
    update_rules(ec, labels, rule, &deltas, &overlapping);
}

/// Difference-of-cubes `addRuleDoc`: adds a new EC for the part of the overlap not already
/// attributed to a descendant, recording a parent -> child DAG arc instead of physically
/// splitting anything.
fn add_rule_doc(ec: &mut EcStore, tree: &mut KdTree, labels: &mut LinkLabels, rule: &Rule) {
    let hit_rects = tree.intersect(&rule.rect);
    let hits: HashSet<usize> = hit_rects.iter().map(|r| r.ec).collect();

    let mut cache: HashMap<usize, (BigUint, Option<usize>)> = HashMap::new();
    let mut deltas: Vec<(usize, usize)> = Vec::new();
    let mut overlapping: Vec<usize> = Vec::new();

    for alpha in hits.iter().copied() {
        add_rule_doc_rec(ec, tree, &rule.rect, alpha, &mut cache, &hits, &mut deltas, &mut overlapping);
    }

    trace!(
        "DoC insertion at priority {}: {} new ECs, {} overlapping",
        rule.priority,
        deltas.len(),
        overlapping.len()
    );
    update_rules(ec, labels, rule, &deltas, &overlapping);
}

#[allow(clippy::too_many_arguments)]
fn add_rule_doc_rec(
    ec: &mut EcStore,
    tree: &mut KdTree,
    added: &HyperRectangle,
    other: usize,
    cache: &mut HashMap<usize, (BigUint, Option<usize>)>,
    hits: &HashSet<usize>,
    deltas: &mut Vec<(usize, usize)>,
    overlapping: &mut Vec<usize>,
) -> (BigUint, Option<usize>) {
    if let Some(cached) = cache.get(&other) {
        return cached.clone();
    }

    let other_rect = ec.rect(other).clone();
    let o = match HyperRectangle::overlap(added, &other_rect) {
        Some(o) => o,
        None => {
            let result = (BigUint::from(0u32), None);
            cache.insert(other, result.clone());
            return result;
        }
    };

    if o.bounds() == other_rect.bounds() {
        let result = (o.volume(), Some(other));
        cache.insert(other, result.clone());
        return result;
    }

    let children: Vec<usize> = ec.children(other).to_vec();
    let mut children_vol = BigUint::from(0u32);
    let mut child_ecs = Vec::new();
    for child in children {
        if hits.contains(&child) {
            let (v, child_ec) = add_rule_doc_rec(ec, tree, added, child, cache, hits, deltas, overlapping);
            children_vol += v;
            if let Some(c) = child_ec {
                child_ecs.push(c);
            }
        }
    }

    let slice = o.volume() - children_vol;
    if slice == BigUint::from(0u32) {
        let result = (o.volume(), None);
        cache.insert(other, result.clone());
        return result;
    }

    let new_assigned = ec.assigned_volume(other).clone() - slice.clone();
    if new_assigned == BigUint::from(0u32) {
        overlapping.push(other);
        let result = (o.volume(), Some(other));
        cache.insert(other, result.clone());
        return result;
    }

    ec.set_assigned_volume(other, new_assigned);
    let beta = ec.alloc(o.clone(), slice);
    ec.add_child(other, beta);
    for c in child_ecs {
        ec.add_child(beta, c);
    }
    tree.insert(o.with_ec(beta));
    overlapping.push(beta);
    deltas.push((other, beta));

    let result = (o.volume(), Some(beta));
    cache.insert(other, result.clone());
    result
}

/// Shared tail of both insertion algorithms: duplicate owner maps into newly split-off ECs, then
/// apply `rule` to every EC it actually overlaps.
fn update_rules(
    ec: &mut EcStore,
    labels: &mut LinkLabels,
    rule: &Rule,
    deltas: &[(usize, usize)],
    overlapping: &[usize],
) {
    for &(parent, child) in deltas {
        let owners = ec.owner_map(parent).clone();
        for owner_rule in owners.values() {
            labels.set(owner_rule.link_index, child);
        }
        ec.set_owner_map(child, owners);
    }

    for &alpha in overlapping {
        let current = ec.owner_map(alpha).get(&rule.source).cloned();
        if rule.outranks(current.as_ref()) {
            labels.set(rule.link_index, alpha);
            if let Some(prev) = &current {
                if prev.link_index != rule.link_index {
                    labels.clear(prev.link_index, alpha);
                }
            }
            ec.owner_map_mut(alpha).insert(rule.source, rule.clone());
        }
    }
}
