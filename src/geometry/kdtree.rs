//! Spatial index over the set of currently live equivalence-class rectangles.

use super::rect::HyperRectangle;

/// A binary tree of axis-aligned splitting planes over the live [`HyperRectangle`]s.
///
/// Every node also stores the bounding box of its whole subtree, which lets [`KdTree::intersect`]
/// prune subtrees that cannot possibly overlap the query rectangle. The bounding box only ever
/// grows on insert; [`KdTree::delete`] does not shrink it back down. A stale, overly large
/// bounding box is still safe to prune against -- it can only cause `intersect` to descend into a
/// subtree it didn't strictly need to, never to miss a live rectangle.
#[derive(Debug, Clone)]
pub struct KdTree {
    k: usize,
    root: Option<Box<Node>>,
}

#[derive(Debug, Clone)]
struct Node {
    rect: HyperRectangle,
    /// bounding box of `rect` unioned with every rectangle in `left` and `right`.
    bbox: HyperRectangle,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

fn union_bbox(a: &HyperRectangle, b: &HyperRectangle) -> HyperRectangle {
    let bounds = a
        .bounds()
        .iter()
        .zip(b.bounds().iter())
        .map(|(&(alo, ahi), &(blo, bhi))| (alo.min(blo), ahi.max(bhi)))
        .collect();
    HyperRectangle::new(bounds, 0)
}

fn overlaps(a: &HyperRectangle, b: &HyperRectangle) -> bool {
    a.bounds().iter().zip(b.bounds().iter()).all(|(&(alo, ahi), &(blo, bhi))| alo < bhi && blo < ahi)
}

fn midpoint(bound: (u64, u64)) -> u64 {
    bound.0 + (bound.1 - bound.0) / 2
}

/// The scalar a node's own splitting plane, and every comparison against it, is keyed on: the
/// midpoint of `rect`'s bound along `axis`. Using the same key on both sides of every comparison
/// (rather than, say, the node's midpoint against the incoming rectangle's raw lower bound) keeps
/// the classic kd-tree invariant intact: everything in a node's left subtree has a strictly
/// smaller key on the node's own axis, everything in its right subtree has a key greater or
/// equal, which is exactly what delete-by-replacement needs to stay correct.
fn key(rect: &HyperRectangle, axis: usize) -> u64 {
    midpoint(rect.bound(axis))
}

impl KdTree {
    /// A fresh, empty tree over `k`-dimensional rectangles.
    pub fn new(k: usize) -> Self {
        Self { k, root: None }
    }

    /// Number of live rectangles.
    pub fn len(&self) -> usize {
        fn count(node: &Option<Box<Node>>) -> usize {
            match node {
                None => 0,
                Some(n) => 1 + count(&n.left) + count(&n.right),
            }
        }
        count(&self.root)
    }

    /// Whether the tree holds no rectangles.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Insert `rect`. The splitting axis cycles through `0..k` by tree depth; at each existing
    /// node, `rect` descends left if its key on that axis (the midpoint of its bound) is less
    /// than the node's own key on that axis, right otherwise.
    pub fn insert(&mut self, rect: HyperRectangle) {
        Self::insert_at(&mut self.root, rect, 0, self.k);
    }

    fn insert_at(slot: &mut Option<Box<Node>>, rect: HyperRectangle, depth: usize, k: usize) {
        match slot {
            None => {
                *slot = Some(Box::new(Node { bbox: rect.clone(), rect, left: None, right: None }));
            }
            Some(node) => {
                node.bbox = union_bbox(&node.bbox, &rect);
                let axis = depth % k;
                if key(&rect, axis) < key(&node.rect, axis) {
                    Self::insert_at(&mut node.left, rect, depth + 1, k);
                } else {
                    Self::insert_at(&mut node.right, rect, depth + 1, k);
                }
            }
        }
    }

    /// Remove a rectangle equal (by bounds) to `rect`. Returns whether a matching rectangle was
    /// found.
    ///
    /// Uses standard kd-tree delete-by-replacement: the matched node is replaced by the minimum
    /// (on its own splitting axis) of its right subtree, or, lacking a right subtree, the minimum
    /// of its left subtree promoted into the right position; that replacement value is then
    /// recursively deleted from the subtree it came from. A single deletion therefore touches
    /// only the nodes along one root-to-leaf path plus one min-search down a single subtree --
    /// O(depth), not the size of the deleted node's whole subtree.
    pub fn delete(&mut self, rect: &HyperRectangle) -> bool {
        Self::delete_at(&mut self.root, rect, 0, self.k)
    }

    fn delete_at(slot: &mut Option<Box<Node>>, target: &HyperRectangle, depth: usize, k: usize) -> bool {
        let axis = depth % k;
        let is_match = matches!(slot, Some(node) if &node.rect == target);
        if !is_match {
            return match slot {
                None => false,
                Some(node) => {
                    if key(target, axis) < key(&node.rect, axis) {
                        Self::delete_at(&mut node.left, target, depth + 1, k)
                    } else {
                        Self::delete_at(&mut node.right, target, depth + 1, k)
                    }
                }
            };
        }

        let mut node = slot.take().unwrap();
        if node.right.is_some() {
            let replacement = Self::find_min(&node.right, depth + 1, k, axis).clone();
            node.rect = replacement.clone();
            Self::delete_at(&mut node.right, &replacement, depth + 1, k);
        } else if node.left.is_some() {
            let replacement = Self::find_min(&node.left, depth + 1, k, axis).clone();
            node.rect = replacement.clone();
            node.right = node.left.take();
            Self::delete_at(&mut node.right, &replacement, depth + 1, k);
        } else {
            // leaf: just drop it, nothing to put back in `slot`.
            return true;
        }
        *slot = Some(node);
        true
    }

    /// The rectangle with the minimum key on `axis` anywhere in the subtree rooted at `slot`.
    ///
    /// Standard kd-tree min-search: at a node splitting on `axis` itself, the minimum can only be
    /// in the left subtree (or the node itself, if it has none); at a node splitting on any other
    /// axis, the minimum could be on either side, so both subtrees (and the node) are checked.
    fn find_min(slot: &Option<Box<Node>>, depth: usize, k: usize, axis: usize) -> &HyperRectangle {
        let node = slot.as_ref().expect("find_min called on an empty subtree");
        let node_axis = depth % k;
        if node_axis == axis {
            match &node.left {
                None => &node.rect,
                Some(_) => Self::find_min(&node.left, depth + 1, k, axis),
            }
        } else {
            let mut best = &node.rect;
            if node.left.is_some() {
                let candidate = Self::find_min(&node.left, depth + 1, k, axis);
                if key(candidate, axis) < key(best, axis) {
                    best = candidate;
                }
            }
            if node.right.is_some() {
                let candidate = Self::find_min(&node.right, depth + 1, k, axis);
                if key(candidate, axis) < key(best, axis) {
                    best = candidate;
                }
            }
            best
        }
    }

    /// All live rectangles that have non-empty overlap with `q`.
    pub fn intersect(&self, q: &HyperRectangle) -> Vec<HyperRectangle> {
        let mut out = Vec::new();
        Self::intersect_at(&self.root, q, &mut out);
        out
    }

    fn intersect_at(slot: &Option<Box<Node>>, q: &HyperRectangle, out: &mut Vec<HyperRectangle>) {
        if let Some(node) = slot {
            if !overlaps(&node.bbox, q) {
                return;
            }
            if overlaps(&node.rect, q) {
                out.push(node.rect.clone());
            }
            Self::intersect_at(&node.left, q, out);
            Self::intersect_at(&node.right, q, out);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn r(bounds: &[(u64, u64)], ec: usize) -> HyperRectangle {
        HyperRectangle::new(bounds.to_vec(), ec)
    }

    #[test]
    fn insert_then_intersect_finds_overlapping_rects() {
        let mut tree = KdTree::new(1);
        tree.insert(r(&[(0, 10)], 0));
        tree.insert(r(&[(10, 20)], 1));
        tree.insert(r(&[(20, 30)], 2));

        let hits = tree.intersect(&r(&[(5, 15)], usize::MAX));
        let mut ecs: Vec<usize> = hits.iter().map(|h| h.ec).collect();
        ecs.sort_unstable();
        assert_eq!(ecs, vec![0, 1]);
    }

    #[test]
    fn delete_removes_exactly_the_matching_rect() {
        let mut tree = KdTree::new(1);
        tree.insert(r(&[(0, 10)], 0));
        tree.insert(r(&[(10, 20)], 1));
        assert!(tree.delete(&r(&[(0, 10)], 0)));
        assert_eq!(tree.len(), 1);
        let hits = tree.intersect(&r(&[(0, 10)], usize::MAX));
        assert!(hits.is_empty());
    }

    #[test]
    fn delete_missing_rect_returns_false() {
        let mut tree = KdTree::new(1);
        tree.insert(r(&[(0, 10)], 0));
        assert!(!tree.delete(&r(&[(50, 60)], 99)));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn delete_node_with_both_children_preserves_the_rest() {
        let mut tree = KdTree::new(1);
        tree.insert(r(&[(40, 50)], 0));
        tree.insert(r(&[(10, 20)], 1));
        tree.insert(r(&[(60, 70)], 2));
        tree.insert(r(&[(0, 5)], 3));
        tree.insert(r(&[(25, 30)], 4));
        tree.insert(r(&[(55, 58)], 5));
        tree.insert(r(&[(80, 90)], 6));

        assert!(tree.delete(&r(&[(40, 50)], 0)));
        assert_eq!(tree.len(), 6);

        let q = r(&[(0, 100)], usize::MAX);
        let mut hit_ecs: Vec<usize> = tree.intersect(&q).iter().map(|h| h.ec).collect();
        hit_ecs.sort_unstable();
        assert_eq!(hit_ecs, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn delete_node_with_only_a_left_child_promotes_it() {
        let mut tree = KdTree::new(1);
        tree.insert(r(&[(40, 50)], 0));
        tree.insert(r(&[(10, 20)], 1));
        tree.insert(r(&[(0, 5)], 2));

        assert!(tree.delete(&r(&[(40, 50)], 0)));
        assert_eq!(tree.len(), 2);

        let q = r(&[(0, 100)], usize::MAX);
        let mut hit_ecs: Vec<usize> = tree.intersect(&q).iter().map(|h| h.ec).collect();
        hit_ecs.sort_unstable();
        assert_eq!(hit_ecs, vec![1, 2]);
    }

    #[test]
    fn fidelity_over_many_inserts_and_deletes() {
        let mut tree = KdTree::new(2);
        let mut live = Vec::new();
        for i in 0..20u64 {
            let rect = r(&[(i * 10, i * 10 + 10), (0, 100)], i as usize);
            tree.insert(rect.clone());
            live.push(rect);
        }
        // delete every third one
        let mut kept = Vec::new();
        for (i, rect) in live.into_iter().enumerate() {
            if i % 3 == 0 {
                assert!(tree.delete(&rect));
            } else {
                kept.push(rect);
            }
        }
        assert_eq!(tree.len(), kept.len());

        let q = r(&[(0, 200), (0, 100)], usize::MAX);
        let mut hit_ecs: Vec<usize> = tree.intersect(&q).iter().map(|h| h.ec).collect();
        hit_ecs.sort_unstable();
        let mut expect_ecs: Vec<usize> = kept.iter().map(|r| r.ec).collect();
        expect_ecs.sort_unstable();
        assert_eq!(hit_ecs, expect_ecs);
    }
}
