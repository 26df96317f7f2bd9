//! Axis-aligned hyperrectangles over packet header space.

use num::BigUint;

/// A half-open axis-aligned product `[lo_0, hi_0) x ... x [lo_{k-1}, hi_{k-1})`.
///
/// `ec` names the equivalence class this rectangle currently belongs to. It is **not** part of
/// the rectangle's identity: two rectangles with identical bounds are equal regardless of which
/// EC they are tagged with, since the tag is just bookkeeping for whoever is holding the
/// rectangle (the KD-tree, a query result, ...).
#[derive(Debug, Clone)]
pub struct HyperRectangle {
    bounds: Vec<(u64, u64)>,
    /// alpha-index of the equivalence class this rectangle represents, if any.
    pub ec: usize,
}

impl PartialEq for HyperRectangle {
    fn eq(&self, other: &Self) -> bool {
        self.bounds == other.bounds
    }
}
impl Eq for HyperRectangle {}

impl HyperRectangle {
    /// Build a rectangle from explicit per-axis bounds, tagged with EC `ec`.
    pub fn new(bounds: Vec<(u64, u64)>, ec: usize) -> Self {
        Self { bounds, ec }
    }

    /// Number of axes.
    pub fn dims(&self) -> usize {
        self.bounds.len()
    }

    /// Bounds on axis `i`.
    pub fn bound(&self, i: usize) -> (u64, u64) {
        self.bounds[i]
    }

    /// All bounds, in axis order.
    pub fn bounds(&self) -> &[(u64, u64)] {
        &self.bounds
    }

    /// Whether the rectangle is non-empty on every axis.
    pub fn is_valid(&self) -> bool {
        self.bounds.iter().all(|(lo, hi)| lo < hi)
    }

    /// Returns a copy of `self` tagged with a different EC.
    pub fn with_ec(&self, ec: usize) -> Self {
        Self { bounds: self.bounds.clone(), ec }
    }

    /// Volume, as an arbitrary-precision integer (the product of the side lengths).
    ///
    /// High-dimensional rectangles easily exceed 64 bits once more than a couple of wide axes
    /// (such as the 33-bit-wide destination IP axis) are multiplied together.
    pub fn volume(&self) -> BigUint {
        self.bounds
            .iter()
            .map(|(lo, hi)| BigUint::from(hi - lo))
            .fold(BigUint::from(1u32), |acc, side| acc * side)
    }

    /// Whether `self` fully contains `other` (`other` is a subset of `self`).
    pub fn contains(&self, other: &HyperRectangle) -> bool {
        debug_assert_eq!(self.dims(), other.dims());
        self.bounds
            .iter()
            .zip(other.bounds.iter())
            .all(|(&(slo, shi), &(olo, ohi))| slo <= olo && ohi <= shi)
    }

    /// The componentwise intersection of `a` and `b`, or `None` if they are disjoint on any axis.
    ///
    /// The result is tagged with `a`'s EC; callers that need a different tag should re-tag with
    /// [`HyperRectangle::with_ec`].
    pub fn overlap(a: &HyperRectangle, b: &HyperRectangle) -> Option<HyperRectangle> {
        debug_assert_eq!(a.dims(), b.dims());
        let mut bounds = Vec::with_capacity(a.dims());
        for (&(alo, ahi), &(blo, bhi)) in a.bounds.iter().zip(b.bounds.iter()) {
            let lo = alo.max(blo);
            let hi = ahi.min(bhi);
            if lo >= hi {
                return None;
            }
            bounds.push((lo, hi));
        }
        Some(HyperRectangle { bounds, ec: a.ec })
    }

    /// Partition `a \ o` into disjoint rectangles, given `o` is contained in `a`.
    ///
    /// Returns the empty vector when `o == a`: the caller is expected to treat `a` itself as the
    /// overlap in that case, no peeling is necessary. Otherwise this sweeps the axes in a fixed
    /// order, at each axis peeling off the slab below `o`'s lower bound and the slab above `o`'s
    /// upper bound, then clipping the remainder to `o`'s range on that axis before moving to the
    /// next one. This is deterministic: the same `(a, o)` pair always yields parts in the same
    /// order.
    pub fn subtract(a: &HyperRectangle, o: &HyperRectangle) -> Vec<HyperRectangle> {
        debug_assert_eq!(a.dims(), o.dims());
        debug_assert!(a.contains(o), "subtract requires o to be contained in a");

        if a == o {
            return Vec::new();
        }

        let mut parts = Vec::new();
        // `remaining` is the part of `a` not yet peeled off, clipped to `o`'s range on every axis
        // already processed.
        let mut remaining = a.bounds.clone();

        for (i, &(olo, ohi)) in o.bounds.iter().enumerate() {
            let (rlo, rhi) = remaining[i];

            if rlo < olo {
                let mut below = remaining.clone();
                below[i] = (rlo, olo);
                parts.push(HyperRectangle { bounds: below, ec: a.ec });
            }
            if ohi < rhi {
                let mut above = remaining.clone();
                above[i] = (ohi, rhi);
                parts.push(HyperRectangle { bounds: above, ec: a.ec });
            }
            remaining[i] = (olo, ohi);
        }

        parts
    }
}
