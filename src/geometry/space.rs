//! Turns header-space predicates into concrete [`HyperRectangle`]s.

use super::field::PacketField;
use super::rect::HyperRectangle;
use itertools::Itertools;
use std::collections::BTreeMap;

/// A sentinel EC tag for rectangles that do not (yet) belong to a live equivalence class, such as
/// a rule's match rectangle or a query rectangle.
pub const NO_EC: usize = usize::MAX;

/// A conjunction of per-field inclusion sets.
///
/// A field absent from `includes` matches its entire domain. A field present with more than one
/// `(lo, hi)` range is a disjunction on that axis: `dst_port in {(80, 81), (443, 444)}` for
/// example. The conjunction across fields, combined with the disjunction within each field, is
/// resolved into a union of rectangles by [`GeometricSpaceFactory::from_header_space`].
#[derive(Debug, Clone, Default)]
pub struct HeaderSpace {
    includes: BTreeMap<PacketField, Vec<(u64, u64)>>,
}

impl HeaderSpace {
    /// An unconstrained header space (matches every field's full domain).
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `field` to the union of `ranges`. Calling this again for the same field replaces
    /// the previous restriction.
    pub fn restrict(&mut self, field: PacketField, ranges: Vec<(u64, u64)>) -> &mut Self {
        self.includes.insert(field, ranges);
        self
    }

    /// Restrict `field` to the single value `v`.
    pub fn restrict_value(&mut self, field: PacketField, v: u64) -> &mut Self {
        self.restrict(field, vec![(v, v + 1)])
    }

    /// All fields this header space explicitly restricts.
    pub fn referenced_fields(&self) -> impl Iterator<Item = PacketField> + '_ {
        self.includes.keys().copied()
    }

    fn ranges_for(&self, field: PacketField) -> Vec<(u64, u64)> {
        self.includes.get(&field).cloned().unwrap_or_else(|| vec![field.full_domain()])
    }
}

/// An ordered union of rectangles, all sharing the same active-field ordering.
#[derive(Debug, Clone, Default)]
pub struct GeometricSpace {
    rects: Vec<HyperRectangle>,
}

impl GeometricSpace {
    /// The rectangles making up this union, in a fixed, deterministic order.
    pub fn rects(&self) -> &[HyperRectangle] {
        &self.rects
    }

    /// Consume the space, yielding its rectangles.
    pub fn into_rects(self) -> Vec<HyperRectangle> {
        self.rects
    }
}

/// Builds rectangles and geometric spaces over a fixed, ordered subset of [`PacketField`]s.
#[derive(Debug, Clone)]
pub struct GeometricSpaceFactory {
    fields: Vec<PacketField>,
}

impl GeometricSpaceFactory {
    /// Build a factory over `fields`, which must already be in [`PacketField::canonical_order`]
    /// relative order (the order the engine otherwise enables fields in).
    pub fn new(fields: Vec<PacketField>) -> Self {
        Self { fields }
    }

    /// The active fields, in the order every rectangle's bounds are indexed against.
    pub fn fields(&self) -> &[PacketField] {
        &self.fields
    }

    /// The full space: every axis at its full domain.
    pub fn full_space(&self) -> HyperRectangle {
        HyperRectangle::new(self.fields.iter().map(|f| f.full_domain()).collect(), NO_EC)
    }

    /// Resolve a [`HeaderSpace`] into a union of rectangles.
    ///
    /// A disjunction on any one field fans out into a cross product of rectangles across all
    /// disjunctions; e.g. two fields each with two alternative ranges yield four rectangles.
    pub fn from_header_space(&self, hs: &HeaderSpace) -> GeometricSpace {
        let per_field_ranges: Vec<Vec<(u64, u64)>> =
            self.fields.iter().map(|f| hs.ranges_for(*f)).collect();

        let rects = per_field_ranges
            .into_iter()
            .multi_cartesian_product()
            .map(|bounds| HyperRectangle::new(bounds, NO_EC))
            .collect();

        GeometricSpace { rects }
    }

    /// Pick one concrete header from inside `rect`: the lower bound on every axis.
    pub fn example(&self, rect: &HyperRectangle) -> Vec<u64> {
        rect.bounds().iter().map(|&(lo, _)| lo).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::field::PacketField::*;

    #[test]
    fn full_space_spans_every_axis() {
        let factory = GeometricSpaceFactory::new(vec![DstIp, DstPort]);
        let full = factory.full_space();
        assert_eq!(full.bound(0), (0, 1u64 << 32));
        assert_eq!(full.bound(1), (0, 1u64 << 16));
    }

    #[test]
    fn disjunction_fans_out_into_cross_product() {
        let factory = GeometricSpaceFactory::new(vec![DstIp, DstPort]);
        let mut hs = HeaderSpace::new();
        hs.restrict(DstIp, vec![(0, 10), (20, 30)]);
        hs.restrict(DstPort, vec![(80, 81), (443, 444)]);
        let space = factory.from_header_space(&hs);
        assert_eq!(space.rects().len(), 4);
    }

    #[test]
    fn example_picks_the_lower_bound() {
        let factory = GeometricSpaceFactory::new(vec![DstIp]);
        let mut hs = HeaderSpace::new();
        hs.restrict_value(DstIp, 167837953);
        let space = factory.from_header_space(&hs);
        assert_eq!(factory.example(&space.rects()[0]), vec![167837953]);
    }
}
