//! # Geometry
//!
//! The geometric representation of packet header space: [`field::PacketField`] enumerates the
//! axes, [`rect::HyperRectangle`] is the per-EC region, [`space`] turns predicates into unions of
//! rectangles, and [`kdtree::KdTree`] is the spatial index over the live set of them.

pub mod field;
pub mod kdtree;
pub mod rect;
pub mod space;

pub use field::PacketField;
pub use kdtree::KdTree;
pub use rect::HyperRectangle;
pub use space::{GeometricSpace, GeometricSpaceFactory, HeaderSpace, NO_EC};
