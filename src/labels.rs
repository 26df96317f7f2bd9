//! Per-link edge-label bitmaps, one bitset per link, indexed by EC alpha-index.

use bitvec::prelude::*;

/// One bitset per link; bit `alpha` of link `l` is set iff EC `alpha` is currently forwarded out
/// link `l`.
///
/// Bitmaps grow lazily: a link's bitset is only ever resized up to cover the highest EC index
/// touched so far, the same append-only discipline as [`crate::ec::EcStore`]'s parallel arrays.
#[derive(Debug, Clone)]
pub struct LinkLabels {
    bits: Vec<BitVec<Lsb0, usize>>,
}

impl LinkLabels {
    /// A fresh label store with `num_links` empty bitsets.
    pub fn new(num_links: usize) -> Self {
        Self { bits: vec![BitVec::new(); num_links] }
    }

    /// Number of links tracked.
    pub fn num_links(&self) -> usize {
        self.bits.len()
    }

    /// Set the label bit for EC `alpha` on `link`.
    pub fn set(&mut self, link: usize, alpha: usize) {
        let bv = &mut self.bits[link];
        if bv.len() <= alpha {
            bv.resize(alpha + 1, false);
        }
        bv.set(alpha, true);
    }

    /// Clear the label bit for EC `alpha` on `link`.
    pub fn clear(&mut self, link: usize, alpha: usize) {
        let bv = &mut self.bits[link];
        if alpha < bv.len() {
            bv.set(alpha, false);
        }
    }

    /// Whether EC `alpha` is labelled on `link`.
    pub fn get(&self, link: usize, alpha: usize) -> bool {
        self.bits[link].get(alpha).map(|b| *b).unwrap_or(false)
    }
}
