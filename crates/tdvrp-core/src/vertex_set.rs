//! Fixed-capacity bitset over vertex indices.
//!
//! `networks2019:code/include/vrp_instance.h` fixes a compile-time
//! `MAX_N = 102` for `std::bitset<MAX_N>` "because we need this at
//! compilation time for bitset purposes". We carry the same tradeoff: a
//! const-sized `[u64; WORDS]` rather than a growable bitset, sized generously
//! above any instance this solver is meant to run (the Size Budget targets
//! routing instances, not graphs with hundreds of vertices).

use std::fmt;

pub const MAX_VERTICES: usize = 128;
const WORDS: usize = MAX_VERTICES / 64;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexSet([u64; WORDS]);

impl VertexSet {
    pub fn empty() -> Self {
        VertexSet([0; WORDS])
    }

    pub fn singleton(v: usize) -> Self {
        let mut s = Self::empty();
        s.insert(v);
        s
    }

    pub fn from_iter(it: impl IntoIterator<Item = usize>) -> Self {
        let mut s = Self::empty();
        for v in it {
            s.insert(v);
        }
        s
    }

    #[inline]
    pub fn insert(&mut self, v: usize) {
        debug_assert!(v < MAX_VERTICES, "vertex {v} exceeds MAX_VERTICES");
        self.0[v / 64] |= 1u64 << (v % 64);
    }

    #[inline]
    pub fn contains(&self, v: usize) -> bool {
        (self.0[v / 64] >> (v % 64)) & 1 == 1
    }

    pub fn union(&self, other: &VertexSet) -> VertexSet {
        let mut out = [0u64; WORDS];
        for i in 0..WORDS {
            out[i] = self.0[i] | other.0[i];
        }
        VertexSet(out)
    }

    pub fn intersection(&self, other: &VertexSet) -> VertexSet {
        let mut out = [0u64; WORDS];
        for i in 0..WORDS {
            out[i] = self.0[i] & other.0[i];
        }
        VertexSet(out)
    }

    pub fn union_with(&mut self, v: usize) {
        self.insert(v);
    }

    /// `self ⊆ other`.
    pub fn is_subset(&self, other: &VertexSet) -> bool {
        (0..WORDS).all(|i| self.0[i] & !other.0[i] == 0)
    }

    pub fn count(&self) -> u32 {
        self.0.iter().map(|w| w.count_ones()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_VERTICES).filter(move |&v| self.contains(v))
    }
}

impl fmt::Debug for VertexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_intersection_subset() {
        let a = VertexSet::from_iter([1, 2, 3]);
        let b = VertexSet::from_iter([2, 3, 4]);
        assert_eq!(a.union(&b), VertexSet::from_iter([1, 2, 3, 4]));
        assert_eq!(a.intersection(&b), VertexSet::from_iter([2, 3]));
        assert!(VertexSet::from_iter([2, 3]).is_subset(&a));
        assert!(!a.is_subset(&b));
    }

    #[test]
    fn singleton_and_count() {
        let s = VertexSet::singleton(70);
        assert!(s.contains(70));
        assert_eq!(s.count(), 1);
    }
}
