//! Atoms and tuple sets over the finite model universe.

use std::collections::BTreeSet;
use std::fmt;

/// An index into the flat atom universe, stable for the lifetime of one
/// `run`/`check` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Atom(pub u32);

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row of a relation: `k` atoms for an arity-`k` relation.
pub type Tuple = Vec<Atom>;

/// An explicit set of tuples, all of the same arity. Backed by a sorted set
/// so bounds comparisons and set algebra are cheap and deterministic, which
/// in turn gives clause emission a canonical tuple order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleSet {
    arity: usize,
    tuples: BTreeSet<Tuple>,
}

impl TupleSet {
    pub fn empty(arity: usize) -> Self {
        Self { arity, tuples: BTreeSet::new() }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn insert(&mut self, t: Tuple) {
        debug_assert_eq!(t.len(), self.arity, "tuple arity mismatch");
        self.tuples.insert(t);
    }

    pub fn contains(&self, t: &[Atom]) -> bool {
        self.tuples.contains(t)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter()
    }

    pub fn unary_from_atoms(atoms: impl IntoIterator<Item = Atom>) -> Self {
        let mut set = Self::empty(1);
        for a in atoms {
            set.insert(vec![a]);
        }
        set
    }

    /// Cartesian product `self x other`, arity `self.arity + other.arity`.
    pub fn product(&self, other: &TupleSet) -> TupleSet {
        let mut out = TupleSet::empty(self.arity + other.arity);
        for a in &self.tuples {
            for b in &other.tuples {
                let mut t = a.clone();
                t.extend(b.iter().copied());
                out.tuples.insert(t);
            }
        }
        out
    }

    pub fn union(&self, other: &TupleSet) -> TupleSet {
        debug_assert_eq!(self.arity, other.arity);
        TupleSet { arity: self.arity, tuples: self.tuples.union(&other.tuples).cloned().collect() }
    }

    pub fn intersection(&self, other: &TupleSet) -> TupleSet {
        debug_assert_eq!(self.arity, other.arity);
        TupleSet { arity: self.arity, tuples: self.tuples.intersection(&other.tuples).cloned().collect() }
    }

    pub fn difference(&self, other: &TupleSet) -> TupleSet {
        debug_assert_eq!(self.arity, other.arity);
        TupleSet { arity: self.arity, tuples: self.tuples.difference(&other.tuples).cloned().collect() }
    }

    pub fn is_subset(&self, other: &TupleSet) -> bool {
        self.tuples.is_subset(&other.tuples)
    }

    /// Relational join on the shared dimension: `self`'s last column against
    /// `other`'s first column.
    pub fn join(&self, other: &TupleSet) -> TupleSet {
        assert!(self.arity > 0 && other.arity > 0, "join requires non-nullary operands");
        let mut out = TupleSet::empty(self.arity + other.arity - 2);
        for a in &self.tuples {
            for b in &other.tuples {
                if a[a.len() - 1] == b[0] {
                    let mut t = a[..a.len() - 1].to_vec();
                    t.extend(b[1..].iter().copied());
                    out.tuples.insert(t);
                }
            }
        }
        out
    }

    pub fn transpose(&self) -> TupleSet {
        assert_eq!(self.arity, 2);
        let mut out = TupleSet::empty(2);
        for t in &self.tuples {
            out.tuples.insert(vec![t[1], t[0]]);
        }
        out
    }

    /// Transitive closure via iterative squaring.
    pub fn transitive_closure(&self, universe_size: usize) -> TupleSet {
        assert_eq!(self.arity, 2);
        let mut r = self.clone();
        let iterations = (universe_size as f64).log2().ceil() as u32 + 1;
        for _ in 0..iterations.max(1) {
            let squared = r.join(&r);
            let next = r.union(&squared);
            if next == r {
                break;
            }
            r = next;
        }
        r
    }

    pub fn reflexive_closure(&self, identity: &TupleSet) -> TupleSet {
        self.union(identity)
    }

    /// `self ++ other`: domain-override.
    pub fn override_with(&self, other: &TupleSet) -> TupleSet {
        assert!(self.arity >= 2 && other.arity == self.arity);
        let domain: BTreeSet<Atom> = other.tuples.iter().map(|t| t[0]).collect();
        let kept: BTreeSet<Tuple> = self.tuples.iter().filter(|t| !domain.contains(&t[0])).cloned().collect();
        TupleSet { arity: self.arity, tuples: kept.union(&other.tuples).cloned().collect() }
    }

    pub fn domain_restrict(&self, domain: &TupleSet) -> TupleSet {
        assert_eq!(domain.arity, 1);
        let keep: BTreeSet<Atom> = domain.tuples.iter().map(|t| t[0]).collect();
        TupleSet { arity: self.arity, tuples: self.tuples.iter().filter(|t| keep.contains(&t[0])).cloned().collect() }
    }

    pub fn range_restrict(&self, range: &TupleSet) -> TupleSet {
        assert_eq!(range.arity, 1);
        let keep: BTreeSet<Atom> = range.tuples.iter().map(|t| t[0]).collect();
        TupleSet { arity: self.arity, tuples: self.tuples.iter().filter(|t| keep.contains(&t[t.len() - 1])).cloned().collect() }
    }

    pub fn identity(atoms: &[Atom]) -> TupleSet {
        let mut out = TupleSet::empty(2);
        for &a in atoms {
            out.insert(vec![a, a]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(n: u32) -> Atom {
        Atom(n)
    }

    #[test]
    fn join_matches_shared_dimension() {
        let mut r = TupleSet::empty(2);
        r.insert(vec![a(0), a(1)]);
        let mut s = TupleSet::empty(2);
        s.insert(vec![a(1), a(2)]);
        let joined = r.join(&s);
        assert_eq!(joined.iter().collect::<Vec<_>>(), vec![&vec![a(0), a(2)]]);
    }

    #[test]
    fn transitive_closure_reaches_all_descendants() {
        let mut r = TupleSet::empty(2);
        r.insert(vec![a(0), a(1)]);
        r.insert(vec![a(1), a(2)]);
        r.insert(vec![a(2), a(3)]);
        let tc = r.transitive_closure(4);
        assert!(tc.contains(&[a(0), a(3)]));
        assert!(tc.contains(&[a(1), a(3)]));
        assert!(!tc.contains(&[a(3), a(0)]));
    }

    #[test]
    fn override_replaces_overridden_domain_only() {
        let mut a_rel = TupleSet::empty(2);
        a_rel.insert(vec![a(0), a(1)]);
        a_rel.insert(vec![a(2), a(3)]);
        let mut b_rel = TupleSet::empty(2);
        b_rel.insert(vec![a(0), a(9)]);
        let result = a_rel.override_with(&b_rel);
        assert!(result.contains(&[a(0), a(9)]));
        assert!(!result.contains(&[a(0), a(1)]));
        assert!(result.contains(&[a(2), a(3)]));
    }
}
