//! Boolean matrices over the atom universe: the core relational-algebra
//! engine. Every matrix enumerates
//! all `|U|^arity` tuples in canonical (mixed-radix) order; a cell is
//! `True`, `False`, or a fresh SAT variable.

use tracing::warn;

use crate::cnf::{CnfBuilder, Literal};
use crate::tupleset::{Atom, Tuple, TupleSet};

/// The kernel refuses to materialize a join/product whose output would
/// exceed this many tuples; callers must bound scopes.
pub const MAX_OUTPUT_TUPLES: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanValue {
    Const(bool),
    Var(Literal),
}

impl BooleanValue {
    pub fn negate(self) -> BooleanValue {
        match self {
            BooleanValue::Const(b) => BooleanValue::Const(!b),
            BooleanValue::Var(l) => BooleanValue::Var(l.negate()),
        }
    }

    pub fn as_literal(self, cnf: &mut CnfBuilder) -> Literal {
        match self {
            BooleanValue::Const(true) => cnf.true_lit(),
            BooleanValue::Const(false) => cnf.false_lit(),
            BooleanValue::Var(l) => l,
        }
    }
}

/// Dense array of `BooleanValue`, indexed by the canonical enumeration of
/// all arity-`k` tuples over a universe of size `universe_size`.
#[derive(Debug, Clone)]
pub struct BooleanMatrix {
    arity: usize,
    universe_size: usize,
    cells: Vec<BooleanValue>,
}

fn pow(base: usize, exp: usize) -> usize {
    let mut r = 1usize;
    for _ in 0..exp {
        r = r.saturating_mul(base);
    }
    r
}

fn tuple_to_index(tuple: &[Atom], universe_size: usize) -> usize {
    let mut idx = 0usize;
    for a in tuple {
        idx = idx * universe_size + a.0 as usize;
    }
    idx
}

fn index_to_tuple(mut idx: usize, arity: usize, universe_size: usize) -> Tuple {
    let mut out = vec![Atom(0); arity];
    for i in (0..arity).rev() {
        out[i] = Atom((idx % universe_size) as u32);
        idx /= universe_size;
    }
    out
}

impl BooleanMatrix {
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn universe_size(&self) -> usize {
        self.universe_size
    }

    pub fn constant(arity: usize, universe_size: usize, value: bool) -> BooleanMatrix {
        let len = pow(universe_size, arity);
        BooleanMatrix { arity, universe_size, cells: vec![BooleanValue::Const(value); len] }
    }

    pub fn cell(&self, tuple: &[Atom]) -> BooleanValue {
        self.cells[tuple_to_index(tuple, self.universe_size)]
    }

    pub fn set_cell(&mut self, tuple: &[Atom], value: BooleanValue) {
        let idx = tuple_to_index(tuple, self.universe_size);
        self.cells[idx] = value;
    }

    pub fn cells_iter(&self) -> impl Iterator<Item = (Tuple, BooleanValue)> + '_ {
        self.cells.iter().enumerate().map(move |(i, &v)| (index_to_tuple(i, self.arity, self.universe_size), v))
    }

    /// Construction from bounds: `True` for tuples in
    /// `lower`, a fresh variable for tuples in `upper \ lower`, `False`
    /// otherwise.
    pub fn from_bounds(lower: &TupleSet, upper: &TupleSet, universe_size: usize, cnf: &mut CnfBuilder) -> BooleanMatrix {
        let arity = upper.arity();
        let mut m = BooleanMatrix::constant(arity, universe_size, false);
        for t in upper.iter() {
            let value = if lower.contains(t) { BooleanValue::Const(true) } else { BooleanValue::Var(cnf.fresh()) };
            m.set_cell(t, value);
        }
        m
    }

    fn combine_cellwise(&self, other: &BooleanMatrix, cnf: &mut CnfBuilder, op: impl Fn(bool, bool) -> bool, gate: impl Fn(&mut CnfBuilder, Literal, Literal) -> Literal) -> BooleanMatrix {
        assert_eq!(self.arity, other.arity, "element-wise op requires equal arity");
        assert_eq!(self.universe_size, other.universe_size);
        let mut out = BooleanMatrix::constant(self.arity, self.universe_size, false);
        for i in 0..self.cells.len() {
            out.cells[i] = match (self.cells[i], other.cells[i]) {
                (BooleanValue::Const(a), BooleanValue::Const(b)) => BooleanValue::Const(op(a, b)),
                (a, b) => {
                    let la = a.as_literal(cnf);
                    let lb = b.as_literal(cnf);
                    BooleanValue::Var(gate(cnf, la, lb))
                }
            };
        }
        out
    }

    pub fn union(&self, other: &BooleanMatrix, cnf: &mut CnfBuilder) -> BooleanMatrix {
        self.combine_cellwise(other, cnf, |a, b| a || b, |cnf, a, b| cnf.or_gate(&[a, b]))
    }

    pub fn intersection(&self, other: &BooleanMatrix, cnf: &mut CnfBuilder) -> BooleanMatrix {
        self.combine_cellwise(other, cnf, |a, b| a && b, |cnf, a, b| cnf.and_gate(&[a, b]))
    }

    pub fn difference(&self, other: &BooleanMatrix, cnf: &mut CnfBuilder) -> BooleanMatrix {
        self.combine_cellwise(other, cnf, |a, b| a && !b, |cnf, a, b| cnf.and_gate(&[a, b.negate()]))
    }

    pub fn transpose(&self) -> BooleanMatrix {
        assert_eq!(self.arity, 2, "transpose requires arity 2");
        let mut out = BooleanMatrix::constant(2, self.universe_size, false);
        for (t, v) in self.cells_iter() {
            out.set_cell(&[t[1], t[0]], v);
        }
        out
    }

    pub fn product(&self, other: &BooleanMatrix, cnf: &mut CnfBuilder) -> BooleanMatrix {
        assert_eq!(self.universe_size, other.universe_size);
        let out_arity = self.arity + other.arity;
        let estimated = pow(self.universe_size, out_arity);
        if estimated > MAX_OUTPUT_TUPLES {
            warn!(estimated, "product output exceeds tuple cap, returning empty matrix");
            return BooleanMatrix::constant(out_arity, self.universe_size, false);
        }
        let mut out = BooleanMatrix::constant(out_arity, self.universe_size, false);
        for (ta, va) in self.cells_iter() {
            if matches!(va, BooleanValue::Const(false)) {
                continue;
            }
            for (tb, vb) in other.cells_iter() {
                if matches!(vb, BooleanValue::Const(false)) {
                    continue;
                }
                let mut t = ta.clone();
                t.extend(tb.iter().copied());
                let value = match (va, vb) {
                    (BooleanValue::Const(a), BooleanValue::Const(b)) => BooleanValue::Const(a && b),
                    _ => {
                        let la = va.as_literal(cnf);
                        let lb = vb.as_literal(cnf);
                        BooleanValue::Var(cnf.and_gate(&[la, lb]))
                    }
                };
                out.set_cell(&t, value);
            }
        }
        out
    }

    /// `A(m) ⋈ B(n) -> C(m+n-2)`.
    pub fn join(&self, other: &BooleanMatrix, cnf: &mut CnfBuilder) -> BooleanMatrix {
        assert!(self.arity > 0 && other.arity > 0, "join requires non-nullary operands");
        assert_eq!(self.universe_size, other.universe_size);
        let out_arity = self.arity + other.arity - 2;
        if out_arity == 0 {
            // Join to a formula-shaped 0-ary matrix isn't representable here;
            // callers needing `some(A.B)` go through `some()` directly on a
            // temporary arity-1 result instead.
        }
        let estimated = pow(self.universe_size, out_arity.max(1));
        if estimated > MAX_OUTPUT_TUPLES {
            warn!(estimated, "join output exceeds tuple cap, returning empty matrix");
            return BooleanMatrix::constant(out_arity, self.universe_size, false);
        }
        let mut out = BooleanMatrix::constant(out_arity, self.universe_size, false);
        for c in 0..self.universe_size {
            for (ta, va) in self.cells_iter() {
                if ta[ta.len() - 1].0 as usize != c || matches!(va, BooleanValue::Const(false)) {
                    continue;
                }
                for (tb, vb) in other.cells_iter() {
                    if tb[0].0 as usize != c || matches!(vb, BooleanValue::Const(false)) {
                        continue;
                    }
                    let mut t = ta[..ta.len() - 1].to_vec();
                    t.extend(tb[1..].iter().copied());
                    let contrib = match (va, vb) {
                        (BooleanValue::Const(a), BooleanValue::Const(b)) => BooleanValue::Const(a && b),
                        _ => {
                            let la = va.as_literal(cnf);
                            let lb = vb.as_literal(cnf);
                            BooleanValue::Var(cnf.and_gate(&[la, lb]))
                        }
                    };
                    let existing = out.cell(&t);
                    out.set_cell(&t, or_fold(existing, contrib, cnf));
                }
            }
        }
        out
    }

    /// Transitive closure by iterative squaring.
    pub fn transitive_closure(&self, cnf: &mut CnfBuilder) -> BooleanMatrix {
        assert_eq!(self.arity, 2);
        let iterations = (self.universe_size as f64).log2().ceil() as u32 + 1;
        let mut r = self.clone();
        for _ in 0..iterations.max(1) {
            let squared = r.join(&r, cnf);
            r = r.union(&squared, cnf);
        }
        r
    }

    pub fn reflexive_closure(&self, identity: &BooleanMatrix, cnf: &mut CnfBuilder) -> BooleanMatrix {
        self.union(identity, cnf)
    }

    /// Cell-wise `cond ? then_ : else_`.
    pub fn ite(cond: Literal, then_: &BooleanMatrix, else_: &BooleanMatrix, cnf: &mut CnfBuilder) -> BooleanMatrix {
        assert_eq!(then_.arity, else_.arity);
        assert_eq!(then_.universe_size, else_.universe_size);
        let mut out = BooleanMatrix::constant(then_.arity, then_.universe_size, false);
        for i in 0..then_.cells.len() {
            out.cells[i] = match (then_.cells[i], else_.cells[i]) {
                (BooleanValue::Const(a), BooleanValue::Const(b)) if a == b => BooleanValue::Const(a),
                (a, b) => {
                    let la = a.as_literal(cnf);
                    let lb = b.as_literal(cnf);
                    BooleanValue::Var(cnf.ite_gate(cond, la, lb))
                }
            };
        }
        out
    }

    pub fn identity(universe_size: usize) -> BooleanMatrix {
        let mut out = BooleanMatrix::constant(2, universe_size, false);
        for i in 0..universe_size {
            out.set_cell(&[Atom(i as u32), Atom(i as u32)], BooleanValue::Const(true));
        }
        out
    }

    /// `A ++ B`: `(A \ (dom(B) -> univ^(arity-1))) ∪ B`.
    pub fn override_with(&self, other: &BooleanMatrix, cnf: &mut CnfBuilder) -> BooleanMatrix {
        assert!(self.arity >= 2 && other.arity == self.arity);
        let dom_b = other.domain(cnf);
        let univ_rest = BooleanMatrix::constant(self.arity - 1, self.universe_size, true);
        let masked_domain = dom_b.product(&univ_rest, cnf);
        let kept = self.difference(&masked_domain, cnf);
        kept.union(other, cnf)
    }

    /// First-column projection as an arity-1 matrix: cell `a` is `some` of
    /// the row `a -> *`.
    pub fn domain(&self, cnf: &mut CnfBuilder) -> BooleanMatrix {
        assert!(self.arity >= 1);
        let mut out = BooleanMatrix::constant(1, self.universe_size, false);
        for a in 0..self.universe_size {
            let mut row_lits = Vec::new();
            let mut any_const_true = false;
            for (t, v) in self.cells_iter() {
                if t[0].0 as usize != a {
                    continue;
                }
                match v {
                    BooleanValue::Const(true) => any_const_true = true,
                    BooleanValue::Const(false) => {}
                    BooleanValue::Var(l) => row_lits.push(l),
                }
            }
            let value = if any_const_true {
                BooleanValue::Const(true)
            } else if row_lits.is_empty() {
                BooleanValue::Const(false)
            } else {
                BooleanValue::Var(cnf.or_gate(&row_lits))
            };
            out.set_cell(&[Atom(a as u32)], value);
        }
        out
    }

    pub fn domain_restrict(&self, domain: &BooleanMatrix, cnf: &mut CnfBuilder) -> BooleanMatrix {
        assert_eq!(domain.arity, 1);
        let univ_rest = BooleanMatrix::constant(self.arity - 1, self.universe_size, true);
        let expanded = domain.product(&univ_rest, cnf);
        self.intersection(&expanded, cnf)
    }

    pub fn range_restrict(&self, range: &BooleanMatrix, cnf: &mut CnfBuilder) -> BooleanMatrix {
        assert_eq!(range.arity, 1);
        let univ_rest = BooleanMatrix::constant(self.arity - 1, self.universe_size, true);
        let expanded = univ_rest.product(range, cnf);
        self.intersection(&expanded, cnf)
    }

    fn all_cell_literals(&self, cnf: &mut CnfBuilder) -> (Vec<Literal>, bool) {
        let mut lits = Vec::new();
        let mut any_const_true = false;
        for &v in &self.cells {
            match v {
                BooleanValue::Const(true) => any_const_true = true,
                BooleanValue::Const(false) => {}
                BooleanValue::Var(l) => lits.push(l),
            }
        }
        (lits, any_const_true)
    }

    pub fn some(&self, cnf: &mut CnfBuilder) -> crate::kernel::bool_formula::BooleanFormula {
        use crate::kernel::bool_formula::BooleanFormula;
        let (lits, any_true) = self.all_cell_literals(cnf);
        if any_true {
            return BooleanFormula::TRUE;
        }
        BooleanFormula::or(lits.into_iter().map(BooleanFormula::Var))
    }

    pub fn no(&self, cnf: &mut CnfBuilder) -> crate::kernel::bool_formula::BooleanFormula {
        self.some(cnf).not()
    }

    /// Pairwise at-most-one encoding over all cells (quadratic, acceptable at
    /// the scales modeled here).
    pub fn at_most_one(&self, cnf: &mut CnfBuilder) -> crate::kernel::bool_formula::BooleanFormula {
        use crate::kernel::bool_formula::BooleanFormula;
        let (lits, _) = self.all_cell_literals(cnf);
        let mut clauses = Vec::new();
        for i in 0..lits.len() {
            for j in (i + 1)..lits.len() {
                clauses.push(BooleanFormula::or(vec![BooleanFormula::Var(lits[i].negate()), BooleanFormula::Var(lits[j].negate())]));
            }
        }
        BooleanFormula::and(clauses)
    }

    pub fn one(&self, cnf: &mut CnfBuilder) -> crate::kernel::bool_formula::BooleanFormula {
        use crate::kernel::bool_formula::BooleanFormula;
        BooleanFormula::and(vec![self.some(cnf), self.at_most_one(cnf)])
    }

    pub fn lone(&self, cnf: &mut CnfBuilder) -> crate::kernel::bool_formula::BooleanFormula {
        self.at_most_one(cnf)
    }

    pub fn equals(&self, other: &BooleanMatrix, cnf: &mut CnfBuilder) -> crate::kernel::bool_formula::BooleanFormula {
        use crate::kernel::bool_formula::BooleanFormula;
        assert_eq!(self.arity, other.arity);
        let mut parts = Vec::new();
        for i in 0..self.cells.len() {
            let la = self.cells[i].as_literal(cnf);
            let lb = other.cells[i].as_literal(cnf);
            parts.push(BooleanFormula::iff(BooleanFormula::Var(la), BooleanFormula::Var(lb)));
        }
        BooleanFormula::and(parts)
    }

    pub fn is_subset_of(&self, other: &BooleanMatrix, cnf: &mut CnfBuilder) -> crate::kernel::bool_formula::BooleanFormula {
        use crate::kernel::bool_formula::BooleanFormula;
        assert_eq!(self.arity, other.arity);
        let mut parts = Vec::new();
        for i in 0..self.cells.len() {
            let la = self.cells[i].as_literal(cnf);
            let lb = other.cells[i].as_literal(cnf);
            parts.push(BooleanFormula::implies(BooleanFormula::Var(la), BooleanFormula::Var(lb)));
        }
        BooleanFormula::and(parts)
    }

    /// Reads back the matrix under a satisfying assignment:
    /// `assignment[|v|-1]` holds the polarity for variable `|v|`.
    pub fn extract(&self, assignment: &[bool]) -> TupleSet {
        let mut set = TupleSet::empty(self.arity);
        for (t, v) in self.cells_iter() {
            let holds = match v {
                BooleanValue::Const(b) => b,
                BooleanValue::Var(l) => {
                    let idx = (l.var() - 1) as usize;
                    assignment.get(idx).copied().unwrap_or(false) == l.polarity()
                }
            };
            if holds {
                set.insert(t);
            }
        }
        set
    }
}

fn or_fold(existing: BooleanValue, contrib: BooleanValue, cnf: &mut CnfBuilder) -> BooleanValue {
    match (existing, contrib) {
        (BooleanValue::Const(false), other) => other,
        (other, BooleanValue::Const(false)) => other,
        (BooleanValue::Const(true), _) | (_, BooleanValue::Const(true)) => BooleanValue::Const(true),
        (a, b) => {
            let la = a.as_literal(cnf);
            let lb = b.as_literal(cnf);
            BooleanValue::Var(cnf.or_gate(&[la, lb]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn const_matrix_from(tuples: &[[u32; 2]], universe_size: usize) -> BooleanMatrix {
        let mut m = BooleanMatrix::constant(2, universe_size, false);
        for t in tuples {
            m.set_cell(&[Atom(t[0]), Atom(t[1])], BooleanValue::Const(true));
        }
        m
    }

    #[test]
    fn join_on_constant_matrices_matches_tupleset_join() {
        let mut cnf = CnfBuilder::new();
        let a = const_matrix_from(&[[0, 1]], 4);
        let b = const_matrix_from(&[[1, 2]], 4);
        let joined = a.join(&b, &mut cnf);
        assert!(matches!(joined.cell(&[Atom(0), Atom(2)]), BooleanValue::Const(true)));
        assert!(matches!(joined.cell(&[Atom(0), Atom(3)]), BooleanValue::Const(false)));
    }

    #[test]
    fn transitive_closure_matches_tupleset_transitive_closure() {
        let mut cnf = CnfBuilder::new();
        let r = const_matrix_from(&[[0, 1], [1, 2], [2, 3]], 4);
        let tc = r.transitive_closure(&mut cnf);
        assert!(matches!(tc.cell(&[Atom(0), Atom(3)]), BooleanValue::Const(true)));
        assert!(matches!(tc.cell(&[Atom(3), Atom(0)]), BooleanValue::Const(false)));
    }

    #[test]
    fn union_of_free_cells_allocates_a_gate_variable() {
        let mut cnf = CnfBuilder::new();
        let mut a = BooleanMatrix::constant(1, 2, false);
        a.set_cell(&[Atom(0)], BooleanValue::Var(cnf.fresh()));
        let mut b = BooleanMatrix::constant(1, 2, false);
        b.set_cell(&[Atom(0)], BooleanValue::Var(cnf.fresh()));
        let u = a.union(&b, &mut cnf);
        assert!(matches!(u.cell(&[Atom(0)]), BooleanValue::Var(_)));
    }

    #[test]
    fn extract_reads_back_constant_and_variable_cells() {
        let mut cnf = CnfBuilder::new();
        let mut m = BooleanMatrix::constant(1, 2, false);
        let v = cnf.fresh();
        m.set_cell(&[Atom(0)], BooleanValue::Var(v));
        m.set_cell(&[Atom(1)], BooleanValue::Const(true));
        let assignment = vec![true; v.var() as usize];
        let set = m.extract(&assignment);
        assert!(set.contains(&[Atom(0)]));
        assert!(set.contains(&[Atom(1)]));
    }
}
