//! BooleanFormula algebraic tree: a lazy
//! layer above `CnfBuilder` so formula-encoder logic can flatten And/Or,
//! absorb constants, and collapse singletons before any clause is emitted.

use crate::cnf::{CnfBuilder, Literal};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BooleanFormula {
    Const(bool),
    Var(Literal),
    And(Vec<BooleanFormula>),
    Or(Vec<BooleanFormula>),
    Implies(Box<BooleanFormula>, Box<BooleanFormula>),
    Iff(Box<BooleanFormula>, Box<BooleanFormula>),
    Ite(Box<BooleanFormula>, Box<BooleanFormula>, Box<BooleanFormula>),
}

impl BooleanFormula {
    pub const TRUE: BooleanFormula = BooleanFormula::Const(true);
    pub const FALSE: BooleanFormula = BooleanFormula::Const(false);

    pub fn not(self) -> BooleanFormula {
        match self {
            BooleanFormula::Const(b) => BooleanFormula::Const(!b),
            BooleanFormula::Var(l) => BooleanFormula::Var(l.negate()),
            other => BooleanFormula::Implies(Box::new(other), Box::new(BooleanFormula::FALSE)),
        }
    }

    /// Flattens nested `And`s and absorbs `Const`, collapsing to a single
    /// operand or `Const` when possible.
    pub fn and(operands: impl IntoIterator<Item = BooleanFormula>) -> BooleanFormula {
        let mut flat = Vec::new();
        for op in operands {
            match op {
                BooleanFormula::Const(true) => continue,
                BooleanFormula::Const(false) => return BooleanFormula::FALSE,
                BooleanFormula::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => BooleanFormula::TRUE,
            1 => flat.into_iter().next().unwrap(),
            _ => BooleanFormula::And(flat),
        }
    }

    pub fn or(operands: impl IntoIterator<Item = BooleanFormula>) -> BooleanFormula {
        let mut flat = Vec::new();
        for op in operands {
            match op {
                BooleanFormula::Const(false) => continue,
                BooleanFormula::Const(true) => return BooleanFormula::TRUE,
                BooleanFormula::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => BooleanFormula::FALSE,
            1 => flat.into_iter().next().unwrap(),
            _ => BooleanFormula::Or(flat),
        }
    }

    pub fn implies(a: BooleanFormula, b: BooleanFormula) -> BooleanFormula {
        match (&a, &b) {
            (BooleanFormula::Const(false), _) => BooleanFormula::TRUE,
            (_, BooleanFormula::Const(true)) => BooleanFormula::TRUE,
            (BooleanFormula::Const(true), _) => b,
            _ => BooleanFormula::Implies(Box::new(a), Box::new(b)),
        }
    }

    pub fn iff(a: BooleanFormula, b: BooleanFormula) -> BooleanFormula {
        match (&a, &b) {
            (BooleanFormula::Const(true), _) => b,
            (_, BooleanFormula::Const(true)) => a,
            (BooleanFormula::Const(false), _) => b.not(),
            (_, BooleanFormula::Const(false)) => a.not(),
            _ => BooleanFormula::Iff(Box::new(a), Box::new(b)),
        }
    }

    pub fn ite(cond: BooleanFormula, then_: BooleanFormula, else_: BooleanFormula) -> BooleanFormula {
        match cond {
            BooleanFormula::Const(true) => then_,
            BooleanFormula::Const(false) => else_,
            _ => BooleanFormula::Ite(Box::new(cond), Box::new(then_), Box::new(else_)),
        }
    }

    /// Lowers this tree to a single literal, memoized by `CnfBuilder`'s gate
    /// cache where the shape matches a gate it already knows.
    pub fn encode(&self, cnf: &mut CnfBuilder) -> Literal {
        match self {
            BooleanFormula::Const(true) => cnf.true_lit(),
            BooleanFormula::Const(false) => cnf.false_lit(),
            BooleanFormula::Var(l) => *l,
            BooleanFormula::And(ops) => {
                let lits: Vec<Literal> = ops.iter().map(|o| o.encode(cnf)).collect();
                cnf.and_gate(&lits)
            }
            BooleanFormula::Or(ops) => {
                let lits: Vec<Literal> = ops.iter().map(|o| o.encode(cnf)).collect();
                cnf.or_gate(&lits)
            }
            BooleanFormula::Implies(a, b) => {
                let (la, lb) = (a.encode(cnf), b.encode(cnf));
                cnf.implies_gate(la, lb)
            }
            BooleanFormula::Iff(a, b) => {
                let (la, lb) = (a.encode(cnf), b.encode(cnf));
                cnf.iff_gate(la, lb)
            }
            BooleanFormula::Ite(c, t, e) => {
                let (lc, lt, le) = (c.encode(cnf), t.encode(cnf), e.encode(cnf));
                cnf.ite_gate(lc, lt, le)
            }
        }
    }

    pub fn assert_into(&self, cnf: &mut CnfBuilder) {
        let lit = self.encode(cnf);
        cnf.assert_true(lit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_absorbs_constant_true_and_flattens() {
        let mut cnf = CnfBuilder::new();
        let a = BooleanFormula::Var(cnf.fresh());
        let f = BooleanFormula::and(vec![BooleanFormula::TRUE, BooleanFormula::and(vec![a.clone()])]);
        assert_eq!(f, a);
    }

    #[test]
    fn or_with_constant_true_short_circuits() {
        let f = BooleanFormula::or(vec![BooleanFormula::Const(true), BooleanFormula::Const(false)]);
        assert_eq!(f, BooleanFormula::TRUE);
    }

    #[test]
    fn encode_and_assert_forces_operand_literal() {
        let mut cnf = CnfBuilder::new();
        let a = cnf.fresh();
        let f = BooleanFormula::Var(a);
        f.assert_into(&mut cnf);
        assert!(cnf.clauses().contains(&vec![a]));
    }
}
