//! Dispatch from AST operators to `BooleanMatrix` relational-algebra calls
//!.

use crate::ast::{BinOp, UnOp};
use crate::cnf::CnfBuilder;
use crate::kernel::matrix::BooleanMatrix;

pub fn apply_binop(op: BinOp, a: &BooleanMatrix, b: &BooleanMatrix, cnf: &mut CnfBuilder) -> BooleanMatrix {
    match op {
        BinOp::Union => a.union(b, cnf),
        BinOp::Diff => a.difference(b, cnf),
        BinOp::Intersect => a.intersection(b, cnf),
        BinOp::Override => a.override_with(b, cnf),
        BinOp::Product => a.product(b, cnf),
        BinOp::DomainRestrict => b.domain_restrict(a, cnf),
        BinOp::RangeRestrict => a.range_restrict(b, cnf),
        BinOp::Join => a.join(b, cnf),
    }
}

pub fn apply_unop(op: UnOp, a: &BooleanMatrix, cnf: &mut CnfBuilder) -> BooleanMatrix {
    match op {
        UnOp::Transpose => a.transpose(),
        UnOp::Closure => a.transitive_closure(cnf),
        UnOp::ReflexiveClosure => {
            let identity = BooleanMatrix::identity(a.universe_size());
            a.reflexive_closure(&identity, cnf)
        }
        UnOp::Cardinality => panic!("cardinality is a bit-vector op, handled by the expression encoder"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tupleset::Atom;

    #[test]
    fn domain_restrict_dispatches_with_operands_swapped() {
        let mut cnf = CnfBuilder::new();
        let mut dom = BooleanMatrix::constant(1, 3, false);
        dom.set_cell(&[Atom(0)], crate::kernel::matrix::BooleanValue::Const(true));
        let mut rel = BooleanMatrix::constant(2, 3, false);
        rel.set_cell(&[Atom(0), Atom(1)], crate::kernel::matrix::BooleanValue::Const(true));
        rel.set_cell(&[Atom(1), Atom(1)], crate::kernel::matrix::BooleanValue::Const(true));
        let restricted = apply_binop(BinOp::DomainRestrict, &dom, &rel, &mut cnf);
        assert!(matches!(restricted.cell(&[Atom(0), Atom(1)]), crate::kernel::matrix::BooleanValue::Const(true)));
        assert!(matches!(restricted.cell(&[Atom(1), Atom(1)]), crate::kernel::matrix::BooleanValue::Const(false)));
    }
}
