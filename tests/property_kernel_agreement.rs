//! The kernel's matrix operations
//! agree with a direct `TupleSet` computation on constant inputs, including
//! transitive closure over a small universe.

use std::collections::BTreeSet;

use ligature::cnf::CnfBuilder;
use ligature::kernel::matrix::{BooleanMatrix, BooleanValue};
use ligature::tupleset::{Atom, Tuple};

const UNIVERSE_SIZE: usize = 6;

fn const_matrix(arity: usize, tuples: &[Tuple]) -> BooleanMatrix {
    let mut m = BooleanMatrix::constant(arity, UNIVERSE_SIZE, false);
    for t in tuples {
        m.set_cell(t, BooleanValue::Const(true));
    }
    m
}

fn a(n: u32) -> Atom {
    Atom(n)
}

fn direct_join(left: &[Tuple], right: &[Tuple]) -> BTreeSet<Tuple> {
    let mut out = BTreeSet::new();
    for l in left {
        for r in right {
            if l[1] == r[0] {
                out.insert(vec![l[0], r[1]]);
            }
        }
    }
    out
}

fn extracted(m: &BooleanMatrix) -> BTreeSet<Tuple> {
    // An all-constant matrix extracts correctly with no SAT assignment.
    m.extract(&[]).iter().cloned().collect()
}

#[test]
fn join_agrees_with_direct_tupleset_computation() {
    let mut cnf = CnfBuilder::new();
    let r = const_matrix(2, &[vec![a(0), a(1)], vec![a(1), a(2)]]);
    let s = const_matrix(2, &[vec![a(1), a(3)], vec![a(2), a(4)]]);

    let joined = r.join(&s, &mut cnf);
    let expected = direct_join(&[vec![a(0), a(1)], vec![a(1), a(2)]], &[vec![a(1), a(3)], vec![a(2), a(4)]]);

    assert_eq!(extracted(&joined), expected);
}

#[test]
fn union_intersection_difference_agree_with_tuplesets() {
    let mut cnf = CnfBuilder::new();
    let r = const_matrix(1, &[vec![a(0)], vec![a(1)], vec![a(2)]]);
    let s = const_matrix(1, &[vec![a(1)], vec![a(2)], vec![a(3)]]);

    let union = r.union(&s, &mut cnf);
    let intersection = r.intersection(&s, &mut cnf);
    let difference = r.difference(&s, &mut cnf);

    let rs: BTreeSet<Tuple> = [vec![a(0)], vec![a(1)], vec![a(2)]].into_iter().collect();
    let ss: BTreeSet<Tuple> = [vec![a(1)], vec![a(2)], vec![a(3)]].into_iter().collect();

    assert_eq!(extracted(&union), rs.union(&ss).cloned().collect());
    assert_eq!(extracted(&intersection), rs.intersection(&ss).cloned().collect());
    assert_eq!(extracted(&difference), rs.difference(&ss).cloned().collect());
}

#[test]
fn transpose_agrees_with_swapping_tuple_columns() {
    let r = const_matrix(2, &[vec![a(0), a(1)], vec![a(2), a(3)]]);
    let transposed = r.transpose();
    let expected: BTreeSet<Tuple> = [vec![a(1), a(0)], vec![a(3), a(2)]].into_iter().collect();
    assert_eq!(extracted(&transposed), expected);
}

/// Transitive closure over a constant arity-2
/// relation matches the mathematical transitive closure, for a universe of
/// size <= 6.
#[test]
fn transitive_closure_matches_mathematical_closure() {
    let mut cnf = CnfBuilder::new();
    // A chain 0 -> 1 -> 2 -> 3 plus an unrelated pair 4 -> 5.
    let edges = [vec![a(0), a(1)], vec![a(1), a(2)], vec![a(2), a(3)], vec![a(4), a(5)]];
    let r = const_matrix(2, &edges);
    let closure = r.transitive_closure(&mut cnf);

    let mut expected: BTreeSet<Tuple> = BTreeSet::new();
    let edge_set: BTreeSet<Tuple> = edges.iter().cloned().collect();
    for start in 0..UNIVERSE_SIZE as u32 {
        let mut frontier = vec![start];
        let mut reached = BTreeSet::new();
        while let Some(cur) = frontier.pop() {
            for t in &edge_set {
                if t[0].0 == cur && reached.insert(t[1].0) {
                    frontier.push(t[1].0);
                }
            }
        }
        for r in reached {
            expected.insert(vec![a(start), a(r)]);
        }
    }

    assert_eq!(extracted(&closure), expected);
}
