//! SAT oracle contract plus a small built-in reference implementation. The
//! solver proper is out of scope here; this module exists only so
//! `run`/`check` are executable end-to-end without wiring an external
//! solver, and is deliberately swappable — any CDCL solver honoring
//! `SatOracle` can replace `DpllOracle`.

use crate::cnf::Literal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveResult {
    Sat(Vec<bool>),
    Unsat,
    Unknown,
}

/// `solve(num_vars, clauses) -> Sat(assignment) | Unsat | Unknown`.
/// `assignment[v-1]` gives the polarity of variable `v`.
pub trait SatOracle {
    fn solve(&mut self, num_vars: u32, clauses: &[Vec<Literal>]) -> SolveResult;
}

/// Unit propagation + pure-literal elimination + chronological backtracking.
/// No clause learning, no restarts, no watched literals — a reference
/// implementation, not a competitive one.
pub struct DpllOracle {
    /// Caps total decisions so pathological instances fail closed with
    /// `Unknown` rather than looping forever.
    pub decision_limit: u64,
}

impl Default for DpllOracle {
    fn default() -> Self {
        Self { decision_limit: 2_000_000 }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Value {
    Unassigned,
    True,
    False,
}

struct Search<'a> {
    clauses: &'a [Vec<Literal>],
    assignment: Vec<Value>,
    /// Decisions taken so far (for the decision-limit cutoff), not the
    /// trail depth.
    decisions: u64,
    limit: u64,
}

impl<'a> Search<'a> {
    fn value_of(&self, lit: Literal) -> Value {
        match self.assignment[(lit.var() - 1) as usize] {
            Value::Unassigned => Value::Unassigned,
            Value::True if lit.polarity() => Value::True,
            Value::True => Value::False,
            Value::False if lit.polarity() => Value::False,
            Value::False => Value::True,
        }
    }

    fn assign(&mut self, var: u32, value: Value) {
        self.assignment[(var - 1) as usize] = value;
    }

    /// Repeated unit propagation until fixpoint or conflict. Returns `false`
    /// on conflict.
    fn propagate(&mut self) -> bool {
        loop {
            let mut changed = false;
            for clause in self.clauses {
                let mut unassigned = None;
                let mut satisfied = false;
                let mut unassigned_count = 0;
                for &lit in clause {
                    match self.value_of(lit) {
                        Value::True => {
                            satisfied = true;
                            break;
                        }
                        Value::Unassigned => {
                            unassigned_count += 1;
                            unassigned = Some(lit);
                        }
                        Value::False => {}
                    }
                }
                if satisfied {
                    continue;
                }
                if unassigned_count == 0 {
                    return false;
                }
                if unassigned_count == 1 {
                    let lit = unassigned.unwrap();
                    self.assign(lit.var(), if lit.polarity() { Value::True } else { Value::False });
                    changed = true;
                }
            }
            if !changed {
                return true;
            }
        }
    }

    /// Assigns every variable that appears with only one polarity across the
    /// remaining (unsatisfied) clauses.
    fn eliminate_pure_literals(&mut self) {
        let mut seen_pos = vec![false; self.assignment.len()];
        let mut seen_neg = vec![false; self.assignment.len()];
        for clause in self.clauses {
            let satisfied = clause.iter().any(|&l| self.value_of(l) == Value::True);
            if satisfied {
                continue;
            }
            for &lit in clause {
                if self.value_of(lit) != Value::Unassigned {
                    continue;
                }
                let idx = (lit.var() - 1) as usize;
                if lit.polarity() {
                    seen_pos[idx] = true;
                } else {
                    seen_neg[idx] = true;
                }
            }
        }
        for i in 0..self.assignment.len() {
            if self.assignment[i] != Value::Unassigned {
                continue;
            }
            match (seen_pos[i], seen_neg[i]) {
                (true, false) => self.assignment[i] = Value::True,
                (false, true) => self.assignment[i] = Value::False,
                _ => {}
            }
        }
    }

    fn all_clauses_satisfied(&self) -> bool {
        self.clauses.iter().all(|clause| clause.iter().any(|&l| self.value_of(l) == Value::True))
    }

    fn first_unassigned(&self) -> Option<u32> {
        self.assignment.iter().position(|&v| v == Value::Unassigned).map(|i| (i + 1) as u32)
    }

    fn search(&mut self) -> Option<bool> {
        if self.decisions > self.limit {
            return None;
        }
        if !self.propagate() {
            return Some(false);
        }
        self.eliminate_pure_literals();
        if !self.propagate() {
            return Some(false);
        }
        if self.all_clauses_satisfied() {
            return Some(true);
        }
        let Some(var) = self.first_unassigned() else {
            return Some(self.all_clauses_satisfied());
        };
        self.decisions += 1;
        let saved = self.assignment.clone();
        self.assign(var, Value::True);
        match self.search() {
            Some(true) => return Some(true),
            None => return None,
            Some(false) => {}
        }
        self.assignment = saved;
        self.decisions += 1;
        self.assign(var, Value::False);
        self.search()
    }
}

impl SatOracle for DpllOracle {
    fn solve(&mut self, num_vars: u32, clauses: &[Vec<Literal>]) -> SolveResult {
        let mut search = Search { clauses, assignment: vec![Value::Unassigned; num_vars as usize], decisions: 0, limit: self.decision_limit };
        match search.search() {
            Some(true) => {
                let out = search
                    .assignment
                    .iter()
                    .map(|v| matches!(v, Value::True))
                    .collect();
                SolveResult::Sat(out)
            }
            Some(false) => SolveResult::Unsat,
            None => SolveResult::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(v: i32) -> Literal {
        Literal::from_dimacs(v)
    }

    #[test]
    fn solves_a_trivially_satisfiable_instance() {
        let clauses = vec![vec![lit(1), lit(2)], vec![lit(-1), lit(2)]];
        let mut oracle = DpllOracle::default();
        match oracle.solve(2, &clauses) {
            SolveResult::Sat(assignment) => assert!(assignment[1]),
            other => panic!("expected Sat, got {other:?}"),
        }
    }

    #[test]
    fn detects_a_direct_contradiction() {
        let clauses = vec![vec![lit(1)], vec![lit(-1)]];
        let mut oracle = DpllOracle::default();
        assert_eq!(oracle.solve(1, &clauses), SolveResult::Unsat);
    }

    #[test]
    fn forces_unit_clauses_through_propagation() {
        let clauses = vec![vec![lit(1)], vec![lit(-1), lit(2)], vec![lit(-2), lit(3)]];
        let mut oracle = DpllOracle::default();
        match oracle.solve(3, &clauses) {
            SolveResult::Sat(assignment) => {
                assert!(assignment[0]);
                assert!(assignment[1]);
                assert!(assignment[2]);
            }
            other => panic!("expected Sat, got {other:?}"),
        }
    }

    #[test]
    fn exhausting_the_decision_limit_reports_unknown() {
        let clauses: Vec<Vec<Literal>> = (1..=20).map(|v| vec![lit(v), lit(-(v + 1))]).collect();
        let mut oracle = DpllOracle { decision_limit: 0 };
        assert_eq!(oracle.solve(21, &clauses), SolveResult::Unknown);
    }
}
