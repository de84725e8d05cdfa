//! CNF Builder: fresh-variable allocation and memoized
//! Tseitin encoding of and/or/iff/ite gates, plus the DIMACS codec shared
//! with the external oracle and `--dimacs` dump mode.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, Write};

/// A DIMACS-style literal: a positive variable id, negated when `polarity`
/// is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    var: u32,
    polarity: bool,
}

impl Literal {
    pub fn positive(var: u32) -> Self {
        Self { var, polarity: true }
    }

    pub fn negative(var: u32) -> Self {
        Self { var, polarity: false }
    }

    pub fn var(self) -> u32 {
        self.var
    }

    pub fn polarity(self) -> bool {
        self.polarity
    }

    pub fn negate(self) -> Self {
        Self { var: self.var, polarity: !self.polarity }
    }

    pub fn to_dimacs(self) -> i32 {
        if self.polarity { self.var as i32 } else { -(self.var as i32) }
    }

    pub fn from_dimacs(n: i32) -> Self {
        if n >= 0 {
            Literal::positive(n as u32)
        } else {
            Literal::negative((-n) as u32)
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

/// A gate key for Tseitin memoization: commutative gates are canonicalized
/// by sorting their operand literals first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GateKey {
    And(Vec<Literal>),
    Or(Vec<Literal>),
    Iff(Literal, Literal),
    Ite(Literal, Literal, Literal),
}

/// Builds a CNF formula incrementally: fresh variables, Tseitin gates with
/// result memoization (so encoding the same subexpression twice returns the
/// same literal instead of duplicating clauses), and top-level assertions.
pub struct CnfBuilder {
    next_var: u32,
    clauses: Vec<Vec<Literal>>,
    gate_cache: HashMap<GateKey, Literal>,
    true_lit: Literal,
}

impl CnfBuilder {
    pub fn new() -> Self {
        let mut b = Self { next_var: 1, clauses: Vec::new(), gate_cache: HashMap::new(), true_lit: Literal::positive(1) };
        let t = b.fresh();
        b.clauses.push(vec![t]);
        b.true_lit = t;
        b
    }

    pub fn fresh(&mut self) -> Literal {
        let v = self.next_var;
        self.next_var += 1;
        Literal::positive(v)
    }

    pub fn num_vars(&self) -> u32 {
        self.next_var - 1
    }

    pub fn true_lit(&self) -> Literal {
        self.true_lit
    }

    pub fn false_lit(&self) -> Literal {
        self.true_lit.negate()
    }

    pub fn clauses(&self) -> &[Vec<Literal>] {
        &self.clauses
    }

    pub fn add_clause(&mut self, clause: Vec<Literal>) {
        self.clauses.push(clause);
    }

    pub fn assert_true(&mut self, lit: Literal) {
        self.add_clause(vec![lit]);
    }

    pub fn assert_false(&mut self, lit: Literal) {
        self.add_clause(vec![lit.negate()]);
    }

    /// `g <-> (a & b & ...)`, encoded via the standard 3-clause-per-operand
    /// Tseitin transform, memoized.
    pub fn and_gate(&mut self, operands: &[Literal]) -> Literal {
        if operands.is_empty() {
            return self.true_lit;
        }
        if operands.len() == 1 {
            return operands[0];
        }
        let mut key_ops = operands.to_vec();
        key_ops.sort_by_key(|l| l.to_dimacs());
        key_ops.dedup();
        if let Some(&g) = self.gate_cache.get(&GateKey::And(key_ops.clone())) {
            return g;
        }
        let g = self.fresh();
        let mut big = vec![g];
        for &op in &key_ops {
            self.add_clause(vec![g.negate(), op]);
            big.push(op.negate());
        }
        self.add_clause(big);
        self.gate_cache.insert(GateKey::And(key_ops), g);
        g
    }

    pub fn or_gate(&mut self, operands: &[Literal]) -> Literal {
        if operands.is_empty() {
            return self.false_lit();
        }
        if operands.len() == 1 {
            return operands[0];
        }
        let negated: Vec<Literal> = operands.iter().map(|l| l.negate()).collect();
        self.and_gate(&negated).negate()
    }

    pub fn not_gate(&mut self, a: Literal) -> Literal {
        a.negate()
    }

    pub fn implies_gate(&mut self, a: Literal, b: Literal) -> Literal {
        self.or_gate(&[a.negate(), b])
    }

    /// `g <-> (a <-> b)`, memoized with its operands order-canonicalized.
    pub fn iff_gate(&mut self, a: Literal, b: Literal) -> Literal {
        let (lo, hi) = if a.to_dimacs() <= b.to_dimacs() { (a, b) } else { (b, a) };
        if let Some(&g) = self.gate_cache.get(&GateKey::Iff(lo, hi)) {
            return g;
        }
        let g = self.fresh();
        self.add_clause(vec![g.negate(), lo.negate(), hi]);
        self.add_clause(vec![g.negate(), lo, hi.negate()]);
        self.add_clause(vec![g, lo, hi]);
        self.add_clause(vec![g, lo.negate(), hi.negate()]);
        self.gate_cache.insert(GateKey::Iff(lo, hi), g);
        g
    }

    /// `g <-> (cond ? then_ : else_)`, memoized on `(cond, then_, else_)`.
    pub fn ite_gate(&mut self, cond: Literal, then_: Literal, else_: Literal) -> Literal {
        let key = GateKey::Ite(cond, then_, else_);
        if let Some(&g) = self.gate_cache.get(&key) {
            return g;
        }
        let g = self.fresh();
        self.add_clause(vec![g.negate(), cond.negate(), then_]);
        self.add_clause(vec![g, cond.negate(), then_.negate()]);
        self.add_clause(vec![g.negate(), cond, else_]);
        self.add_clause(vec![g, cond, else_.negate()]);
        self.gate_cache.insert(key, g);
        g
    }

    /// "At most one" of `lits`, pairwise encoding — quadratic but the field
    /// groups this is used on are small.
    pub fn at_most_one(&mut self, lits: &[Literal]) {
        for i in 0..lits.len() {
            for j in (i + 1)..lits.len() {
                self.add_clause(vec![lits[i].negate(), lits[j].negate()]);
            }
        }
    }

    pub fn at_least_one(&mut self, lits: &[Literal]) {
        if !lits.is_empty() {
            self.add_clause(lits.to_vec());
        }
    }

    pub fn exactly_one(&mut self, lits: &[Literal]) {
        self.at_least_one(lits);
        self.at_most_one(lits);
    }

    pub fn write_dimacs(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "p cnf {} {}", self.num_vars(), self.clauses.len())?;
        for clause in &self.clauses {
            for lit in clause {
                write!(out, "{} ", lit.to_dimacs())?;
            }
            writeln!(out, "0")?;
        }
        Ok(())
    }
}

impl Default for CnfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a DIMACS CNF file (the `p cnf nvars nclauses` header followed by
/// zero-terminated clause lines), skipping `c` comment lines.
pub fn parse_dimacs(input: impl BufRead) -> io::Result<(u32, Vec<Vec<Literal>>)> {
    let mut num_vars = 0u32;
    let mut clauses = Vec::new();
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('c') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("p cnf") {
            let mut parts = rest.split_whitespace();
            num_vars = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            continue;
        }
        let mut clause = Vec::new();
        for tok in line.split_whitespace() {
            let n: i32 = tok.parse().map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed DIMACS literal"))?;
            if n == 0 {
                break;
            }
            clause.push(Literal::from_dimacs(n));
        }
        if !clause.is_empty() {
            clauses.push(clause);
        }
    }
    Ok((num_vars, clauses))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_gate_forces_both_operands_true_when_asserted() {
        let mut cnf = CnfBuilder::new();
        let a = cnf.fresh();
        let b = cnf.fresh();
        let g = cnf.and_gate(&[a, b]);
        cnf.assert_true(g);
        assert!(cnf.clauses().iter().any(|c| c == &vec![a]) || cnf.clauses().iter().any(|c| c.contains(&a)));
    }

    #[test]
    fn gate_memoization_returns_identical_literal() {
        let mut cnf = CnfBuilder::new();
        let a = cnf.fresh();
        let b = cnf.fresh();
        let g1 = cnf.and_gate(&[a, b]);
        let g2 = cnf.and_gate(&[b, a]);
        assert_eq!(g1, g2);
    }

    #[test]
    fn dimacs_round_trips_through_literal_encoding() {
        let mut cnf = CnfBuilder::new();
        let a = cnf.fresh();
        let b = cnf.fresh();
        cnf.add_clause(vec![a, b.negate()]);
        let mut buf = Vec::new();
        cnf.write_dimacs(&mut buf).unwrap();
        let (nvars, clauses) = parse_dimacs(io::Cursor::new(buf)).unwrap();
        assert_eq!(nvars, cnf.num_vars());
        assert!(clauses.iter().any(|c| c == &vec![a, b.negate()]));
    }
}
