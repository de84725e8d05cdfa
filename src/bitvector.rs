//! Two's-complement bit-vector arithmetic. Bit 0 is the
//! least-significant bit. Every arithmetic op is encoded via Tseitin gates
//! on `CnfBuilder`, mirroring the relational kernel's style of allocating
//! one fresh variable per output cell.

use crate::cnf::CnfBuilder;
use crate::kernel::bool_formula::BooleanFormula;
use crate::kernel::matrix::{BooleanMatrix, BooleanValue};
use crate::universe::IntegerFactory;

#[derive(Debug, Clone)]
pub struct BitVector {
    /// LSB at index 0.
    bits: Vec<BooleanValue>,
}

fn xor_value(a: BooleanValue, b: BooleanValue, cnf: &mut CnfBuilder) -> BooleanValue {
    match (a, b) {
        (BooleanValue::Const(x), BooleanValue::Const(y)) => BooleanValue::Const(x ^ y),
        _ => {
            let la = a.as_literal(cnf);
            let lb = b.as_literal(cnf);
            BooleanValue::Var(cnf.iff_gate(la, lb).negate())
        }
    }
}

fn and_value(a: BooleanValue, b: BooleanValue, cnf: &mut CnfBuilder) -> BooleanValue {
    match (a, b) {
        (BooleanValue::Const(x), BooleanValue::Const(y)) => BooleanValue::Const(x && y),
        _ => {
            let la = a.as_literal(cnf);
            let lb = b.as_literal(cnf);
            BooleanValue::Var(cnf.and_gate(&[la, lb]))
        }
    }
}

fn or_value(a: BooleanValue, b: BooleanValue, cnf: &mut CnfBuilder) -> BooleanValue {
    match (a, b) {
        (BooleanValue::Const(x), BooleanValue::Const(y)) => BooleanValue::Const(x || y),
        _ => {
            let la = a.as_literal(cnf);
            let lb = b.as_literal(cnf);
            BooleanValue::Var(cnf.or_gate(&[la, lb]))
        }
    }
}

fn mux_value(cond: BooleanValue, then_: BooleanValue, else_: BooleanValue, cnf: &mut CnfBuilder) -> BooleanValue {
    match cond {
        BooleanValue::Const(true) => then_,
        BooleanValue::Const(false) => else_,
        _ => {
            let lc = cond.as_literal(cnf);
            let lt = then_.as_literal(cnf);
            let le = else_.as_literal(cnf);
            BooleanValue::Var(cnf.ite_gate(lc, lt, le))
        }
    }
}

impl BitVector {
    pub fn width(&self) -> u32 {
        self.bits.len() as u32
    }

    pub fn bit(&self, i: u32) -> BooleanValue {
        self.bits[i as usize]
    }

    pub fn sign(&self) -> BooleanValue {
        *self.bits.last().unwrap()
    }

    pub fn bits(&self) -> &[BooleanValue] {
        &self.bits
    }

    /// A constant two's-complement encoding of `v` at width `bw`.
    pub fn from_const(v: i64, bw: u32) -> BitVector {
        let bits = (0..bw).map(|i| BooleanValue::Const((v >> i) & 1 == 1)).collect();
        BitVector { bits }
    }

    pub fn from_bits(bits: Vec<BooleanValue>) -> BitVector {
        BitVector { bits }
    }

    /// Matrix-to-bitvector bridge: allocates a fresh
    /// bitvector and, for each integer atom, asserts `in_matrix(a_v) ->
    /// (bv == v)`.
    pub fn from_matrix(matrix: &BooleanMatrix, factory: &IntegerFactory, cnf: &mut CnfBuilder) -> BitVector {
        let bw = factory.bitwidth;
        let bits: Vec<BooleanValue> = (0..bw).map(|_| BooleanValue::Var(cnf.fresh())).collect();
        let bv = BitVector { bits };
        for (v, atom) in factory.all_atoms() {
            let cell = matrix.cell(&[atom]);
            let cell_lit = cell.as_literal(cnf);
            let eq = bv.equals_const(v, bw).encode(cnf);
            let implication = cnf.implies_gate(cell_lit, eq);
            cnf.assert_true(implication);
        }
        bv
    }

    pub fn equals_const(&self, v: i64, bw: u32) -> BooleanFormula {
        let mut parts = Vec::new();
        for i in 0..bw {
            let want = (v >> i) & 1 == 1;
            let cell = self.bits[i as usize];
            parts.push(match cell {
                BooleanValue::Const(b) => BooleanFormula::Const(b == want),
                BooleanValue::Var(l) => {
                    if want {
                        BooleanFormula::Var(l)
                    } else {
                        BooleanFormula::Var(l.negate())
                    }
                }
            });
        }
        BooleanFormula::and(parts)
    }

    pub fn equals(&self, other: &BitVector, cnf: &mut CnfBuilder) -> BooleanFormula {
        let mut parts = Vec::new();
        for i in 0..self.width() {
            let a = self.bits[i as usize].as_literal(cnf);
            let b = other.bits[i as usize].as_literal(cnf);
            parts.push(BooleanFormula::iff(BooleanFormula::Var(a), BooleanFormula::Var(b)));
        }
        BooleanFormula::and(parts)
    }

    fn half_adder(a: BooleanValue, b: BooleanValue, cnf: &mut CnfBuilder) -> (BooleanValue, BooleanValue) {
        (xor_value(a, b, cnf), and_value(a, b, cnf))
    }

    fn full_adder(a: BooleanValue, b: BooleanValue, carry_in: BooleanValue, cnf: &mut CnfBuilder) -> (BooleanValue, BooleanValue) {
        let (s1, c1) = Self::half_adder(a, b, cnf);
        let (sum, c2) = Self::half_adder(s1, carry_in, cnf);
        (sum, or_value(c1, c2, cnf))
    }

    /// Ripple-carry add with signed-overflow detection. The
    /// caller is responsible for asserting `!overflow` per the
    /// no-overflow language semantics.
    pub fn add(&self, other: &BitVector, cnf: &mut CnfBuilder) -> (BitVector, BooleanFormula) {
        assert_eq!(self.width(), other.width());
        let bw = self.width();
        let mut carry = BooleanValue::Const(false);
        let mut bits = Vec::with_capacity(bw as usize);
        for i in 0..bw {
            let (sum, c) = Self::full_adder(self.bits[i as usize], other.bits[i as usize], carry, cnf);
            bits.push(sum);
            carry = c;
        }
        let result = BitVector { bits };
        let same_sign_inputs = BooleanFormula::iff(wrap(self.sign()), wrap(other.sign()));
        let differs_from_inputs = BooleanFormula::iff(wrap(self.sign()), wrap(result.sign())).not();
        let overflow = BooleanFormula::and(vec![same_sign_inputs, differs_from_inputs]);
        (result, overflow)
    }

    /// `~x + 1`.
    pub fn negate(&self, cnf: &mut CnfBuilder) -> (BitVector, BooleanFormula) {
        let inverted: Vec<BooleanValue> = self.bits.iter().map(|&b| b.negate()).collect();
        let one = BitVector::from_const(1, self.width());
        BitVector { bits: inverted }.add(&one, cnf)
    }

    pub fn sub(&self, other: &BitVector, cnf: &mut CnfBuilder) -> (BitVector, BooleanFormula) {
        let (neg_other, _) = other.negate(cnf);
        self.add(&neg_other, cnf)
    }

    /// Shift-and-add multiply; each conditional add inherits overflow
    /// detection, OR-folded into the result's overflow flag.
    pub fn mul(&self, other: &BitVector, cnf: &mut CnfBuilder) -> (BitVector, BooleanFormula) {
        let bw = self.width();
        let mut acc = BitVector::from_const(0, bw);
        let mut overflow_parts = Vec::new();
        for i in 0..bw {
            let shifted = self.shl_const(i, cnf);
            let (added, add_overflow) = acc.add(&shifted, cnf);
            let selected_bits: Vec<BooleanValue> = (0..bw as usize).map(|b| mux_value(other.bits[i as usize], added.bits[b], acc.bits[b], cnf)).collect();
            overflow_parts.push(BooleanFormula::and(vec![wrap(other.bits[i as usize]), add_overflow]));
            acc = BitVector { bits: selected_bits };
        }
        (acc, BooleanFormula::or(overflow_parts))
    }

    fn shl_const(&self, amount: u32, cnf: &mut CnfBuilder) -> BitVector {
        let bw = self.width();
        let bits = (0..bw)
            .map(|i| if i < amount { BooleanValue::Const(false) } else { self.bits[(i - amount) as usize] })
            .collect();
        let _ = cnf;
        BitVector { bits }
    }

    /// Barrel shifter: logical left shift by a bit-vector amount.
    pub fn shl(&self, amount: &BitVector, cnf: &mut CnfBuilder) -> BitVector {
        self.barrel_shift(amount, cnf, |bv, k, cnf| bv.shl_const(k, cnf))
    }

    pub fn shr(&self, amount: &BitVector, cnf: &mut CnfBuilder) -> BitVector {
        self.barrel_shift(amount, cnf, |bv, k, _cnf| {
            let bw = bv.width();
            let bits = (0..bw).map(|i| if i + k < bw { bv.bits[(i + k) as usize] } else { BooleanValue::Const(false) }).collect();
            BitVector { bits }
        })
    }

    /// Arithmetic (sign-extending) right shift.
    pub fn sha(&self, amount: &BitVector, cnf: &mut CnfBuilder) -> BitVector {
        self.barrel_shift(amount, cnf, |bv, k, _cnf| {
            let bw = bv.width();
            let sign = bv.sign();
            let bits = (0..bw).map(|i| if i + k < bw { bv.bits[(i + k) as usize] } else { sign }).collect();
            BitVector { bits }
        })
    }

    fn barrel_shift(&self, amount: &BitVector, cnf: &mut CnfBuilder, fixed_shift: impl Fn(&BitVector, u32, &mut CnfBuilder) -> BitVector) -> BitVector {
        let bw = self.width();
        let mut cur = self.clone();
        for i in 0..bw {
            let k = 1u32 << i;
            if k >= bw {
                break;
            }
            let shifted = fixed_shift(&cur, k, cnf);
            let bits = (0..bw as usize).map(|b| mux_value(amount.bits[i as usize], shifted.bits[b], cur.bits[b], cnf)).collect();
            cur = BitVector { bits };
        }
        cur
    }

    /// Restoring signed division; `div_by_zero` must be asserted false by
    /// the caller.
    pub fn div_rem(&self, other: &BitVector, cnf: &mut CnfBuilder) -> (BitVector, BitVector, BooleanFormula) {
        let bw = self.width();
        let zero = BitVector::from_const(0, bw);
        let div_by_zero = other.equals(&zero, cnf);

        let a_sign = self.sign();
        let b_sign = other.sign();
        let (abs_a, _) = self.negate(cnf);
        let (abs_b, _) = other.negate(cnf);
        let a_mag_bits: Vec<BooleanValue> = (0..bw as usize).map(|i| mux_value(a_sign, abs_a.bits[i], self.bits[i], cnf)).collect();
        let b_mag_bits: Vec<BooleanValue> = (0..bw as usize).map(|i| mux_value(b_sign, abs_b.bits[i], other.bits[i], cnf)).collect();
        let a_mag = BitVector { bits: a_mag_bits };
        let b_mag = BitVector { bits: b_mag_bits };

        let mut quotient = BitVector::from_const(0, bw);
        let mut remainder = BitVector::from_const(0, bw);
        for i in (0..bw).rev() {
            let shifted_bits: Vec<BooleanValue> =
                std::iter::once(a_mag.bits[i as usize]).chain(remainder.bits[..(bw as usize - 1)].iter().copied()).collect();
            remainder = BitVector { bits: shifted_bits };
            let (trial, _) = remainder.sub(&b_mag, cnf);
            // Trial fits (remainder >= b_mag) iff the subtraction didn't go negative.
            let fits = wrap(trial.sign()).not();
            let fits_lit = fits.encode(cnf);
            let new_remainder_bits: Vec<BooleanValue> = (0..bw as usize).map(|b| mux_value(BooleanValue::Var(fits_lit), trial.bits[b], remainder.bits[b], cnf)).collect();
            remainder = BitVector { bits: new_remainder_bits };
            let mut q_bits = quotient.bits.clone();
            q_bits[i as usize] = BooleanValue::Var(fits_lit);
            quotient = BitVector { bits: q_bits };
        }

        let quotient_sign = xor_value(a_sign, b_sign, cnf);
        let (neg_quotient, _) = quotient.negate(cnf);
        let signed_q_bits: Vec<BooleanValue> = (0..bw as usize).map(|i| mux_value(quotient_sign, neg_quotient.bits[i], quotient.bits[i], cnf)).collect();
        let (neg_remainder, _) = remainder.negate(cnf);
        let signed_r_bits: Vec<BooleanValue> = (0..bw as usize).map(|i| mux_value(a_sign, neg_remainder.bits[i], remainder.bits[i], cnf)).collect();

        (BitVector { bits: signed_q_bits }, BitVector { bits: signed_r_bits }, div_by_zero)
    }

    /// Signed less-than via subtraction: `sign(a-b) XOR overflow(a-b)`.
    pub fn lt(&self, other: &BitVector, cnf: &mut CnfBuilder) -> BooleanFormula {
        let (diff, overflow) = self.sub(other, cnf);
        BooleanFormula::iff(wrap(diff.sign()), overflow).not()
    }

    pub fn le(&self, other: &BitVector, cnf: &mut CnfBuilder) -> BooleanFormula {
        BooleanFormula::or(vec![self.lt(other, cnf), self.equals(other, cnf)])
    }

    pub fn gt(&self, other: &BitVector, cnf: &mut CnfBuilder) -> BooleanFormula {
        other.lt(self, cnf)
    }

    pub fn ge(&self, other: &BitVector, cnf: &mut CnfBuilder) -> BooleanFormula {
        other.le(self, cnf)
    }

    /// Cardinality: zero-extends each cell to a 1-bit value and sums via a
    /// pairwise adder tree.
    pub fn cardinality(cells: &[BooleanValue], bw: u32, cnf: &mut CnfBuilder) -> BitVector {
        let mut addends: Vec<BitVector> = cells
            .iter()
            .map(|&c| {
                let mut bits = vec![BooleanValue::Const(false); bw as usize];
                bits[0] = c;
                BitVector { bits }
            })
            .collect();
        if addends.is_empty() {
            return BitVector::from_const(0, bw);
        }
        while addends.len() > 1 {
            let mut next = Vec::with_capacity(addends.len().div_ceil(2));
            let mut it = addends.into_iter();
            while let Some(a) = it.next() {
                if let Some(b) = it.next() {
                    let (sum, _overflow) = a.add(&b, cnf);
                    next.push(sum);
                } else {
                    next.push(a);
                }
            }
            addends = next;
        }
        addends.into_iter().next().unwrap()
    }
}

fn wrap(v: BooleanValue) -> BooleanFormula {
    match v {
        BooleanValue::Const(b) => BooleanFormula::Const(b),
        BooleanValue::Var(l) => BooleanFormula::Var(l),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_constants_matches_twos_complement_sum() {
        let mut cnf = CnfBuilder::new();
        let a = BitVector::from_const(3, 4);
        let b = BitVector::from_const(2, 4);
        let (sum, overflow) = a.add(&b, &mut cnf);
        assert_eq!(overflow, BooleanFormula::Const(false));
        assert_eq!(sum.equals_const(5, 4), BooleanFormula::Const(true));
    }

    #[test]
    fn add_detects_signed_overflow_at_the_positive_boundary() {
        let mut cnf = CnfBuilder::new();
        let a = BitVector::from_const(7, 4); // max positive at bw=4
        let b = BitVector::from_const(1, 4);
        let (_, overflow) = a.add(&b, &mut cnf);
        assert_eq!(overflow, BooleanFormula::Const(true));
    }

    #[test]
    fn negate_constant_matches_twos_complement_negation() {
        let mut cnf = CnfBuilder::new();
        let a = BitVector::from_const(3, 4);
        let (neg, _) = a.negate(&mut cnf);
        assert_eq!(neg.equals_const(-3, 4), BooleanFormula::Const(true));
    }

    #[test]
    fn lt_on_constants_agrees_with_signed_comparison() {
        let mut cnf = CnfBuilder::new();
        let a = BitVector::from_const(-2, 4);
        let b = BitVector::from_const(1, 4);
        assert_eq!(a.lt(&b, &mut cnf), BooleanFormula::Const(true));
    }
}
