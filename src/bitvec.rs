//! Signed two's-complement bit-vectors whose bits are BDDs.
//!
//! Every arithmetic operation widens its result far enough that it cannot
//! overflow, so an expression over `w`-bit variables is evaluated with
//! mathematical integer semantics. Only the variables themselves are bounded.

use crate::bdd::Bdd;
use crate::reference::Ref;

/// Bits are stored least significant first; the last bit is the sign.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BitVec {
    bits: Vec<Ref>,
}

/// Number of bits needed to represent `value` in two's complement.
pub fn signed_width(value: i64) -> usize {
    let magnitude = if value >= 0 { value } else { !value };
    (64 - magnitude.leading_zeros() as usize) + 1
}

impl BitVec {
    pub fn from_bits(bits: Vec<Ref>) -> Self {
        assert!(!bits.is_empty(), "Bit-vector must have at least one bit");
        Self { bits }
    }

    pub fn constant(bdd: &Bdd, value: i64) -> Self {
        let width = signed_width(value);
        let bits = (0..width)
            .map(|i| bdd.constant((value >> i.min(63)) & 1 == 1))
            .collect();
        Self { bits }
    }

    pub fn width(&self) -> usize {
        self.bits.len()
    }

    pub fn sign(&self) -> Ref {
        self.bits[self.bits.len() - 1]
    }

    pub fn sign_extend(&self, width: usize) -> Self {
        let mut bits = self.bits.clone();
        let sign = self.sign();
        while bits.len() < width {
            bits.push(sign);
        }
        Self { bits }
    }

    pub fn add(&self, bdd: &Bdd, other: &BitVec) -> Self {
        let width = self.width().max(other.width()) + 1;
        let a = self.sign_extend(width);
        let b = other.sign_extend(width);
        let mut carry = bdd.zero;
        let mut bits = Vec::with_capacity(width);
        for (&x, &y) in a.bits.iter().zip(b.bits.iter()) {
            let xy = bdd.apply_xor(x, y);
            bits.push(bdd.apply_xor(xy, carry));
            // carry' = (x ∧ y) ∨ (carry ∧ (x ⊕ y))
            carry = bdd.apply_or(bdd.apply_and(x, y), bdd.apply_and(carry, xy));
        }
        Self { bits }
    }

    pub fn neg(&self, bdd: &Bdd) -> Self {
        let widened = self.sign_extend(self.width() + 1);
        let inverted = Self {
            bits: widened.bits.iter().map(|&b| -b).collect(),
        };
        let one = BitVec::constant(bdd, 1);
        let mut res = inverted.add(bdd, &one);
        res.bits.truncate(self.width() + 1);
        res
    }

    pub fn sub(&self, bdd: &Bdd, other: &BitVec) -> Self {
        self.add(bdd, &other.neg(bdd))
    }

    /// Multiplication by a constant, by shift-and-add.
    pub fn mul_const(&self, bdd: &Bdd, k: i64) -> Self {
        if k == 0 {
            return BitVec::constant(bdd, 0);
        }
        let magnitude = k.unsigned_abs();
        let mut acc: Option<BitVec> = None;
        for shift in 0..64 {
            if (magnitude >> shift) & 1 == 0 {
                continue;
            }
            let mut bits = vec![bdd.zero; shift];
            bits.extend(self.bits.iter().copied());
            let term = Self { bits };
            acc = Some(match acc {
                None => term,
                Some(sum) => sum.add(bdd, &term),
            });
        }
        let res = acc.unwrap_or_else(|| BitVec::constant(bdd, 0));
        if k < 0 {
            res.neg(bdd)
        } else {
            res
        }
    }

    pub fn ite(bdd: &Bdd, cond: Ref, then: &BitVec, else_: &BitVec) -> Self {
        let width = then.width().max(else_.width());
        let t = then.sign_extend(width);
        let e = else_.sign_extend(width);
        let bits = t
            .bits
            .iter()
            .zip(e.bits.iter())
            .map(|(&x, &y)| bdd.apply_ite(cond, x, y))
            .collect();
        Self { bits }
    }

    pub fn equal(&self, bdd: &Bdd, other: &BitVec) -> Ref {
        let width = self.width().max(other.width());
        let a = self.sign_extend(width);
        let b = other.sign_extend(width);
        bdd.apply_and_many(
            a.bits
                .iter()
                .zip(b.bits.iter())
                .map(|(&x, &y)| bdd.apply_eq(x, y)),
        )
    }

    /// Signed `self < other`.
    pub fn less_than(&self, bdd: &Bdd, other: &BitVec) -> Ref {
        self.sub(bdd, other).sign()
    }

    /// Signed `self <= other`.
    pub fn less_equal(&self, bdd: &Bdd, other: &BitVec) -> Ref {
        -other.less_than(bdd, self)
    }

    /// Decodes the value from an assignment of the bits.
    pub fn decode(&self, bdd: &Bdd, value_of: impl Fn(Ref) -> bool) -> i64 {
        let mut res: i64 = 0;
        for (i, &bit) in self.bits.iter().enumerate().take(64) {
            let b = if bdd.is_terminal(bit) {
                bdd.is_one(bit)
            } else {
                value_of(bit)
            };
            if b {
                res |= 1 << i;
            }
        }
        let width = self.width().min(64);
        if width < 64 && (res >> (width - 1)) & 1 == 1 {
            res -= 1 << width;
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn value(bdd: &Bdd, bv: &BitVec) -> i64 {
        bv.decode(bdd, |_| false)
    }

    #[test]
    fn test_signed_width() {
        assert_eq!(signed_width(0), 1);
        assert_eq!(signed_width(-1), 1);
        assert_eq!(signed_width(1), 2);
        assert_eq!(signed_width(127), 8);
        assert_eq!(signed_width(-128), 8);
        assert_eq!(signed_width(128), 9);
    }

    #[test]
    fn test_constant_arithmetic() {
        let bdd = Bdd::default();
        let a = BitVec::constant(&bdd, 100);
        let b = BitVec::constant(&bdd, -77);
        assert_eq!(value(&bdd, &a.add(&bdd, &b)), 23);
        assert_eq!(value(&bdd, &a.sub(&bdd, &b)), 177);
        assert_eq!(value(&bdd, &b.neg(&bdd)), 77);
        assert_eq!(value(&bdd, &BitVec::constant(&bdd, -128).neg(&bdd)), 128);
        assert_eq!(value(&bdd, &b.mul_const(&bdd, -3)), 231);
        assert_eq!(value(&bdd, &a.mul_const(&bdd, 0)), 0);
    }

    #[test]
    fn test_comparisons() {
        let bdd = Bdd::default();
        let a = BitVec::constant(&bdd, -5);
        let b = BitVec::constant(&bdd, 3);
        assert!(bdd.is_one(a.less_than(&bdd, &b)));
        assert!(bdd.is_zero(b.less_than(&bdd, &a)));
        assert!(bdd.is_one(a.less_equal(&bdd, &a)));
        assert!(bdd.is_one(a.equal(&bdd, &BitVec::constant(&bdd, -5))));
        assert!(bdd.is_zero(a.equal(&bdd, &b)));
    }

    #[test]
    fn test_symbolic_equation() {
        // x + 3 == 5 has the single solution x == 2 over 4-bit x.
        let bdd = Bdd::default();
        let x = BitVec::from_bits((1..=4).map(|v| bdd.mk_var(v)).collect());
        let f = x.add(&bdd, &BitVec::constant(&bdd, 3)).equal(&bdd, &BitVec::constant(&bdd, 5));
        let path = bdd.one_sat(f).unwrap();
        let assignment = |r: Ref| {
            let var = bdd.variable(r);
            let b = path.iter().any(|&(v, val)| v == var && val);
            if r.is_negated() {
                !b
            } else {
                b
            }
        };
        assert_eq!(x.decode(&bdd, assignment), 2);
    }
}
