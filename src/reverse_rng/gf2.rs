//! A pure-Rust backend for constraint systems that are linear over GF(2).
//!
//! XOR, constant shifts and constant masks map every output bit to an affine
//! combination of the unknown bits, so equalities become rows of a linear
//! system solved by Gaussian elimination. The reverse-order convention only
//! needs these operations. Modular addition is not linear and is refused.

use tracing::debug;

use crate::error::Error;
use crate::reverse_rng::backend::{SatisfiabilityBackend, Verdict};

/// Unknown bits the backend can track: two 64-bit words.
pub const MAX_UNKNOWN_BITS: u32 = 128;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Affine {
    vars: u128,
    constant: bool,
}

impl Affine {
    const ZERO: Affine = Affine { vars: 0, constant: false };

    fn xor(self, other: Affine) -> Affine {
        Affine {
            vars: self.vars ^ other.vars,
            constant: self.constant ^ other.constant,
        }
    }

    fn eval(self, assignment: u128) -> bool {
        parity(self.vars & assignment) ^ self.constant
    }
}

/// One 64-bit word, bit 0 first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinearWord {
    bits: [Affine; 64],
}

impl LinearWord {
    fn zero() -> Self {
        LinearWord { bits: [Affine::ZERO; 64] }
    }
}

fn parity(x: u128) -> bool {
    x.count_ones() & 1 == 1
}

#[derive(Debug)]
pub struct Gf2Backend {
    next_var: u32,
    // basis[k] holds the row whose highest set bit is k
    basis: Vec<Option<(u128, bool)>>,
    equations: usize,
    inconsistent: bool,
    exhausted: bool,
    solution: Option<u128>,
}

impl Default for Gf2Backend {
    fn default() -> Self {
        Gf2Backend::new()
    }
}

impl Gf2Backend {
    pub fn new() -> Self {
        Gf2Backend {
            next_var: 0,
            basis: vec![None; MAX_UNKNOWN_BITS as usize],
            equations: 0,
            inconsistent: false,
            exhausted: false,
            solution: None,
        }
    }

    /// Number of independent equations asserted so far.
    pub fn rank(&self) -> usize {
        self.basis.iter().filter(|row| row.is_some()).count()
    }

    fn insert(&mut self, mut row: u128, mut rhs: bool) {
        self.equations += 1;
        while row != 0 {
            let top = (127 - row.leading_zeros()) as usize;
            match self.basis[top] {
                Some((pivot, pivot_rhs)) => {
                    row ^= pivot;
                    rhs ^= pivot_rhs;
                }
                None => {
                    self.basis[top] = Some((row, rhs));
                    return;
                }
            }
        }
        if rhs {
            self.inconsistent = true;
        }
    }

    /// Back-substitution from the lowest pivot up; free bits are zero.
    fn back_substitute(&self) -> u128 {
        let mut solution = 0u128;
        for (k, row) in self.basis.iter().enumerate() {
            if let Some((pivot, rhs)) = *row {
                let lower = pivot & !(1u128 << k);
                if rhs ^ parity(lower & solution) {
                    solution |= 1u128 << k;
                }
            }
        }
        solution
    }
}

impl SatisfiabilityBackend for Gf2Backend {
    type Word = LinearWord;

    fn name(&self) -> &'static str {
        "gf2"
    }

    fn unknown(&mut self, name: &str) -> LinearWord {
        if self.next_var + 64 > MAX_UNKNOWN_BITS {
            debug!(name, "gf2 backend is out of unknown bits");
            self.exhausted = true;
            return LinearWord::zero();
        }
        let mut word = LinearWord::zero();
        for (i, bit) in word.bits.iter_mut().enumerate() {
            bit.vars = 1u128 << (self.next_var as usize + i);
        }
        self.next_var += 64;
        word
    }

    fn xor(&mut self, a: &LinearWord, b: &LinearWord) -> LinearWord {
        let mut out = LinearWord::zero();
        for i in 0..64 {
            out.bits[i] = a.bits[i].xor(b.bits[i]);
        }
        out
    }

    fn shl(&mut self, a: &LinearWord, bits: u32) -> LinearWord {
        let shift = bits as usize;
        let mut out = LinearWord::zero();
        for i in shift..64 {
            out.bits[i] = a.bits[i - shift];
        }
        out
    }

    fn lshr(&mut self, a: &LinearWord, bits: u32) -> LinearWord {
        let shift = bits as usize;
        let mut out = LinearWord::zero();
        for i in 0..64usize.saturating_sub(shift) {
            out.bits[i] = a.bits[i + shift];
        }
        out
    }

    fn mask(&mut self, a: &LinearWord, mask: u64) -> LinearWord {
        let mut out = LinearWord::zero();
        for i in 0..64 {
            if (mask >> i) & 1 == 1 {
                out.bits[i] = a.bits[i];
            }
        }
        out
    }

    fn wrapping_add(&mut self, _a: &LinearWord, _b: &LinearWord) -> Result<LinearWord, Error> {
        Err(Error::UnsupportedOperation {
            backend: "gf2",
            operation: "modular addition",
        })
    }

    fn assert_eq(&mut self, word: &LinearWord, value: u64) {
        self.solution = None;
        for (i, bit) in word.bits.iter().enumerate() {
            let expected = (value >> i) & 1 == 1;
            self.insert(bit.vars, bit.constant ^ expected);
        }
    }

    fn check(&mut self) -> Verdict {
        if self.exhausted {
            return Verdict::Unknown;
        }
        if self.inconsistent {
            debug!(equations = self.equations, rank = self.rank(), "gf2 system is inconsistent");
            return Verdict::Unsat;
        }
        debug!(
            equations = self.equations,
            rank = self.rank(),
            unknowns = self.next_var,
            "gf2 system is consistent"
        );
        self.solution = Some(self.back_substitute());
        Verdict::Sat
    }

    fn value(&self, word: &LinearWord) -> Option<u64> {
        let solution = self.solution?;
        Some(
            word.bits
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, bit)| acc | (u64::from(bit.eval(solution)) << i)),
        )
    }
}
