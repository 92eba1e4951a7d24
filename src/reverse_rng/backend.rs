//! The bit-vector solving capability the constraint builder is written against.

use crate::error::Error;

/// Result of a satisfiability check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Sat,
    Unsat,
    /// The backend gave up, e.g. on timeout.
    Unknown,
}

/// A solver over 64-bit bit-vector words.
///
/// All shifts are by constant amounts and all arithmetic wraps modulo 2^64.
/// `value` is only meaningful after `check` returned [`Verdict::Sat`].
pub trait SatisfiabilityBackend {
    type Word: Clone;

    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// A fresh unknown 64-bit word.
    fn unknown(&mut self, name: &str) -> Self::Word;

    fn xor(&mut self, a: &Self::Word, b: &Self::Word) -> Self::Word;

    fn shl(&mut self, a: &Self::Word, bits: u32) -> Self::Word;

    /// Logical right shift.
    fn lshr(&mut self, a: &Self::Word, bits: u32) -> Self::Word;

    fn mask(&mut self, a: &Self::Word, mask: u64) -> Self::Word;

    fn wrapping_add(&mut self, a: &Self::Word, b: &Self::Word) -> Result<Self::Word, Error>;

    /// Asserts `word == value`.
    fn assert_eq(&mut self, word: &Self::Word, value: u64);

    fn check(&mut self) -> Verdict;

    /// The model's value for `word`.
    fn value(&self, word: &Self::Word) -> Option<u64>;
}
