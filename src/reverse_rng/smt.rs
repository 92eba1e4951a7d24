//! Z3-backed implementation of [`SatisfiabilityBackend`].
//!
//! Handles both conventions, including the modular addition the forward-order
//! output needs.

use std::time::Duration;

use z3::ast::{Ast, BV};
use z3::{Config, Context, Model, SatResult, Solver};

use crate::error::Error;
use crate::reverse_rng::backend::{SatisfiabilityBackend, Verdict};

pub const WORD_BITS: u32 = 64;

/// Z3 configuration with an optional solver timeout.
pub fn config(timeout: Option<Duration>) -> Config {
    let mut cfg = Config::new();
    if let Some(timeout) = timeout {
        cfg.set_timeout_msec(timeout.as_millis().min(u128::from(u64::MAX)) as u64);
    }
    cfg
}

pub struct Z3Backend<'ctx> {
    context: &'ctx Context,
    solver: Solver<'ctx>,
    model: Option<Model<'ctx>>,
}

impl<'ctx> Z3Backend<'ctx> {
    pub fn new(context: &'ctx Context) -> Self {
        Z3Backend {
            context,
            solver: Solver::new(context),
            model: None,
        }
    }

    fn constant(&self, value: u64) -> BV<'ctx> {
        BV::from_u64(self.context, value, WORD_BITS)
    }
}

impl<'ctx> SatisfiabilityBackend for Z3Backend<'ctx> {
    type Word = BV<'ctx>;

    fn name(&self) -> &'static str {
        "z3"
    }

    fn unknown(&mut self, name: &str) -> BV<'ctx> {
        BV::new_const(self.context, name, WORD_BITS)
    }

    fn xor(&mut self, a: &BV<'ctx>, b: &BV<'ctx>) -> BV<'ctx> {
        a.bvxor(b)
    }

    fn shl(&mut self, a: &BV<'ctx>, bits: u32) -> BV<'ctx> {
        a.bvshl(&self.constant(u64::from(bits)))
    }

    // Logical shift instead of arithmetic shift
    fn lshr(&mut self, a: &BV<'ctx>, bits: u32) -> BV<'ctx> {
        a.bvlshr(&self.constant(u64::from(bits)))
    }

    fn mask(&mut self, a: &BV<'ctx>, mask: u64) -> BV<'ctx> {
        a.bvand(&self.constant(mask))
    }

    fn wrapping_add(&mut self, a: &BV<'ctx>, b: &BV<'ctx>) -> Result<BV<'ctx>, Error> {
        Ok(a.bvadd(b))
    }

    fn assert_eq(&mut self, word: &BV<'ctx>, value: u64) {
        self.model = None;
        self.solver.assert(&word._eq(&self.constant(value)));
    }

    fn check(&mut self) -> Verdict {
        match self.solver.check() {
            SatResult::Sat => {
                self.model = self.solver.get_model();
                if self.model.is_some() {
                    Verdict::Sat
                } else {
                    Verdict::Unknown
                }
            }
            SatResult::Unsat => Verdict::Unsat,
            SatResult::Unknown => Verdict::Unknown,
        }
    }

    fn value(&self, word: &BV<'ctx>) -> Option<u64> {
        self.model.as_ref()?.eval(word, true)?.as_u64()
    }
}
