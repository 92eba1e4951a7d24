//! Symbolic xorshift128+ and the per-sample equality constraints.

use tracing::debug;

use crate::codec::{MANTISSA_BITS, MANTISSA_MASK};
use crate::convention::{EngineConvention, OutputRule};
use crate::error::Error;
use crate::reverse_rng::backend::SatisfiabilityBackend;
use crate::rng::{SHIFT_A, SHIFT_B, SHIFT_C};

/// A generator state whose words are solver expressions.
#[derive(Clone, Debug)]
pub struct SymbolicState<W> {
    pub state0: W,
    pub state1: W,
}

impl<W: Clone> SymbolicState<W> {
    /// The two unknowns the solver assigns.
    pub fn unknown<B>(backend: &mut B) -> Self
    where
        B: SatisfiabilityBackend<Word = W>,
    {
        SymbolicState {
            state0: backend.unknown("se_state0"),
            state1: backend.unknown("se_state1"),
        }
    }
}

/// [`crate::rng::GeneratorState::forward`] over solver words.
pub fn symbolic_step<B: SatisfiabilityBackend>(
    backend: &mut B,
    state: &SymbolicState<B::Word>,
) -> SymbolicState<B::Word> {
    let mut x = state.state0.clone();
    let shifted = backend.shl(&x, SHIFT_A);
    x = backend.xor(&x, &shifted);
    let shifted = backend.lshr(&x, SHIFT_B);
    x = backend.xor(&x, &shifted);
    x = backend.xor(&x, &state.state1);
    let shifted = backend.lshr(&state.state1, SHIFT_C);
    x = backend.xor(&x, &shifted);
    SymbolicState {
        state0: state.state1.clone(),
        state1: x,
    }
}

/// The solver expression for the mantissa served from `state`.
fn symbolic_mantissa<B: SatisfiabilityBackend>(
    backend: &mut B,
    output: OutputRule,
    state: &SymbolicState<B::Word>,
) -> Result<B::Word, Error> {
    match output {
        OutputRule::HighBitsOfState0 => Ok(backend.lshr(&state.state0, 64 - MANTISSA_BITS)),
        OutputRule::LowBitsOfSum => {
            let sum = backend.wrapping_add(&state.state0, &state.state1)?;
            Ok(backend.mask(&sum, MANTISSA_MASK))
        }
    }
}

/// Asserts one equality per mantissa and returns the unknown starting state.
///
/// For the reverse-order convention the mantissas are consumed last-first,
/// which puts them back in generation order.
pub fn build_constraints<B: SatisfiabilityBackend>(
    backend: &mut B,
    convention: &EngineConvention,
    mantissas: &[u64],
) -> Result<SymbolicState<B::Word>, Error> {
    let initial = SymbolicState::unknown(backend);
    let mut current = initial.clone();

    let ordered: Vec<u64> = if convention.reverse_observations {
        mantissas.iter().rev().copied().collect()
    } else {
        mantissas.to_vec()
    };

    for mantissa in ordered {
        current = symbolic_step(backend, &current);
        let served = symbolic_mantissa(backend, convention.output, &current)?;
        backend.assert_eq(&served, mantissa);
    }

    debug!(
        backend = backend.name(),
        constraints = mantissas.len(),
        "asserted one equality per observation"
    );
    Ok(initial)
}
