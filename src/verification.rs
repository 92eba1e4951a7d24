//! Randomized checks that the hand-derived inverse step and the symbolic
//! encoding agree with the concrete generator.

use rand::Rng;
use rayon::prelude::*;
use tracing::info;

use crate::reverse_rng::backend::{SatisfiabilityBackend, Verdict};
use crate::reverse_rng::constraints::{symbolic_step, SymbolicState};
use crate::reverse_rng::gf2::Gf2Backend;
use crate::rng::GeneratorState;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub checked: usize,
    /// States for which `backward(forward(s)) != s` or vice versa.
    pub inverse_failures: Vec<GeneratorState>,
    /// States for which the symbolic step disagreed with the concrete one.
    pub encoding_failures: Vec<GeneratorState>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.inverse_failures.is_empty() && self.encoding_failures.is_empty()
    }
}

pub fn inverse_holds(state: GeneratorState) -> bool {
    state.forward().backward() == state && state.backward().forward() == state
}

/// Pins the unknowns to `state`, steps symbolically `steps` times and
/// compares with the concrete walk.
pub fn encoding_holds(state: GeneratorState, steps: usize) -> bool {
    let mut backend = Gf2Backend::new();
    let initial = SymbolicState::unknown(&mut backend);
    backend.assert_eq(&initial.state0, state.state0);
    backend.assert_eq(&initial.state1, state.state1);

    let mut symbolic = initial;
    let mut concrete = state;
    for _ in 0..steps {
        symbolic = symbolic_step(&mut backend, &symbolic);
        concrete = concrete.forward();
    }

    backend.check() == Verdict::Sat
        && backend.value(&symbolic.state0) == Some(concrete.state0)
        && backend.value(&symbolic.state1) == Some(concrete.state1)
}

/// Checks `states` random states in parallel; a sample of them (one in 64)
/// also goes through the symbolic encoding, which is much slower.
pub fn verify_random_states(states: usize) -> VerificationReport {
    let results: Vec<(GeneratorState, bool, bool)> = (0..states)
        .into_par_iter()
        .map_init(rand::thread_rng, |rng, i| {
            let state = GeneratorState::new(rng.gen(), rng.gen());
            let encoding = i % 64 != 0 || encoding_holds(state, 3);
            (state, inverse_holds(state), encoding)
        })
        .collect();

    let mut report = VerificationReport {
        checked: results.len(),
        ..VerificationReport::default()
    };
    for (state, inverse, encoding) in results {
        if !inverse {
            report.inverse_failures.push(state);
        }
        if !encoding {
            report.encoding_failures.push(state);
        }
    }
    info!(
        checked = report.checked,
        inverse_failures = report.inverse_failures.len(),
        encoding_failures = report.encoding_failures.len(),
        "verification finished"
    );
    report
}
