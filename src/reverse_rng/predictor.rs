//! Solved-state predictor shared by every engine family.

use tracing::{debug, info, warn};

use crate::codec::recover_mantissas;
use crate::convention::EngineConvention;
use crate::error::Error;
use crate::reverse_rng::backend::{SatisfiabilityBackend, Verdict};
use crate::reverse_rng::constraints::build_constraints;
use crate::rng::GeneratorState;

/// Fewer observations than this never pin down 128 bits of state.
pub const MIN_SAMPLES: usize = 3;

/// Enough observations that spurious second solutions do not show up in practice.
pub const RECOMMENDED_SAMPLES: usize = 5;

/// Where a predictor stands once construction has finished.
///
/// There is no unseeded variant: a predictor only exists after its one solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredictorState {
    Seeded(GeneratorState),
    /// No state is consistent with the observations, or the solver gave up.
    Unsolvable,
}

#[derive(Clone, Debug)]
pub struct Predictor {
    convention: EngineConvention,
    state: PredictorState,
}

impl Predictor {
    /// Recovers the generator state behind `samples` and positions it just
    /// past the last observation.
    ///
    /// Malformed samples and backends that cannot express the convention are
    /// errors. An unsatisfiable, timed out or too short capture yields an
    /// [`PredictorState::Unsolvable`] predictor instead.
    pub fn solve<B: SatisfiabilityBackend>(
        convention: EngineConvention,
        samples: &[f64],
        mut backend: B,
    ) -> Result<Self, Error> {
        let mantissas = recover_mantissas(samples)?;

        if mantissas.len() < MIN_SAMPLES {
            warn!(samples = mantissas.len(), minimum = MIN_SAMPLES, "too few samples to recover state");
            return Ok(Predictor::unsolvable(convention));
        }

        let initial = build_constraints(&mut backend, &convention, &mantissas)?;

        let verdict = backend.check();
        debug!(backend = backend.name(), ?verdict, "solver finished");
        let solved = match verdict {
            Verdict::Sat => backend
                .value(&initial.state0)
                .zip(backend.value(&initial.state1))
                .map(|(state0, state1)| GeneratorState::new(state0, state1)),
            Verdict::Unsat => None,
            Verdict::Unknown => {
                warn!(backend = backend.name(), "solver gave up, treating as unsolvable");
                None
            }
        };
        drop(backend);

        let mut state = match solved {
            Some(state) => state,
            None => {
                warn!(samples = samples.len(), "no generator state matches the observations");
                return Ok(Predictor::unsolvable(convention));
            }
        };

        // Bring the concrete state level with where the symbolic one ended,
        // otherwise the first predictions repeat the observations.
        for _ in 0..convention.resync_steps(samples.len()) {
            state = state.forward();
        }

        info!(%state, samples = samples.len(), "recovered generator state");
        Ok(Predictor {
            convention,
            state: PredictorState::Seeded(state),
        })
    }

    /// A predictor resumed from a known state.
    pub fn from_state(convention: EngineConvention, state: GeneratorState) -> Self {
        Predictor {
            convention,
            state: PredictorState::Seeded(state),
        }
    }

    fn unsolvable(convention: EngineConvention) -> Self {
        Predictor {
            convention,
            state: PredictorState::Unsolvable,
        }
    }

    /// The next value the engine will serve, or `None` if the state could
    /// not be recovered. Every call advances the state once.
    pub fn predict_next(&mut self) -> Option<f64> {
        match &mut self.state {
            PredictorState::Seeded(state) => {
                let raw = self.convention.advance(state);
                Some(self.convention.output.to_double(raw))
            }
            PredictorState::Unsolvable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, PredictorState::Seeded(_))
    }

    /// The current concrete state, if any.
    pub fn state(&self) -> Option<GeneratorState> {
        match self.state {
            PredictorState::Seeded(state) => Some(state),
            PredictorState::Unsolvable => None,
        }
    }

    pub fn predictor_state(&self) -> PredictorState {
        self.state
    }

    pub fn convention(&self) -> EngineConvention {
        self.convention
    }
}

impl Iterator for Predictor {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        self.predict_next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reverse_rng::gf2::Gf2Backend;
    use rand::Rng;

    fn random_state() -> GeneratorState {
        let mut rng = rand::thread_rng();
        GeneratorState::new(rng.gen(), rng.gen())
    }

    #[test]
    fn reverse_order_predicts_values_generated_earlier() {
        // Served LIFO: g_15, g_14, ..., g_1. Observing g_15..g_11 must
        // predict g_10 down to g_1.
        let served = EngineConvention::REVERSE_ORDER.served_sequence(random_state(), 15);

        let mut predictor =
            Predictor::solve(EngineConvention::REVERSE_ORDER, &served[..5], Gf2Backend::new()).unwrap();
        assert!(predictor.is_available());

        for expected in &served[5..] {
            assert_eq!(predictor.predict_next(), Some(*expected));
        }
    }

    #[test]
    fn reverse_order_never_repeats_observations() {
        let seed = random_state();
        let served = EngineConvention::REVERSE_ORDER.served_sequence(seed, 12);
        let observed = &served[..6];

        let predictor = Predictor::solve(EngineConvention::REVERSE_ORDER, observed, Gf2Backend::new()).unwrap();
        let predictions: Vec<f64> = predictor.take(6).collect();

        assert_eq!(predictions.len(), 6);
        for p in &predictions {
            assert!(!observed.contains(p), "prediction {} was already observed", p);
        }
    }

    #[test]
    fn identical_captures_give_identical_predictions() {
        let served = EngineConvention::REVERSE_ORDER.served_sequence(random_state(), 10);
        let a = Predictor::solve(EngineConvention::REVERSE_ORDER, &served[..5], Gf2Backend::new()).unwrap();
        let b = Predictor::solve(EngineConvention::REVERSE_ORDER, &served[..5], Gf2Backend::new()).unwrap();

        assert_eq!(a.state(), b.state());
        let left: Vec<f64> = a.take(5).collect();
        let right: Vec<f64> = b.take(5).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn too_few_samples_is_unsolvable() {
        let served = EngineConvention::REVERSE_ORDER.served_sequence(random_state(), 2);
        let mut predictor = Predictor::solve(EngineConvention::REVERSE_ORDER, &served, Gf2Backend::new()).unwrap();

        assert_eq!(predictor.predictor_state(), PredictorState::Unsolvable);
        assert_eq!(predictor.predict_next(), None);
        assert_eq!(predictor.predict_next(), None);
    }

    #[test]
    fn inconsistent_samples_are_unsolvable() {
        let mut rng = rand::thread_rng();
        // Uniform doubles on the 2^-53 grid that no state produced.
        let noise: Vec<f64> = (0..6)
            .map(|_| crate::codec::mantissa_to_double(rng.gen::<u64>()))
            .collect();

        let mut predictor = Predictor::solve(EngineConvention::REVERSE_ORDER, &noise, Gf2Backend::new()).unwrap();
        assert!(!predictor.is_available());
        assert_eq!(predictor.state(), None);
        assert_eq!(predictor.predict_next(), None);
    }

    #[test]
    fn malformed_sample_is_rejected_eagerly() {
        let result = Predictor::solve(
            EngineConvention::REVERSE_ORDER,
            &[0.1, 0.2, 1.0, 0.3, 0.4],
            Gf2Backend::new(),
        );
        assert!(matches!(result, Err(Error::InvalidSample { index: 2, .. })));
    }

    /// Wraps the GF(2) backend but reports a timeout on every check.
    struct TimingOutBackend(Gf2Backend);

    impl SatisfiabilityBackend for TimingOutBackend {
        type Word = <Gf2Backend as SatisfiabilityBackend>::Word;

        fn name(&self) -> &'static str {
            "timing-out"
        }
        fn unknown(&mut self, name: &str) -> Self::Word {
            self.0.unknown(name)
        }
        fn xor(&mut self, a: &Self::Word, b: &Self::Word) -> Self::Word {
            self.0.xor(a, b)
        }
        fn shl(&mut self, a: &Self::Word, bits: u32) -> Self::Word {
            self.0.shl(a, bits)
        }
        fn lshr(&mut self, a: &Self::Word, bits: u32) -> Self::Word {
            self.0.lshr(a, bits)
        }
        fn mask(&mut self, a: &Self::Word, mask: u64) -> Self::Word {
            self.0.mask(a, mask)
        }
        fn wrapping_add(&mut self, a: &Self::Word, b: &Self::Word) -> Result<Self::Word, Error> {
            self.0.wrapping_add(a, b)
        }
        fn assert_eq(&mut self, word: &Self::Word, value: u64) {
            self.0.assert_eq(word, value)
        }
        fn check(&mut self) -> Verdict {
            Verdict::Unknown
        }
        fn value(&self, word: &Self::Word) -> Option<u64> {
            self.0.value(word)
        }
    }

    // Hardening: the source tool blocks on the solver forever. A timeout is
    // treated the same as an unsatisfiable capture.
    #[test]
    fn solver_timeout_is_unsolvable() {
        let served = EngineConvention::REVERSE_ORDER.served_sequence(random_state(), 5);
        let mut predictor =
            Predictor::solve(EngineConvention::REVERSE_ORDER, &served, TimingOutBackend(Gf2Backend::new())).unwrap();
        assert_eq!(predictor.predictor_state(), PredictorState::Unsolvable);
        assert_eq!(predictor.predict_next(), None);
    }

    #[test]
    fn forward_order_on_linear_backend_is_an_error() {
        let served = EngineConvention::FORWARD_ORDER.served_sequence(random_state(), 5);
        let result = Predictor::solve(EngineConvention::FORWARD_ORDER, &served, Gf2Backend::new());
        assert!(matches!(result, Err(Error::UnsupportedOperation { .. })));
    }

    #[test]
    fn resumed_forward_predictor_follows_the_generator() {
        let seed = GeneratorState::new(1, 1);
        let served = EngineConvention::FORWARD_ORDER.served_sequence(seed, 8);
        let predictor = Predictor::from_state(EngineConvention::FORWARD_ORDER, seed);
        assert_eq!(predictor.take(8).collect::<Vec<_>>(), served);
    }

    /// Evaluates every expression against one candidate seed. `check` is Sat
    /// only when all asserted equalities hold for that seed.
    struct CandidateBackend {
        candidate: GeneratorState,
        unknowns: usize,
        consistent: bool,
    }

    impl CandidateBackend {
        fn new(candidate: GeneratorState) -> Self {
            CandidateBackend {
                candidate,
                unknowns: 0,
                consistent: true,
            }
        }
    }

    impl SatisfiabilityBackend for CandidateBackend {
        type Word = u64;

        fn name(&self) -> &'static str {
            "candidate"
        }
        fn unknown(&mut self, _name: &str) -> u64 {
            self.unknowns += 1;
            match self.unknowns {
                1 => self.candidate.state0,
                2 => self.candidate.state1,
                n => panic!("unexpected unknown #{}", n),
            }
        }
        fn xor(&mut self, a: &u64, b: &u64) -> u64 {
            a ^ b
        }
        fn shl(&mut self, a: &u64, bits: u32) -> u64 {
            a << bits
        }
        fn lshr(&mut self, a: &u64, bits: u32) -> u64 {
            a >> bits
        }
        fn mask(&mut self, a: &u64, mask: u64) -> u64 {
            a & mask
        }
        fn wrapping_add(&mut self, a: &u64, b: &u64) -> Result<u64, Error> {
            Ok(a.wrapping_add(*b))
        }
        fn assert_eq(&mut self, word: &u64, value: u64) {
            self.consistent &= *word == value;
        }
        fn check(&mut self) -> Verdict {
            if self.consistent {
                Verdict::Sat
            } else {
                Verdict::Unsat
            }
        }
        fn value(&self, word: &u64) -> Option<u64> {
            Some(*word)
        }
    }

    #[test]
    fn forward_order_predicts_sixth_output_from_unit_seed() {
        let seed = GeneratorState::new(1, 1);
        let served = EngineConvention::FORWARD_ORDER.served_sequence(seed, 6);

        let mut predictor =
            Predictor::solve(EngineConvention::FORWARD_ORDER, &served[..5], CandidateBackend::new(seed)).unwrap();
        assert_eq!(predictor.predict_next(), Some(served[5]));
    }

    #[test]
    fn forward_order_resynchronizes_past_the_observations() {
        let seed = random_state();
        let served = EngineConvention::FORWARD_ORDER.served_sequence(seed, 15);
        let observed = &served[..5];

        let predictor =
            Predictor::solve(EngineConvention::FORWARD_ORDER, observed, CandidateBackend::new(seed)).unwrap();
        let mut expected = seed;
        for _ in 0..observed.len() {
            expected = expected.forward();
        }
        assert_eq!(predictor.state(), Some(expected));

        let predictions: Vec<f64> = predictor.take(10).collect();
        assert_eq!(predictions, served[5..].to_vec());
        for p in &predictions {
            assert!(!observed.contains(p), "prediction {} was already observed", p);
        }
    }

    #[test]
    fn forward_order_wrong_candidate_is_unsolvable() {
        let seed = random_state();
        let served = EngineConvention::FORWARD_ORDER.served_sequence(seed, 5);
        let wrong = seed.forward();

        let predictor = Predictor::solve(EngineConvention::FORWARD_ORDER, &served, CandidateBackend::new(wrong)).unwrap();
        assert_eq!(predictor.predictor_state(), PredictorState::Unsolvable);
    }

    #[test]
    fn identical_forward_captures_give_identical_predictions() {
        let seed = random_state();
        let served = EngineConvention::FORWARD_ORDER.served_sequence(seed, 5);
        let a = Predictor::solve(EngineConvention::FORWARD_ORDER, &served, CandidateBackend::new(seed)).unwrap();
        let b = Predictor::solve(EngineConvention::FORWARD_ORDER, &served, CandidateBackend::new(seed)).unwrap();

        assert_eq!(a.state(), b.state());
        let left: Vec<f64> = a.take(5).collect();
        let right: Vec<f64> = b.take(5).collect();
        assert_eq!(left, right);
    }

    #[cfg(feature = "smt")]
    mod smt {
        use super::*;
        use crate::reverse_rng::smt::{config, Z3Backend};
        use std::time::Duration;
        use z3::Context;

        fn solve_with_z3(convention: EngineConvention, samples: &[f64]) -> Predictor {
            let cfg = config(Some(Duration::from_secs(60)));
            let ctx = Context::new(&cfg);
            Predictor::solve(convention, samples, Z3Backend::new(&ctx)).unwrap()
        }

        #[test]
        fn forward_order_predicts_sixth_output_from_unit_seed() {
            let served = EngineConvention::FORWARD_ORDER.served_sequence(GeneratorState::new(1, 1), 6);
            let mut predictor = solve_with_z3(EngineConvention::FORWARD_ORDER, &served[..5]);
            assert_eq!(predictor.predict_next(), Some(served[5]));
        }

        #[test]
        fn forward_order_replays_the_sequence() {
            let served = EngineConvention::FORWARD_ORDER.served_sequence(random_state(), 15);
            let predictor = solve_with_z3(EngineConvention::FORWARD_ORDER, &served[..5]);
            let predictions: Vec<f64> = predictor.take(10).collect();
            assert_eq!(predictions, served[5..].to_vec());
            for p in &predictions {
                assert!(!served[..5].contains(p));
            }
        }

        #[test]
        fn reverse_order_agrees_with_linear_backend() {
            let served = EngineConvention::REVERSE_ORDER.served_sequence(random_state(), 10);
            let z3 = solve_with_z3(EngineConvention::REVERSE_ORDER, &served[..5]);
            let linear = Predictor::solve(EngineConvention::REVERSE_ORDER, &served[..5], Gf2Backend::new()).unwrap();
            assert_eq!(z3.take(5).collect::<Vec<_>>(), linear.take(5).collect::<Vec<_>>());
        }

        #[test]
        fn forward_order_noise_is_unsolvable() {
            let mut rng = rand::thread_rng();
            let noise: Vec<f64> = (0..6)
                .map(|_| crate::codec::mantissa_to_double(rng.gen::<u64>()))
                .collect();
            let predictor = solve_with_z3(EngineConvention::FORWARD_ORDER, &noise);
            assert!(!predictor.is_available());
        }
    }
}
