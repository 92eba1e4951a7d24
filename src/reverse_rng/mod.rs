pub mod backend;
pub mod constraints;
pub mod gf2;
pub mod predictor;
#[cfg(feature = "smt")]
pub mod smt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Capture, SolverConfig};
use crate::convention::{EngineFamily, OutputRule};
use crate::error::Error;
use crate::rng::GeneratorState;
use gf2::Gf2Backend;
use predictor::{Predictor, RECOMMENDED_SAMPLES};

/// Builds the predictor for `family` with the best available backend.
///
/// Reverse-order captures are linear over GF(2) and always go to the GF(2)
/// backend. Forward-order captures need Z3 (feature `smt`).
pub fn recover(family: EngineFamily, samples: &[f64], config: &SolverConfig) -> Result<Predictor, Error> {
    let convention = family.convention();
    if convention.output == OutputRule::HighBitsOfState0 {
        debug!(%family, "using gf2 backend");
        return Predictor::solve(convention, samples, Gf2Backend::new());
    }
    recover_nonlinear(family, samples, config)
}

#[cfg(feature = "smt")]
fn recover_nonlinear(family: EngineFamily, samples: &[f64], config: &SolverConfig) -> Result<Predictor, Error> {
    use z3::Context;

    debug!(%family, timeout_ms = ?config.timeout_ms, "using z3 backend");
    let cfg = smt::config(config.timeout());
    let ctx = Context::new(&cfg);
    Predictor::solve(family.convention(), samples, smt::Z3Backend::new(&ctx))
}

#[cfg(not(feature = "smt"))]
fn recover_nonlinear(family: EngineFamily, samples: &[f64], _config: &SolverConfig) -> Result<Predictor, Error> {
    debug!(%family, "z3 backend not compiled in, falling back to gf2");
    Predictor::solve(family.convention(), samples, Gf2Backend::new())
}

/// Outcome of recovering a capture and running the predictor forward.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionReport {
    pub engine: EngineFamily,
    pub samples: Vec<f64>,
    /// State positioned just past the last observation.
    pub recovered_state: Option<GeneratorState>,
    pub predictions: Vec<f64>,
}

pub fn run(capture: &Capture, count: usize, config: &SolverConfig) -> Result<PredictionReport, Error> {
    if capture.samples.len() < RECOMMENDED_SAMPLES {
        warn!(
            samples = capture.samples.len(),
            recommended = RECOMMENDED_SAMPLES,
            "capture may be too short to identify the state uniquely"
        );
    }

    let mut predictor = recover(capture.engine, &capture.samples, config)?;
    let recovered_state = predictor.state();
    let predictions = (0..count).map_while(|_| predictor.predict_next()).collect();

    Ok(PredictionReport {
        engine: capture.engine,
        samples: capture.samples.clone(),
        recovered_state,
        predictions,
    })
}
