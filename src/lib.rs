pub mod error;
pub mod codec;
pub mod rng;
pub mod convention;
pub mod config;
pub mod reverse_rng;
pub mod verification;

pub use config::{Capture, SolverConfig};
pub use convention::{EngineConvention, EngineFamily};
pub use error::Error;
pub use reverse_rng::predictor::{Predictor, PredictorState};
pub use reverse_rng::recover;
pub use rng::GeneratorState;
