//! Solver settings and the on-disk capture format.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::convention::EngineFamily;
use crate::error::Error;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// `None` lets the solver run until it decides.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: Option<u64>,
}

fn default_timeout_ms() -> Option<u64> {
    Some(DEFAULT_TIMEOUT_MS)
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SolverConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Consecutive `Math.random()` values observed from one engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub engine: EngineFamily,
    pub samples: Vec<f64>,
}

impl Capture {
    /// A capture typed in by hand; rejects an empty sample list.
    pub fn from_samples(engine: EngineFamily, samples: Vec<f64>) -> Result<Self, Error> {
        if samples.is_empty() {
            return Err(Error::from("No samples given".to_string()));
        }
        Ok(Capture { engine, samples })
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)?;
        let capture: Capture = serde_json::from_str(&contents)?;
        if capture.samples.is_empty() {
            return Err(Error::from(format!("No samples found in capture file {}", path.display())));
        }
        Ok(capture)
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
