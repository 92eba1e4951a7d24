//! How each browser engine turns generator state into `Math.random()` output.
//!
//! V8 refills a cache of values by stepping forward and then serves it from
//! the top, so callers see values in the reverse of generation order.
//! SpiderMonkey and JavaScriptCore step once per call and serve immediately.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::{mantissa_to_double, MANTISSA_BITS, MANTISSA_MASK};
use crate::error::Error;
use crate::rng::GeneratorState;

/// Which way the concrete state moves to reach the next served value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Which 53 bits of the state become the served double.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputRule {
    /// `state0 >> 11`.
    HighBitsOfState0,
    /// `(state0 + state1) & (2^53 - 1)`.
    LowBitsOfSum,
}

impl OutputRule {
    /// The raw 64-bit word this rule reads from a state.
    #[inline]
    pub fn raw(self, state: GeneratorState) -> u64 {
        match self {
            OutputRule::HighBitsOfState0 => state.state0,
            OutputRule::LowBitsOfSum => state.sum(),
        }
    }

    /// Reduces a raw word to the 53-bit mantissa.
    #[inline]
    pub fn mantissa(self, raw: u64) -> u64 {
        match self {
            OutputRule::HighBitsOfState0 => raw >> (64 - MANTISSA_BITS),
            OutputRule::LowBitsOfSum => raw & MANTISSA_MASK,
        }
    }

    #[inline]
    pub fn to_double(self, raw: u64) -> f64 {
        mantissa_to_double(self.mantissa(raw))
    }
}

/// Everything that differs between the engine families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConvention {
    pub direction: Direction,
    pub output: OutputRule,
    /// Feed observations to the constraint builder last-first.
    pub reverse_observations: bool,
    /// Step the solved state once per observation before predicting.
    pub resynchronize: bool,
}

impl EngineConvention {
    /// V8: values come off a LIFO cache.
    pub const REVERSE_ORDER: EngineConvention = EngineConvention {
        direction: Direction::Backward,
        output: OutputRule::HighBitsOfState0,
        reverse_observations: true,
        resynchronize: false,
    };

    /// SpiderMonkey and JavaScriptCore: one step per call.
    pub const FORWARD_ORDER: EngineConvention = EngineConvention {
        direction: Direction::Forward,
        output: OutputRule::LowBitsOfSum,
        reverse_observations: false,
        resynchronize: true,
    };

    /// Number of forward steps between the solved state and the first
    /// prediction.
    pub fn resync_steps(&self, observations: usize) -> usize {
        if self.resynchronize {
            observations
        } else {
            0
        }
    }

    /// Moves `state` to the next served position and returns the raw word
    /// for that position.
    ///
    /// Backward engines read before stepping: the solved state already sits
    /// one position past the last observation.
    #[inline]
    pub fn advance(&self, state: &mut GeneratorState) -> u64 {
        match self.direction {
            Direction::Forward => {
                *state = state.forward();
                self.output.raw(*state)
            }
            Direction::Backward => {
                let raw = self.output.raw(*state);
                *state = state.backward();
                raw
            }
        }
    }

    /// The first `count` doubles an engine seeded with `seed` would serve.
    ///
    /// For the reverse-order convention this is one freshly generated batch
    /// of `count` values served from the top; values served after it are the
    /// ones generated before it, going back towards `seed`.
    pub fn served_sequence(&self, seed: GeneratorState, count: usize) -> Vec<f64> {
        let mut state = seed;
        let mut generated: Vec<f64> = (0..count)
            .map(|_| {
                state = state.forward();
                self.output.to_double(self.output.raw(state))
            })
            .collect();
        if self.reverse_observations {
            generated.reverse();
        }
        generated
    }
}

/// The browser engines whose `Math.random()` is xorshift128+.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineFamily {
    #[serde(alias = "v8", alias = "node")]
    Chrome,
    #[serde(alias = "spidermonkey")]
    Firefox,
    #[serde(alias = "jsc", alias = "webkit")]
    Safari,
}

impl EngineFamily {
    pub fn convention(self) -> EngineConvention {
        match self {
            EngineFamily::Chrome => EngineConvention::REVERSE_ORDER,
            EngineFamily::Firefox | EngineFamily::Safari => EngineConvention::FORWARD_ORDER,
        }
    }
}

impl FromStr for EngineFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" | "v8" | "node" => Ok(EngineFamily::Chrome),
            "firefox" | "spidermonkey" => Ok(EngineFamily::Firefox),
            "safari" | "jsc" | "webkit" => Ok(EngineFamily::Safari),
            _ => Err(Error::UnknownEngine(s.to_string())),
        }
    }
}

impl fmt::Display for EngineFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            EngineFamily::Chrome => "chrome",
            EngineFamily::Firefox => "firefox",
            EngineFamily::Safari => "safari",
        };
        write!(f, "{}", name)
    }
}
