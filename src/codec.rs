//! Conversion between `[0, 1)` doubles and the 53-bit integers they encode.
//!
//! Every engine reduces a raw 64-bit word to 53 bits and scales by 2^-53, so a
//! served double is always exactly `m / 2^53` for some `m < 2^53`.

use crate::error::Error;
use libm::ldexp;

pub const MANTISSA_BITS: u32 = 53;
pub const MANTISSA_MASK: u64 = (1 << MANTISSA_BITS) - 1;

/// Scale a served double back up to its 53-bit integer.
pub fn recover_mantissa(sample: f64) -> u64 {
    ldexp(sample, MANTISSA_BITS as i32).round() as u64
}

pub fn mantissa_to_double(mantissa: u64) -> f64 {
    ldexp((mantissa & MANTISSA_MASK) as f64, -(MANTISSA_BITS as i32))
}

/// Checks that `sample` could have come out of `Math.random()`.
pub fn validate_sample(index: usize, sample: f64) -> Result<u64, Error> {
    if !sample.is_finite() || !(0.0..1.0).contains(&sample) {
        return Err(Error::InvalidSample { index, value: sample });
    }
    Ok(recover_mantissa(sample))
}

/// Validates a whole capture and returns its mantissas in the same order.
pub fn recover_mantissas(samples: &[f64]) -> Result<Vec<u64>, Error> {
    samples
        .iter()
        .enumerate()
        .map(|(index, &sample)| validate_sample(index, sample))
        .collect()
}
