// SPDX-License-Identifier: MIT OR Apache-2.0

//! Experiment seeding.
//!
//! One call seeds every randomness source an experiment touches: the
//! candle device generator (for `rand`/`randn` tensor initialisation on
//! accelerators) and a host-side [`StdRng`] returned to the caller for
//! sampling and shuffling.

use candle_core::Device;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::error::Result;

/// Seed all randomness sources for a reproducible experiment.
///
/// Seeds the device generator when `device` is an accelerator and returns
/// a host generator seeded with the same value. The CPU backend draws from
/// a thread-local source that cannot be reseeded, so host-side sampling
/// must go through the returned generator rather than the device.
///
/// # Example
///
/// ```
/// use candle_core::Device;
/// use candle_interp::{random_permutation_matrix, set_seed};
///
/// let mut rng = set_seed(42, &Device::Cpu).unwrap();
/// let p = random_permutation_matrix(8, &mut rng, &Device::Cpu).unwrap();
/// assert_eq!(p.dims(), &[8, 8]);
/// ```
///
/// # Errors
///
/// Returns [`InterpError::Model`](crate::InterpError::Model) if the device
/// rejects the seed.
pub fn set_seed(seed: u64, device: &Device) -> Result<StdRng> {
    if !matches!(device, Device::Cpu) {
        device.set_seed(seed)?;
    }
    debug!(seed, "seeded rngs");
    Ok(StdRng::seed_from_u64(seed))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
