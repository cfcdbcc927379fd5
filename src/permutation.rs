// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permutation matrices for alignment search.
//!
//! Rotation-style alignment experiments relax a hard permutation into a
//! soft doubly-stochastic matrix and penalise its distance from an exact
//! permutation. This module provides the random initialisation and the
//! penalty term.

use candle_core::{DType, Device, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Random permutation
// ---------------------------------------------------------------------------

/// Uniformly random `n x n` permutation matrix.
///
/// Shuffles `0..n` with the caller's generator and selects the matching
/// rows of the identity, so equal seeds produce equal matrices.
///
/// # Shapes
/// - returns: `[n, n]`, F32, exactly one `1.0` per row and column.
///
/// # Errors
///
/// Returns [`InterpError::Model`](crate::InterpError::Model) if the
/// underlying tensor operations fail.
pub fn random_permutation_matrix(n: usize, rng: &mut StdRng, device: &Device) -> Result<Tensor> {
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)] // vocab-scale n fits u32
    let mut perm: Vec<u32> = (0..n).map(|i| i as u32).collect();
    perm.shuffle(rng);

    let identity = Tensor::eye(n, DType::F32, device)?;
    let index = Tensor::from_vec(perm, n, device)?;
    Ok(identity.index_select(&index, 0)?)
}

// ---------------------------------------------------------------------------
// Distance from permutation-ness
// ---------------------------------------------------------------------------

/// Penalty for how far a matrix is from being a permutation matrix.
///
/// Combines a doubly-stochastic term (mean absolute deviation of the row
/// and column sums from 1) with an entry term `mean(r * (1 - r))` that is
/// zero only when every entry saturates at 0 or 1:
///
/// `0.5 * (mean|rowsum - 1| + mean|colsum - 1|) + mean(r * (1 - r))`
///
/// Exact permutation matrices score 0.
///
/// # Shapes
/// - `r`: `[rows, cols]` floating-point.
/// - returns: scalar (0-d tensor), usable as a training penalty.
///
/// # Errors
///
/// Returns [`InterpError::Model`](crate::InterpError::Model) if `r` is not
/// rank 2 or a tensor operation fails.
pub fn closeness_to_permutation_loss(r: &Tensor) -> Result<Tensor> {
    r.dims2()?;

    let row_term = (r.sum(1)? - 1.0)?.abs()?.mean_all()?;
    let col_term = (r.sum(0)? - 1.0)?.abs()?.mean_all()?;
    let entry_term = (r * r.affine(-1.0, 1.0)?)?.mean_all()?;

    let stochastic = ((row_term + col_term)? * 0.5)?;
    Ok((stochastic + entry_term)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
