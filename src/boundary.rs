// SPDX-License-Identifier: MIT OR Apache-2.0

//! Differentiable boundary masks.
//!
//! Soft windows over position tensors, used to select a contiguous span
//! of tokens in a way that stays differentiable with respect to the
//! boundaries. The window is ~1 between the boundaries and ~0 outside,
//! sharpening as the temperature approaches zero.

use candle_core::Tensor;
use candle_nn::ops;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Smooth window
// ---------------------------------------------------------------------------

/// Smooth boundary mask: `sigmoid((x - bx) / t) * sigmoid((by - x) / t)`.
///
/// Positions well inside `(boundary_x, boundary_y)` map to ~1, positions
/// far outside to ~0, with a smooth transition of width proportional to
/// `temperature` at each boundary. Exactly at a boundary (with the other
/// boundary far away) the mask is ~0.5.
///
/// # Shapes
/// - `input`: any shape, floating-point positions.
/// - returns: same shape as `input`.
///
/// # Errors
///
/// Returns [`InterpError::Model`](crate::InterpError::Model) if the
/// underlying tensor operations fail.
pub fn sigmoid_boundary(
    input: &Tensor,
    boundary_x: f64,
    boundary_y: f64,
    temperature: f64,
) -> Result<Tensor> {
    let left = ops::sigmoid(&((input - boundary_x)? / temperature)?)?;
    let right = ops::sigmoid(&(input.affine(-1.0, boundary_y)? / temperature)?)?;
    Ok((left * right)?)
}

// ---------------------------------------------------------------------------
// Piecewise harmonic window
// ---------------------------------------------------------------------------

/// Piecewise boundary mask using the harmonic mean of boundary distances.
///
/// At or below `boundary_x` this is the rising sigmoid
/// `sigmoid((x - bx) / t)`; at or above `boundary_y` the falling sigmoid
/// `sigmoid((by - x) / t)`. Strictly between the boundaries it is
/// `sigmoid(h / t)` where `h` is the harmonic mean of the distances to the
/// two boundaries, which keeps the interior response high even when one
/// boundary is close.
///
/// Positions exactly on a boundary fall in the sigmoid branches, where the
/// mask evaluates to 0.5. The interior reciprocals follow IEEE semantics,
/// so as a position approaches a boundary from inside, the harmonic term
/// tends to zero and the interior branch to 0.5, matching the boundary
/// value.
///
/// # Shapes
/// - `input`: any shape, floating-point positions.
/// - returns: same shape as `input`.
///
/// # Errors
///
/// Returns [`InterpError::Model`](crate::InterpError::Model) if the
/// underlying tensor operations fail.
pub fn harmonic_sigmoid_boundary(
    input: &Tensor,
    boundary_x: f64,
    boundary_y: f64,
    temperature: f64,
) -> Result<Tensor> {
    let dtype = input.dtype();

    // Region indicators: x <= bx, x >= by, bx < x < by.
    let in_left = input.le(boundary_x)?.to_dtype(dtype)?;
    let in_right = input.ge(boundary_y)?.to_dtype(dtype)?;
    let in_mid =
        (input.gt(boundary_x)?.to_dtype(dtype)? * input.lt(boundary_y)?.to_dtype(dtype)?)?;

    let left_sig = ops::sigmoid(&((input - boundary_x)? / temperature)?)?;
    let right_sig = ops::sigmoid(&(input.affine(-1.0, boundary_y)? / temperature)?)?;

    let inv_dx = (input - boundary_x)?.abs()?.recip()?;
    let inv_dy = (input - boundary_y)?.abs()?.recip()?;
    let harmonic = ((inv_dx + inv_dy)? * 0.5)?.recip()?;
    let mid_sig = ops::sigmoid(&(harmonic / temperature)?)?;

    let out = ((in_left * left_sig)? + (in_right * right_sig)?)?;
    Ok((out + (in_mid * mid_sig)?)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use candle_core::Device;

    use super::*;

    fn positions(device: &Device) -> Tensor {
        Tensor::new(&[0.0f32, 2.0, 5.0, 8.0, 10.0], device).unwrap()
    }

    #[test]
    fn window_high_inside_low_outside() {
        let device = Device::Cpu;
        let input = positions(&device);

        let mask = sigmoid_boundary(&input, 2.0, 8.0, 0.1).unwrap();
        let vals: Vec<f32> = mask.to_vec1().unwrap();

        // Far outside, on a boundary, mid-window, on a boundary, far outside.
        assert!(vals[0] < 1e-4);
        assert!((vals[1] - 0.5).abs() < 1e-4);
        assert!(vals[2] > 0.9999);
        assert!((vals[3] - 0.5).abs() < 1e-4);
        assert!(vals[4] < 1e-4);
    }

    #[test]
    fn window_sharpens_with_temperature() {
        let device = Device::Cpu;
        let input = Tensor::new(&[1.5f32], &device).unwrap();

        let soft: Vec<f32> = sigmoid_boundary(&input, 2.0, 8.0, 2.0).unwrap().to_vec1().unwrap();
        let sharp: Vec<f32> = sigmoid_boundary(&input, 2.0, 8.0, 0.1).unwrap().to_vec1().unwrap();

        // Just outside the window: the sharp mask rejects harder.
        assert!(sharp[0] < soft[0]);
    }

    #[test]
    fn window_preserves_shape() {
        let device = Device::Cpu;
        let input = Tensor::zeros((2, 3, 4), candle_core::DType::F32, &device).unwrap();

        let mask = sigmoid_boundary(&input, -1.0, 1.0, 1.0).unwrap();
        assert_eq!(mask.dims(), &[2, 3, 4]);
    }

    #[test]
    fn harmonic_matches_sigmoid_branches_outside() {
        let device = Device::Cpu;
        let input = Tensor::new(&[1.0f32, 9.0], &device).unwrap();

        let mask = harmonic_sigmoid_boundary(&input, 2.0, 8.0, 0.5).unwrap();
        let vals: Vec<f32> = mask.to_vec1().unwrap();

        // Below bx: sigmoid((1 - 2) / 0.5) = sigmoid(-2).
        let expected_left = 1.0 / (1.0 + (2.0f32).exp());
        assert!((vals[0] - expected_left).abs() < 1e-5);
        // Above by: sigmoid((8 - 9) / 0.5) = sigmoid(-2).
        assert!((vals[1] - expected_left).abs() < 1e-5);
    }

    #[test]
    fn harmonic_high_mid_window() {
        let device = Device::Cpu;
        let input = Tensor::new(&[5.0f32], &device).unwrap();

        let mask = harmonic_sigmoid_boundary(&input, 2.0, 8.0, 0.1).unwrap();
        let vals: Vec<f32> = mask.to_vec1().unwrap();
        assert!(vals[0] > 0.9999);
    }

    #[test]
    fn harmonic_is_half_on_boundary() {
        let device = Device::Cpu;
        let input = Tensor::new(&[2.0f32, 8.0], &device).unwrap();

        let mask = harmonic_sigmoid_boundary(&input, 2.0, 8.0, 0.5).unwrap();
        let vals: Vec<f32> = mask.to_vec1().unwrap();
        assert!((vals[0] - 0.5).abs() < 1e-5);
        assert!((vals[1] - 0.5).abs() < 1e-5);
    }
}
