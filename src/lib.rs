// SPDX-License-Identifier: MIT OR Apache-2.0

//! # candle-interp
//!
//! Stateless interpretability utilities for transformer language models,
//! built on [candle](https://github.com/huggingface/candle).
//!
//! The crate is a toolbox rather than a framework: every function is a
//! short, independent transformation over tensors or simple values,
//! callable in isolation from an experiment script. It covers experiment
//! seeding, embedding-to-vocabulary projection, forward and pre-forward
//! hook management, differentiable boundary masks, permutation-matrix
//! utilities, and top-k prediction printing.
//!
//! ## Example
//!
//! ```
//! use candle_core::{Device, Tensor};
//! use candle_interp::{HookRegistry, set_seed, sigmoid_boundary};
//!
//! # fn main() -> candle_interp::Result<()> {
//! let device = Device::Cpu;
//! let rng = set_seed(42, &device)?;
//!
//! // Soft mask selecting positions 2..=5 of an 8-token sequence.
//! let positions = Tensor::arange(0f32, 8f32, &device)?;
//! let mask = sigmoid_boundary(&positions, 2.0, 5.0, 0.1)?;
//!
//! // Steering hook on one block's output.
//! let mut hooks = HookRegistry::new();
//! hooks.register_forward("blocks.3", "scale", |t: &Tensor| Ok(Some((t * 1.5)?)));
//! # let _ = (rng, mask, hooks);
//! # Ok(())
//! # }
//! ```

#![deny(warnings)]
#![warn(missing_docs)]

pub mod boundary;
pub mod distrib;
pub mod error;
pub mod hooks;
pub mod model;
pub mod permutation;
pub mod predictions;
pub mod seed;

pub use boundary::{harmonic_sigmoid_boundary, sigmoid_boundary};
pub use distrib::{DistribSpace, embed_to_distrib};
pub use error::{InterpError, Result};
pub use hooks::{HookHandle, HookKind, HookRegistry};
pub use model::{Architecture, InterpModel, count_parameters};
pub use permutation::{closeness_to_permutation_loss, random_permutation_matrix};
pub use predictions::{
    TokenPrediction, decode_top_k_with, format_token, top_k, top_predictions, top_vals,
};
pub use seed::set_seed;
