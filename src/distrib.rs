// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding-to-vocabulary projection.
//!
//! Projects hidden embeddings through the model's tied unembedding into a
//! distribution over the vocabulary. This is the primitive behind logit
//! lens readouts: what would the model predict if decoding stopped at this
//! hidden state?

use candle_core::{D, DType, Tensor};
use candle_nn::ops;

use crate::error::{InterpError, Result};
use crate::model::{Architecture, InterpModel};

// ---------------------------------------------------------------------------
// DistribSpace
// ---------------------------------------------------------------------------

/// Output space of [`embed_to_distrib`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistribSpace {
    /// Raw unembedding logits.
    Logits,
    /// Softmax probabilities over the vocabulary.
    Probs,
    /// Log-softmax over the vocabulary.
    LogProbs,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project hidden embeddings into a vocabulary distribution.
///
/// Multiplies by the transpose of the token embedding (GPT-2 ties its
/// unembedding to `wte`) and normalises over the vocabulary dimension
/// according to `space`. Normalised outputs are computed and returned in
/// F32; [`DistribSpace::Logits`] keeps the matmul dtype.
///
/// # Shapes
/// - `embed`: `[..., d_model]`, rank 2 or higher.
/// - returns: `[..., vocab]`.
///
/// # Errors
///
/// Returns [`InterpError::Unsupported`] for model families without a tied
/// unembedding projection (`LLaMA` among them) and
/// [`InterpError::Model`] on tensor operation failures.
pub fn embed_to_distrib(
    model: &dyn InterpModel,
    embed: &Tensor,
    space: DistribSpace,
) -> Result<Tensor> {
    match model.architecture() {
        Architecture::Gpt2 => {
            let weight = model.token_embedding()?;
            let logits = embed.broadcast_matmul(&weight.t()?)?;

            match space {
                DistribSpace::Logits => Ok(logits),
                DistribSpace::Probs => {
                    // PROMOTE: softmax needs f32 for numerical stability
                    let logits = logits.to_dtype(DType::F32)?;
                    Ok(ops::softmax_last_dim(&logits)?)
                }
                DistribSpace::LogProbs => {
                    // PROMOTE: softmax needs f32 for numerical stability
                    let logits = logits.to_dtype(DType::F32)?;
                    Ok(ops::log_softmax(&logits, D::Minus1)?)
                }
            }
        }
        Architecture::Llama => Err(InterpError::Unsupported(
            "LLaMA unembedding projection is not implemented".into(),
        )),
        other => Err(InterpError::Unsupported(format!(
            "no unembedding projection for {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
