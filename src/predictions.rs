// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-k readout and pretty-printing of vocabulary distributions.
//!
//! Host-side helpers for the last step of an experiment: pull the largest
//! entries out of a distribution produced by
//! [`embed_to_distrib`](crate::embed_to_distrib), decode them, and print
//! them aligned for eyeballing.

use candle_core::{DType, Tensor};
use tokenizers::Tokenizer;

use crate::error::Result;

// ---------------------------------------------------------------------------
// TokenPrediction
// ---------------------------------------------------------------------------

/// A single decoded entry of a vocabulary distribution.
#[derive(Debug, Clone)]
pub struct TokenPrediction {
    /// Token ID in the vocabulary.
    pub token_id: u32,
    /// Decoded token string.
    pub token: String,
    /// Score from the distribution: a probability, log-probability, or
    /// logit, depending on the space the distribution was computed in.
    pub value: f32,
}

// ---------------------------------------------------------------------------
// Top-k extraction
// ---------------------------------------------------------------------------

/// Indices and values of the `k` largest entries of a distribution.
///
/// Entries are returned in descending value order; ties keep the lower
/// token id first. `k` larger than the vocabulary is clamped.
///
/// # Shapes
/// - `distrib`: `[vocab]` scores for a single position (higher-rank
///   tensors are flattened).
///
/// # Errors
///
/// Returns [`InterpError::Model`](crate::InterpError::Model) if the tensor
/// cannot be read back to the host.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)] // vocab ids fit u32
pub fn top_k(distrib: &Tensor, k: usize) -> Result<Vec<(u32, f32)>> {
    let values: Vec<f32> = distrib.to_dtype(DType::F32)?.flatten_all()?.to_vec1()?;

    let mut entries: Vec<(u32, f32)> = values
        .iter()
        .enumerate()
        .map(|(idx, &value)| (idx as u32, value))
        .collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    entries.truncate(k);
    Ok(entries)
}

/// Decode `(token_id, value)` entries via a caller-supplied decode function.
///
/// Generic over any tokenizer: the caller provides a closure that maps a
/// token id to its string.
///
/// # Example
///
/// ```
/// use candle_interp::decode_top_k_with;
///
/// let preds = decode_top_k_with(&[(42, 0.7), (99, 0.2)], |id| format!("token_{id}"));
/// assert_eq!(preds.len(), 2);
/// assert_eq!(preds[0].token, "token_42");
/// ```
pub fn decode_top_k_with(
    entries: &[(u32, f32)],
    decode_fn: impl Fn(u32) -> String,
) -> Vec<TokenPrediction> {
    entries
        .iter()
        .map(|&(token_id, value)| TokenPrediction {
            token_id,
            token: decode_fn(token_id),
            value,
        })
        .collect()
}

/// Top `k` entries of a distribution, decoded through a tokenizer.
///
/// Tokens the tokenizer fails to decode render as `<id>` rather than
/// aborting the listing.
///
/// # Errors
///
/// Returns [`InterpError::Model`](crate::InterpError::Model) if the tensor
/// cannot be read back to the host.
pub fn top_predictions(
    tokenizer: &Tokenizer,
    distrib: &Tensor,
    k: usize,
) -> Result<Vec<TokenPrediction>> {
    let entries = top_k(distrib, k)?;
    Ok(decode_top_k_with(&entries, |token_id| {
        tokenizer
            .decode(&[token_id], false)
            .unwrap_or_else(|_| format!("<{token_id}>"))
    }))
}

// ---------------------------------------------------------------------------
// Display formatting
// ---------------------------------------------------------------------------

/// Format a token for display in aligned listings.
///
/// Spaces become `_` and newlines the two characters `\n`, so leading
/// spaces and line breaks stay visible when predictions are compared
/// side by side.
#[must_use]
pub fn format_token(token: &str) -> String {
    token.replace(' ', "_").replace('\n', "\\n")
}

/// One listing line: the escaped token left-aligned in a 20-column field,
/// then the value.
fn prediction_line(prediction: &TokenPrediction) -> String {
    let token = format_token(&prediction.token);
    format!("{token:<20} {}", prediction.value)
}

/// Print the top `k` predictions of a distribution, one per line.
///
/// Each line is the escaped token left-aligned in a 20-column field,
/// followed by its value:
///
/// ```text
/// _the                 0.2656
/// _a                   0.1003
/// ```
///
/// # Errors
///
/// Returns [`InterpError::Model`](crate::InterpError::Model) if the tensor
/// cannot be read back to the host.
pub fn top_vals(tokenizer: &Tokenizer, distrib: &Tensor, k: usize) -> Result<()> {
    for prediction in top_predictions(tokenizer, distrib, k)? {
        println!("{}", prediction_line(&prediction));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
