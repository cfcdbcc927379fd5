// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model family introspection.
//!
//! [`Architecture`] identifies the model family from a `HuggingFace`
//! `config.json`, [`InterpModel`] is the narrow view of a loaded model that
//! the utilities consume, and [`count_parameters`] reports trainable sizes.

use std::fmt;
use std::path::Path;

use candle_core::Tensor;
use candle_nn::VarMap;
use serde_json::Value;

use crate::error::{InterpError, Result};

// ---------------------------------------------------------------------------
// Architecture
// ---------------------------------------------------------------------------

/// Model family recognised by the utilities.
///
/// Detected from the `architectures` entry of a `HuggingFace`
/// `config.json` by case-insensitive substring match, so
/// `"GPT2LMHeadModel"`, `"gpt2"` and `"GPT2Model"` all map to
/// [`Architecture::Gpt2`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// GPT-2 family (tied token embedding / unembedding).
    Gpt2,
    /// GPT-Neo family.
    GptNeo,
    /// GPT-NeoX family.
    GptNeoX,
    /// `LLaMA` family.
    Llama,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpt2 => write!(f, "GPT-2"),
            Self::GptNeo => write!(f, "GPT-Neo"),
            Self::GptNeoX => write!(f, "GPT-NeoX"),
            Self::Llama => write!(f, "LLaMA"),
        }
    }
}

impl Architecture {
    /// Match an architecture or model-type name to a family.
    ///
    /// Returns `None` for unrecognised names. `NeoX` is tested before
    /// `Neo` because every `NeoX` name contains the `Neo` substring.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.contains("gpt_neox") || lower.contains("gptneox") {
            Some(Self::GptNeoX)
        } else if lower.contains("gpt_neo") || lower.contains("gptneo") {
            Some(Self::GptNeo)
        } else if lower.contains("gpt2") {
            Some(Self::Gpt2)
        } else if lower.contains("llama") {
            Some(Self::Llama)
        } else {
            None
        }
    }

    /// Detect the architecture from a `HuggingFace` `config.json` value.
    ///
    /// Reads `architectures[0]`, falling back to `model_type` when the
    /// list is absent.
    ///
    /// # Errors
    ///
    /// Returns [`InterpError::Config`] if both fields are missing or the
    /// named architecture is not recognised.
    pub fn from_hf_config(config: &Value) -> Result<Self> {
        let name = config
            .get("architectures")
            .and_then(Value::as_array)
            .and_then(|archs| archs.first())
            .and_then(Value::as_str)
            .or_else(|| config.get("model_type").and_then(Value::as_str))
            .ok_or_else(|| {
                InterpError::Config("missing 'architectures' or 'model_type' field".into())
            })?;

        Self::from_name(name)
            .ok_or_else(|| InterpError::Config(format!("unrecognised architecture: '{name}'")))
    }

    /// Detect the architecture from a `config.json` file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`InterpError::Io`] if the file cannot be read and
    /// [`InterpError::Config`] if it is not valid JSON or names an
    /// unrecognised architecture.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let json: Value = serde_json::from_str(&raw)
            .map_err(|e| InterpError::Config(format!("invalid config.json: {e}")))?;
        Self::from_hf_config(&json)
    }

    /// Whether this architecture is a transformer language model.
    ///
    /// Every family the utilities currently recognise is a decoder-only
    /// transformer, so this holds for all variants.
    #[must_use]
    pub const fn is_transformer(self) -> bool {
        match self {
            Self::Gpt2 | Self::GptNeo | Self::GptNeoX | Self::Llama => true,
        }
    }
}

// ---------------------------------------------------------------------------
// InterpModel
// ---------------------------------------------------------------------------

/// Minimal view of a loaded language model consumed by the utilities.
///
/// Experiment code implements this for whatever model object it holds; the
/// utilities never run a forward pass themselves.
pub trait InterpModel: Send + Sync {
    /// The model family.
    fn architecture(&self) -> Architecture;

    /// Token embedding matrix.
    ///
    /// # Shapes
    /// - returns: `[vocab, d_model]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding is unavailable for this model.
    fn token_embedding(&self) -> Result<&Tensor>;
}

// ---------------------------------------------------------------------------
// Parameter census
// ---------------------------------------------------------------------------

/// Total number of trainable parameter elements in a variable map.
///
/// Sums the element counts of every variable registered in `varmap`, the
/// candle analogue of counting parameters that require gradients.
#[must_use]
pub fn count_parameters(varmap: &VarMap) -> usize {
    varmap
        .all_vars()
        .iter()
        .map(|var| var.as_tensor().elem_count())
        .sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
