//! Model persistence.
//!
//! Models are stored as a JSON envelope:
//!
//! ```text
//! {
//!   "format": "ruvector-qsvr-model",
//!   "version": 1,
//!   "model_tag": "ruvector_qsvr::Qsvr",
//!   "payload": { ... }
//! }
//! ```
//!
//! `load` checks `format` and `model_tag` before decoding the payload, so a
//! file written by another model type fails with [`QsvrError::TypeMismatch`]
//! instead of decoding into the wrong structure. `f64` values round-trip
//! exactly, so a loaded model predicts bit-for-bit the same values.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{QsvrError, Result};
use crate::model::Qsvr;

/// Envelope format name.
pub const FORMAT_NAME: &str = "ruvector-qsvr-model";

/// Envelope format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    format: &'a str,
    version: u32,
    model_tag: &'a str,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    format: Option<String>,
    version: Option<u32>,
    model_tag: Option<String>,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Capability to save and load a model through the tag-checked envelope.
pub trait SerializableModel: Serialize + DeserializeOwned + Sized {
    /// Identifies the model type inside a stored file.
    const MODEL_TAG: &'static str;

    /// Consistency check run on every freshly loaded model.
    fn validate_loaded(&self) -> Result<()> {
        Ok(())
    }

    /// Encode the model as an envelope string.
    fn to_json(&self) -> Result<String> {
        let envelope = EnvelopeRef {
            format: FORMAT_NAME,
            version: FORMAT_VERSION,
            model_tag: Self::MODEL_TAG,
            payload: self,
        };
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Decode a model from an envelope string.
    fn from_json(json: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(json)?;

        let format = envelope.format.unwrap_or_default();
        if format != FORMAT_NAME {
            return Err(QsvrError::type_mismatch(FORMAT_NAME, format));
        }
        match envelope.version {
            Some(FORMAT_VERSION) => {}
            other => {
                return Err(QsvrError::Serialization(format!(
                    "unsupported format version {other:?}, expected {FORMAT_VERSION}"
                )))
            }
        }
        let tag = envelope.model_tag.unwrap_or_default();
        if tag != Self::MODEL_TAG {
            return Err(QsvrError::type_mismatch(Self::MODEL_TAG, tag));
        }

        let model: Self = serde_json::from_value(envelope.payload)?;
        model.validate_loaded()?;
        Ok(model)
    }

    /// Write the model to `path`.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_json()?;
        std::fs::write(&path, content)?;
        info!("{} saved to {:?}", Self::MODEL_TAG, path.as_ref());
        Ok(())
    }

    /// Read a model from `path`.
    fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let model = Self::from_json(&content)?;
        info!("{} loaded from {:?}", Self::MODEL_TAG, path.as_ref());
        Ok(model)
    }
}

impl SerializableModel for Qsvr {
    const MODEL_TAG: &'static str = "ruvector_qsvr::Qsvr";

    fn validate_loaded(&self) -> Result<()> {
        self.check_consistency()
    }
}
