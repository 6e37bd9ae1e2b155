use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Discriminator for single-key map updates.
pub const KEY_VIEW_UPDATED: &str = "KeyViewUpdatedPayload";
/// Discriminator for full-view replacement updates.
pub const VIEW_UPDATED: &str = "ViewUpdatedPayload";

/// One decoded transport frame: which subsystem produced it, an optional
/// payload-type discriminator, and the payload itself. The connector
/// subsystem sends a bare boolean with no `payloadType`, so the field stays
/// optional and is omitted on the wire when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub source: String,
    #[serde(
        rename = "payloadType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub payload_type: Option<String>,
    pub payload: Value,
}

/// Payload of a `KeyViewUpdatedPayload` envelope. `new_value == None` marks
/// a deletion of the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyViewUpdateData {
    pub key: String,
    #[serde(rename = "newValue")]
    pub new_value: Option<Value>,
}

/// Payload of a `ViewUpdatedPayload` envelope: the complete replacement
/// state for the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewUpdateData {
    #[serde(rename = "newState")]
    pub new_state: Value,
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, WireError> {
    rmp_serde::to_vec_named(envelope).map_err(WireError::from)
}

pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, WireError> {
    rmp_serde::from_slice(bytes).map_err(WireError::from)
}

impl Envelope {
    pub fn is_key_view_update(&self) -> bool {
        self.payload_type.as_deref() == Some(KEY_VIEW_UPDATED)
    }

    pub fn is_view_update(&self) -> bool {
        self.payload_type.as_deref() == Some(VIEW_UPDATED)
    }

    /// Reshape the opaque payload into the key-update form.
    pub fn key_view_update(&self) -> Result<KeyViewUpdateData, WireError> {
        serde_json::from_value(self.payload.clone()).map_err(WireError::from)
    }

    /// Reshape the opaque payload into the full-view form.
    pub fn view_update(&self) -> Result<ViewUpdateData, WireError> {
        serde_json::from_value(self.payload.clone()).map_err(WireError::from)
    }
}
