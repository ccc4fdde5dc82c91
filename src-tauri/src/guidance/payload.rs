//! Guidance RPC payload parsing
//!
//! The remote agent sends a JSON string:
//!
//! ```json
//! {
//!   "instruction_text": "Tap here",
//!   "bounding_box": [top, left, bottom, right],
//!   "visual_cue_type": "arrow"
//! }
//! ```
//!
//! Box coordinates are on the 0-1000 scale. `visual_cue_type` is optional and
//! unrecognised values fall back to an arrow. Each failure carries a stable
//! numeric code that is reported back to the remote caller.

use crate::geometry::NormalisedBox;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cue type used when the payload names none or an unknown one
pub const DEFAULT_CUE_TYPE: &str = "arrow";

/// Visual cue drawn toward the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum VisualCue {
    #[default]
    Arrow,
}

impl VisualCue {
    /// Resolve a requested cue type, falling back to an arrow
    pub fn resolve(requested: &str) -> VisualCue {
        match requested.trim().to_ascii_lowercase().as_str() {
            "arrow" => VisualCue::Arrow,
            other => {
                tracing::debug!("Unrecognised visual cue {:?}, drawing an arrow", other);
                VisualCue::Arrow
            }
        }
    }
}

/// Reasons a guidance payload is rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PayloadError {
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    #[error("bounding_box must be four numbers [top, left, bottom, right]: {0}")]
    InvalidBoundingBox(String),

    #[error("Field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

impl PayloadError {
    /// Stable error code reported to the remote caller
    pub fn code(&self) -> u32 {
        match self {
            PayloadError::InvalidJson(_) => 1001,
            PayloadError::MissingField(_) => 1002,
            PayloadError::InvalidBoundingBox(_) => 1003,
            PayloadError::WrongType { .. } => 1004,
        }
    }
}

/// A validated guidance payload
#[derive(Debug, Clone, PartialEq)]
pub struct GuidancePayload {
    pub instruction_text: String,
    pub bounding_box: NormalisedBox,
    /// The cue type as sent, for logging
    pub visual_cue_type: String,
    pub cue: VisualCue,
}

/// Parse and validate a raw payload string
pub fn parse_payload(raw: &str) -> Result<GuidancePayload, PayloadError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;

    let object = value.as_object().ok_or(PayloadError::WrongType {
        field: "payload",
        expected: "a JSON object",
    })?;

    let instruction_text = match object.get("instruction_text") {
        None | Some(Value::Null) => return Err(PayloadError::MissingField("instruction_text")),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(PayloadError::WrongType {
                field: "instruction_text",
                expected: "a string",
            })
        }
    };

    let bounding_box = match object.get("bounding_box") {
        None | Some(Value::Null) => return Err(PayloadError::MissingField("bounding_box")),
        Some(v) => parse_bounding_box(v)?,
    };

    // Non-string cue types are treated like unknown names
    let visual_cue_type = object
        .get("visual_cue_type")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_CUE_TYPE)
        .to_string();
    let cue = VisualCue::resolve(&visual_cue_type);

    Ok(GuidancePayload {
        instruction_text,
        bounding_box,
        visual_cue_type,
        cue,
    })
}

fn parse_bounding_box(value: &Value) -> Result<NormalisedBox, PayloadError> {
    let items = value
        .as_array()
        .ok_or_else(|| PayloadError::InvalidBoundingBox(format!("expected an array, got {}", value)))?;

    if items.len() != 4 {
        return Err(PayloadError::InvalidBoundingBox(format!(
            "expected 4 values, got {}",
            items.len()
        )));
    }

    let mut coords = [0.0_f64; 4];
    for (slot, item) in coords.iter_mut().zip(items) {
        *slot = item
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| PayloadError::InvalidBoundingBox(format!("{} is not a number", item)))?;
    }

    let [top, left, bottom, right] = coords;
    Ok(NormalisedBox::new(top, left, bottom, right))
}
