//! Remote navigation guidance
//!
//! A remote agent points the user at a region of the screen by sending a
//! JSON payload over RPC. The payload is parsed ([`payload`]), mapped into
//! pixels, laid out as a highlight, arrow and instruction box ([`layout`]),
//! and shown on an input-inert overlay by the [`renderer`], which keeps at
//! most one annotation on screen and dismisses it after a timeout.

pub mod layout;
pub mod payload;
pub mod renderer;

pub use payload::{parse_payload, GuidancePayload, PayloadError, VisualCue};
pub use renderer::GuidanceRenderer;

use crate::geometry::{to_pixel_box, PixelBox, ScreenMetrics};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One guidance annotation as requested by the remote agent
#[derive(Debug, Clone, PartialEq)]
pub struct GuidanceRequest {
    pub id: Uuid,
    pub instruction_text: String,
    /// Target in overlay pixels; may be inverted or off-screen
    pub target: PixelBox,
    pub visual_cue_type: String,
    pub cue: VisualCue,
    pub requested_at: DateTime<Utc>,
}

impl GuidanceRequest {
    /// Build a request from a validated payload for the given screen
    pub fn from_payload(payload: GuidancePayload, metrics: &ScreenMetrics) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: to_pixel_box(&payload.bounding_box, metrics),
            instruction_text: payload.instruction_text,
            visual_cue_type: payload.visual_cue_type,
            cue: payload.cue,
            requested_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_payload_maps_to_pixels() {
        let payload = parse_payload(
            r#"{"instruction_text":"Tap here","bounding_box":[100,100,200,200],"visual_cue_type":"arrow"}"#,
        )
        .unwrap();
        let request = GuidanceRequest::from_payload(payload, &ScreenMetrics::new(1000, 2000, 0));

        assert_eq!(request.target, PixelBox::new(200, 100, 400, 200));
        assert_eq!(request.instruction_text, "Tap here");
        assert_eq!(request.cue, VisualCue::Arrow);
    }

    #[test]
    fn test_requests_get_distinct_ids() {
        let payload =
            parse_payload(r#"{"instruction_text":"x","bounding_box":[0,0,1,1]}"#).unwrap();
        let metrics = ScreenMetrics::new(1080, 2400, 80);
        let a = GuidanceRequest::from_payload(payload.clone(), &metrics);
        let b = GuidanceRequest::from_payload(payload, &metrics);
        assert_ne!(a.id, b.id);
    }
}
