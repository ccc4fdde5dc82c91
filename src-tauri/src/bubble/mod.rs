//! Floating assistant bubble
//!
//! The bubble is the session's only always-visible surface. Collapsed, it is
//! a small draggable icon in its own content-sized window that leaves every
//! touch outside the icon to the apps underneath. Expanded, the window fills
//! the screen, may take focus for text entry, and shows the conversation
//! panel pinned to the bottom while the icon can still be dragged around.
//!
//! ```text
//!            tap                        toggle share
//! ┌───────────┐ ───► ┌──────────┐     ┌─────┐ ───► ┌─────────┐ granted ┌────┐
//! │ COLLAPSED │      │ EXPANDED │     │ OFF │      │ PENDING │ ──────► │ ON │
//! └───────────┘ ◄─── └──────────┘     └─────┘ ◄─── └─────────┘         └────┘
//!            tap                          ▲   denied                   │
//!     (a tap straight after a drag        └────────────────────────────┘
//!      is swallowed)                          toggle / capture failed
//! ```

pub mod state;

pub use state::{
    BubbleEffect, BubbleEvent, BubblePosition, BubbleState, BubbleStateMachine, Expansion,
    ScreenShareState,
};

use crate::overlay::WindowAttributes;
use crate::session::transcript::TranscriptEntry;
use serde::Serialize;

/// Room connection state shown on the bubble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn description(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
        }
    }
}

/// Everything the bubble surface draws
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleView {
    pub expanded: bool,
    pub mic_on: bool,
    pub screen_share: ScreenShareState,
    /// Icon offset; relative to the screen when expanded, unused otherwise
    pub icon: BubblePosition,
    pub icon_size_px: i32,
    pub connection: ConnectionStatus,
    pub status_text: &'static str,
    /// Conversation panel contents, empty while collapsed
    pub transcript: Vec<TranscriptEntry>,
}

impl BubbleView {
    pub fn new(
        machine: &BubbleStateMachine,
        connection: ConnectionStatus,
        transcript: Vec<TranscriptEntry>,
    ) -> Self {
        let state = machine.state();
        let expanded = state.is_expanded();
        Self {
            expanded,
            mic_on: state.mic_on,
            screen_share: state.screen_share,
            icon: state.position,
            icon_size_px: machine.size_px(),
            connection,
            status_text: connection.description(),
            transcript: if expanded { transcript } else { Vec::new() },
        }
    }
}

/// Window attributes for the bubble surface in the given state
pub fn attributes_for(state: &BubbleState) -> WindowAttributes {
    match state.expansion {
        Expansion::Expanded => WindowAttributes::fullscreen_interactive(),
        Expansion::Collapsed => WindowAttributes::floating(state.position.x, state.position.y),
    }
}
