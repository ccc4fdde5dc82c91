//! Bubble state machine
//!
//! Expansion, microphone, screen share and drag position are tracked here.
//! Every event returns the effects the session must apply; the state
//! machine itself never touches the window host or the room connection.

use crate::config::BubbleConfig;
use crate::geometry::ScreenMetrics;
use serde::{Deserialize, Serialize};

/// Whether the assistant panel is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Expansion {
    /// Only the floating icon is shown
    #[default]
    Collapsed,
    /// Full-screen surface with the conversation panel
    Expanded,
}

/// Screen-share sub-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScreenShareState {
    #[default]
    Off,
    /// Waiting for the user to answer the capture consent prompt
    Pending,
    On,
}

impl ScreenShareState {
    pub fn is_on(&self) -> bool {
        matches!(self, ScreenShareState::On)
    }
}

/// Pixel offset of the bubble icon from the top-left of the overlay area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BubblePosition {
    pub x: i32,
    pub y: i32,
}

impl BubblePosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Snapshot of the bubble state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleState {
    pub expansion: Expansion,
    pub mic_on: bool,
    pub screen_share: ScreenShareState,
    pub position: BubblePosition,
    /// Where the collapsed bubble sat when it was last expanded
    pub last_position_before_expand: BubblePosition,
}

impl BubbleState {
    pub fn is_expanded(&self) -> bool {
        self.expansion == Expansion::Expanded
    }
}

/// Input to the bubble state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BubbleEvent {
    /// Tap on the bubble icon
    Tap,
    /// Drag of the bubble icon by a pixel delta
    Drag { dx: i32, dy: i32 },
    ToggleMic,
    ToggleScreenShare,
    /// The user answered the capture consent prompt
    CaptureGrantResolved { granted: bool },
    /// The capture track never became available
    ScreenShareFailed,
    /// Close button, or the inactivity timeout
    Close,
}

/// Work the session must carry out after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleEffect {
    /// Re-apply window attributes and redraw
    Render,
    /// Publish or mute the local microphone
    SetMicrophone(bool),
    /// Ask the user for a one-time capture grant
    RequestCaptureGrant,
    /// Start publishing the screen with the grant just obtained
    StartScreenShare,
    /// Stop publishing the screen and release the capturer
    StopScreenShare,
    /// Tear the session down
    Close,
}

/// Floating bubble state machine
pub struct BubbleStateMachine {
    state: BubbleState,
    /// Set by a drag so the tap that ends the gesture does not toggle
    suppress_next_tap: bool,
    closed: bool,
    size_px: i32,
    metrics: ScreenMetrics,
}

impl BubbleStateMachine {
    /// Creates a collapsed bubble at the configured initial position
    pub fn new(config: &BubbleConfig, metrics: ScreenMetrics, mic_on: bool) -> Self {
        let mut machine = Self {
            state: BubbleState {
                expansion: Expansion::Collapsed,
                mic_on,
                screen_share: ScreenShareState::Off,
                position: BubblePosition::default(),
                last_position_before_expand: BubblePosition::default(),
            },
            suppress_next_tap: false,
            closed: false,
            size_px: config.size_px as i32,
            metrics,
        };
        let start = machine.clamp(BubblePosition::new(config.initial_x, config.initial_y));
        machine.state.position = start;
        machine.state.last_position_before_expand = start;
        machine
    }

    pub fn state(&self) -> &BubbleState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn size_px(&self) -> i32 {
        self.size_px
    }

    /// Process an event and return the effects to apply, in order.
    ///
    /// After `Close` every further event is ignored.
    pub fn process(&mut self, event: BubbleEvent) -> Vec<BubbleEffect> {
        if self.closed {
            tracing::debug!("Bubble closed, ignoring {:?}", event);
            return Vec::new();
        }

        // Only the tap straight after a drag is swallowed
        let suppress_tap = std::mem::take(&mut self.suppress_next_tap);

        match event {
            BubbleEvent::Tap if suppress_tap => {
                tracing::debug!("Tap after drag suppressed");
                Vec::new()
            }
            BubbleEvent::Tap => {
                self.toggle_expansion();
                vec![BubbleEffect::Render]
            }

            BubbleEvent::Drag { dx, dy } => {
                if dx == 0 && dy == 0 {
                    self.suppress_next_tap = suppress_tap;
                    return Vec::new();
                }
                let moved = BubblePosition::new(
                    self.state.position.x.saturating_add(dx),
                    self.state.position.y.saturating_add(dy),
                );
                self.state.position = self.clamp(moved);
                self.suppress_next_tap = true;
                vec![BubbleEffect::Render]
            }

            BubbleEvent::ToggleMic => {
                self.state.mic_on = !self.state.mic_on;
                tracing::info!(
                    "Microphone {}",
                    if self.state.mic_on { "on" } else { "off" }
                );
                vec![
                    BubbleEffect::SetMicrophone(self.state.mic_on),
                    BubbleEffect::Render,
                ]
            }

            BubbleEvent::ToggleScreenShare => match self.state.screen_share {
                ScreenShareState::Off => {
                    self.state.screen_share = ScreenShareState::Pending;
                    vec![BubbleEffect::RequestCaptureGrant, BubbleEffect::Render]
                }
                ScreenShareState::Pending => {
                    tracing::debug!("Capture grant already requested");
                    Vec::new()
                }
                ScreenShareState::On => {
                    self.state.screen_share = ScreenShareState::Off;
                    vec![BubbleEffect::StopScreenShare, BubbleEffect::Render]
                }
            },

            BubbleEvent::CaptureGrantResolved { granted } => {
                if self.state.screen_share != ScreenShareState::Pending {
                    tracing::debug!("Capture grant resolved with no request pending");
                    return Vec::new();
                }
                if granted {
                    self.state.screen_share = ScreenShareState::On;
                    vec![BubbleEffect::StartScreenShare, BubbleEffect::Render]
                } else {
                    tracing::info!("Capture grant denied, screen share stays off");
                    self.state.screen_share = ScreenShareState::Off;
                    vec![BubbleEffect::Render]
                }
            }

            BubbleEvent::ScreenShareFailed => {
                if self.state.screen_share != ScreenShareState::On {
                    return Vec::new();
                }
                self.state.screen_share = ScreenShareState::Off;
                vec![BubbleEffect::StopScreenShare, BubbleEffect::Render]
            }

            BubbleEvent::Close => {
                self.closed = true;
                let mut effects = Vec::new();
                if self.state.screen_share.is_on() {
                    effects.push(BubbleEffect::StopScreenShare);
                }
                self.state.screen_share = ScreenShareState::Off;
                effects.push(BubbleEffect::Close);
                effects
            }
        }
    }

    fn toggle_expansion(&mut self) {
        match self.state.expansion {
            Expansion::Collapsed => {
                self.state.last_position_before_expand = self.state.position;
                self.state.expansion = Expansion::Expanded;
                tracing::info!("Bubble expanded");
            }
            Expansion::Expanded => {
                self.state.position = self.state.last_position_before_expand;
                self.state.expansion = Expansion::Collapsed;
                tracing::info!("Bubble collapsed");
            }
        }
    }

    /// Keep the whole icon inside the overlay area
    fn clamp(&self, position: BubblePosition) -> BubblePosition {
        let max_x = (self.metrics.width_px as i32 - self.size_px).max(0);
        let max_y = (self.metrics.usable_height() as i32 - self.size_px).max(0);
        BubblePosition::new(position.x.clamp(0, max_x), position.y.clamp(0, max_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> BubbleStateMachine {
        BubbleStateMachine::new(
            &BubbleConfig::default(),
            ScreenMetrics::new(1000, 2000, 0),
            true,
        )
    }

    #[test]
    fn test_starts_collapsed_at_initial_position() {
        let m = machine();
        assert_eq!(m.state().expansion, Expansion::Collapsed);
        assert_eq!(m.state().position, BubblePosition::new(0, 300));
        assert!(m.state().mic_on);
        assert_eq!(m.state().screen_share, ScreenShareState::Off);
    }

    #[test]
    fn test_tap_toggles_expansion() {
        let mut m = machine();
        assert_eq!(m.process(BubbleEvent::Tap), vec![BubbleEffect::Render]);
        assert!(m.state().is_expanded());
        m.process(BubbleEvent::Tap);
        assert!(!m.state().is_expanded());
    }

    #[test]
    fn test_drag_suppresses_following_tap() {
        let mut m = machine();
        m.process(BubbleEvent::Drag { dx: 40, dy: 10 });
        assert!(m.process(BubbleEvent::Tap).is_empty());
        assert!(!m.state().is_expanded());

        // Only one tap is swallowed
        m.process(BubbleEvent::Tap);
        assert!(m.state().is_expanded());
    }

    #[test]
    fn test_other_event_clears_tap_suppression() {
        let mut m = machine();
        m.process(BubbleEvent::Drag { dx: 5, dy: 0 });
        m.process(BubbleEvent::ToggleMic);
        m.process(BubbleEvent::Tap);
        assert!(m.state().is_expanded());
    }

    #[test]
    fn test_zero_drag_is_not_a_drag() {
        let mut m = machine();
        assert!(m.process(BubbleEvent::Drag { dx: 0, dy: 0 }).is_empty());
        m.process(BubbleEvent::Tap);
        assert!(m.state().is_expanded());
    }

    #[test]
    fn test_drag_is_clamped_to_screen() {
        let mut m = machine();
        m.process(BubbleEvent::Drag { dx: -500, dy: 5000 });
        assert_eq!(m.state().position, BubblePosition::new(0, 2000 - 160));
        m.process(BubbleEvent::Drag {
            dx: i32::MAX,
            dy: i32::MIN,
        });
        assert_eq!(m.state().position, BubblePosition::new(1000 - 160, 0));
    }

    #[test]
    fn test_collapse_restores_position_from_before_expand() {
        let mut m = machine();
        m.process(BubbleEvent::Drag { dx: 100, dy: 0 });
        m.process(BubbleEvent::ToggleMic);
        m.process(BubbleEvent::Tap);
        assert_eq!(
            m.state().last_position_before_expand,
            BubblePosition::new(100, 300)
        );

        m.process(BubbleEvent::Drag { dx: 200, dy: 200 });
        assert_eq!(m.state().position, BubblePosition::new(300, 500));

        m.process(BubbleEvent::ToggleMic);
        m.process(BubbleEvent::Tap);
        assert!(!m.state().is_expanded());
        assert_eq!(m.state().position, BubblePosition::new(100, 300));
    }

    #[test]
    fn test_mic_toggle_is_independent_of_expansion() {
        let mut m = machine();
        m.process(BubbleEvent::Tap);
        assert_eq!(
            m.process(BubbleEvent::ToggleMic),
            vec![BubbleEffect::SetMicrophone(false), BubbleEffect::Render]
        );
        assert!(m.state().is_expanded());
        assert!(!m.state().mic_on);
    }

    #[test]
    fn test_screen_share_waits_for_grant() {
        let mut m = machine();
        assert_eq!(
            m.process(BubbleEvent::ToggleScreenShare),
            vec![BubbleEffect::RequestCaptureGrant, BubbleEffect::Render]
        );
        assert_eq!(m.state().screen_share, ScreenShareState::Pending);

        // A second toggle while pending does not re-prompt
        assert!(m.process(BubbleEvent::ToggleScreenShare).is_empty());

        assert_eq!(
            m.process(BubbleEvent::CaptureGrantResolved { granted: true }),
            vec![BubbleEffect::StartScreenShare, BubbleEffect::Render]
        );
        assert!(m.state().screen_share.is_on());

        assert_eq!(
            m.process(BubbleEvent::ToggleScreenShare),
            vec![BubbleEffect::StopScreenShare, BubbleEffect::Render]
        );
        assert_eq!(m.state().screen_share, ScreenShareState::Off);
    }

    #[test]
    fn test_denied_grant_reverts_screen_share() {
        let mut m = machine();
        m.process(BubbleEvent::ToggleScreenShare);
        let effects = m.process(BubbleEvent::CaptureGrantResolved { granted: false });
        assert_eq!(effects, vec![BubbleEffect::Render]);
        assert_eq!(m.state().screen_share, ScreenShareState::Off);
    }

    #[test]
    fn test_unsolicited_grant_ignored() {
        let mut m = machine();
        assert!(m
            .process(BubbleEvent::CaptureGrantResolved { granted: true })
            .is_empty());
        assert_eq!(m.state().screen_share, ScreenShareState::Off);
    }

    #[test]
    fn test_capture_failure_turns_share_off() {
        let mut m = machine();
        m.process(BubbleEvent::ToggleScreenShare);
        m.process(BubbleEvent::CaptureGrantResolved { granted: true });
        assert_eq!(
            m.process(BubbleEvent::ScreenShareFailed),
            vec![BubbleEffect::StopScreenShare, BubbleEffect::Render]
        );
        assert_eq!(m.state().screen_share, ScreenShareState::Off);
    }

    #[test]
    fn test_close_is_terminal() {
        let mut m = machine();
        m.process(BubbleEvent::ToggleScreenShare);
        m.process(BubbleEvent::CaptureGrantResolved { granted: true });

        assert_eq!(
            m.process(BubbleEvent::Close),
            vec![BubbleEffect::StopScreenShare, BubbleEffect::Close]
        );
        assert!(m.is_closed());
        assert!(m.process(BubbleEvent::Close).is_empty());
        assert!(m.process(BubbleEvent::Tap).is_empty());
    }
}
