//! Overlay surface management
//!
//! Overlay surfaces are windows drawn above every other application: the
//! floating assistant bubble and the full-screen guidance annotation. The
//! platform window manager is abstracted behind [`WindowHost`]; the only
//! code that talks to it is [`OverlayWindowController`], which enforces a
//! single mounted surface per logical overlay and removes whatever it still
//! owns when dropped.

pub mod controller;
pub mod recording;

pub use controller::{OverlayWindowController, SurfaceHandle};
pub use recording::{HostOp, RecordedSurface, RecordingHost};

use crate::bubble::BubbleView;
use crate::geometry::ScreenMetrics;
use crate::guidance::layout::GuidanceScene;
use serde::Serialize;

/// Logical overlays. At most one surface per kind is mounted at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    /// Floating assistant bubble and its conversation panel
    Bubble,
    /// Transparent full-screen guidance annotation
    Guidance,
}

impl SurfaceKind {
    /// Stable label, also used as the window label by the desktop shell
    pub fn label(&self) -> &'static str {
        match self {
            SurfaceKind::Bubble => "bubble",
            SurfaceKind::Guidance => "guidance",
        }
    }
}

/// Requested surface size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SurfaceSize {
    /// Exact pixel dimensions
    Exact { width: u32, height: u32 },
    /// Fill the whole screen below the status bar
    Fill,
    /// Size to the content (the collapsed bubble)
    WrapContent,
}

/// Anchor used for gravity-based placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gravity {
    TopStart,
    TopCenter,
    BottomCenter,
}

/// Requested surface position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SurfacePosition {
    /// Pixel offset from the top-left corner
    Offset { x: i32, y: i32 },
    /// Anchored to a screen edge
    Anchored { gravity: Gravity },
}

/// Stacking class. Every overlay sits above other applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZOrder {
    #[default]
    AboveOtherApps,
}

/// Window-manager parameters for one surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowAttributes {
    pub size: SurfaceSize,
    pub position: SurfacePosition,
    /// May take keyboard focus (needed for text entry)
    pub focusable: bool,
    /// Intercepts touches; `false` lets them reach the apps underneath
    pub touchable: bool,
    pub z_order: ZOrder,
}

impl WindowAttributes {
    /// Full-screen surface that never takes focus or touches
    pub fn input_inert_overlay() -> Self {
        Self {
            size: SurfaceSize::Fill,
            position: SurfacePosition::Anchored {
                gravity: Gravity::TopStart,
            },
            focusable: false,
            touchable: false,
            z_order: ZOrder::AboveOtherApps,
        }
    }

    /// Content-sized floating surface at a pixel offset, without focus
    pub fn floating(x: i32, y: i32) -> Self {
        Self {
            size: SurfaceSize::WrapContent,
            position: SurfacePosition::Offset { x, y },
            focusable: false,
            touchable: true,
            z_order: ZOrder::AboveOtherApps,
        }
    }

    /// Full-screen interactive surface that may take focus
    pub fn fullscreen_interactive() -> Self {
        Self {
            size: SurfaceSize::Fill,
            position: SurfacePosition::Anchored {
                gravity: Gravity::TopStart,
            },
            focusable: true,
            touchable: true,
            z_order: ZOrder::AboveOtherApps,
        }
    }
}

/// What a surface displays
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "view", rename_all = "snake_case")]
pub enum SurfaceContent {
    Bubble(BubbleView),
    Guidance(GuidanceScene),
}

/// Errors raised by the platform window manager
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("Overlay permission denied")]
    PermissionDenied,

    #[error("No {0:?} surface is mounted")]
    NotMounted(SurfaceKind),

    #[error("Stale handle for {0:?} surface")]
    StaleHandle(SurfaceKind),

    #[error("Window host failure: {0}")]
    Host(String),
}

/// The platform window manager.
///
/// Implementations must be safe to call from the assistant loop task; the
/// controller guarantees calls are never concurrent for one session.
pub trait WindowHost: Send + Sync {
    /// Screen size and status-bar inset, read once per session
    fn screen_metrics(&self) -> ScreenMetrics;

    /// Create a new surface
    fn add_surface(
        &self,
        kind: SurfaceKind,
        content: &SurfaceContent,
        attributes: &WindowAttributes,
    ) -> Result<(), WindowError>;

    /// Update an existing surface's attributes and, optionally, its content
    fn update_surface(
        &self,
        kind: SurfaceKind,
        content: Option<&SurfaceContent>,
        attributes: &WindowAttributes,
    ) -> Result<(), WindowError>;

    /// Remove a surface
    fn remove_surface(&self, kind: SurfaceKind) -> Result<(), WindowError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inert_overlay_never_takes_input() {
        let attrs = WindowAttributes::input_inert_overlay();
        assert!(!attrs.focusable);
        assert!(!attrs.touchable);
        assert_eq!(attrs.size, SurfaceSize::Fill);
        assert_eq!(attrs.z_order, ZOrder::AboveOtherApps);
    }

    #[test]
    fn test_attribute_serialisation() {
        let json = serde_json::to_value(WindowAttributes::floating(10, 20)).unwrap();
        assert_eq!(json["size"]["mode"], "wrap_content");
        assert_eq!(json["position"]["mode"], "offset");
        assert_eq!(json["position"]["x"], 10);
        assert_eq!(json["zOrder"], "above_other_apps");
    }

    #[test]
    fn test_labels() {
        assert_eq!(SurfaceKind::Bubble.label(), "bubble");
        assert_eq!(SurfaceKind::Guidance.label(), "guidance");
    }
}
