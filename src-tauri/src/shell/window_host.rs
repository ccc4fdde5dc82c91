//! Overlay surfaces as borderless, always-on-top webview windows
//!
//! Each [`SurfaceKind`] maps to one window labelled with [`SurfaceKind::label`].
//! Content is pushed to the page with a `surface-content` event and also kept
//! here so a freshly loaded page can pull it with the `surface_content`
//! command before the first event arrives.

use crate::geometry::ScreenMetrics;
use crate::overlay::{
    Gravity, SurfaceContent, SurfaceKind, SurfacePosition, SurfaceSize, WindowAttributes,
    WindowError, WindowHost,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use tauri::{AppHandle, Emitter, Manager, PhysicalPosition, PhysicalSize, WebviewUrl};

/// Event carrying a surface's latest [`SurfaceContent`]
pub const SURFACE_CONTENT_EVENT: &str = "surface-content";

/// Used when the primary monitor cannot be read
const FALLBACK_SCREEN: (u32, u32) = (1920, 1080);

/// Menu bar / panel allowance on desktops
const DESKTOP_TOP_INSET_PX: u32 = 0;

pub struct TauriWindowHost {
    app: AppHandle,
    bubble_size_px: u32,
    contents: Mutex<HashMap<SurfaceKind, SurfaceContent>>,
}

impl TauriWindowHost {
    pub fn new(app: AppHandle, bubble_size_px: u32) -> Self {
        Self {
            app,
            bubble_size_px,
            contents: Mutex::new(HashMap::new()),
        }
    }

    /// Latest content pushed to a surface, if it is mounted
    pub fn content(&self, kind: SurfaceKind) -> Option<SurfaceContent> {
        self.contents.lock().get(&kind).cloned()
    }

    fn window(&self, kind: SurfaceKind) -> Result<tauri::WebviewWindow, WindowError> {
        self.app
            .get_webview_window(kind.label())
            .ok_or(WindowError::NotMounted(kind))
    }

    fn pixel_size(&self, size: SurfaceSize, metrics: &ScreenMetrics) -> (u32, u32) {
        match size {
            SurfaceSize::Exact { width, height } => (width, height),
            SurfaceSize::Fill => (metrics.width_px, metrics.usable_height() as u32),
            SurfaceSize::WrapContent => (self.bubble_size_px, self.bubble_size_px),
        }
    }

    fn apply(
        &self,
        window: &tauri::WebviewWindow,
        attributes: &WindowAttributes,
    ) -> Result<(), WindowError> {
        let metrics = self.screen_metrics();
        let (width, height) = self.pixel_size(attributes.size, &metrics);
        let (x, y) = place(attributes.position, width, height, &metrics);

        window
            .set_size(PhysicalSize::new(width, height))
            .map_err(host_error)?;
        window
            .set_position(PhysicalPosition::new(x, y))
            .map_err(host_error)?;
        window
            .set_ignore_cursor_events(!attributes.touchable)
            .map_err(host_error)?;
        if attributes.focusable {
            window.set_focus().map_err(host_error)?;
        }
        Ok(())
    }

    fn push_content(&self, kind: SurfaceKind, content: &SurfaceContent) -> Result<(), WindowError> {
        self.contents.lock().insert(kind, content.clone());
        self.app
            .emit_to(kind.label(), SURFACE_CONTENT_EVENT, content)
            .map_err(host_error)
    }
}

impl WindowHost for TauriWindowHost {
    fn screen_metrics(&self) -> ScreenMetrics {
        match self.app.primary_monitor() {
            Ok(Some(monitor)) => {
                let size = monitor.size();
                ScreenMetrics::new(size.width, size.height, DESKTOP_TOP_INSET_PX)
            }
            Ok(None) | Err(_) => {
                tracing::warn!("Primary monitor unavailable, assuming {:?}", FALLBACK_SCREEN);
                ScreenMetrics::new(FALLBACK_SCREEN.0, FALLBACK_SCREEN.1, DESKTOP_TOP_INSET_PX)
            }
        }
    }

    fn add_surface(
        &self,
        kind: SurfaceKind,
        content: &SurfaceContent,
        attributes: &WindowAttributes,
    ) -> Result<(), WindowError> {
        if self.app.get_webview_window(kind.label()).is_some() {
            return Err(WindowError::Host(format!(
                "{} window already exists",
                kind.label()
            )));
        }

        let metrics = self.screen_metrics();
        let (width, height) = self.pixel_size(attributes.size, &metrics);
        let (x, y) = place(attributes.position, width, height, &metrics);

        // Content must be stored before the page loads and asks for it
        self.contents.lock().insert(kind, content.clone());

        let window = tauri::WebviewWindowBuilder::new(
            &self.app,
            kind.label(),
            WebviewUrl::App("index.html".into()),
        )
        .title(kind.label())
        .decorations(false)
        .transparent(true)
        .always_on_top(true)
        .skip_taskbar(true)
        .resizable(false)
        .focused(attributes.focusable)
        .shadow(false)
        .visible(true)
        .build()
        .map_err(|e| {
            self.contents.lock().remove(&kind);
            host_error(e)
        })?;

        let placed = window
            .set_size(PhysicalSize::new(width, height))
            .and_then(|_| window.set_position(PhysicalPosition::new(x, y)))
            .and_then(|_| window.set_ignore_cursor_events(!attributes.touchable));
        if let Err(e) = placed {
            // The controller never records a failed add, so nothing else would remove it
            discard_unplaced(&self.contents, kind, || window.destroy());
            return Err(host_error(e));
        }

        tracing::debug!(
            "Created {} window {}x{} at ({}, {})",
            kind.label(),
            width,
            height,
            x,
            y
        );
        Ok(())
    }

    fn update_surface(
        &self,
        kind: SurfaceKind,
        content: Option<&SurfaceContent>,
        attributes: &WindowAttributes,
    ) -> Result<(), WindowError> {
        let window = self.window(kind)?;
        self.apply(&window, attributes)?;
        if let Some(content) = content {
            self.push_content(kind, content)?;
        }
        Ok(())
    }

    fn remove_surface(&self, kind: SurfaceKind) -> Result<(), WindowError> {
        self.contents.lock().remove(&kind);
        let window = self.window(kind)?;
        window.destroy().map_err(host_error)?;
        tracing::debug!("Destroyed {} window", kind.label());
        Ok(())
    }
}

fn host_error(e: tauri::Error) -> WindowError {
    WindowError::Host(e.to_string())
}

/// Tear down a window that was built but could not be placed, so the next
/// add for the same kind starts clean
fn discard_unplaced<E: std::fmt::Display>(
    contents: &Mutex<HashMap<SurfaceKind, SurfaceContent>>,
    kind: SurfaceKind,
    destroy: impl FnOnce() -> Result<(), E>,
) {
    if let Err(e) = destroy() {
        tracing::warn!("Failed to destroy half-built {} window: {}", kind.label(), e);
    }
    contents.lock().remove(&kind);
}

/// Top-left corner for a surface of the given size
fn place(position: SurfacePosition, width: u32, height: u32, metrics: &ScreenMetrics) -> (i32, i32) {
    let top = metrics.top_inset_px as i32;
    match position {
        SurfacePosition::Offset { x, y } => (x, top + y),
        SurfacePosition::Anchored { gravity } => {
            let free_x = (metrics.width_px as i32 - width as i32).max(0);
            let free_y = (metrics.usable_height() as i32 - height as i32).max(0);
            match gravity {
                Gravity::TopStart => (0, top),
                Gravity::TopCenter => (free_x / 2, top),
                Gravity::BottomCenter => (free_x / 2, top + free_y),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuidanceConfig;
    use crate::geometry::PixelBox;
    use crate::guidance::layout::compute_scene;
    use crate::guidance::payload::VisualCue;

    fn metrics() -> ScreenMetrics {
        ScreenMetrics::new(1920, 1080, 40)
    }

    fn scene() -> SurfaceContent {
        SurfaceContent::Guidance(compute_scene(
            &PixelBox::new(200, 100, 400, 200),
            "Tap here",
            VisualCue::Arrow,
            &metrics(),
            &GuidanceConfig::default(),
            false,
        ))
    }

    #[test]
    fn test_unplaced_window_is_destroyed_and_forgotten() {
        let contents = Mutex::new(HashMap::from([
            (SurfaceKind::Guidance, scene()),
            (SurfaceKind::Bubble, scene()),
        ]));
        let mut destroyed = false;

        discard_unplaced(&contents, SurfaceKind::Guidance, || {
            destroyed = true;
            Ok::<(), String>(())
        });

        assert!(destroyed);
        assert!(!contents.lock().contains_key(&SurfaceKind::Guidance));
        assert!(contents.lock().contains_key(&SurfaceKind::Bubble));
    }

    #[test]
    fn test_content_forgotten_even_if_destroy_fails() {
        let contents = Mutex::new(HashMap::from([(SurfaceKind::Bubble, scene())]));

        discard_unplaced(&contents, SurfaceKind::Bubble, || {
            Err("window already gone".to_string())
        });

        assert!(contents.lock().is_empty());
    }

    #[test]
    fn test_place_offsets_below_inset() {
        assert_eq!(
            place(SurfacePosition::Offset { x: 10, y: 20 }, 160, 160, &metrics()),
            (10, 60)
        );
    }

    #[test]
    fn test_place_anchored_gravities() {
        let anchored = |gravity| SurfacePosition::Anchored { gravity };
        assert_eq!(place(anchored(Gravity::TopStart), 200, 100, &metrics()), (0, 40));
        assert_eq!(place(anchored(Gravity::TopCenter), 200, 100, &metrics()), (860, 40));
        assert_eq!(
            place(anchored(Gravity::BottomCenter), 200, 100, &metrics()),
            (860, 40 + 940)
        );
    }
}
