//! Headless window host
//!
//! Keeps surfaces in memory and records every call, so the assistant can run
//! without a display and tests can assert on exactly what the window manager
//! was asked to do. Revoking the overlay permission makes further adds and
//! updates fail the way a platform window manager does.

use super::{SurfaceContent, SurfaceKind, WindowAttributes, WindowError, WindowHost};
use crate::geometry::ScreenMetrics;
use parking_lot::Mutex;
use std::collections::HashMap;

/// One call made against the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    Add(SurfaceKind),
    Update(SurfaceKind),
    Remove(SurfaceKind),
}

/// Current state of a surface held by the host
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSurface {
    pub content: SurfaceContent,
    pub attributes: WindowAttributes,
}

#[derive(Debug)]
struct RecordingState {
    ops: Vec<HostOp>,
    surfaces: HashMap<SurfaceKind, RecordedSurface>,
    overlay_permitted: bool,
}

/// In-memory [`WindowHost`]
#[derive(Debug)]
pub struct RecordingHost {
    metrics: ScreenMetrics,
    state: Mutex<RecordingState>,
}

impl RecordingHost {
    pub fn new(metrics: ScreenMetrics) -> Self {
        Self {
            metrics,
            state: Mutex::new(RecordingState {
                ops: Vec::new(),
                surfaces: HashMap::new(),
                overlay_permitted: true,
            }),
        }
    }

    /// Grant or revoke the overlay permission
    pub fn set_overlay_permitted(&self, permitted: bool) {
        self.state.lock().overlay_permitted = permitted;
    }

    pub fn ops(&self) -> Vec<HostOp> {
        self.state.lock().ops.clone()
    }

    pub fn surface(&self, kind: SurfaceKind) -> Option<RecordedSurface> {
        self.state.lock().surfaces.get(&kind).cloned()
    }

    pub fn surface_count(&self) -> usize {
        self.state.lock().surfaces.len()
    }

    /// Number of times a surface of this kind was added
    pub fn add_count(&self, kind: SurfaceKind) -> usize {
        self.state
            .lock()
            .ops
            .iter()
            .filter(|op| **op == HostOp::Add(kind))
            .count()
    }
}

impl WindowHost for RecordingHost {
    fn screen_metrics(&self) -> ScreenMetrics {
        self.metrics
    }

    fn add_surface(
        &self,
        kind: SurfaceKind,
        content: &SurfaceContent,
        attributes: &WindowAttributes,
    ) -> Result<(), WindowError> {
        let mut state = self.state.lock();
        if !state.overlay_permitted {
            return Err(WindowError::PermissionDenied);
        }
        if state.surfaces.contains_key(&kind) {
            return Err(WindowError::Host(format!(
                "{} surface added twice",
                kind.label()
            )));
        }

        state.ops.push(HostOp::Add(kind));
        state.surfaces.insert(
            kind,
            RecordedSurface {
                content: content.clone(),
                attributes: *attributes,
            },
        );
        Ok(())
    }

    fn update_surface(
        &self,
        kind: SurfaceKind,
        content: Option<&SurfaceContent>,
        attributes: &WindowAttributes,
    ) -> Result<(), WindowError> {
        let mut state = self.state.lock();
        if !state.overlay_permitted {
            return Err(WindowError::PermissionDenied);
        }

        let surface = state
            .surfaces
            .get_mut(&kind)
            .ok_or(WindowError::NotMounted(kind))?;
        surface.attributes = *attributes;
        if let Some(content) = content {
            surface.content = content.clone();
        }
        state.ops.push(HostOp::Update(kind));
        Ok(())
    }

    fn remove_surface(&self, kind: SurfaceKind) -> Result<(), WindowError> {
        let mut state = self.state.lock();
        if state.surfaces.remove(&kind).is_none() {
            return Err(WindowError::NotMounted(kind));
        }
        state.ops.push(HostOp::Remove(kind));
        Ok(())
    }
}
