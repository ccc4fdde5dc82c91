//! Owning controller for overlay surfaces
//!
//! Create, update and remove are the only mutation paths. A mount for a kind
//! that is already mounted updates the existing surface in place. When the
//! host refuses an update, the surface is dropped from the controller (and a
//! best-effort removal is attempted) so callers never hold a handle to a
//! half-initialised window.

use super::{SurfaceContent, SurfaceKind, WindowAttributes, WindowError, WindowHost};
use std::collections::HashMap;
use std::sync::Arc;

/// Proof of a mounted surface. Invalidated by unmount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceHandle {
    kind: SurfaceKind,
    id: u64,
}

impl SurfaceHandle {
    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }
}

#[derive(Debug)]
struct MountedSurface {
    id: u64,
    attributes: WindowAttributes,
}

/// Owns every overlay surface of one session
pub struct OverlayWindowController {
    host: Arc<dyn WindowHost>,
    mounted: HashMap<SurfaceKind, MountedSurface>,
    next_id: u64,
}

impl OverlayWindowController {
    pub fn new(host: Arc<dyn WindowHost>) -> Self {
        Self {
            host,
            mounted: HashMap::new(),
            next_id: 1,
        }
    }

    /// Mount a surface, or update it in place if this kind is already mounted
    pub fn mount(
        &mut self,
        kind: SurfaceKind,
        content: &SurfaceContent,
        attributes: WindowAttributes,
    ) -> Result<SurfaceHandle, WindowError> {
        if let Some(id) = self.mounted.get(&kind).map(|m| m.id) {
            let handle = SurfaceHandle { kind, id };
            self.update(handle, Some(content), attributes)?;
            return Ok(handle);
        }

        self.host.add_surface(kind, content, &attributes).map_err(|e| {
            tracing::warn!("Window host refused to add {:?} surface: {}", kind, e);
            e
        })?;

        let id = self.next_id;
        self.next_id += 1;
        self.mounted.insert(kind, MountedSurface { id, attributes });
        tracing::debug!("Mounted {:?} surface (id {})", kind, id);

        Ok(SurfaceHandle { kind, id })
    }

    /// Re-apply attributes, optionally replacing the content
    pub fn update(
        &mut self,
        handle: SurfaceHandle,
        content: Option<&SurfaceContent>,
        attributes: WindowAttributes,
    ) -> Result<(), WindowError> {
        self.check(handle)?;

        if let Err(e) = self.host.update_surface(handle.kind, content, &attributes) {
            tracing::warn!(
                "Window host refused to update {:?} surface, discarding it: {}",
                handle.kind,
                e
            );
            self.discard(handle.kind);
            return Err(e);
        }

        if let Some(mounted) = self.mounted.get_mut(&handle.kind) {
            mounted.attributes = attributes;
        }
        Ok(())
    }

    /// Re-apply attributes only
    pub fn update_attributes(
        &mut self,
        handle: SurfaceHandle,
        attributes: WindowAttributes,
    ) -> Result<(), WindowError> {
        self.update(handle, None, attributes)
    }

    /// Remove a surface. The handle is invalid afterwards even if the host fails.
    pub fn unmount(&mut self, handle: SurfaceHandle) -> Result<(), WindowError> {
        self.check(handle)?;
        self.mounted.remove(&handle.kind);

        self.host.remove_surface(handle.kind).map_err(|e| {
            tracing::warn!("Failed to remove {:?} surface: {}", handle.kind, e);
            e
        })?;

        tracing::debug!("Unmounted {:?} surface (id {})", handle.kind, handle.id);
        Ok(())
    }

    pub fn is_mounted(&self, kind: SurfaceKind) -> bool {
        self.mounted.contains_key(&kind)
    }

    /// Attributes last applied to a mounted surface
    pub fn attributes(&self, kind: SurfaceKind) -> Option<WindowAttributes> {
        self.mounted.get(&kind).map(|m| m.attributes)
    }

    /// Remove every surface this controller still owns
    pub fn unmount_all(&mut self) {
        let kinds: Vec<SurfaceKind> = self.mounted.keys().copied().collect();
        for kind in kinds {
            self.discard(kind);
        }
    }

    fn check(&self, handle: SurfaceHandle) -> Result<(), WindowError> {
        match self.mounted.get(&handle.kind) {
            Some(m) if m.id == handle.id => Ok(()),
            Some(_) => Err(WindowError::StaleHandle(handle.kind)),
            None => Err(WindowError::NotMounted(handle.kind)),
        }
    }

    fn discard(&mut self, kind: SurfaceKind) {
        if self.mounted.remove(&kind).is_some() {
            if let Err(e) = self.host.remove_surface(kind) {
                tracing::debug!("Removal of discarded {:?} surface failed: {}", kind, e);
            }
        }
    }
}

impl Drop for OverlayWindowController {
    fn drop(&mut self) {
        self.unmount_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuidanceConfig;
    use crate::geometry::{PixelBox, ScreenMetrics};
    use crate::guidance::layout::compute_scene;
    use crate::guidance::payload::VisualCue;
    use crate::overlay::{HostOp, RecordingHost};

    fn scene() -> SurfaceContent {
        SurfaceContent::Guidance(compute_scene(
            &PixelBox::new(200, 100, 400, 200),
            "Tap here",
            VisualCue::Arrow,
            &ScreenMetrics::new(1000, 2000, 0),
            &GuidanceConfig::default(),
            false,
        ))
    }

    fn setup() -> (Arc<RecordingHost>, OverlayWindowController) {
        let host = Arc::new(RecordingHost::new(ScreenMetrics::new(1000, 2000, 0)));
        let controller = OverlayWindowController::new(host.clone());
        (host, controller)
    }

    #[test]
    fn test_mount_twice_updates_in_place() {
        let (host, mut controller) = setup();
        let attrs = WindowAttributes::input_inert_overlay();

        let first = controller
            .mount(SurfaceKind::Guidance, &scene(), attrs)
            .unwrap();
        let second = controller
            .mount(SurfaceKind::Guidance, &scene(), attrs)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(host.surface_count(), 1);
        assert_eq!(controller.attributes(SurfaceKind::Guidance), Some(attrs));
        assert_eq!(
            host.ops(),
            vec![
                HostOp::Add(SurfaceKind::Guidance),
                HostOp::Update(SurfaceKind::Guidance)
            ]
        );
    }

    #[test]
    fn test_unmount_invalidates_handle() {
        let (host, mut controller) = setup();
        let handle = controller
            .mount(
                SurfaceKind::Guidance,
                &scene(),
                WindowAttributes::input_inert_overlay(),
            )
            .unwrap();

        controller.unmount(handle).unwrap();
        assert!(!controller.is_mounted(SurfaceKind::Guidance));
        assert_eq!(host.surface_count(), 0);
        assert_eq!(
            controller.unmount(handle),
            Err(WindowError::NotMounted(SurfaceKind::Guidance))
        );
    }

    #[test]
    fn test_stale_handle_rejected() {
        let (_host, mut controller) = setup();
        let attrs = WindowAttributes::input_inert_overlay();
        let old = controller
            .mount(SurfaceKind::Guidance, &scene(), attrs)
            .unwrap();
        controller.unmount(old).unwrap();
        let _new = controller
            .mount(SurfaceKind::Guidance, &scene(), attrs)
            .unwrap();

        assert_eq!(
            controller.update_attributes(old, attrs),
            Err(WindowError::StaleHandle(SurfaceKind::Guidance))
        );
    }

    #[test]
    fn test_denied_mount_leaves_nothing_behind() {
        let (host, mut controller) = setup();
        host.set_overlay_permitted(false);

        let result = controller.mount(
            SurfaceKind::Bubble,
            &scene(),
            WindowAttributes::floating(0, 0),
        );

        assert_eq!(result, Err(WindowError::PermissionDenied));
        assert!(!controller.is_mounted(SurfaceKind::Bubble));
        assert_eq!(host.surface_count(), 0);
    }

    #[test]
    fn test_refused_update_discards_surface() {
        let (host, mut controller) = setup();
        let handle = controller
            .mount(
                SurfaceKind::Bubble,
                &scene(),
                WindowAttributes::floating(0, 0),
            )
            .unwrap();

        host.set_overlay_permitted(false);
        let result = controller.update_attributes(handle, WindowAttributes::floating(5, 5));

        assert_eq!(result, Err(WindowError::PermissionDenied));
        assert!(!controller.is_mounted(SurfaceKind::Bubble));
    }

    #[test]
    fn test_drop_removes_owned_surfaces() {
        let (host, mut controller) = setup();
        controller
            .mount(
                SurfaceKind::Bubble,
                &scene(),
                WindowAttributes::floating(0, 0),
            )
            .unwrap();
        controller
            .mount(
                SurfaceKind::Guidance,
                &scene(),
                WindowAttributes::input_inert_overlay(),
            )
            .unwrap();
        assert_eq!(host.surface_count(), 2);

        drop(controller);
        assert_eq!(host.surface_count(), 0);
    }
}
