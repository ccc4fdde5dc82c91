//! Guidance annotation lifecycle
//!
//! Owns the single active guidance request and its auto-dismiss timer. A new
//! request always clears the previous one (timer canceled, surface removed)
//! before it is drawn, so at most one annotation is ever on screen.

use super::layout::compute_scene;
use super::GuidanceRequest;
use crate::config::GuidanceConfig;
use crate::geometry::ScreenMetrics;
use crate::overlay::{
    OverlayWindowController, SurfaceContent, SurfaceHandle, SurfaceKind, WindowAttributes,
    WindowError,
};
use crate::timer::OneShotTimer;
use std::sync::Arc;

/// Called with the timer generation when the auto-dismiss delay elapses.
/// The owner routes it back to [`GuidanceRenderer::on_dismiss_timer`].
pub type DismissCallback = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Debug)]
struct ActiveGuidance {
    request: GuidanceRequest,
    handle: SurfaceHandle,
}

pub struct GuidanceRenderer {
    style: GuidanceConfig,
    metrics: ScreenMetrics,
    debug: bool,
    timer: OneShotTimer,
    active: Option<ActiveGuidance>,
    on_dismiss: DismissCallback,
}

impl GuidanceRenderer {
    pub fn new(
        style: GuidanceConfig,
        metrics: ScreenMetrics,
        debug: bool,
        on_dismiss: DismissCallback,
    ) -> Self {
        Self {
            style,
            metrics,
            debug,
            timer: OneShotTimer::new(),
            active: None,
            on_dismiss,
        }
    }

    /// Show a request, replacing whatever is currently displayed.
    ///
    /// On a mount failure the renderer is left inactive.
    pub fn display(
        &mut self,
        request: GuidanceRequest,
        controller: &mut OverlayWindowController,
    ) -> Result<(), WindowError> {
        self.clear(controller);

        let scene = compute_scene(
            &request.target,
            &request.instruction_text,
            request.cue,
            &self.metrics,
            &self.style,
            self.debug,
        );

        let handle = controller
            .mount(
                SurfaceKind::Guidance,
                &SurfaceContent::Guidance(scene),
                WindowAttributes::input_inert_overlay(),
            )
            .map_err(|e| {
                tracing::warn!("Could not show guidance {}: {}", request.id, e);
                e
            })?;

        let on_dismiss = self.on_dismiss.clone();
        self.timer
            .arm(self.style.auto_dismiss(), move |generation| on_dismiss(generation));

        tracing::info!(
            "Showing guidance {} at {:?} (dismiss in {}s)",
            request.id,
            request.target,
            self.style.auto_dismiss_secs
        );
        self.active = Some(ActiveGuidance { request, handle });
        Ok(())
    }

    /// Remove the active annotation, if any. Safe to call repeatedly.
    pub fn clear(&mut self, controller: &mut OverlayWindowController) {
        self.timer.cancel();

        if let Some(active) = self.active.take() {
            if let Err(e) = controller.unmount(active.handle) {
                tracing::debug!("Guidance surface already gone: {}", e);
            }
            tracing::info!("Cleared guidance {}", active.request.id);
        }
    }

    /// Handle an auto-dismiss firing. Returns whether it dismissed anything;
    /// firings from superseded or canceled arms are ignored.
    pub fn on_dismiss_timer(
        &mut self,
        generation: u64,
        controller: &mut OverlayWindowController,
    ) -> bool {
        if !self.timer.accept(generation) {
            tracing::debug!("Ignoring stale guidance dismiss (generation {})", generation);
            return false;
        }
        tracing::debug!("Guidance auto-dismiss elapsed");
        self.clear(controller);
        true
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_request(&self) -> Option<&GuidanceRequest> {
        self.active.as_ref().map(|a| &a.request)
    }
}
