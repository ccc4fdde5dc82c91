//! Assistant session
//!
//! A [`Session`] is everything that exists between a wake and the return to
//! idle: the overlay controller with the bubble and guidance surfaces, the
//! bubble state machine, the guidance renderer, the room orchestration and
//! the inactivity timer. It lives on the assistant loop and is dropped as a
//! unit, so nothing from a finished session can linger.
//!
//! Background work started by the session (consent prompt, capture polling,
//! timers) posts its result back as an [`AssistantEvent`] tagged with the
//! session epoch; the loop drops results for epochs that have ended.

pub mod capture;
pub mod connection;
pub mod orchestrator;
pub mod token;
pub mod transcript;

use crate::assistant::AssistantEvent;
use crate::bubble::{
    attributes_for, BubbleEffect, BubbleEvent, BubbleState, BubbleStateMachine, BubbleView,
    ConnectionStatus,
};
use crate::config::Config;
use crate::geometry::ScreenMetrics;
use crate::guidance::GuidanceRenderer;
use crate::notice::{Notice, Notifier};
use crate::overlay::{
    OverlayWindowController, SurfaceContent, SurfaceHandle, SurfaceKind, WindowError, WindowHost,
};
use crate::timer::OneShotTimer;
use capture::{CaptureConsent, CaptureError, CaptureGrant};
use connection::{RoomConnection, RoomEvent, RpcError};
use orchestrator::{GuidanceTarget, SessionOrchestrator};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use transcript::Upsert;

pub use token::{CredentialSource, SessionCredentials, TokenClient, TokenError};

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Close button
    User,
    /// No activity within the inactivity timeout
    Inactivity,
    /// The window manager refused the bubble surface
    OverlayDenied,
    ConnectFailed(String),
    Disconnected(String),
}

impl CloseReason {
    /// Notice to show for this reason, if any
    pub fn notice(&self) -> Option<Notice> {
        match self {
            CloseReason::User => None,
            CloseReason::Inactivity => Some(Notice::info("Assistant closed after inactivity")),
            CloseReason::OverlayDenied => Some(Notice::error(
                "Permission to draw over other apps is required",
            )),
            CloseReason::ConnectFailed(e) => {
                Some(Notice::error(format!("Could not connect: {}", e)))
            }
            CloseReason::Disconnected(e) => Some(Notice::warning(format!("Disconnected: {}", e))),
        }
    }
}

/// What the loop should do after the session handled something
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Continue,
    Close(CloseReason),
}

/// Platform services a session calls out to
#[derive(Clone)]
pub struct SessionServices {
    pub window_host: Arc<dyn WindowHost>,
    pub consent: Arc<dyn CaptureConsent>,
    pub notifier: Arc<dyn Notifier>,
}

/// Snapshot of a running session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub epoch: u64,
    pub bubble: BubbleState,
    pub connection: ConnectionStatus,
    pub guidance_active: bool,
    pub transcript_len: usize,
}

pub struct Session {
    epoch: u64,
    config: Config,
    metrics: ScreenMetrics,
    services: SessionServices,
    events: mpsc::UnboundedSender<AssistantEvent>,
    bubble: BubbleStateMachine,
    bubble_surface: Option<SurfaceHandle>,
    renderer: GuidanceRenderer,
    orchestrator: SessionOrchestrator,
    inactivity: OneShotTimer,
    pending_grant: Option<CaptureGrant>,
    // Dropped last so every surface it still owns is removed
    controller: OverlayWindowController,
}

impl Session {
    /// Build the session and show the collapsed bubble.
    ///
    /// Fails if the window host refuses the bubble surface.
    pub fn start(
        epoch: u64,
        config: Config,
        services: SessionServices,
        events: mpsc::UnboundedSender<AssistantEvent>,
    ) -> Result<Session, WindowError> {
        let metrics = services.window_host.screen_metrics();
        let dismiss_events = events.clone();
        let renderer = GuidanceRenderer::new(
            config.guidance.clone(),
            metrics,
            config.general.debug_mode,
            Arc::new(move |generation| {
                let _ = dismiss_events.send(AssistantEvent::GuidanceDismiss { epoch, generation });
            }),
        );

        let mut session = Session {
            epoch,
            metrics,
            bubble: BubbleStateMachine::new(
                &config.bubble,
                metrics,
                config.session.start_with_mic_on,
            ),
            bubble_surface: None,
            renderer,
            orchestrator: SessionOrchestrator::new(),
            inactivity: OneShotTimer::new(),
            pending_grant: None,
            controller: OverlayWindowController::new(services.window_host.clone()),
            services,
            events,
            config,
        };

        session.render()?;
        session.reset_inactivity();
        tracing::info!("Session {} started on {:?}", epoch, metrics);
        Ok(session)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The room was joined
    pub fn attach(&mut self, connection: Arc<dyn RoomConnection>) -> SessionOutcome {
        let mic_on = self.bubble.state().mic_on;
        if let Err(e) = self.orchestrator.attach(connection, mic_on) {
            return SessionOutcome::Close(CloseReason::ConnectFailed(e.to_string()));
        }
        self.reset_inactivity();
        self.rerender()
    }

    /// A gesture or toggle on the bubble
    pub fn on_bubble_event(&mut self, event: BubbleEvent) -> SessionOutcome {
        if matches!(event, BubbleEvent::ToggleMic) {
            self.reset_inactivity();
        }
        let effects = self.bubble.process(event);
        self.apply(effects, CloseReason::User)
    }

    pub fn on_room_event(&mut self, event: RoomEvent) -> SessionOutcome {
        match event {
            RoomEvent::Transcription(segment) => {
                match self.orchestrator.on_transcription(segment) {
                    Upsert::Unchanged => SessionOutcome::Continue,
                    Upsert::Added | Upsert::Updated => {
                        self.reset_inactivity();
                        self.rerender()
                    }
                }
            }
            RoomEvent::Activity => {
                self.reset_inactivity();
                SessionOutcome::Continue
            }
            RoomEvent::Rpc {
                method,
                payload,
                reply,
            } => {
                let result = self.handle_rpc(&method, &payload);
                if reply.send(result).is_err() {
                    tracing::debug!("RPC caller for {} went away before the reply", method);
                }
                SessionOutcome::Continue
            }
            RoomEvent::Disconnected { reason } => {
                tracing::warn!("Room disconnected: {}", reason);
                self.orchestrator.on_disconnected();
                SessionOutcome::Close(CloseReason::Disconnected(reason))
            }
        }
    }

    /// The consent prompt was answered
    pub fn on_capture_grant(&mut self, grant: Option<CaptureGrant>) -> SessionOutcome {
        let granted = grant.is_some();
        self.pending_grant = grant;
        let effects = self
            .bubble
            .process(BubbleEvent::CaptureGrantResolved { granted });
        if effects.is_empty() {
            self.pending_grant = None;
        }
        self.apply(effects, CloseReason::User)
    }

    /// Screen track acquisition finished
    pub fn on_capture_finished(&mut self, result: Result<u32, CaptureError>) -> SessionOutcome {
        match result {
            Ok(_) => SessionOutcome::Continue,
            Err(e) => {
                tracing::warn!("Screen share failed to start: {}", e);
                let effects = self.bubble.process(BubbleEvent::ScreenShareFailed);
                self.apply(effects, CloseReason::User)
            }
        }
    }

    pub fn on_guidance_dismiss(&mut self, generation: u64) {
        self.renderer
            .on_dismiss_timer(generation, &mut self.controller);
    }

    /// The inactivity timer fired. Stale generations are ignored.
    pub fn on_inactivity_timeout(&mut self, generation: u64) -> SessionOutcome {
        if !self.inactivity.accept(generation) {
            return SessionOutcome::Continue;
        }
        tracing::info!(
            "No activity for {}s, closing session {}",
            self.config.session.inactivity_timeout_secs,
            self.epoch
        );
        let effects = self.bubble.process(BubbleEvent::Close);
        self.apply(effects, CloseReason::Inactivity)
    }

    /// Text typed into the conversation panel
    pub fn submit_text(&mut self, text: &str) -> SessionOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SessionOutcome::Continue;
        }
        if !self.bubble.state().is_expanded() {
            tracing::debug!("Ignoring text entry while collapsed");
            return SessionOutcome::Continue;
        }
        if let Err(e) = self.orchestrator.send_chat(text) {
            tracing::warn!("Failed to send message: {}", e);
            self.services
                .notifier
                .notify(Notice::warning(format!("Message not sent: {}", e)));
            return SessionOutcome::Continue;
        }
        self.reset_inactivity();
        self.rerender()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            epoch: self.epoch,
            bubble: *self.bubble.state(),
            connection: self.orchestrator.status(),
            guidance_active: self.renderer.is_active(),
            transcript_len: self.orchestrator.transcript().len(),
        }
    }

    /// Release everything: timers, guidance, room resources and surfaces
    pub fn teardown(mut self) {
        tracing::info!("Tearing down session {}", self.epoch);
        self.inactivity.cancel();
        self.renderer.clear(&mut self.controller);
        self.orchestrator.detach();
        self.controller.unmount_all();
        self.bubble_surface = None;
    }

    fn handle_rpc(&mut self, method: &str, payload: &str) -> Result<String, RpcError> {
        let result = self.orchestrator.handle_rpc(
            method,
            payload,
            GuidanceTarget {
                renderer: &mut self.renderer,
                controller: &mut self.controller,
                metrics: self.metrics,
                notifier: self.services.notifier.as_ref(),
                debug: self.config.general.debug_mode,
            },
        );
        if let Err(e) = &result {
            tracing::debug!("RPC {} failed: {}", method, e);
        }
        result
    }

    fn apply(&mut self, effects: Vec<BubbleEffect>, close_reason: CloseReason) -> SessionOutcome {
        for effect in effects {
            match effect {
                BubbleEffect::Render => {
                    if let SessionOutcome::Close(reason) = self.rerender() {
                        return SessionOutcome::Close(reason);
                    }
                }
                BubbleEffect::SetMicrophone(enabled) => self.orchestrator.set_microphone(enabled),
                BubbleEffect::RequestCaptureGrant => self.request_capture_grant(),
                BubbleEffect::StartScreenShare => {
                    if !self.start_screen_share() {
                        let fallback = self.bubble.process(BubbleEvent::ScreenShareFailed);
                        if let SessionOutcome::Close(reason) = self.apply(fallback, close_reason.clone())
                        {
                            return SessionOutcome::Close(reason);
                        }
                    }
                }
                BubbleEffect::StopScreenShare => self.orchestrator.stop_screen_share(),
                BubbleEffect::Close => return SessionOutcome::Close(close_reason),
            }
        }
        SessionOutcome::Continue
    }

    fn request_capture_grant(&self) {
        let consent = self.services.consent.clone();
        let events = self.events.clone();
        let epoch = self.epoch;
        tracing::info!("Requesting screen capture permission");
        tokio::spawn(async move {
            let grant = consent.request_grant().await;
            let _ = events.send(AssistantEvent::CaptureGrant { epoch, grant });
        });
    }

    fn start_screen_share(&mut self) -> bool {
        let Some(grant) = self.pending_grant.take() else {
            tracing::warn!("Screen share approved without a grant");
            return false;
        };
        let events = self.events.clone();
        let epoch = self.epoch;
        self.orchestrator
            .start_screen_share(grant, self.config.capture.clone(), move |result| {
                let _ = events.send(AssistantEvent::CaptureFinished { epoch, result });
            })
    }

    fn reset_inactivity(&mut self) {
        let events = self.events.clone();
        let epoch = self.epoch;
        self.inactivity
            .arm(self.config.session.inactivity_timeout(), move |generation| {
                let _ = events.send(AssistantEvent::InactivityTimeout { epoch, generation });
            });
    }

    /// Redraw the bubble; a refused surface ends the session
    fn rerender(&mut self) -> SessionOutcome {
        match self.render() {
            Ok(()) => SessionOutcome::Continue,
            Err(e) => {
                tracing::error!("Bubble surface lost: {}", e);
                self.renderer.clear(&mut self.controller);
                SessionOutcome::Close(CloseReason::OverlayDenied)
            }
        }
    }

    fn render(&mut self) -> Result<(), WindowError> {
        let content = SurfaceContent::Bubble(BubbleView::new(
            &self.bubble,
            self.orchestrator.status(),
            self.orchestrator.transcript().snapshot(),
        ));
        let attributes = attributes_for(self.bubble.state());

        match self.bubble_surface {
            Some(handle) => {
                if let Err(e) = self.controller.update(handle, Some(&content), attributes) {
                    self.bubble_surface = None;
                    return Err(e);
                }
            }
            None => {
                let handle = self
                    .controller
                    .mount(SurfaceKind::Bubble, &content, attributes)?;
                self.bubble_surface = Some(handle);
            }
        }
        Ok(())
    }
}
