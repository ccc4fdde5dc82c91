//! Assistant event loop
//!
//! One task owns the wake gate and the running session and is the only
//! caller of the window host. Everything else (wake engine callbacks, the
//! credential fetch, room events, timers, UI gestures) reaches it as an
//! [`AssistantEvent`] on an unbounded channel, so state transitions are
//! strictly serialised. Results of background work carry the session epoch
//! they were started for and are dropped once that session has ended.

use crate::bubble::BubbleEvent;
use crate::config::Config;
use crate::notice::{Notice, Notifier, Permissions, ServiceStatus};
use crate::overlay::WindowHost;
use crate::session::capture::{CaptureConsent, CaptureError, CaptureGrant};
use crate::session::connection::{
    ConnectError, RoomConnection, RoomConnector, RoomEvent, RoomEventSink, RpcError,
};
use crate::session::{
    CloseReason, CredentialSource, Session, SessionCredentials, SessionOutcome, SessionServices,
    SessionStatus, TokenError,
};
use crate::wake::{GateState, WakeEngine, WakeGate};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Input to the assistant loop
pub enum AssistantEvent {
    /// The wake word was heard
    Wake,
    /// A permission may have been granted or revoked
    PermissionsChanged,
    CredentialsFetched {
        epoch: u64,
        result: Result<SessionCredentials, TokenError>,
    },
    RoomConnected {
        epoch: u64,
        result: Result<Arc<dyn RoomConnection>, ConnectError>,
    },
    Room {
        epoch: u64,
        event: RoomEvent,
    },
    /// Gesture or toggle on the bubble
    Bubble(BubbleEvent),
    /// Text typed into the conversation panel
    SubmitText(String),
    CaptureGrant {
        epoch: u64,
        grant: Option<CaptureGrant>,
    },
    CaptureFinished {
        epoch: u64,
        result: Result<u32, CaptureError>,
    },
    GuidanceDismiss {
        epoch: u64,
        generation: u64,
    },
    InactivityTimeout {
        epoch: u64,
        generation: u64,
    },
    ResumeListening {
        generation: u64,
    },
    Status(oneshot::Sender<AssistantStatus>),
    /// Stop for good (the notification's "Stop" action)
    Shutdown,
}

impl AssistantEvent {
    fn name(&self) -> &'static str {
        match self {
            AssistantEvent::Wake => "wake",
            AssistantEvent::PermissionsChanged => "permissions_changed",
            AssistantEvent::CredentialsFetched { .. } => "credentials_fetched",
            AssistantEvent::RoomConnected { .. } => "room_connected",
            AssistantEvent::Room { .. } => "room",
            AssistantEvent::Bubble(_) => "bubble",
            AssistantEvent::SubmitText(_) => "submit_text",
            AssistantEvent::CaptureGrant { .. } => "capture_grant",
            AssistantEvent::CaptureFinished { .. } => "capture_finished",
            AssistantEvent::GuidanceDismiss { .. } => "guidance_dismiss",
            AssistantEvent::InactivityTimeout { .. } => "inactivity_timeout",
            AssistantEvent::ResumeListening { .. } => "resume_listening",
            AssistantEvent::Status(_) => "status",
            AssistantEvent::Shutdown => "shutdown",
        }
    }
}

/// Snapshot of the whole assistant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantStatus {
    pub gate: GateState,
    pub listening: bool,
    pub shut_down: bool,
    pub session: Option<SessionStatus>,
}

/// Platform capabilities the assistant runs on
pub struct Platform {
    pub window_host: Arc<dyn WindowHost>,
    pub wake_engine: Box<dyn WakeEngine>,
    pub credentials: Arc<dyn CredentialSource>,
    pub rooms: Arc<dyn RoomConnector>,
    pub consent: Arc<dyn CaptureConsent>,
    pub notifier: Arc<dyn Notifier>,
    pub permissions: Arc<dyn Permissions>,
}

/// Cheap, cloneable sender for the assistant loop.
///
/// Every method returns `false` once the loop has stopped.
#[derive(Clone)]
pub struct AssistantHandle {
    events: mpsc::UnboundedSender<AssistantEvent>,
}

impl AssistantHandle {
    pub fn send(&self, event: AssistantEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn wake(&self) -> bool {
        self.send(AssistantEvent::Wake)
    }

    pub fn bubble(&self, event: BubbleEvent) -> bool {
        self.send(AssistantEvent::Bubble(event))
    }

    pub fn tap(&self) -> bool {
        self.bubble(BubbleEvent::Tap)
    }

    pub fn drag(&self, dx: i32, dy: i32) -> bool {
        self.bubble(BubbleEvent::Drag { dx, dy })
    }

    pub fn toggle_mic(&self) -> bool {
        self.bubble(BubbleEvent::ToggleMic)
    }

    pub fn toggle_screen_share(&self) -> bool {
        self.bubble(BubbleEvent::ToggleScreenShare)
    }

    pub fn close(&self) -> bool {
        self.bubble(BubbleEvent::Close)
    }

    pub fn submit_text(&self, text: impl Into<String>) -> bool {
        self.send(AssistantEvent::SubmitText(text.into()))
    }

    pub fn permissions_changed(&self) -> bool {
        self.send(AssistantEvent::PermissionsChanged)
    }

    pub fn shutdown(&self) -> bool {
        self.send(AssistantEvent::Shutdown)
    }

    /// Ask the loop for a status snapshot
    pub async fn status(&self) -> Option<AssistantStatus> {
        let (tx, rx) = oneshot::channel();
        if !self.send(AssistantEvent::Status(tx)) {
            return None;
        }
        rx.await.ok()
    }
}

pub struct Assistant {
    config: Config,
    gate: WakeGate,
    session: Option<Session>,
    services: SessionServices,
    credentials: Arc<dyn CredentialSource>,
    rooms: Arc<dyn RoomConnector>,
    permissions: Arc<dyn Permissions>,
    /// Credential fetch or room join for the current epoch
    in_flight: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<AssistantEvent>,
    events_rx: mpsc::UnboundedReceiver<AssistantEvent>,
}

impl Assistant {
    pub fn new(config: Config, platform: Platform) -> (Assistant, AssistantHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let resume_tx = events_tx.clone();
        let gate = WakeGate::new(
            platform.wake_engine,
            platform.notifier.clone(),
            platform.permissions.clone(),
            config.wake.restart_delay(),
            Arc::new(move |generation| {
                let _ = resume_tx.send(AssistantEvent::ResumeListening { generation });
            }),
        );

        let handle = AssistantHandle {
            events: events_tx.clone(),
        };
        let assistant = Assistant {
            config,
            gate,
            session: None,
            services: SessionServices {
                window_host: platform.window_host,
                consent: platform.consent,
                notifier: platform.notifier,
            },
            credentials: platform.credentials,
            rooms: platform.rooms,
            permissions: platform.permissions,
            in_flight: None,
            events_tx,
            events_rx,
        };
        (assistant, handle)
    }

    /// Run until shut down
    pub async fn run(mut self) {
        tracing::info!("Assistant starting");

        let wake_tx = self.events_tx.clone();
        let on_wake = Arc::new(move || {
            let _ = wake_tx.send(AssistantEvent::Wake);
        });
        if self.gate.initialise(on_wake).is_ok() {
            self.gate.start_listening();
        }

        while let Some(event) = self.events_rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }

        self.stop();
        tracing::info!("Assistant stopped");
    }

    /// Handle one event. Returns `false` once the loop should stop.
    fn handle_event(&mut self, event: AssistantEvent) -> bool {
        tracing::trace!("Assistant event: {}", event.name());

        match event {
            AssistantEvent::Wake => self.on_wake(),
            AssistantEvent::PermissionsChanged => self.on_permissions_changed(),
            AssistantEvent::CredentialsFetched { epoch, result } => {
                self.on_credentials(epoch, result)
            }
            AssistantEvent::RoomConnected { epoch, result } => self.on_room_connected(epoch, result),
            AssistantEvent::Room { epoch, event } => self.on_room_event(epoch, event),
            AssistantEvent::Bubble(event) => {
                self.with_session(None, |session| session.on_bubble_event(event))
            }
            AssistantEvent::SubmitText(text) => {
                self.with_session(None, |session| session.submit_text(&text))
            }
            AssistantEvent::CaptureGrant { epoch, grant } => {
                self.with_session(Some(epoch), |session| session.on_capture_grant(grant))
            }
            AssistantEvent::CaptureFinished { epoch, result } => {
                self.with_session(Some(epoch), |session| session.on_capture_finished(result))
            }
            AssistantEvent::GuidanceDismiss { epoch, generation } => {
                self.with_session(Some(epoch), |session| {
                    session.on_guidance_dismiss(generation);
                    SessionOutcome::Continue
                })
            }
            AssistantEvent::InactivityTimeout { epoch, generation } => self
                .with_session(Some(epoch), |session| {
                    session.on_inactivity_timeout(generation)
                }),
            AssistantEvent::ResumeListening { generation } => {
                self.gate.on_resume_timer(generation);
            }
            AssistantEvent::Status(reply) => {
                let _ = reply.send(self.status());
            }
            AssistantEvent::Shutdown => {
                tracing::info!("Shutdown requested");
                return false;
            }
        }
        true
    }

    fn on_wake(&mut self) {
        let Some(epoch) = self.gate.on_wake() else {
            return;
        };

        let credentials = self.credentials.clone();
        let events = self.events_tx.clone();
        let timeout_secs = self.config.session.token_timeout_secs;
        self.replace_in_flight(tokio::spawn(async move {
            let result = match tokio::time::timeout(
                std::time::Duration::from_secs(timeout_secs),
                credentials.fetch(),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(TokenError::Timeout(timeout_secs)),
            };
            let _ = events.send(AssistantEvent::CredentialsFetched { epoch, result });
        }));
    }

    fn on_permissions_changed(&mut self) {
        if self.session.is_some() && !self.permissions.overlay_granted() {
            tracing::warn!("Overlay permission revoked during session");
            self.end_session(CloseReason::OverlayDenied);
            return;
        }
        if self.gate.state() == GateState::Idle && !self.gate.is_listening() {
            self.gate.start_listening();
        }
    }

    fn on_credentials(&mut self, epoch: u64, result: Result<SessionCredentials, TokenError>) {
        if self.gate.active_epoch() != Some(epoch) || self.session.is_some() {
            tracing::debug!("Dropping credentials for ended session {}", epoch);
            return;
        }
        self.in_flight = None;

        let credentials = match result {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::error!("Failed to fetch session token: {}", e);
                self.services
                    .notifier
                    .notify(Notice::error(format!("Failed to get session token: {}", e)));
                self.gate.end_session(epoch);
                return;
            }
        };

        if !self.permissions.overlay_granted() {
            tracing::warn!("Overlay permission missing, cannot show the assistant");
            if let Some(notice) = CloseReason::OverlayDenied.notice() {
                self.services.notifier.notify(notice);
            }
            self.gate.end_session(epoch);
            return;
        }

        let session = match Session::start(
            epoch,
            self.config.clone(),
            self.services.clone(),
            self.events_tx.clone(),
        ) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("Failed to show the assistant bubble: {}", e);
                if let Some(notice) = CloseReason::OverlayDenied.notice() {
                    self.services.notifier.notify(notice);
                }
                self.gate.end_session(epoch);
                return;
            }
        };
        self.session = Some(session);
        self.services.notifier.set_status(ServiceStatus::InSession);

        let rooms = self.rooms.clone();
        let events = self.events_tx.clone();
        let room_events = self.events_tx.clone();
        self.replace_in_flight(tokio::spawn(async move {
            let sink: RoomEventSink = Arc::new(move |event: RoomEvent| {
                let _ = room_events.send(AssistantEvent::Room { epoch, event });
            });
            let result = rooms.connect(credentials, sink).await;
            let _ = events.send(AssistantEvent::RoomConnected { epoch, result });
        }));
    }

    fn on_room_connected(
        &mut self,
        epoch: u64,
        result: Result<Arc<dyn RoomConnection>, ConnectError>,
    ) {
        if self.session_epoch() != Some(epoch) {
            if let Ok(connection) = result {
                tracing::debug!("Leaving room joined for ended session {}", epoch);
                connection.disconnect();
            }
            return;
        }
        self.in_flight = None;

        self.with_session(Some(epoch), |session| match result {
            Ok(connection) => session.attach(connection),
            Err(e) => {
                tracing::error!("Failed to join room: {}", e);
                SessionOutcome::Close(CloseReason::ConnectFailed(e.to_string()))
            }
        });
    }

    fn on_room_event(&mut self, epoch: u64, event: RoomEvent) {
        if self.session_epoch() == Some(epoch) {
            self.with_session(Some(epoch), |session| session.on_room_event(event));
            return;
        }

        // Remote callers always get an answer
        if let RoomEvent::Rpc { method, reply, .. } = event {
            tracing::debug!("RPC {} arrived after session {} ended", method, epoch);
            let _ = reply.send(Err(RpcError::application("No active session")));
        }
    }

    /// Run `f` against the session if it matches `epoch` (any session when
    /// `None`), then act on the outcome
    fn with_session<F>(&mut self, epoch: Option<u64>, f: F)
    where
        F: FnOnce(&mut Session) -> SessionOutcome,
    {
        let Some(session) = self.session.as_mut() else {
            tracing::debug!("No active session, event dropped");
            return;
        };
        if epoch.is_some_and(|e| e != session.epoch()) {
            tracing::debug!("Event for ended session {:?} dropped", epoch);
            return;
        }

        if let SessionOutcome::Close(reason) = f(session) {
            self.end_session(reason);
        }
    }

    fn end_session(&mut self, reason: CloseReason) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        let Some(session) = self.session.take() else {
            return;
        };

        let epoch = session.epoch();
        tracing::info!("Ending session {}: {:?}", epoch, reason);
        session.teardown();

        if let Some(notice) = reason.notice() {
            self.services.notifier.notify(notice);
        }
        self.gate.end_session(epoch);
    }

    fn stop(&mut self) {
        self.end_session(CloseReason::User);
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        self.gate.shutdown();
    }

    fn replace_in_flight(&mut self, task: JoinHandle<()>) {
        if let Some(previous) = self.in_flight.replace(task) {
            previous.abort();
        }
    }

    fn session_epoch(&self) -> Option<u64> {
        self.session.as_ref().map(Session::epoch)
    }

    fn status(&self) -> AssistantStatus {
        AssistantStatus {
            gate: self.gate.state(),
            listening: self.gate.is_listening(),
            shut_down: self.gate.is_shut_down(),
            session: self.session.as_ref().map(Session::status),
        }
    }
}
