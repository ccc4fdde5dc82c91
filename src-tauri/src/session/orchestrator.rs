//! Session orchestration
//!
//! Wires one room connection to the session's bubble and guidance renderer:
//! answers the guidance RPCs, forwards microphone and screen-share toggles
//! to the connection and collects the live transcript.

use super::capture::{acquire_screen_track, CaptureError, CaptureGrant};
use super::connection::{
    ConnectError, RoomConnection, RpcError, TranscriptionSegment, METHOD_CLEAR_GUIDANCE,
    METHOD_DISPLAY_GUIDANCE, METHOD_IS_GUIDANCE_ACTIVE,
};
use super::transcript::{TranscriptLog, Upsert};
use crate::bubble::ConnectionStatus;
use crate::config::CaptureConfig;
use crate::geometry::ScreenMetrics;
use crate::guidance::{parse_payload, GuidanceRenderer, GuidanceRequest};
use crate::notice::{Notice, Notifier};
use crate::overlay::OverlayWindowController;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What the guidance RPCs operate on
pub struct GuidanceTarget<'a> {
    pub renderer: &'a mut GuidanceRenderer,
    pub controller: &'a mut OverlayWindowController,
    pub metrics: ScreenMetrics,
    pub notifier: &'a dyn Notifier,
    pub debug: bool,
}

pub struct SessionOrchestrator {
    connection: Option<Arc<dyn RoomConnection>>,
    status: ConnectionStatus,
    local_identity: String,
    transcript: TranscriptLog,
    capture_task: Option<JoinHandle<()>>,
}

impl Default for SessionOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionOrchestrator {
    pub fn new() -> Self {
        Self {
            connection: None,
            status: ConnectionStatus::Connecting,
            local_identity: String::new(),
            transcript: TranscriptLog::new(),
            capture_task: None,
        }
    }

    /// Take over a freshly joined room and apply the current mic state
    pub fn attach(
        &mut self,
        connection: Arc<dyn RoomConnection>,
        mic_on: bool,
    ) -> Result<(), ConnectError> {
        self.local_identity = connection.local_identity();
        self.status = ConnectionStatus::Connected;
        // Segments can arrive before the join is processed
        let retagged = self.transcript.retag(&self.local_identity);
        if retagged > 0 {
            tracing::debug!("Retagged {} early transcript entries as local", retagged);
        }
        connection.set_microphone_enabled(mic_on)?;
        self.connection = Some(connection);
        tracing::info!(
            "Joined room as {} (microphone {})",
            self.local_identity,
            if mic_on { "on" } else { "off" }
        );
        Ok(())
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn transcript(&self) -> &TranscriptLog {
        &self.transcript
    }

    /// Forward a mic toggle. Before the room is joined the state is applied
    /// on attach instead.
    pub fn set_microphone(&self, enabled: bool) {
        if let Some(connection) = &self.connection {
            if let Err(e) = connection.set_microphone_enabled(enabled) {
                tracing::warn!("Failed to toggle microphone: {}", e);
            }
        }
    }

    /// Start publishing the screen. `done` receives the outcome of track
    /// acquisition. Returns `false` when there is no room to publish to.
    pub fn start_screen_share<F>(
        &mut self,
        grant: CaptureGrant,
        config: CaptureConfig,
        done: F,
    ) -> bool
    where
        F: FnOnce(Result<u32, CaptureError>) + Send + 'static,
    {
        let Some(connection) = self.connection.clone() else {
            tracing::warn!("Cannot share the screen before the room is joined");
            return false;
        };

        self.abort_capture();
        self.capture_task = Some(tokio::spawn(async move {
            done(acquire_screen_track(connection, grant, config).await);
        }));
        true
    }

    /// Stop publishing the screen and free the capturer
    pub fn stop_screen_share(&mut self) {
        self.abort_capture();
        if let Some(connection) = &self.connection {
            connection.stop_screen_share();
            tracing::info!("Screen share stopped");
        }
    }

    pub fn on_transcription(&mut self, segment: TranscriptionSegment) -> Upsert {
        self.transcript.upsert(segment, &self.local_identity)
    }

    /// Send a typed message to the room and record it in the transcript
    pub fn send_chat(&mut self, text: &str) -> Result<(), ConnectError> {
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| ConnectError::Publish("not connected".to_string()))?;
        connection.send_chat(text)?;
        self.transcript.push_local_message(text);
        Ok(())
    }

    pub fn on_disconnected(&mut self) {
        self.abort_capture();
        self.connection = None;
        self.status = ConnectionStatus::Disconnected;
    }

    /// Leave the room, releasing capture and microphone resources first
    pub fn detach(&mut self) {
        self.abort_capture();
        if let Some(connection) = self.connection.take() {
            connection.stop_screen_share();
            if let Err(e) = connection.set_microphone_enabled(false) {
                tracing::debug!("Failed to mute before leaving: {}", e);
            }
            connection.disconnect();
            tracing::info!("Left room");
        }
        self.status = ConnectionStatus::Disconnected;
    }

    /// Answer a guidance RPC. Failures become structured errors and never
    /// escape as anything else.
    pub fn handle_rpc(
        &self,
        method: &str,
        payload: &str,
        target: GuidanceTarget<'_>,
    ) -> Result<String, RpcError> {
        tracing::debug!("RPC {} received", method);

        match method {
            METHOD_DISPLAY_GUIDANCE => {
                if target.debug {
                    tracing::info!("Guidance payload: {}", payload);
                }
                let parsed = parse_payload(payload).map_err(|e| {
                    tracing::warn!("Rejected guidance payload ({}): {}", e.code(), e);
                    RpcError::from(e)
                })?;
                let request = GuidanceRequest::from_payload(parsed, &target.metrics);

                target
                    .renderer
                    .display(request, target.controller)
                    .map_err(|e| {
                        target
                            .notifier
                            .notify(Notice::warning(format!("Could not show guidance: {}", e)));
                        RpcError::application(format!("Failed to display guidance: {}", e))
                    })?;
                Ok("Guidance displayed".to_string())
            }
            METHOD_CLEAR_GUIDANCE => {
                target.renderer.clear(target.controller);
                Ok("Guidance cleared".to_string())
            }
            METHOD_IS_GUIDANCE_ACTIVE => Ok(if target.renderer.is_active() {
                "active".to_string()
            } else {
                "inactive".to_string()
            }),
            other => {
                tracing::warn!("Unsupported RPC method {}", other);
                Err(RpcError::unsupported(other))
            }
        }
    }

    fn abort_capture(&mut self) {
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
    }
}

impl Drop for SessionOrchestrator {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuidanceConfig;
    use crate::notice::LogNotifier;
    use crate::overlay::{RecordingHost, SurfaceKind};
    use crate::session::connection::RPC_UNSUPPORTED_METHOD;
    use crate::session::transcript::Origin;

    struct Room;

    impl RoomConnection for Room {
        fn local_identity(&self) -> String {
            "me".to_string()
        }
        fn set_microphone_enabled(&self, _enabled: bool) -> Result<(), ConnectError> {
            Ok(())
        }
        fn start_screen_share(&self, _grant: &CaptureGrant) -> Result<(), CaptureError> {
            Ok(())
        }
        fn screen_track_ready(&self) -> bool {
            false
        }
        fn stop_screen_share(&self) {}
        fn send_chat(&self, _text: &str) -> Result<(), ConnectError> {
            Ok(())
        }
        fn disconnect(&self) {}
    }

    fn segment(id: &str, who: &str, text: &str, is_final: bool) -> TranscriptionSegment {
        TranscriptionSegment {
            id: id.to_string(),
            participant_identity: who.to_string(),
            text: text.to_string(),
            is_final,
        }
    }

    struct Fixture {
        host: Arc<RecordingHost>,
        controller: OverlayWindowController,
        renderer: GuidanceRenderer,
        orchestrator: SessionOrchestrator,
    }

    impl Fixture {
        fn new() -> Self {
            let metrics = ScreenMetrics::new(1000, 2000, 0);
            let host = Arc::new(RecordingHost::new(metrics));
            Self {
                controller: OverlayWindowController::new(host.clone()),
                host,
                renderer: GuidanceRenderer::new(
                    GuidanceConfig::default(),
                    metrics,
                    false,
                    Arc::new(|_| {}),
                ),
                orchestrator: SessionOrchestrator::new(),
            }
        }

        fn call(&mut self, method: &str, payload: &str) -> Result<String, RpcError> {
            self.orchestrator.handle_rpc(
                method,
                payload,
                GuidanceTarget {
                    renderer: &mut self.renderer,
                    controller: &mut self.controller,
                    metrics: ScreenMetrics::new(1000, 2000, 0),
                    notifier: &LogNotifier,
                    debug: false,
                },
            )
        }
    }

    const TAP_HERE: &str =
        r#"{"instruction_text":"Tap here","bounding_box":[100,100,200,200],"visual_cue_type":"arrow"}"#;

    #[tokio::test]
    async fn test_display_then_query_then_clear() {
        let mut f = Fixture::new();
        assert_eq!(f.call(METHOD_IS_GUIDANCE_ACTIVE, "").unwrap(), "inactive");

        assert_eq!(
            f.call(METHOD_DISPLAY_GUIDANCE, TAP_HERE).unwrap(),
            "Guidance displayed"
        );
        assert_eq!(f.call(METHOD_IS_GUIDANCE_ACTIVE, "").unwrap(), "active");
        assert!(f.host.surface(SurfaceKind::Guidance).is_some());

        assert_eq!(f.call(METHOD_CLEAR_GUIDANCE, "").unwrap(), "Guidance cleared");
        assert_eq!(f.call(METHOD_IS_GUIDANCE_ACTIVE, "").unwrap(), "inactive");
        assert_eq!(f.host.surface_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_leaves_state_untouched() {
        let mut f = Fixture::new();
        let err = f
            .call(METHOD_DISPLAY_GUIDANCE, r#"{"instruction_text":"Tap here"}"#)
            .unwrap_err();

        assert_eq!(err.code, 1002);
        assert!(!f.renderer.is_active());
        assert_eq!(f.host.surface_count(), 0);
    }

    #[tokio::test]
    async fn test_overlay_denied_becomes_rpc_error() {
        let mut f = Fixture::new();
        f.host.set_overlay_permitted(false);
        let err = f.call(METHOD_DISPLAY_GUIDANCE, TAP_HERE).unwrap_err();
        assert_eq!(err.code, crate::session::connection::RPC_APPLICATION_ERROR);
        assert!(!f.renderer.is_active());
    }

    #[tokio::test]
    async fn test_unknown_method_rejected() {
        let mut f = Fixture::new();
        let err = f.call("self-destruct", "{}").unwrap_err();
        assert_eq!(err.code, RPC_UNSUPPORTED_METHOD);
    }

    #[test]
    fn test_chat_requires_connection() {
        let mut orchestrator = SessionOrchestrator::new();
        assert!(orchestrator.send_chat("hello").is_err());
        assert!(orchestrator.transcript().is_empty());
    }

    #[test]
    fn test_speech_before_join_is_tagged_local_after_attach() {
        let mut orchestrator = SessionOrchestrator::new();
        orchestrator.on_transcription(segment("s1", "me", "open", false));
        orchestrator.on_transcription(segment("s2", "agent", "sure", true));

        orchestrator.attach(Arc::new(Room), true).unwrap();
        let entries = orchestrator.transcript().snapshot();
        assert_eq!(entries[0].origin, Origin::Local);
        assert_eq!(entries[1].origin, Origin::Remote);

        assert_eq!(
            orchestrator.on_transcription(segment("s1", "me", "open settings", true)),
            Upsert::Updated
        );
        let entries = orchestrator.transcript().snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].origin, Origin::Local);
        assert!(entries[0].is_final);
    }
}
