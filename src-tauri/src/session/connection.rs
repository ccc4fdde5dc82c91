//! Room connection boundary
//!
//! The conferencing SDK is consumed through [`RoomConnector`] and
//! [`RoomConnection`]. Everything the room pushes at us (transcriptions,
//! liveness, RPC invocations, disconnects) arrives as a [`RoomEvent`]
//! through the sink handed to `connect`, and is marshalled onto the
//! assistant loop before any state is touched.

use super::capture::{CaptureError, CaptureGrant};
use super::token::SessionCredentials;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Show a guidance annotation; payload is the guidance JSON
pub const METHOD_DISPLAY_GUIDANCE: &str = "display-navigation-guidance";
/// Remove the current guidance annotation
pub const METHOD_CLEAR_GUIDANCE: &str = "clear-navigation-guidance";
/// Answer "active" or "inactive"
pub const METHOD_IS_GUIDANCE_ACTIVE: &str = "is-guidance-active";

/// Error code for failures inside a handler
pub const RPC_APPLICATION_ERROR: u32 = 1500;
/// Error code for methods this client does not handle
pub const RPC_UNSUPPORTED_METHOD: u32 = 1400;

/// Structured error returned to the remote caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: u32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::new(RPC_APPLICATION_ERROR, message)
    }

    pub fn unsupported(method: &str) -> Self {
        Self::new(
            RPC_UNSUPPORTED_METHOD,
            format!("Unsupported method: {}", method),
        )
    }
}

impl From<crate::guidance::PayloadError> for RpcError {
    fn from(err: crate::guidance::PayloadError) -> Self {
        RpcError::new(err.code(), err.to_string())
    }
}

/// Where the reply to an RPC invocation goes
pub type RpcReply = oneshot::Sender<Result<String, RpcError>>;

/// A piece of live transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionSegment {
    /// Stable across interim and final versions of the same utterance
    pub id: String,
    pub participant_identity: String,
    pub text: String,
    pub is_final: bool,
}

/// Something the room pushed at us
#[derive(Debug)]
pub enum RoomEvent {
    Transcription(TranscriptionSegment),
    /// Liveness signal, such as the agent changing state or speaking
    Activity,
    Rpc {
        method: String,
        payload: String,
        reply: RpcReply,
    },
    Disconnected { reason: String },
}

/// Receives room events from SDK threads
pub type RoomEventSink = Arc<dyn Fn(RoomEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("Failed to connect to room: {0}")]
    Connect(String),

    #[error("Room connection lost: {0}")]
    Lost(String),

    #[error("Failed to publish: {0}")]
    Publish(String),
}

/// Joins rooms
#[async_trait]
pub trait RoomConnector: Send + Sync {
    async fn connect(
        &self,
        credentials: SessionCredentials,
        events: RoomEventSink,
    ) -> Result<Arc<dyn RoomConnection>, ConnectError>;
}

/// A joined room. Calls return once the SDK has queued the request.
pub trait RoomConnection: Send + Sync {
    /// Our own participant identity, to tell local speech from remote
    fn local_identity(&self) -> String;

    fn set_microphone_enabled(&self, enabled: bool) -> Result<(), ConnectError>;

    /// Begin capturing and publishing the screen with a consent grant
    fn start_screen_share(&self, grant: &CaptureGrant) -> Result<(), CaptureError>;

    /// Whether the screen track is being published
    fn screen_track_ready(&self) -> bool;

    /// Unpublish the screen and free the capturer. Safe when not sharing.
    fn stop_screen_share(&self);

    fn send_chat(&self, text: &str) -> Result<(), ConnectError>;

    /// Leave the room, releasing microphone and capture resources
    fn disconnect(&self);
}

/// Connector used when no conferencing SDK is linked into the build
#[derive(Debug, Default)]
pub struct UnlinkedRoomConnector;

#[async_trait]
impl RoomConnector for UnlinkedRoomConnector {
    async fn connect(
        &self,
        credentials: SessionCredentials,
        _events: RoomEventSink,
    ) -> Result<Arc<dyn RoomConnection>, ConnectError> {
        Err(ConnectError::Connect(format!(
            "no room transport available for {}",
            credentials.server_url
        )))
    }
}
