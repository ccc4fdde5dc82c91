//! Wake gate
//!
//! Top-level mode switch between spotting the wake word (`Idle`) and running
//! one assistant session (`SessionActive`). The keyword spotter itself is a
//! black box behind [`WakeEngine`].
//!
//! ```text
//!            wake (spotting stops)
//! ┌──────┐ ─────────────────────────► ┌────────────────┐
//! │ IDLE │                            │ SESSION_ACTIVE │ ── wake: ignored
//! └──────┘ ◄───────────────────────── └────────────────┘
//!    ▲     session ended / fetch failed
//!    │     (spotting resumes after restart delay)
//!    └── shutdown: spotting stops for good, engine released
//! ```
//!
//! Each session gets a fresh epoch. Completions that carry an epoch other
//! than the current one belong to a session that has already ended and are
//! dropped by the caller.

use crate::notice::{Notice, Notifier, Permissions, ServiceStatus};
use crate::timer::OneShotTimer;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Invoked by the engine, from any thread, when the wake word is heard
pub type WakeCallback = Arc<dyn Fn() + Send + Sync>;

/// Invoked with the timer generation when spotting should resume
pub type ResumeCallback = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WakeError {
    #[error("Wake word engine not initialised")]
    NotInitialised,

    #[error("Wake word engine error: {0}")]
    Engine(String),
}

/// A keyword spotter
pub trait WakeEngine: Send {
    /// Load the keyword model and register the detection callback
    fn initialise(&mut self, on_wake: WakeCallback) -> Result<(), WakeError>;

    /// Begin spotting
    fn start(&mut self) -> Result<(), WakeError>;

    /// Pause spotting, keeping the model loaded
    fn stop(&mut self) -> Result<(), WakeError>;

    /// Free the engine. It must be initialised again before reuse.
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    #[default]
    Idle,
    SessionActive,
}

pub struct WakeGate {
    engine: Box<dyn WakeEngine>,
    notifier: Arc<dyn Notifier>,
    permissions: Arc<dyn Permissions>,
    state: GateState,
    /// Epoch of the current or most recent session
    epoch: u64,
    initialised: bool,
    listening: bool,
    shut_down: bool,
    restart_delay: Duration,
    resume_timer: OneShotTimer,
    on_resume: ResumeCallback,
}

impl WakeGate {
    pub fn new(
        engine: Box<dyn WakeEngine>,
        notifier: Arc<dyn Notifier>,
        permissions: Arc<dyn Permissions>,
        restart_delay: Duration,
        on_resume: ResumeCallback,
    ) -> Self {
        Self {
            engine,
            notifier,
            permissions,
            state: GateState::Idle,
            epoch: 0,
            initialised: false,
            listening: false,
            shut_down: false,
            restart_delay,
            resume_timer: OneShotTimer::new(),
            on_resume,
        }
    }

    /// Initialise the engine. Failures are reported to the user.
    pub fn initialise(&mut self, on_wake: WakeCallback) -> Result<(), WakeError> {
        match self.engine.initialise(on_wake) {
            Ok(()) => {
                self.initialised = true;
                tracing::info!("Wake word engine initialised");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to initialise wake word engine: {}", e);
                self.notifier.notify(Notice::error(format!(
                    "Error initialising wake word engine: {}",
                    e
                )));
                Err(e)
            }
        }
    }

    /// Start spotting if idle. Returns whether the engine is now listening.
    pub fn start_listening(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        if self.state == GateState::SessionActive {
            tracing::debug!("Session active, not resuming wake word spotting");
            return false;
        }
        if !self.permissions.microphone_granted() {
            tracing::warn!("Microphone permission missing, wake word spotting on hold");
            self.notifier
                .notify(Notice::warning("Microphone permission is required to listen"));
            self.notifier.set_status(ServiceStatus::WaitingForPermission);
            return false;
        }
        if !self.initialised {
            tracing::warn!("Wake word engine not initialised, cannot start listening");
            self.notifier.notify(Notice::warning("Wake word engine not ready."));
            return false;
        }
        if self.listening {
            tracing::debug!("Already listening");
            return true;
        }

        match self.engine.start() {
            Ok(()) => {
                self.listening = true;
                tracing::info!("Started listening for wake word");
                self.notifier.notify(Notice::info("Listening for wake word..."));
                self.notifier.set_status(ServiceStatus::Listening);
                true
            }
            Err(e) => {
                tracing::error!("Failed to start wake word engine: {}", e);
                self.notifier.notify(Notice::error(format!(
                    "Error starting wake word listener: {}",
                    e
                )));
                false
            }
        }
    }

    /// Pause spotting. A no-op when not listening.
    pub fn stop_listening(&mut self) {
        if !self.listening {
            tracing::debug!("Not currently listening");
            return;
        }

        match self.engine.stop() {
            Ok(()) => {
                self.listening = false;
                tracing::info!("Stopped listening for wake word");
            }
            Err(e) => {
                tracing::error!("Failed to stop wake word engine: {}", e);
                self.notifier.notify(Notice::error(format!(
                    "Error stopping wake word listener: {}",
                    e
                )));
            }
        }
    }

    /// Handle a wake signal. Returns the new session epoch, or `None` when
    /// the signal is ignored.
    pub fn on_wake(&mut self) -> Option<u64> {
        if self.shut_down {
            return None;
        }
        if self.state == GateState::SessionActive {
            tracing::info!("Wake word ignored, session {} already active", self.epoch);
            return None;
        }

        self.resume_timer.cancel();
        self.stop_listening();
        self.epoch += 1;
        self.state = GateState::SessionActive;
        tracing::info!("Wake word detected, starting session {}", self.epoch);
        self.notifier.set_status(ServiceStatus::Connecting);
        Some(self.epoch)
    }

    /// Return to idle after the session with `epoch` ended. Spotting resumes
    /// after the restart delay. Returns `false` for a stale epoch.
    pub fn end_session(&mut self, epoch: u64) -> bool {
        if self.state != GateState::SessionActive || epoch != self.epoch {
            tracing::debug!("Ignoring end of stale session {}", epoch);
            return false;
        }

        self.state = GateState::Idle;
        tracing::info!("Session {} ended, returning to idle", epoch);

        if !self.shut_down {
            let on_resume = self.on_resume.clone();
            self.resume_timer
                .arm(self.restart_delay, move |generation| on_resume(generation));
            self.notifier.set_status(ServiceStatus::Paused);
        }
        true
    }

    /// Handle the resume timer. Stale generations are ignored.
    pub fn on_resume_timer(&mut self, generation: u64) -> bool {
        if !self.resume_timer.accept(generation) {
            return false;
        }
        self.start_listening()
    }

    /// Stop for good: spotting stops, the engine is released and further
    /// wake signals are ignored
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.resume_timer.cancel();
        self.stop_listening();
        self.engine.release();
        self.initialised = false;
        self.listening = false;
        self.shut_down = true;
        self.state = GateState::Idle;
        self.notifier.set_status(ServiceStatus::Stopped);
        tracing::info!("Wake gate shut down");
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Epoch of the running session, if any
    pub fn active_epoch(&self) -> Option<u64> {
        (self.state == GateState::SessionActive).then_some(self.epoch)
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl Drop for WakeGate {
    fn drop(&mut self) {
        if !self.shut_down {
            self.engine.release();
        }
    }
}
