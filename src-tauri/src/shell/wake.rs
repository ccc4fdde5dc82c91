//! Global shortcut standing in for the wake word on desktops
//!
//! Desktops have no always-on keyword spotter, so pressing the configured
//! accelerator counts as hearing the wake word. "Spotting" is simply having
//! the shortcut registered.

use tauri::AppHandle;
use tauri_plugin_global_shortcut::{GlobalShortcutExt, Shortcut, ShortcutState};

use crate::wake::{WakeCallback, WakeEngine, WakeError};

pub struct ShortcutWakeEngine {
    app: AppHandle,
    accelerator: String,
    on_wake: Option<WakeCallback>,
    registered: bool,
}

impl ShortcutWakeEngine {
    pub fn new(app: AppHandle, accelerator: impl Into<String>) -> Self {
        Self {
            app,
            accelerator: accelerator.into(),
            on_wake: None,
            registered: false,
        }
    }
}

impl WakeEngine for ShortcutWakeEngine {
    fn initialise(&mut self, on_wake: WakeCallback) -> Result<(), WakeError> {
        self.accelerator.parse::<Shortcut>().map_err(|e| {
            WakeError::Engine(format!("Invalid shortcut '{}': {}", self.accelerator, e))
        })?;
        self.on_wake = Some(on_wake);
        tracing::info!("Wake shortcut: {}", self.accelerator);
        Ok(())
    }

    fn start(&mut self) -> Result<(), WakeError> {
        let on_wake = self.on_wake.clone().ok_or(WakeError::NotInitialised)?;
        if self.registered {
            return Ok(());
        }

        self.app
            .global_shortcut()
            .on_shortcut(self.accelerator.as_str(), move |_app, shortcut, event| {
                if matches!(event.state, ShortcutState::Pressed) {
                    tracing::debug!("Wake shortcut pressed: {:?}", shortcut);
                    on_wake();
                }
            })
            .map_err(|e| {
                WakeError::Engine(format!(
                    "Failed to register shortcut '{}': {}",
                    self.accelerator, e
                ))
            })?;
        self.registered = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), WakeError> {
        if !self.registered {
            return Ok(());
        }
        self.app
            .global_shortcut()
            .unregister(self.accelerator.as_str())
            .map_err(|e| {
                WakeError::Engine(format!(
                    "Failed to unregister shortcut '{}': {}",
                    self.accelerator, e
                ))
            })?;
        self.registered = false;
        Ok(())
    }

    fn release(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("{}", e);
        }
        self.on_wake = None;
    }
}
