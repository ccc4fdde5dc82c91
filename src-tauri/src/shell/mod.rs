//! Desktop shell
//!
//! Hosts the assistant inside a Tauri app with no main window: overlay
//! surfaces become borderless always-on-top webview windows, the tray stands
//! in for the persistent status notification and a global shortcut stands in
//! for the wake word.

pub mod commands;
pub mod consent;
pub mod tray;
pub mod wake;
pub mod window_host;

use anyhow::Context;
use std::sync::Arc;
use tauri::Manager;

use crate::assistant::{Assistant, Platform};
use crate::config;
use crate::notice::{AlwaysGranted, LogNotifier, Notifier};
use crate::session::connection::{RoomConnector, UnlinkedRoomConnector};
use crate::session::TokenClient;

use consent::DialogConsent;
use wake::ShortcutWakeEngine;
use window_host::TauriWindowHost;

/// Run the desktop app without a room transport
pub fn run() {
    run_with_rooms(Arc::new(UnlinkedRoomConnector));
}

/// Run the desktop app, joining rooms through `rooms`
pub fn run_with_rooms(rooms: Arc<dyn RoomConnector>) {
    crate::init_logging();

    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|_app, _argv, _cwd| {
            tracing::info!("Solus is already running");
        }))
        .plugin(tauri_plugin_global_shortcut::Builder::new().build())
        .plugin(tauri_plugin_dialog::init())
        .setup(move |app| {
            tracing::info!("Solus starting");
            let cfg = config::get_config();

            // Tray only, no dock icon
            #[cfg(target_os = "macos")]
            app.set_activation_policy(tauri::ActivationPolicy::Accessory);

            let notifier: Arc<dyn Notifier> = if cfg.general.show_status_notification {
                Arc::new(tray::setup_tray(app)?)
            } else {
                Arc::new(LogNotifier)
            };

            let handle = app.handle().clone();
            let window_host = Arc::new(TauriWindowHost::new(handle.clone(), cfg.bubble.size_px));
            let credentials = TokenClient::from_config(&cfg.session)
                .context("Failed to build token client")?;

            let platform = Platform {
                window_host: window_host.clone(),
                wake_engine: Box::new(ShortcutWakeEngine::new(
                    handle.clone(),
                    cfg.wake.shortcut.clone(),
                )),
                credentials: Arc::new(credentials),
                rooms: rooms.clone(),
                consent: Arc::new(DialogConsent::new(handle.clone())),
                notifier,
                permissions: Arc::new(AlwaysGranted),
            };

            let (assistant, assistant_handle) = Assistant::new(cfg, platform);
            app.manage(window_host);
            app.manage(assistant_handle);

            tauri::async_runtime::spawn(async move {
                assistant.run().await;
                tracing::info!("Assistant stopped, exiting");
                handle.exit(0);
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::surface_content,
            commands::bubble_tap,
            commands::bubble_drag,
            commands::toggle_mic,
            commands::toggle_screen_share,
            commands::close_assistant,
            commands::submit_text,
            commands::assistant_status,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|_app, event| {
            // Overlay windows come and go; destroying the last one must not
            // end the app. Explicit exits carry a code.
            if let tauri::RunEvent::ExitRequested { code: None, api, .. } = event {
                api.prevent_exit();
            }
        });
}
