//! System tray: the desktop's persistent status line and "Stop" action

use tauri::{
    image::Image,
    menu::{MenuBuilder, MenuItem, MenuItemBuilder, PredefinedMenuItem},
    tray::TrayIconBuilder,
    AppHandle, Manager, Wry,
};

use crate::assistant::AssistantHandle;
use crate::notice::{LogNotifier, Notice, Notifier, ServiceStatus};

const TRAY_ICON_PNG: &[u8] = include_bytes!("../../icons/icon.png");

const TRAY_ID: &str = "main";

/// Menu item IDs
mod menu_ids {
    pub const STATUS: &str = "status";
    pub const STOP: &str = "stop";
}

// =============================================================================
// Tray Setup
// =============================================================================

/// Build the tray and return the notifier that keeps it current
pub fn setup_tray(app: &tauri::App) -> Result<TrayNotifier, Box<dyn std::error::Error>> {
    let status = MenuItemBuilder::with_id(menu_ids::STATUS, ServiceStatus::Stopped.description())
        .enabled(false)
        .build(app)?;
    let stop = MenuItemBuilder::with_id(menu_ids::STOP, "Stop Solus").build(app)?;

    let menu = MenuBuilder::new(app)
        .item(&status)
        .item(&PredefinedMenuItem::separator(app)?)
        .item(&stop)
        .build()?;

    TrayIconBuilder::with_id(TRAY_ID)
        .icon(Image::from_bytes(TRAY_ICON_PNG)?)
        .menu(&menu)
        .tooltip("Solus")
        .show_menu_on_left_click(true)
        .on_menu_event(move |app, event| {
            if event.id().0 == menu_ids::STOP {
                tracing::info!("Stop requested from tray");
                // The assistant loop exits the app once it has wound down
                let stopping = app
                    .try_state::<AssistantHandle>()
                    .is_some_and(|handle| handle.shutdown());
                if !stopping {
                    app.exit(0);
                }
            }
        })
        .build(app)?;

    tracing::info!("System tray initialised");

    Ok(TrayNotifier {
        app: app.handle().clone(),
        status,
    })
}

// =============================================================================
// Notifier
// =============================================================================

/// Shows the service status in the tray menu and the latest notice as the
/// tray tooltip
pub struct TrayNotifier {
    app: AppHandle,
    status: MenuItem<Wry>,
}

impl Notifier for TrayNotifier {
    fn notify(&self, notice: Notice) {
        LogNotifier.notify(notice.clone());
        if let Some(tray) = self.app.tray_by_id(TRAY_ID) {
            let tooltip = format!("Solus\n{}", notice.message);
            if let Err(e) = tray.set_tooltip(Some(tooltip)) {
                tracing::warn!("Failed to update tray tooltip: {}", e);
            }
        }
    }

    fn set_status(&self, status: ServiceStatus) {
        LogNotifier.set_status(status);
        if let Err(e) = self.status.set_text(status.description()) {
            tracing::warn!("Failed to update tray status: {}", e);
        }
    }
}
