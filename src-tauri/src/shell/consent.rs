//! Screen-capture consent as a native confirmation dialog

use async_trait::async_trait;
use tauri::AppHandle;
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};
use tokio::sync::oneshot;

use crate::session::capture::{CaptureConsent, CaptureGrant};

const CONSENT_TITLE: &str = "Share your screen?";
const CONSENT_MESSAGE: &str =
    "Solus will share your screen with the assistant until you stop sharing or the session ends.";

pub struct DialogConsent {
    app: AppHandle,
}

impl DialogConsent {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

#[async_trait]
impl CaptureConsent for DialogConsent {
    async fn request_grant(&self) -> Option<CaptureGrant> {
        let (tx, rx) = oneshot::channel();
        self.app
            .dialog()
            .message(CONSENT_MESSAGE)
            .title(CONSENT_TITLE)
            .kind(MessageDialogKind::Info)
            .buttons(MessageDialogButtons::OkCancel)
            .show(move |accepted| {
                let _ = tx.send(accepted);
            });

        match rx.await {
            Ok(true) => Some(CaptureGrant::new(uuid::Uuid::new_v4().to_string())),
            Ok(false) => {
                tracing::info!("Screen capture declined");
                None
            }
            Err(_) => {
                tracing::warn!("Consent dialog closed without an answer");
                None
            }
        }
    }
}
