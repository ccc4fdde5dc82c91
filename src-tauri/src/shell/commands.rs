//! Tauri commands invoked by the overlay pages

use std::sync::Arc;
use tauri::State;

use crate::assistant::{AssistantHandle, AssistantStatus};
use crate::overlay::{SurfaceContent, SurfaceKind};

use super::window_host::TauriWindowHost;

const LOOP_STOPPED: &str = "Assistant is not running";

fn sent(ok: bool) -> Result<(), String> {
    if ok {
        Ok(())
    } else {
        Err(LOOP_STOPPED.to_string())
    }
}

/// Current content for the window with the given label
#[tauri::command]
pub fn surface_content(
    host: State<'_, Arc<TauriWindowHost>>,
    label: &str,
) -> Result<Option<SurfaceContent>, String> {
    let kind = match label {
        "bubble" => SurfaceKind::Bubble,
        "guidance" => SurfaceKind::Guidance,
        other => return Err(format!("Unknown surface: {}", other)),
    };
    Ok(host.content(kind))
}

#[tauri::command]
pub fn bubble_tap(handle: State<'_, AssistantHandle>) -> Result<(), String> {
    sent(handle.tap())
}

#[tauri::command]
pub fn bubble_drag(handle: State<'_, AssistantHandle>, dx: i32, dy: i32) -> Result<(), String> {
    sent(handle.drag(dx, dy))
}

#[tauri::command]
pub fn toggle_mic(handle: State<'_, AssistantHandle>) -> Result<(), String> {
    sent(handle.toggle_mic())
}

#[tauri::command]
pub fn toggle_screen_share(handle: State<'_, AssistantHandle>) -> Result<(), String> {
    sent(handle.toggle_screen_share())
}

#[tauri::command]
pub fn close_assistant(handle: State<'_, AssistantHandle>) -> Result<(), String> {
    sent(handle.close())
}

#[tauri::command]
pub fn submit_text(handle: State<'_, AssistantHandle>, text: String) -> Result<(), String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }
    sent(handle.submit_text(text))
}

#[tauri::command]
pub async fn assistant_status(
    handle: State<'_, AssistantHandle>,
) -> Result<AssistantStatus, String> {
    handle.status().await.ok_or_else(|| LOOP_STOPPED.to_string())
}
