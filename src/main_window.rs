use tauri::{AppHandle, Manager, WebviewUrl, WebviewWindow, WebviewWindowBuilder};

use crate::{
    BackendSupervisor, ReadinessState, APP_TITLE, MAIN_WINDOW_HEIGHT, MAIN_WINDOW_LABEL,
    MAIN_WINDOW_WIDTH,
};

fn build_main_window(app_handle: &AppHandle) -> tauri::Result<WebviewWindow> {
    WebviewWindowBuilder::new(app_handle, MAIN_WINDOW_LABEL, WebviewUrl::default())
        .title(APP_TITLE)
        .inner_size(MAIN_WINDOW_WIDTH, MAIN_WINDOW_HEIGHT)
        .build()
}

fn get_or_build_main_window(app_handle: &AppHandle) -> Option<WebviewWindow> {
    if let Some(window) = app_handle.get_webview_window(MAIN_WINDOW_LABEL) {
        return Some(window);
    }
    match build_main_window(app_handle) {
        Ok(window) => Some(window),
        Err(error) => {
            tracing::error!(target: "runtime", "failed to create main window: {error}");
            None
        }
    }
}

pub(crate) fn navigate_main_window_to_backend(
    window: &WebviewWindow,
    backend_url: &str,
) -> Result<(), String> {
    let target = serde_json::to_string(backend_url)
        .map_err(|error| format!("Failed to encode backend url: {error}"))?;
    window
        .eval(&format!("window.location.replace({target});"))
        .map_err(|error| format!("Failed to navigate main window to backend: {error}"))
}

pub(crate) fn focus_main_window(app_handle: &AppHandle) {
    let Some(window) = get_or_build_main_window(app_handle) else {
        return;
    };
    if let Err(error) = window.unminimize() {
        tracing::debug!(target: "runtime", "failed to unminimize main window: {error}");
    }
    if let Err(error) = window.show() {
        tracing::warn!(target: "runtime", "failed to show main window: {error}");
    }
    if let Err(error) = window.set_focus() {
        tracing::debug!(target: "runtime", "failed to focus main window: {error}");
    }
}

/// Points the main window at the ready backend and brings it forward.
pub(crate) fn reveal_backend(app_handle: &AppHandle, backend_url: &str) {
    let Some(window) = get_or_build_main_window(app_handle) else {
        return;
    };
    match navigate_main_window_to_backend(&window, backend_url) {
        Ok(()) => tracing::info!(target: "startup", url = backend_url, "main window revealed"),
        Err(error) => tracing::error!(target: "startup", "{error}"),
    }
    focus_main_window(app_handle);
}

/// Recreates the main window after all windows were closed while the shell
/// stayed resident.
pub(crate) fn restore_main_window(app_handle: &AppHandle, supervisor: &BackendSupervisor) {
    let existed = app_handle.get_webview_window(MAIN_WINDOW_LABEL).is_some();
    if !existed && supervisor.readiness() == ReadinessState::Ready {
        reveal_backend(app_handle, supervisor.backend_url());
    } else {
        focus_main_window(app_handle);
    }
}
