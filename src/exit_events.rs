use std::sync::Arc;

use tauri::{AppHandle, ExitRequestApi, Manager};

use crate::{
    exit_cleanup::wait_for_termination_signal,
    exit_state::{decide_exit_request, platform_keeps_running_without_windows, ExitRequestDecision},
    BackendSupervisor, ShutdownTrigger,
};

pub(crate) fn handle_exit_requested(
    app_handle: &AppHandle,
    code: Option<i32>,
    api: &ExitRequestApi,
) {
    let supervisor = app_handle.state::<Arc<BackendSupervisor>>();
    match decide_exit_request(
        platform_keeps_running_without_windows(),
        code,
        supervisor.is_quitting(),
    ) {
        ExitRequestDecision::StayResident => {
            api.prevent_exit();
            tracing::info!(
                target: "shutdown",
                "last window closed; staying resident with the backend running"
            );
        }
        ExitRequestDecision::Proceed => {
            let trigger = if code.is_some() {
                ShutdownTrigger::QuitRequested
            } else {
                ShutdownTrigger::WindowsClosed
            };
            supervisor.request_shutdown(trigger);
        }
    }
}

pub(crate) fn handle_exit_event(app_handle: &AppHandle) {
    let supervisor = app_handle.state::<Arc<BackendSupervisor>>();
    supervisor.request_shutdown(ShutdownTrigger::HostExit);
    tracing::info!(target: "shutdown", "desktop process exiting");
}

/// Turns SIGINT/SIGTERM (Ctrl+C on Windows) into an orderly exit.
pub(crate) fn spawn_signal_listener(app_handle: AppHandle) {
    tauri::async_runtime::spawn(async move {
        match wait_for_termination_signal().await {
            Ok(signal) => {
                tracing::info!(target: "shutdown", signal, "termination signal received");
                let supervisor = app_handle.state::<Arc<BackendSupervisor>>();
                supervisor.request_shutdown(ShutdownTrigger::Signal);
                app_handle.exit(0);
            }
            Err(error) => {
                tracing::warn!(target: "shutdown", "failed to listen for termination signals: {error}");
            }
        }
    });
}
