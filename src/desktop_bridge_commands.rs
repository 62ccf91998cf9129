use std::sync::Arc;

use tauri::State;

use crate::{BackendBridgeState, BackendSupervisor};

#[tauri::command]
pub(crate) fn desktop_bridge_get_backend_state(
    supervisor: State<'_, Arc<BackendSupervisor>>,
) -> BackendBridgeState {
    supervisor.bridge_state()
}
