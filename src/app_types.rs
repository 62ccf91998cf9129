use serde::Serialize;

use crate::backend_readiness::ReadinessState;

/// Snapshot of the backend as seen by the loading page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendBridgeState {
    pub running: bool,
    pub readiness: ReadinessState,
    pub backend_url: String,
    pub exit_status: Option<String>,
    pub shutting_down: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_is_serialized_as_text() {
        let state = BackendBridgeState {
            running: false,
            readiness: ReadinessState::Ready,
            backend_url: "http://127.0.0.1:8501/".to_string(),
            exit_status: Some("exit status: 4".to_string()),
            shutting_down: true,
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["readiness"], "ready");
        assert_eq!(value["exitStatus"], "exit status: 4");
        assert_eq!(value["shuttingDown"], true);
    }
}
