use std::{io, sync::Arc};

use crate::supervisor::BackendSupervisor;

/// Chains onto the current panic hook so a crashing shell still kills its backend.
pub fn install_panic_hook(supervisor: Arc<BackendSupervisor>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        eprintln!("desktop shell panicked: {info}");
        supervisor.terminate_on_panic();
        previous(info);
    }));
}

/// Resolves with the signal name once the process is asked to stop.
#[cfg(unix)]
pub async fn wait_for_termination_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = hangup.recv() => Ok("SIGHUP"),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_termination_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "Ctrl+C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend_config::EndpointTarget, exit_state::ShutdownTrigger};

    #[test]
    fn panic_hook_marks_supervisor_as_quitting() {
        let supervisor = Arc::new(BackendSupervisor::new(EndpointTarget::default()));
        install_panic_hook(Arc::clone(&supervisor));

        let result = std::thread::spawn(|| panic!("boom")).join();
        let _ = std::panic::take_hook();

        assert!(result.is_err());
        assert!(supervisor.shutdown_requested());
        assert_eq!(supervisor.shutdown_trigger(), Some(ShutdownTrigger::Panic));
    }
}
