use std::{
    process::ExitStatus,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use tokio::sync::watch;

use crate::{
    app_types::BackendBridgeState,
    backend_config::EndpointTarget,
    backend_process::{ProcessHandle, TerminationOutcome},
    backend_readiness::{GateOutcome, ReadinessPolicy, ReadinessProbe, ReadinessState},
    exit_state::{ExitStateMachine, ShutdownTrigger},
    Error, LaunchPlan, Result, PROBE_FAILURE_LOG_EVERY,
};

/// Owns the one backend process of this run and everything that observes it.
///
/// Shared through `Arc` between the startup task, the exit handlers and the
/// bridge commands. None of the mutexes is ever held across an `.await`.
#[derive(Debug)]
pub struct BackendSupervisor {
    backend_url: String,
    child: Mutex<Option<ProcessHandle>>,
    launched: AtomicBool,
    last_exit: Mutex<Option<ExitStatus>>,
    readiness: watch::Sender<ReadinessState>,
    shutdown: watch::Sender<bool>,
    exit_state: Mutex<ExitStateMachine>,
}

fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, name: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned: PoisonError<MutexGuard<'a, T>>| {
        tracing::warn!(target: "runtime", "{name} lock was poisoned; recovering");
        poisoned.into_inner()
    })
}

impl BackendSupervisor {
    pub fn new(endpoint: EndpointTarget) -> Self {
        Self {
            backend_url: endpoint.url(),
            child: Mutex::new(None),
            launched: AtomicBool::new(false),
            last_exit: Mutex::new(None),
            readiness: watch::Sender::new(ReadinessState::Polling),
            shutdown: watch::Sender::new(false),
            exit_state: Mutex::new(ExitStateMachine::default()),
        }
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Spawns the backend. Only the first call of a run may spawn.
    pub fn launch(&self, plan: &LaunchPlan) -> Result<u32> {
        if self.shutdown_requested() {
            self.mark_failed();
            return Err(Error::ShuttingDown);
        }
        if self.launched.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyLaunched);
        }

        let mut slot = lock_or_recover(&self.child, "backend process");
        // Shutdown raises the flag before taking this lock.
        if self.shutdown_requested() {
            drop(slot);
            self.mark_failed();
            return Err(Error::ShuttingDown);
        }

        match ProcessHandle::spawn(plan) {
            Ok(handle) => {
                let pid = handle.pid();
                *slot = Some(handle);
                Ok(pid)
            }
            Err(error) => {
                drop(slot);
                tracing::error!(target: "startup", "backend launch failed: {error}");
                self.mark_failed();
                Err(error)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        lock_or_recover(&self.child, "backend process")
            .as_ref()
            .is_some_and(ProcessHandle::is_running)
    }

    pub fn pid(&self) -> Option<u32> {
        lock_or_recover(&self.child, "backend process")
            .as_ref()
            .map(ProcessHandle::pid)
    }

    pub fn readiness(&self) -> ReadinessState {
        *self.readiness.borrow()
    }

    /// Only `Polling` can move; returns whether this call made the transition.
    fn transition_from_polling(&self, next: ReadinessState) -> bool {
        self.readiness.send_if_modified(|state| {
            if *state == ReadinessState::Polling {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    pub fn mark_ready(&self) -> bool {
        self.transition_from_polling(ReadinessState::Ready)
    }

    pub fn mark_failed(&self) -> bool {
        self.transition_from_polling(ReadinessState::Failed)
    }

    pub fn last_exit_status(&self) -> Option<ExitStatus> {
        *lock_or_recover(&self.last_exit, "backend exit status")
    }

    /// Reaps the backend without blocking. A process that exited on its own
    /// stops being tracked and its status is kept for the bridge state.
    pub fn poll_backend_exit(&self) -> Option<ExitStatus> {
        let mut slot = lock_or_recover(&self.child, "backend process");
        let handle = slot.as_mut()?;
        let pid = handle.pid();
        match handle.poll_exit() {
            Ok(Some(status)) => {
                *slot = None;
                drop(slot);
                *lock_or_recover(&self.last_exit, "backend exit status") = Some(status);
                Some(status)
            }
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(target: "runtime", pid, "failed to poll backend process: {error}");
                None
            }
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn is_quitting(&self) -> bool {
        lock_or_recover(&self.exit_state, "exit state").is_quitting()
    }

    pub fn shutdown_trigger(&self) -> Option<ShutdownTrigger> {
        lock_or_recover(&self.exit_state, "exit state").trigger()
    }

    /// Terminates the backend on behalf of any exit path.
    ///
    /// Safe to call any number of times from any thread. Only a tracked,
    /// still-running process is signalled, so later calls report `NotRunning`.
    pub fn request_shutdown(&self, trigger: ShutdownTrigger) -> TerminationOutcome {
        let first = lock_or_recover(&self.exit_state, "exit state").mark_quitting(trigger);
        if first {
            tracing::info!(target: "shutdown", %trigger, "shutdown requested");
        } else {
            tracing::debug!(target: "shutdown", %trigger, "shutdown already in progress");
        }

        self.shutdown.send_replace(true);
        if self.mark_failed() {
            tracing::info!(target: "shutdown", "backend never became ready before shutdown");
        }

        let handle = lock_or_recover(&self.child, "backend process").take();
        let outcome = match handle {
            Some(mut handle) => handle.terminate(),
            None => TerminationOutcome::NotRunning,
        };
        self.record_outcome(&outcome);
        outcome
    }

    fn record_outcome(&self, outcome: &TerminationOutcome) {
        match outcome {
            TerminationOutcome::Terminated { pid } => {
                tracing::info!(target: "shutdown", pid, "{outcome}");
            }
            TerminationOutcome::AlreadyExited { pid, status } => {
                *lock_or_recover(&self.last_exit, "backend exit status") = Some(*status);
                tracing::info!(target: "shutdown", pid, "{outcome}");
            }
            TerminationOutcome::NotRunning => {
                tracing::debug!(target: "shutdown", "{outcome}");
            }
            TerminationOutcome::Failed { pid, .. } => {
                tracing::error!(target: "shutdown", pid, "{outcome}");
            }
        }
    }

    /// Last-resort cleanup from a panic hook; gives up instead of blocking
    /// when another thread holds the process lock.
    pub fn terminate_on_panic(&self) {
        if let Ok(mut exit_state) = self.exit_state.try_lock() {
            exit_state.mark_quitting(ShutdownTrigger::Panic);
        }
        self.shutdown.send_replace(true);

        let handle = match self.child.try_lock() {
            Ok(mut slot) => slot.take(),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner().take(),
            Err(std::sync::TryLockError::WouldBlock) => {
                eprintln!("backend process lock busy during panic; skipping cleanup");
                return;
            }
        };
        if let Some(mut handle) = handle {
            let outcome = handle.terminate();
            eprintln!("panic cleanup: {outcome}");
        }
    }

    /// Polls the endpoint until it answers, then fires `on_ready` with the
    /// backend URL. `on_ready` runs at most once, and never after shutdown.
    pub async fn wait_until_ready<P, F>(
        &self,
        probe: &P,
        policy: &ReadinessPolicy,
        on_ready: F,
    ) -> GateOutcome
    where
        P: ReadinessProbe,
        F: FnOnce(&str),
    {
        let mut shutdown_rx = self.shutdown.subscribe();
        let started = tokio::time::Instant::now();
        let mut attempts: u32 = 0;

        let outcome = loop {
            if *shutdown_rx.borrow_and_update() {
                break GateOutcome::Cancelled { attempts };
            }
            if let Some(status) = self.poll_backend_exit() {
                tracing::error!(
                    target: "startup",
                    attempts,
                    "backend exited before becoming ready ({status})"
                );
                break GateOutcome::BackendExited { status };
            }
            attempts = attempts.saturating_add(1);
            match probe.probe(&self.backend_url).await {
                Ok(()) => {
                    // A probe in flight when shutdown arrived must not reveal anything.
                    if *shutdown_rx.borrow_and_update() {
                        break GateOutcome::Cancelled { attempts };
                    }
                    break GateOutcome::Ready { attempts };
                }
                Err(failure) => {
                    if attempts == 1 || attempts % PROBE_FAILURE_LOG_EVERY == 0 {
                        tracing::info!(
                            target: "startup",
                            attempts,
                            url = %self.backend_url,
                            "waiting for backend: {failure}"
                        );
                    } else {
                        tracing::debug!(target: "startup", attempts, "waiting for backend: {failure}");
                    }
                    if policy
                        .max_attempts
                        .is_some_and(|max_attempts| attempts >= max_attempts.get())
                    {
                        tracing::error!(
                            target: "startup",
                            attempts,
                            "backend did not become ready within the attempt limit"
                        );
                        break GateOutcome::AttemptsExhausted { attempts };
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(policy.poll_interval) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break GateOutcome::Cancelled { attempts };
                    }
                }
            }
        };

        match outcome {
            GateOutcome::Ready { attempts } => {
                if self.mark_ready() {
                    tracing::info!(
                        target: "startup",
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        url = %self.backend_url,
                        "backend is ready"
                    );
                    on_ready(&self.backend_url);
                    outcome
                } else {
                    // Shutdown won the race for the state; nothing is revealed.
                    GateOutcome::Cancelled { attempts }
                }
            }
            GateOutcome::Cancelled { attempts } => {
                self.mark_failed();
                tracing::info!(target: "startup", attempts, "readiness polling stopped by shutdown");
                outcome
            }
            GateOutcome::BackendExited { .. } | GateOutcome::AttemptsExhausted { .. } => {
                self.mark_failed();
                outcome
            }
        }
    }

    /// Launches the backend and runs the readiness gate for it.
    ///
    /// A launch error is returned before any probe is issued.
    pub async fn start<P, F>(
        &self,
        plan: &LaunchPlan,
        probe: &P,
        policy: &ReadinessPolicy,
        on_ready: F,
    ) -> Result<GateOutcome>
    where
        P: ReadinessProbe,
        F: FnOnce(&str),
    {
        let pid = self.launch(plan)?;
        tracing::info!(target: "startup", pid, url = %self.backend_url, "polling backend readiness");
        Ok(self.wait_until_ready(probe, policy, on_ready).await)
    }

    /// Keeps reaping the backend after it became ready. Returns the exit
    /// status if it exits on its own, or `None` once shutdown is requested.
    pub async fn watch_for_exit(&self, interval: Duration) -> Option<ExitStatus> {
        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            if *shutdown_rx.borrow_and_update() {
                return None;
            }
            if let Some(status) = self.poll_backend_exit() {
                tracing::error!(target: "runtime", "backend exited unexpectedly ({status})");
                return Some(status);
            }
            if self.pid().is_none() {
                return None;
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    pub fn bridge_state(&self) -> BackendBridgeState {
        BackendBridgeState {
            running: self.is_running(),
            readiness: self.readiness(),
            backend_url: self.backend_url.clone(),
            exit_status: self.last_exit_status().map(|status| status.to_string()),
            shutting_down: self.shutdown_requested(),
        }
    }
}

impl Drop for BackendSupervisor {
    fn drop(&mut self) {
        let slot = self
            .child
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(mut handle) = slot.take() {
            let outcome = handle.terminate();
            tracing::info!(target: "shutdown", "supervisor dropped: {outcome}");
        }
    }
}
