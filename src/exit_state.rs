use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    WindowsClosed,
    QuitRequested,
    HostExit,
    Signal,
    Panic,
}

impl ShutdownTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WindowsClosed => "windows-closed",
            Self::QuitRequested => "quit-requested",
            Self::HostExit => "host-exit",
            Self::Signal => "signal",
            Self::Panic => "panic",
        }
    }
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remembers the first reason the shell started shutting down.
#[derive(Debug, Default)]
pub struct ExitStateMachine {
    trigger: Option<ShutdownTrigger>,
}

impl ExitStateMachine {
    /// Returns `true` only for the first trigger.
    pub fn mark_quitting(&mut self, trigger: ShutdownTrigger) -> bool {
        if self.trigger.is_some() {
            return false;
        }
        self.trigger = Some(trigger);
        true
    }

    pub fn is_quitting(&self) -> bool {
        self.trigger.is_some()
    }

    pub fn trigger(&self) -> Option<ShutdownTrigger> {
        self.trigger
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRequestDecision {
    Proceed,
    /// Keep the shell (and the backend) alive without windows.
    StayResident,
}

/// macOS applications keep running after their last window closes.
pub fn platform_keeps_running_without_windows() -> bool {
    cfg!(target_os = "macos")
}

/// `explicit_code` is `None` when the request comes from the last window closing.
pub fn decide_exit_request(
    keeps_running_without_windows: bool,
    explicit_code: Option<i32>,
    already_quitting: bool,
) -> ExitRequestDecision {
    if explicit_code.is_none() && keeps_running_without_windows && !already_quitting {
        ExitRequestDecision::StayResident
    } else {
        ExitRequestDecision::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_trigger_wins() {
        let mut state = ExitStateMachine::default();
        assert!(!state.is_quitting());

        assert!(state.mark_quitting(ShutdownTrigger::QuitRequested));
        assert!(!state.mark_quitting(ShutdownTrigger::HostExit));
        assert!(!state.mark_quitting(ShutdownTrigger::Signal));

        assert!(state.is_quitting());
        assert_eq!(state.trigger(), Some(ShutdownTrigger::QuitRequested));
    }

    #[test]
    fn decide_exit_request_table() {
        use ExitRequestDecision::{Proceed, StayResident};

        let cases = [
            (true, None, false, StayResident),
            (true, None, true, Proceed),
            (true, Some(0), false, Proceed),
            (false, None, false, Proceed),
            (false, Some(1), false, Proceed),
        ];
        for (keeps_running, code, quitting, expected) in cases {
            assert_eq!(
                decide_exit_request(keeps_running, code, quitting),
                expected,
                "keeps_running={keeps_running} code={code:?} quitting={quitting}"
            );
        }
    }

    #[test]
    fn trigger_names_are_stable() {
        assert_eq!(ShutdownTrigger::WindowsClosed.to_string(), "windows-closed");
        assert_eq!(ShutdownTrigger::Panic.as_str(), "panic");
    }
}
