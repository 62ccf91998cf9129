use std::{
    env, fmt,
    process::{Child, Command, ExitStatus, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    output_drain::{spawn_output_drain, OutputStream},
    process_control::stop_child_process,
    Error, LaunchPlan, Result,
};

/// Result of asking a tracked backend process to terminate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// A kill signal was sent and the process was reaped.
    Terminated { pid: u32 },
    /// The process had already exited; no signal was sent.
    AlreadyExited { pid: u32, status: ExitStatus },
    /// No process was tracked.
    NotRunning,
    Failed { pid: u32, reason: String },
}

impl TerminationOutcome {
    pub fn signal_sent(&self) -> bool {
        matches!(self, Self::Terminated { .. })
    }
}

impl fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminated { pid } => write!(f, "backend process {pid} terminated"),
            Self::AlreadyExited { pid, status } => {
                write!(f, "backend process {pid} had already exited ({status})")
            }
            Self::NotRunning => f.write_str("no backend process was running"),
            Self::Failed { pid, reason } => {
                write!(f, "failed to terminate backend process {pid}: {reason}")
            }
        }
    }
}

const DRAIN_FLUSH_GRACE: Duration = Duration::from_millis(500);

/// The spawned backend. Its stdout/stderr pipes are owned by drain threads.
pub struct ProcessHandle {
    child: Child,
    pid: u32,
    exit_status: Option<ExitStatus>,
    drains: Vec<JoinHandle<()>>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("exit_status", &self.exit_status)
            .field("drains", &self.drains.len())
            .finish()
    }
}

impl ProcessHandle {
    pub fn spawn(plan: &LaunchPlan) -> Result<Self> {
        if let Some(executable) = plan.executable_to_verify() {
            if !executable.is_file() {
                return Err(Error::ExecutableMissing(executable.to_path_buf()));
            }
        }

        let mut command = Command::new(&plan.cmd);
        command
            .args(&plan.args)
            .current_dir(&plan.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("PYTHONUNBUFFERED", "1")
            .env(
                "PYTHONUTF8",
                env::var("PYTHONUTF8").unwrap_or_else(|_| "1".to_string()),
            )
            .env(
                "PYTHONIOENCODING",
                env::var("PYTHONIOENCODING").unwrap_or_else(|_| "utf-8".to_string()),
            );

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(crate::CREATE_NO_WINDOW);
        }

        let mut child = command.spawn().map_err(|source| Error::Spawn {
            command: plan.debug_command(),
            source,
        })?;
        let pid = child.id();

        let mut drains = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            match spawn_output_drain(stdout, OutputStream::Stdout, pid) {
                Ok(handle) => drains.push(handle),
                Err(error) => tracing::warn!(target: "startup", pid, "failed to start stdout drain: {error}"),
            }
        }
        if let Some(stderr) = child.stderr.take() {
            match spawn_output_drain(stderr, OutputStream::Stderr, pid) {
                Ok(handle) => drains.push(handle),
                Err(error) => tracing::warn!(target: "startup", pid, "failed to start stderr drain: {error}"),
            }
        }

        tracing::info!(
            target: "startup",
            pid,
            mode = %plan.mode,
            cwd = %plan.cwd.display(),
            command = ?plan.debug_command(),
            "backend process spawned"
        );

        Ok(Self {
            child,
            pid,
            exit_status: None,
            drains,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_running(&self) -> bool {
        self.exit_status.is_none()
    }

    /// Non-blocking reap; records the exit status once the process is gone.
    pub fn poll_exit(&mut self) -> std::io::Result<Option<ExitStatus>> {
        if let Some(status) = self.exit_status {
            return Ok(Some(status));
        }
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.exit_status = status;
        }
        Ok(status)
    }

    /// Signals the process only when no exit status is known yet.
    pub fn terminate(&mut self) -> TerminationOutcome {
        let pid = self.pid;
        match self.poll_exit() {
            Ok(Some(status)) => {
                self.finish_drains(DRAIN_FLUSH_GRACE);
                return TerminationOutcome::AlreadyExited { pid, status };
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(target: "shutdown", pid, "failed to poll backend status before termination: {error}");
            }
        }

        match stop_child_process(&mut self.child) {
            Ok(status) => {
                self.exit_status = Some(status);
                self.finish_drains(DRAIN_FLUSH_GRACE);
                TerminationOutcome::Terminated { pid }
            }
            Err(reason) => TerminationOutcome::Failed { pid, reason },
        }
    }

    /// Joins the drain threads so the backend's last lines reach the log.
    ///
    /// A grandchild that inherited the pipes can keep them open, so threads
    /// still running after `grace` are detached instead of joined.
    fn finish_drains(&mut self, grace: Duration) {
        let deadline = Instant::now() + grace;
        while self.drains.iter().any(|drain| !drain.is_finished()) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        for drain in self.drains.drain(..) {
            if !drain.is_finished() {
                tracing::debug!(target: "shutdown", pid = self.pid, "backend output still open; detaching drain");
                continue;
            }
            if drain.join().is_err() {
                tracing::warn!(target: "shutdown", pid = self.pid, "backend output drain panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::DeploymentMode;

    #[cfg(unix)]
    fn shell_plan(script: &str) -> LaunchPlan {
        LaunchPlan {
            cmd: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            cwd: std::env::temp_dir(),
            mode: DeploymentMode::Development,
        }
    }

    #[test]
    fn spawn_fails_fast_for_missing_executable() {
        let plan = LaunchPlan {
            cmd: PathBuf::from("/definitely/missing/tallyenv/bin/python")
                .to_string_lossy()
                .to_string(),
            args: Vec::new(),
            cwd: std::env::temp_dir(),
            mode: DeploymentMode::Development,
        };
        assert!(matches!(
            ProcessHandle::spawn(&plan),
            Err(Error::ExecutableMissing(path)) if path.ends_with("python")
        ));
    }

    #[test]
    fn spawn_reports_unresolvable_program() {
        let plan = LaunchPlan {
            cmd: "tally-backend-that-does-not-exist".to_string(),
            args: Vec::new(),
            cwd: std::env::temp_dir(),
            mode: DeploymentMode::Packaged,
        };
        match ProcessHandle::spawn(&plan) {
            Err(Error::Spawn { command, .. }) => {
                assert_eq!(command, vec!["tally-backend-that-does-not-exist"]);
            }
            other => panic!("expected spawn error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn terminate_is_signal_then_noop_on_exited_process() {
        let mut handle = ProcessHandle::spawn(&shell_plan("sleep 30")).unwrap();
        assert!(handle.is_running());

        let first = handle.terminate();
        assert_eq!(first, TerminationOutcome::Terminated { pid: handle.pid() });
        assert!(!handle.is_running());

        let second = handle.terminate();
        assert!(matches!(second, TerminationOutcome::AlreadyExited { .. }));
        assert!(!second.signal_sent());
    }

    #[cfg(unix)]
    #[test]
    fn self_exited_process_is_not_signalled() {
        let mut handle = ProcessHandle::spawn(&shell_plan("echo started; exit 3")).unwrap();
        let mut status = None;
        for _ in 0..200 {
            status = handle.poll_exit().unwrap();
            if status.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(25));
        }
        assert_eq!(status.and_then(|status| status.code()), Some(3));
        assert!(matches!(
            handle.terminate(),
            TerminationOutcome::AlreadyExited { status, .. } if status.code() == Some(3)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn termination_joins_finished_output_drains() {
        let mut handle =
            ProcessHandle::spawn(&shell_plan("echo last words; exec sleep 30")).unwrap();
        assert_eq!(handle.drains.len(), 2);

        assert!(handle.terminate().signal_sent());
        assert!(handle.drains.is_empty());
    }
}
