use std::process::{Child, ExitStatus};

/// Kills the child (its whole tree on Windows) and reaps it.
#[cfg(target_os = "windows")]
pub(crate) fn stop_child_process(child: &mut Child) -> Result<ExitStatus, String> {
    use std::os::windows::process::CommandExt;
    use std::process::{Command, Stdio};

    let pid = child.id();
    let taskkill = Command::new("taskkill")
        .args(["/pid", &pid.to_string(), "/t", "/f"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .creation_flags(crate::CREATE_NO_WINDOW)
        .status();
    match taskkill {
        Ok(status) if status.success() => {}
        Ok(status) => {
            tracing::warn!(target: "shutdown", pid, "taskkill exited with {status}; falling back to kill");
            child
                .kill()
                .map_err(|error| format!("Failed to kill backend process {pid}: {error}"))?;
        }
        Err(error) => {
            tracing::warn!(target: "shutdown", pid, "failed to run taskkill: {error}; falling back to kill");
            child
                .kill()
                .map_err(|error| format!("Failed to kill backend process {pid}: {error}"))?;
        }
    }

    child
        .wait()
        .map_err(|error| format!("Failed to reap backend process {pid}: {error}"))
}

/// Kills the child and reaps it.
#[cfg(not(target_os = "windows"))]
pub(crate) fn stop_child_process(child: &mut Child) -> Result<ExitStatus, String> {
    let pid = child.id();
    child
        .kill()
        .map_err(|error| format!("Failed to kill backend process {pid}: {error}"))?;
    child
        .wait()
        .map_err(|error| format!("Failed to reap backend process {pid}: {error}"))
}

#[cfg(all(test, unix))]
mod tests {
    use std::process::{Command, Stdio};

    use super::*;

    #[test]
    fn stop_child_process_kills_and_reaps() {
        let mut child = Command::new("/bin/sh")
            .args(["-c", "sleep 30"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let status = stop_child_process(&mut child).unwrap();
        assert!(!status.success());
        assert!(child.try_wait().unwrap().is_some());
    }
}
