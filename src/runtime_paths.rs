use std::{
    env,
    path::{Path, PathBuf},
};

use crate::{DEV_ENTRY_SCRIPT, PACKAGED_ROOT_DIR_NAME};

pub fn default_packaged_root_dir() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(PACKAGED_ROOT_DIR_NAME))
}

pub fn resolve_desktop_log_path(root_dir: Option<PathBuf>, log_file_name: &str) -> PathBuf {
    root_dir
        .unwrap_or_else(|| env::temp_dir().join(PACKAGED_ROOT_DIR_NAME))
        .join("logs")
        .join(log_file_name)
}

fn workspace_root_dir() -> PathBuf {
    let candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    candidate.canonicalize().unwrap_or(candidate)
}

fn is_source_root(candidate: &Path) -> bool {
    candidate.join(DEV_ENTRY_SCRIPT).is_file()
}

/// Finds the directory holding the backend entry script in a development checkout.
///
/// An explicit override is trusted only if it actually contains the entry script.
pub fn detect_source_root(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(candidate) = explicit {
        if is_source_root(candidate) {
            return Some(candidate.canonicalize().unwrap_or_else(|_| candidate.to_path_buf()));
        }
        tracing::warn!(
            target: "startup",
            path = %candidate.display(),
            "configured source directory has no {DEV_ENTRY_SCRIPT}; ignoring it"
        );
    }

    let workspace_root = workspace_root_dir();
    let mut candidates = vec![workspace_root.clone()];
    if let Some(parent) = workspace_root.parent() {
        candidates.push(parent.to_path_buf());
    }
    if let Ok(current_dir) = env::current_dir() {
        candidates.push(current_dir);
    }

    candidates
        .into_iter()
        .find(|candidate| is_source_root(candidate))
        .map(|candidate| candidate.canonicalize().unwrap_or(candidate))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn desktop_log_path_lives_under_logs_dir() {
        let root = PathBuf::from("/home/user/.tally-expert");
        assert_eq!(
            resolve_desktop_log_path(Some(root), "desktop.log"),
            PathBuf::from("/home/user/.tally-expert/logs/desktop.log")
        );
    }

    #[test]
    fn desktop_log_path_falls_back_to_temp_dir() {
        let path = resolve_desktop_log_path(None, "desktop.log");
        assert!(path.starts_with(env::temp_dir()));
        assert!(path.ends_with("logs/desktop.log"));
    }

    #[test]
    fn detect_source_root_accepts_override_with_entry_script() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join(DEV_ENTRY_SCRIPT), "import streamlit\n").unwrap();

        let detected = detect_source_root(Some(temp.path())).unwrap();
        assert_eq!(detected, temp.path().canonicalize().unwrap());
    }

    #[test]
    fn detect_source_root_skips_override_without_entry_script() {
        let temp = tempfile::tempdir().unwrap();
        let detected = detect_source_root(Some(temp.path()));
        assert_ne!(detected, Some(temp.path().to_path_buf()));
    }
}
