use std::{env, fmt};

use crate::{DEV_OVERRIDE_ENV, PACKAGED_MARKER_ENV};

/// How the backend is laid out on disk for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Interpreter from the `tallyenv` environment next to the application source.
    Development,
    /// Prebuilt backend binary shipped in the installed resource directory.
    Packaged,
}

impl DeploymentMode {
    /// A packaged build runs in packaged mode unless the dev-only override is present.
    pub fn from_markers(packaged_build: bool, dev_override: bool) -> Self {
        if packaged_build && !dev_override {
            Self::Packaged
        } else {
            Self::Development
        }
    }

    pub fn detect() -> Self {
        Self::detect_with(!cfg!(debug_assertions), |key| env::var(key).ok())
    }

    pub fn detect_with<F>(release_build: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let packaged_marker = lookup(PACKAGED_MARKER_ENV)
            .map(|value| is_truthy(&value))
            .unwrap_or(false);
        let dev_override = lookup(DEV_OVERRIDE_ENV)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false);
        Self::from_markers(release_build || packaged_marker, dev_override)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Packaged => "packaged",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
