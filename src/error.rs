//! Error types for the desktop shell's backend supervisor

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{BACKEND_CMD_ENV, SOURCE_DIR_ENV};

#[derive(Debug, Error)]
pub enum Error {
    #[error("backend executable is missing: {}", .0.display())]
    ExecutableMissing(PathBuf),

    #[error(
        "cannot locate the backend source directory; set {} to the folder containing app.py",
        SOURCE_DIR_ENV
    )]
    SourceDirNotFound,

    #[error("cannot locate the application resource directory")]
    ResourceDirNotFound,

    #[error("invalid {}: {}", BACKEND_CMD_ENV, .0)]
    InvalidCommand(String),

    #[error("failed to spawn backend process with command {command:?}: {source}")]
    Spawn {
        command: Vec<String>,
        #[source]
        source: io::Error,
    },

    #[error("backend launch was already attempted in this run")]
    AlreadyLaunched,

    #[error("shutdown was requested before the backend could start")]
    ShuttingDown,

    #[error("failed to build readiness probe client: {0}")]
    ProbeClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
