//! Backend supervisor for the Tally AI Expert desktop shell.
//!
//! The shell starts the question-answering backend as a child process, waits
//! until its HTTP endpoint answers before showing the main window, and makes
//! sure the backend dies with the shell. The Tauri glue is compiled only with
//! the `desktop` feature; everything else is plain library code.

mod app_constants;

pub mod app_types;
pub mod backend_config;
pub mod backend_process;
pub mod backend_readiness;
pub mod deployment_mode;
pub mod error;
pub mod exit_cleanup;
pub mod exit_state;
pub mod launch_plan;
pub mod logging;
pub mod output_drain;
mod process_control;
pub mod runtime_paths;
pub mod supervisor;

#[cfg(feature = "desktop")]
pub mod app_runtime;
#[cfg(feature = "desktop")]
mod desktop_bridge_commands;
#[cfg(feature = "desktop")]
mod exit_events;
#[cfg(feature = "desktop")]
mod main_window;
#[cfg(feature = "desktop")]
mod startup_task;

pub use app_constants::*;
pub use app_types::BackendBridgeState;
pub use backend_config::{normalize_backend_url, EndpointTarget, SupervisorConfig};
pub use backend_process::{ProcessHandle, TerminationOutcome};
pub use backend_readiness::{
    GateOutcome, HttpProbe, ProbeFailure, ReadinessPolicy, ReadinessProbe, ReadinessState,
};
pub use deployment_mode::DeploymentMode;
pub use error::{Error, Result};
pub use exit_state::ShutdownTrigger;
pub use launch_plan::{resolve_launch_plan, LaunchLayout, LaunchPlan};
pub use supervisor::BackendSupervisor;
