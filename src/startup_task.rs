use std::sync::Arc;

use tauri::{AppHandle, Manager};

use crate::{
    main_window, resolve_launch_plan, runtime_paths::detect_source_root, BackendSupervisor,
    DeploymentMode, GateOutcome, HttpProbe, LaunchLayout, SupervisorConfig,
};

pub(crate) fn spawn_startup_task(
    app_handle: AppHandle,
    supervisor: Arc<BackendSupervisor>,
    config: SupervisorConfig,
) {
    tauri::async_runtime::spawn(async move {
        run_startup(app_handle, supervisor, config).await;
    });
}

fn launch_layout(app_handle: &AppHandle, config: &SupervisorConfig) -> LaunchLayout {
    let resource_dir = match app_handle.path().resource_dir() {
        Ok(dir) => Some(dir),
        Err(error) => {
            tracing::warn!(target: "startup", "failed to resolve resource directory: {error}");
            None
        }
    };
    LaunchLayout {
        source_dir: detect_source_root(config.source_dir_override.as_deref()),
        resource_dir,
    }
}

async fn run_startup(
    app_handle: AppHandle,
    supervisor: Arc<BackendSupervisor>,
    config: SupervisorConfig,
) {
    let mode = DeploymentMode::detect();
    tracing::info!(
        target: "startup",
        %mode,
        url = supervisor.backend_url(),
        auto_start = config.auto_start,
        "desktop startup"
    );

    let probe = match HttpProbe::new(config.readiness.probe_timeout) {
        Ok(probe) => probe,
        Err(error) => {
            tracing::error!(target: "startup", "{error}");
            supervisor.mark_failed();
            return;
        }
    };

    let reveal_handle = app_handle.clone();
    let reveal = move |url: &str| main_window::reveal_backend(&reveal_handle, url);

    let outcome = if config.auto_start {
        let layout = launch_layout(&app_handle, &config);
        let plan = match resolve_launch_plan(&config, mode, &layout) {
            Ok(plan) => plan,
            Err(error) => {
                tracing::error!(target: "startup", "failed to resolve backend launch plan: {error}");
                supervisor.mark_failed();
                return;
            }
        };
        match supervisor
            .start(&plan, &probe, &config.readiness, reveal)
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(target: "startup", "backend startup failed: {error}");
                return;
            }
        }
    } else {
        tracing::info!(target: "startup", "auto start disabled; waiting for an external backend");
        supervisor
            .wait_until_ready(&probe, &config.readiness, reveal)
            .await
    };

    match outcome {
        GateOutcome::Ready { .. } => {
            if supervisor
                .watch_for_exit(config.readiness.poll_interval)
                .await
                .is_some()
            {
                tracing::error!(target: "runtime", "backend is gone; restart the application to recover");
            }
        }
        GateOutcome::Cancelled { .. } => {}
        other => {
            tracing::error!(target: "startup", outcome = ?other, "backend did not become ready");
        }
    }
}
