use std::sync::Arc;

use tauri::RunEvent;

use crate::{
    desktop_bridge_commands, exit_cleanup, exit_events, logging, main_window, runtime_paths,
    startup_task, BackendSupervisor, SupervisorConfig,
};

pub fn run() {
    let log_path = logging::init_logging(runtime_paths::default_packaged_root_dir());
    tracing::info!(
        target: "startup",
        version = env!("CARGO_PKG_VERSION"),
        "desktop process starting"
    );
    if let Some(path) = &log_path {
        tracing::info!(target: "startup", "desktop log path: {}", path.display());
    }

    let config = SupervisorConfig::from_env();
    let supervisor = Arc::new(BackendSupervisor::new(config.endpoint.clone()));
    exit_cleanup::install_panic_hook(Arc::clone(&supervisor));

    let startup_supervisor = Arc::clone(&supervisor);
    let app = match tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app_handle, argv, _cwd| {
            tracing::info!(target: "runtime", ?argv, "second instance started; focusing main window");
            main_window::focus_main_window(app_handle);
        }))
        .manage(supervisor)
        .invoke_handler(tauri::generate_handler![
            desktop_bridge_commands::desktop_bridge_get_backend_state,
        ])
        .setup(move |app| {
            let app_handle = app.handle().clone();
            exit_events::spawn_signal_listener(app_handle.clone());
            startup_task::spawn_startup_task(app_handle, startup_supervisor, config);
            Ok(())
        })
        .build(tauri::generate_context!())
    {
        Ok(app) => app,
        Err(error) => {
            tracing::error!(target: "startup", "failed to build desktop application: {error}");
            std::process::exit(1);
        }
    };

    app.run(|app_handle, event| match event {
        RunEvent::ExitRequested { code, api, .. } => {
            exit_events::handle_exit_requested(app_handle, code, &api);
        }
        RunEvent::Exit => {
            exit_events::handle_exit_event(app_handle);
        }
        #[cfg(target_os = "macos")]
        RunEvent::Reopen {
            has_visible_windows: false,
            ..
        } => {
            use tauri::Manager;

            let supervisor = app_handle.state::<Arc<BackendSupervisor>>();
            main_window::restore_main_window(app_handle, &supervisor);
        }
        _ => {}
    });
}
