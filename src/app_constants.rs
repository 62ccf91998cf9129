use std::time::Duration;

pub const APP_TITLE: &str = "Tally AI Expert";
pub const MAIN_WINDOW_LABEL: &str = "main";
pub const MAIN_WINDOW_WIDTH: f64 = 1200.0;
pub const MAIN_WINDOW_HEIGHT: f64 = 800.0;

pub const DEFAULT_BACKEND_HOST: &str = "127.0.0.1";
pub const DEFAULT_BACKEND_PORT: u16 = 8501;

pub const BACKEND_URL_ENV: &str = "TALLY_BACKEND_URL";
pub const BACKEND_AUTO_START_ENV: &str = "TALLY_BACKEND_AUTO_START";
pub const BACKEND_CMD_ENV: &str = "TALLY_BACKEND_CMD";
pub const BACKEND_CWD_ENV: &str = "TALLY_BACKEND_CWD";
pub const SOURCE_DIR_ENV: &str = "TALLY_SOURCE_DIR";
pub const PACKAGED_MARKER_ENV: &str = "TALLY_DESKTOP_PACKAGED";
pub const DEV_OVERRIDE_ENV: &str = "TALLY_DESKTOP_DEV";
pub const DESKTOP_LOG_FILTER_ENV: &str = "TALLY_DESKTOP_LOG";

pub const BACKEND_READY_POLL_INTERVAL_ENV: &str = "TALLY_BACKEND_READY_POLL_INTERVAL_MS";
pub const DEFAULT_BACKEND_READY_POLL_INTERVAL_MS: u64 = 1_000;
pub const BACKEND_READY_POLL_INTERVAL_MIN_MS: u64 = 50;
pub const BACKEND_READY_POLL_INTERVAL_MAX_MS: u64 = 10_000;

pub const BACKEND_READY_PROBE_TIMEOUT_ENV: &str = "TALLY_BACKEND_READY_PROBE_TIMEOUT_MS";
pub const DEFAULT_BACKEND_READY_PROBE_TIMEOUT_MS: u64 = 2_000;
pub const BACKEND_READY_PROBE_TIMEOUT_MIN_MS: u64 = 100;
pub const BACKEND_READY_PROBE_TIMEOUT_MAX_MS: u64 = 30_000;

pub const BACKEND_READY_MAX_ATTEMPTS_ENV: &str = "TALLY_BACKEND_READY_MAX_ATTEMPTS";

/// Every n-th failed probe is logged at info level, the rest at debug.
pub const PROBE_FAILURE_LOG_EVERY: u32 = 10;

pub const DEV_ENV_DIR: &str = "tallyenv";
pub const DEV_ENTRY_SCRIPT: &str = "app.py";
pub const PACKAGED_BACKEND_DIR: &str = "dist";
pub const PACKAGED_BACKEND_NAME: &str = "tally-ai-backend";

pub const PACKAGED_ROOT_DIR_NAME: &str = ".tally-expert";
pub const DESKTOP_LOG_FILE: &str = "desktop.log";
pub const DESKTOP_LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const LOG_BACKUP_COUNT: usize = 5;

pub const MAX_FORWARDED_LINE_BYTES: usize = 16 * 1024;

#[cfg(target_os = "windows")]
pub const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub const fn default_poll_interval() -> Duration {
    Duration::from_millis(DEFAULT_BACKEND_READY_POLL_INTERVAL_MS)
}

pub const fn default_probe_timeout() -> Duration {
    Duration::from_millis(DEFAULT_BACKEND_READY_PROBE_TIMEOUT_MS)
}
