use std::{env, fmt, num::NonZeroU32, path::PathBuf, time::Duration};

use url::Url;

use crate::{
    backend_readiness::ReadinessPolicy, BACKEND_AUTO_START_ENV,
    BACKEND_CMD_ENV, BACKEND_CWD_ENV, BACKEND_READY_MAX_ATTEMPTS_ENV,
    BACKEND_READY_POLL_INTERVAL_ENV, BACKEND_READY_POLL_INTERVAL_MAX_MS,
    BACKEND_READY_POLL_INTERVAL_MIN_MS, BACKEND_READY_PROBE_TIMEOUT_ENV,
    BACKEND_READY_PROBE_TIMEOUT_MAX_MS, BACKEND_READY_PROBE_TIMEOUT_MIN_MS, BACKEND_URL_ENV,
    DEFAULT_BACKEND_HOST, DEFAULT_BACKEND_PORT, DEFAULT_BACKEND_READY_POLL_INTERVAL_MS,
    DEFAULT_BACKEND_READY_PROBE_TIMEOUT_MS, SOURCE_DIR_ENV,
};

/// The local address the backend is expected to bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTarget {
    host: String,
    port: u16,
}

impl EndpointTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Accepts `http://host:port/...`; anything else yields `None`.
    pub fn from_backend_url(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let parsed = Url::parse(trimmed).ok()?;
        if parsed.scheme() != "http" {
            return None;
        }
        let host = parsed.host_str()?.to_string();
        let port = parsed.port_or_known_default()?;
        Some(Self { host, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://{self}/")
    }
}

impl Default for EndpointTarget {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_HOST, DEFAULT_BACKEND_PORT)
    }
}

impl fmt::Display for EndpointTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

pub fn normalize_backend_url(raw: Option<&str>) -> EndpointTarget {
    raw.and_then(EndpointTarget::from_backend_url)
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub endpoint: EndpointTarget,
    pub auto_start: bool,
    pub custom_command: Option<String>,
    pub cwd_override: Option<PathBuf>,
    pub source_dir_override: Option<PathBuf>,
    pub readiness: ReadinessPolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl SupervisorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let auto_start = non_empty(BACKEND_AUTO_START_ENV)
            .map(|value| value != "0" && !value.eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        let readiness = ReadinessPolicy {
            poll_interval: parse_clamped_ms(
                non_empty(BACKEND_READY_POLL_INTERVAL_ENV).as_deref(),
                DEFAULT_BACKEND_READY_POLL_INTERVAL_MS,
                BACKEND_READY_POLL_INTERVAL_MIN_MS,
                BACKEND_READY_POLL_INTERVAL_MAX_MS,
            ),
            probe_timeout: parse_clamped_ms(
                non_empty(BACKEND_READY_PROBE_TIMEOUT_ENV).as_deref(),
                DEFAULT_BACKEND_READY_PROBE_TIMEOUT_MS,
                BACKEND_READY_PROBE_TIMEOUT_MIN_MS,
                BACKEND_READY_PROBE_TIMEOUT_MAX_MS,
            ),
            max_attempts: non_empty(BACKEND_READY_MAX_ATTEMPTS_ENV)
                .and_then(|value| value.parse::<u32>().ok())
                .and_then(NonZeroU32::new),
        };

        Self {
            endpoint: normalize_backend_url(non_empty(BACKEND_URL_ENV).as_deref()),
            auto_start,
            custom_command: non_empty(BACKEND_CMD_ENV),
            cwd_override: non_empty(BACKEND_CWD_ENV).map(PathBuf::from),
            source_dir_override: non_empty(SOURCE_DIR_ENV).map(PathBuf::from),
            readiness,
        }
    }
}

pub(crate) fn parse_clamped_ms(
    raw: Option<&str>,
    default_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Duration {
    let millis = raw
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default_ms)
        .clamp(min_ms, max_ms);
    Duration::from_millis(millis)
}
