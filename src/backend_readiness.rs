//! Readiness probing for the backend endpoint.
//!
//! Reachability is the only criterion: any HTTP response, whatever its status,
//! means the backend accepts connections.

use std::{fmt, future::Future, num::NonZeroU32, process::ExitStatus, time::Duration};

use serde::Serialize;
use thiserror::Error;

use crate::{default_poll_interval, default_probe_timeout, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessState {
    Polling,
    Ready,
    Failed,
}

impl ReadinessState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Backoff between failed probes.
    pub poll_interval: Duration,
    /// Upper bound for a single probe request.
    pub probe_timeout: Duration,
    /// `None` polls until success or shutdown.
    pub max_attempts: Option<NonZeroU32>,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            probe_timeout: default_probe_timeout(),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("probe timed out")]
    Timeout,
    #[error("probe failed: {0}")]
    Other(String),
}

impl ProbeFailure {
    fn from_request_error(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Unreachable(error.to_string())
        } else {
            Self::Other(error.to_string())
        }
    }
}

/// Terminal result of one readiness gate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Ready { attempts: u32 },
    Cancelled { attempts: u32 },
    BackendExited { status: ExitStatus },
    AttemptsExhausted { attempts: u32 },
}

impl GateOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

pub type ProbeResult = std::result::Result<(), ProbeFailure>;

pub trait ReadinessProbe {
    fn probe(&self, url: &str) -> impl Future<Output = ProbeResult> + Send;
}

/// HTTP GET probe; proxies are bypassed since the target is always local.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

impl ReadinessProbe for HttpProbe {
    fn probe(&self, url: &str) -> impl Future<Output = ProbeResult> + Send {
        let request = self.client.get(url);
        async move {
            match request.send().await {
                Ok(response) => {
                    tracing::debug!(
                        target: "startup",
                        status = %response.status(),
                        "backend answered readiness probe"
                    );
                    Ok(())
                }
                Err(error) => Err(ProbeFailure::from_request_error(&error)),
            }
        }
    }
}
