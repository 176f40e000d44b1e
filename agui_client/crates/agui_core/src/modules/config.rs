use crate::modules::backoff::ReconnectPolicy;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use url::Url;

pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/ws";
const DEFAULT_EVENT_CAPACITY: usize = 256;
const DEFAULT_COMMAND_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid websocket url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported url scheme {0:?} (expected ws or wss)")]
    UnsupportedScheme(String),
    #[error("thread id must not be empty")]
    EmptyThreadId,
    #[error("{key}={value:?} is not a valid number")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base endpoint; the thread id is appended as the last path segment.
    pub endpoint: Url,
    pub thread_id: String,
    pub reconnect: ReconnectPolicy,
    pub event_capacity: usize,
    pub command_capacity: usize,
}

impl ClientConfig {
    pub fn new(endpoint: &str, thread_id: impl Into<String>) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(endpoint.trim())?;
        if !matches!(endpoint.scheme(), "ws" | "wss") || endpoint.cannot_be_a_base() {
            return Err(ConfigError::UnsupportedScheme(endpoint.scheme().to_string()));
        }
        let thread_id = thread_id.into().trim().to_string();
        if thread_id.is_empty() {
            return Err(ConfigError::EmptyThreadId);
        }
        Ok(Self {
            endpoint,
            thread_id,
            reconnect: ReconnectPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        })
    }

    /// Reads `AGUI_WS_URL`, `AGUI_THREAD_ID`, `AGUI_RECONNECT_ATTEMPTS`, `AGUI_RECONNECT_STEP_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = lookup("AGUI_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        let thread_id = lookup("AGUI_THREAD_ID").unwrap_or_else(new_thread_id);
        let mut config = Self::new(&endpoint, thread_id)?;

        let attempts = parse_number::<u32>(&lookup, "AGUI_RECONNECT_ATTEMPTS")?;
        let step_ms = parse_number::<u64>(&lookup, "AGUI_RECONNECT_STEP_MS")?;
        config.reconnect = tune_policy(config.reconnect, attempts, step_ms.map(Duration::from_millis));
        Ok(config)
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// `<endpoint>/<thread_id>`
    pub fn thread_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&self.thread_id);
        }
        url
    }
}

/// Applies overrides to a policy. Zero attempts disables reconnecting.
pub fn tune_policy(
    policy: ReconnectPolicy,
    attempts: Option<u32>,
    step: Option<Duration>,
) -> ReconnectPolicy {
    if attempts == Some(0) {
        return ReconnectPolicy::Never;
    }
    if attempts.is_none() && step.is_none() {
        return policy;
    }
    let base = match policy {
        ReconnectPolicy::Never => ReconnectPolicy::default(),
        linear => linear,
    };
    let ReconnectPolicy::Linear {
        step: cur_step,
        max_delay,
        max_attempts,
    } = base
    else {
        return policy;
    };
    ReconnectPolicy::Linear {
        step: step.unwrap_or(cur_step),
        max_delay,
        max_attempts: attempts.unwrap_or(max_attempts),
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidNumber { key, value: raw })
}

/// Time-based id for sessions started without an explicit thread.
pub fn new_thread_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("cli-{nanos}")
}
