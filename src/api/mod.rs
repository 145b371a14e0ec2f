//! Client for the deeprotection web backend.
//!
//! Every dashboard component talks to the backend through the [`Backend`]
//! trait. [`HttpBackend`] implements it over the JSON endpoints under
//! `/api` using the synchronous `ureq` client; tests substitute scripted
//! implementations.

pub mod generation;
pub mod sse;

use std::collections::BTreeMap;
use std::io::BufReader;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::schema::BackendConfig;

pub use sse::{LogStream, StreamEvent};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A failed backend request.
///
/// `Status` displays the backend's `error` text verbatim so it can be shown
/// to the operator as-is.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Status {
        code: u16,
        message: String,
        details: Option<String>,
    },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Backend-supplied details (e.g. output of a failed command).
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Status { details, .. } => details.as_deref(),
            _ => None,
        }
    }
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// The `basic` section of the backend config: flat string key/values.
///
/// Known keys get accessors; unknown keys are preserved untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasicSettings(pub BTreeMap<String, String>);

impl BasicSettings {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn language(&self) -> Option<&str> {
        self.get("language")
    }

    pub fn disable(&self) -> Option<&str> {
        self.get("disable")
    }

    pub fn expire_hours(&self) -> Option<&str> {
        self.get("expire_hours")
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.get("timestamp")
    }

    pub fn update(&self) -> Option<&str> {
        self.get("update")
    }

    pub fn mode(&self) -> Option<&str> {
        self.get("mode")
    }
}

/// `GET /api/config` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub basic: BasicSettings,
    #[serde(default)]
    pub protected_paths: Vec<String>,
    #[serde(default)]
    pub command_rules: Vec<String>,
}

/// `POST /api/config` body. Absent sections are left alone by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic: Option<BasicSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected_paths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_rules: Option<Vec<String>>,
}

/// `GET /api/stats` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub protection_count: u64,
    #[serde(default)]
    pub remaining_time: Option<String>,
}

/// One entry of `GET /api/languages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    pub name: String,
}

/// Acknowledgement from config updates, reload and restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ActionAck {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

/// `POST /api/command` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommandOutput {
    #[serde(default)]
    pub output: String,
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    command: &'a str,
}

// ---------------------------------------------------------------------------
// Backend contract
// ---------------------------------------------------------------------------

/// Operations the dashboard needs from the protection service.
pub trait Backend: Send + Sync {
    fn fetch_config(&self) -> Result<RemoteConfig, ApiError>;
    fn update_config(&self, update: &ConfigUpdate) -> Result<ActionAck, ApiError>;
    fn fetch_stats(&self) -> Result<Stats, ApiError>;
    fn fetch_languages(&self) -> Result<Vec<Language>, ApiError>;
    fn reload(&self) -> Result<ActionAck, ApiError>;
    fn restart(&self) -> Result<ActionAck, ApiError>;
    fn execute(&self, command: &str) -> Result<CommandOutput, ApiError>;
    fn open_log_stream(&self) -> Result<LogStream, ApiError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Synchronous HTTP backend client.
///
/// Holds two agents: one with the configured request timeout for ordinary
/// calls, and one without a read timeout for the long-lived log stream.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    agent: ureq::Agent,
    stream_agent: ureq::Agent,
}

/// Connect timeout shared by both agents.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

impl HttpBackend {
    /// Build a client from the resolved config.
    pub fn from_config(config: &BackendConfig) -> Self {
        let mut builder = ureq::AgentBuilder::new().timeout_connect(CONNECT_TIMEOUT);
        if config.request_timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.request_timeout_ms));
        }

        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            agent: builder.build(),
            stream_agent: ureq::AgentBuilder::new()
                .timeout_connect(CONNECT_TIMEOUT)
                .build(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        fallback: &str,
    ) -> Result<T, ApiError> {
        tracing::debug!(path, "GET");
        let result = self.agent.get(&self.url(path)).call();
        decode(result, fallback)
    }

    fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<T, ApiError> {
        tracing::debug!(path, "POST");
        let result = self.agent.post(&self.url(path)).send_json(body);
        decode(result, fallback)
    }

    fn post_empty<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        fallback: &str,
    ) -> Result<T, ApiError> {
        tracing::debug!(path, "POST");
        let result = self.agent.post(&self.url(path)).call();
        decode(result, fallback)
    }
}

impl Backend for HttpBackend {
    fn fetch_config(&self) -> Result<RemoteConfig, ApiError> {
        self.get_json("/api/config", "Failed to fetch configuration")
    }

    fn update_config(&self, update: &ConfigUpdate) -> Result<ActionAck, ApiError> {
        self.post_json("/api/config", update, "Failed to update configuration")
    }

    fn fetch_stats(&self) -> Result<Stats, ApiError> {
        self.get_json("/api/stats", "Failed to fetch stats")
    }

    fn fetch_languages(&self) -> Result<Vec<Language>, ApiError> {
        self.get_json("/api/languages", "Failed to fetch languages")
    }

    fn reload(&self) -> Result<ActionAck, ApiError> {
        self.post_empty("/api/reload", "Failed to reload service")
    }

    fn restart(&self) -> Result<ActionAck, ApiError> {
        self.post_empty("/api/restart", "Failed to restart service")
    }

    fn execute(&self, command: &str) -> Result<CommandOutput, ApiError> {
        self.post_json(
            "/api/command",
            &CommandRequest { command },
            "Command execution failed",
        )
    }

    fn open_log_stream(&self) -> Result<LogStream, ApiError> {
        tracing::debug!(path = "/api/logs", "GET stream");
        let resp = self
            .stream_agent
            .get(&self.url("/api/logs"))
            .set("Accept", "text/event-stream")
            .call()
            .map_err(|e| into_api_error(e, "Failed to open log stream"))?;
        Ok(LogStream::new(BufReader::new(resp.into_reader())))
    }
}

/// Turn a ureq result into a decoded body or an [`ApiError`].
fn decode<T: serde::de::DeserializeOwned>(
    result: Result<ureq::Response, ureq::Error>,
    fallback: &str,
) -> Result<T, ApiError> {
    let resp = result.map_err(|e| into_api_error(e, fallback))?;
    resp.into_json::<T>()
        .map_err(|e| ApiError::Decode(e.to_string()))
}

fn into_api_error(err: ureq::Error, fallback: &str) -> ApiError {
    match err {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            status_error(code, &body, fallback)
        }
        ureq::Error::Transport(t) => ApiError::Transport(t.to_string()),
    }
}

/// Build a status error from a non-2xx body, preferring its `error` text.
pub(crate) fn status_error(code: u16, body: &str, fallback: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    ApiError::Status {
        code,
        message,
        details: parsed.details.filter(|d| !d.is_empty()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
