//! Configuration schema and defaults for the dashboard client.
//!
//! Sections: `[backend]`, `[dashboard]`, `[logs]`, `[notifications]`,
//! `[logging]`. Every field has a built-in default; files only need the
//! values they override.
use serde::{Deserialize, Serialize};

/// Top-level dashboard configuration.
///
/// Maps to `~/.dpdash/config.toml` and `.dpdash.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    pub backend: BackendConfig,
    pub dashboard: DashboardConfig,
    pub logs: LogsConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [backend]
// ---------------------------------------------------------------------------

/// Where the protection service's web backend listens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL, without the `/api` suffix.
    pub url: String,
    /// Per-request timeout. `0` leaves it to the transport (no timeout).
    /// Does not apply to the log stream.
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// [dashboard]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Seconds between stats polls while the dashboard page is open.
    pub poll_interval_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// [logs]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Lines kept on the log page; older lines are discarded.
    pub buffer_lines: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            buffer_lines: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// [notifications]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Toasts kept on screen at once; the oldest is evicted beyond this.
    pub max_visible: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { max_visible: 5 }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl DashConfig {
    /// Annotated default config written by `dpdash config init`.
    pub fn default_toml() -> String {
        r#"# dpdash configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. --url command line flag
#   2. Environment variables (DPDASH_*)
#   3. Project config (.dpdash.toml in current directory)
#   4. User global config (~/.dpdash/config.toml)
#   5. Built-in defaults

[backend]
url = "http://127.0.0.1:8080"
request_timeout_ms = 10000   # 0 = no timeout

[dashboard]
poll_interval_secs = 5

[logs]
buffer_lines = 1000          # older log lines are discarded

[notifications]
max_visible = 5

[logging]
level = "info"               # trace | debug | info | warn | error
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
