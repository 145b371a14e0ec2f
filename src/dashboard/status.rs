//! Status panel derived from the cached backend config and latest stats.
use chrono::{Local, TimeZone};

use crate::api::{RemoteConfig, Stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Active,
    Disabled,
    /// Config not loaded yet or failed to load.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiration {
    pub text: String,
    /// `true` while a temporary disable is counting down.
    pub counting_down: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub protection: Protection,
    pub status_text: String,
    pub last_updated: String,
    pub update_mode: String,
    pub protection_mode: String,
    pub expiration: Option<Expiration>,
    pub protection_count: Option<u64>,
}

impl StatusView {
    pub fn derive(config: Option<&RemoteConfig>, stats: Option<&Stats>) -> Self {
        Self::derive_in(config, stats, &Local)
    }

    /// Like [`derive`](Self::derive) with an explicit zone for the
    /// last-updated timestamp.
    pub fn derive_in<Tz>(config: Option<&RemoteConfig>, stats: Option<&Stats>, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let protection_count = stats.map(|s| s.protection_count);

        let Some(config) = config else {
            return Self {
                protection: Protection::Unknown,
                status_text: "Error loading status".to_string(),
                last_updated: "Unknown".to_string(),
                update_mode: "Unknown".to_string(),
                protection_mode: "Unknown".to_string(),
                expiration: None,
                protection_count,
            };
        };
        let basic = &config.basic;

        let protection = if basic.disable() == Some("false") {
            Protection::Active
        } else {
            Protection::Disabled
        };
        let status_text = match protection {
            Protection::Active => "Active",
            _ => "Disabled",
        }
        .to_string();

        let last_updated = basic
            .timestamp()
            .and_then(|raw| format_timestamp(raw, tz))
            .unwrap_or_else(|| "Unknown".to_string());

        let update_mode = if basic.update() == Some("enable") {
            "Enabled"
        } else {
            "Disabled"
        }
        .to_string();

        let protection_mode = basic
            .mode()
            .filter(|m| !m.is_empty())
            .unwrap_or("Permissive")
            .to_string();

        let expiration = stats.map(|s| match s.remaining_time.as_deref() {
            Some(remaining) if !remaining.is_empty() => Expiration {
                text: remaining.to_string(),
                counting_down: true,
            },
            _ => Expiration {
                text: format!("{} hours (default)", basic.expire_hours().unwrap_or("?")),
                counting_down: false,
            },
        });

        Self {
            protection,
            status_text,
            last_updated,
            update_mode,
            protection_mode,
            expiration,
            protection_count,
        }
    }
}

/// Format unix seconds as a wall-clock time in `tz`.
fn format_timestamp<Tz>(raw: &str, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let secs: i64 = raw.trim().parse().ok()?;
    let time = tz.timestamp_opt(secs, 0).single()?;
    Some(time.format("%Y-%m-%d %H:%M:%S").to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BasicSettings;
    use chrono::Utc;

    fn config(pairs: &[(&str, &str)]) -> RemoteConfig {
        let mut basic = BasicSettings::default();
        for (k, v) in pairs {
            basic.set(*k, *v);
        }
        RemoteConfig {
            basic,
            ..Default::default()
        }
    }

    #[test]
    fn enabled_service_is_active() {
        let cfg = config(&[
            ("disable", "false"),
            ("timestamp", "0"),
            ("update", "enable"),
            ("mode", "Enhanced"),
        ]);
        let view = StatusView::derive_in(Some(&cfg), None, &Utc);
        assert_eq!(view.protection, Protection::Active);
        assert_eq!(view.status_text, "Active");
        assert_eq!(view.last_updated, "1970-01-01 00:00:00");
        assert_eq!(view.update_mode, "Enabled");
        assert_eq!(view.protection_mode, "Enhanced");
        assert_eq!(view.expiration, None);
    }

    #[test]
    fn anything_but_false_is_disabled() {
        let cfg = config(&[("disable", "true")]);
        let view = StatusView::derive_in(Some(&cfg), None, &Utc);
        assert_eq!(view.protection, Protection::Disabled);
        assert_eq!(view.protection_mode, "Permissive");
        assert_eq!(view.update_mode, "Disabled");
        assert_eq!(view.last_updated, "Unknown");
    }

    #[test]
    fn missing_config_reports_error() {
        let view = StatusView::derive_in(None, None, &Utc);
        assert_eq!(view.protection, Protection::Unknown);
        assert_eq!(view.status_text, "Error loading status");
    }

    #[test]
    fn remaining_time_wins_over_default() {
        let cfg = config(&[("disable", "true"), ("expire_hours", "24")]);
        let stats = Stats {
            protection_count: 12,
            remaining_time: Some("3h 05m".into()),
        };
        let view = StatusView::derive_in(Some(&cfg), Some(&stats), &Utc);
        assert_eq!(
            view.expiration,
            Some(Expiration {
                text: "3h 05m".into(),
                counting_down: true
            })
        );
        assert_eq!(view.protection_count, Some(12));
    }

    #[test]
    fn empty_remaining_time_shows_default_hours() {
        let cfg = config(&[("disable", "false"), ("expire_hours", "24")]);
        let stats = Stats {
            protection_count: 0,
            remaining_time: Some(String::new()),
        };
        let view = StatusView::derive_in(Some(&cfg), Some(&stats), &Utc);
        assert_eq!(view.expiration.unwrap().text, "24 hours (default)");
    }

    #[test]
    fn bad_timestamp_is_unknown() {
        assert_eq!(format_timestamp("soon", &Utc), None);
        assert_eq!(
            format_timestamp(" 86400 ", &Utc).as_deref(),
            Some("1970-01-02 00:00:00")
        );
    }
}
