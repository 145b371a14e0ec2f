//! Editable form for the backend's basic settings.
//!
//! Only the keys the operator can change are sent back; everything else in
//! `basic` (e.g. `timestamp`) is left to the backend.
use std::fmt;

use crate::api::{BasicSettings, Language};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Language,
    Disable,
    ExpireHours,
    Update,
    Mode,
    WebIp,
    WebPort,
}

impl SettingKey {
    pub const ALL: [SettingKey; 7] = [
        Self::Language,
        Self::Disable,
        Self::ExpireHours,
        Self::Update,
        Self::Mode,
        Self::WebIp,
        Self::WebPort,
    ];

    /// Key in the backend's `basic` map.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Language => "language",
            Self::Disable => "disable",
            Self::ExpireHours => "expire_hours",
            Self::Update => "update",
            Self::Mode => "mode",
            Self::WebIp => "web_ip",
            Self::WebPort => "web_port",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Language => "Language",
            Self::Disable => "Disable protection",
            Self::ExpireHours => "Disable expires after (hours)",
            Self::Update => "Automatic updates",
            Self::Mode => "Protection mode",
            Self::WebIp => "Web listen address",
            Self::WebPort => "Web listen port",
        }
    }

    fn default_value(self) -> &'static str {
        match self {
            Self::Language => "",
            Self::Disable => "false",
            Self::ExpireHours => "24",
            Self::Update => "enable",
            Self::Mode => "Permissive",
            Self::WebIp => "127.0.0.1",
            Self::WebPort => "8080",
        }
    }

    /// Fixed choices for toggle-style fields. Language choices come from
    /// the backend instead.
    fn choices(self) -> Option<&'static [&'static str]> {
        match self {
            Self::Disable => Some(&["false", "true"]),
            Self::Update => Some(&["enable", "disable"]),
            _ => None,
        }
    }

    /// Whether the field is edited as free text.
    pub fn is_text(self) -> bool {
        matches!(self, Self::ExpireHours | Self::Mode | Self::WebIp | Self::WebPort)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsError {
    pub key: SettingKey,
    pub message: String,
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key.label(), self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    values: Vec<(SettingKey, String)>,
    errors: Vec<SettingsError>,
}

impl Default for SettingsForm {
    fn default() -> Self {
        Self {
            values: SettingKey::ALL
                .iter()
                .map(|k| (*k, k.default_value().to_string()))
                .collect(),
            errors: Vec::new(),
        }
    }
}

impl SettingsForm {
    /// Fill the form from the backend config; missing keys get defaults.
    pub fn from_basic(basic: &BasicSettings) -> Self {
        let mut form = Self::default();
        for (key, value) in form.values.iter_mut() {
            if let Some(current) = basic.get(key.wire_name()).filter(|v| !v.is_empty()) {
                *value = current.to_string();
            }
        }
        form
    }

    pub fn get(&self, key: SettingKey) -> &str {
        self.values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    pub fn set(&mut self, key: SettingKey, value: impl Into<String>) {
        if let Some((_, slot)) = self.values.iter_mut().find(|(k, _)| *k == key) {
            *slot = value.into();
        }
        self.errors.retain(|e| e.key != key);
    }

    /// Advance a choice field to its next value. Text fields are unchanged.
    pub fn cycle(&mut self, key: SettingKey, languages: &[Language]) {
        let current = self.get(key).to_string();
        let next = match key {
            SettingKey::Language => {
                if languages.is_empty() {
                    return;
                }
                let index = languages.iter().position(|l| l.code == current);
                let next = index.map_or(0, |i| (i + 1) % languages.len());
                languages[next].code.clone()
            }
            _ => {
                let Some(choices) = key.choices() else {
                    return;
                };
                let index = choices.iter().position(|c| *c == current);
                let next = index.map_or(0, |i| (i + 1) % choices.len());
                choices[next].to_string()
            }
        };
        self.set(key, next);
    }

    /// Display value: language codes are shown by name when known.
    pub fn display(&self, key: SettingKey, languages: &[Language]) -> String {
        let value = self.get(key);
        if key == SettingKey::Language
            && let Some(lang) = languages.iter().find(|l| l.code == value)
        {
            return format!("{} ({})", lang.name, lang.code);
        }
        value.to_string()
    }

    pub fn errors(&self) -> &[SettingsError] {
        &self.errors
    }

    pub fn error_for(&self, key: SettingKey) -> Option<&SettingsError> {
        self.errors.iter().find(|e| e.key == key)
    }

    /// Check all fields; on success return the `basic` body to submit.
    /// Failures are kept on the form for display.
    pub fn validate(&mut self) -> Result<BasicSettings, Vec<SettingsError>> {
        let mut errors = Vec::new();

        let hours = self.get(SettingKey::ExpireHours).trim();
        if !hours.parse::<f64>().is_ok_and(|h| h.is_finite() && h >= 0.0) {
            errors.push(SettingsError {
                key: SettingKey::ExpireHours,
                message: "must be a non-negative number".to_string(),
            });
        }

        let port = self.get(SettingKey::WebPort).trim();
        if !port.parse::<u16>().is_ok_and(|p| p > 0) {
            errors.push(SettingsError {
                key: SettingKey::WebPort,
                message: "must be a port between 1 and 65535".to_string(),
            });
        }

        if self.get(SettingKey::WebIp).trim().is_empty() {
            errors.push(SettingsError {
                key: SettingKey::WebIp,
                message: "is required".to_string(),
            });
        }

        self.errors = errors.clone();
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut basic = BasicSettings::default();
        for (key, value) in &self.values {
            basic.set(key.wire_name(), value.trim());
        }
        Ok(basic)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn langs() -> Vec<Language> {
        vec![
            Language {
                code: "en_US".into(),
                name: "English".into(),
            },
            Language {
                code: "zh_CN".into(),
                name: "简体中文".into(),
            },
        ]
    }

    #[test]
    fn defaults_fill_missing_keys() {
        let mut basic = BasicSettings::default();
        basic.set("mode", "Enhanced");
        basic.set("web_port", "");
        let form = SettingsForm::from_basic(&basic);
        assert_eq!(form.get(SettingKey::Mode), "Enhanced");
        assert_eq!(form.get(SettingKey::WebPort), "8080");
        assert_eq!(form.get(SettingKey::ExpireHours), "24");
        assert_eq!(form.get(SettingKey::Disable), "false");
    }

    #[test]
    fn choices_cycle() {
        let mut form = SettingsForm::default();
        form.cycle(SettingKey::Disable, &[]);
        assert_eq!(form.get(SettingKey::Disable), "true");
        form.cycle(SettingKey::Disable, &[]);
        assert_eq!(form.get(SettingKey::Disable), "false");
        form.cycle(SettingKey::Update, &[]);
        assert_eq!(form.get(SettingKey::Update), "disable");
    }

    #[test]
    fn language_cycles_through_backend_list() {
        let mut form = SettingsForm::default();
        form.cycle(SettingKey::Language, &langs());
        assert_eq!(form.get(SettingKey::Language), "en_US");
        form.cycle(SettingKey::Language, &langs());
        assert_eq!(form.get(SettingKey::Language), "zh_CN");
        assert_eq!(form.display(SettingKey::Language, &langs()), "简体中文 (zh_CN)");
        form.cycle(SettingKey::Language, &[]);
        assert_eq!(form.get(SettingKey::Language), "zh_CN");
    }

    #[test]
    fn text_fields_do_not_cycle() {
        let mut form = SettingsForm::default();
        form.cycle(SettingKey::Mode, &[]);
        assert_eq!(form.get(SettingKey::Mode), "Permissive");
    }

    #[test]
    fn validation_rejects_bad_numbers() {
        let mut form = SettingsForm::default();
        form.set(SettingKey::ExpireHours, "-1");
        form.set(SettingKey::WebPort, "70000");
        form.set(SettingKey::WebIp, " ");
        let errors = form.validate().unwrap_err();
        let keys: Vec<SettingKey> = errors.iter().map(|e| e.key).collect();
        assert_eq!(
            keys,
            vec![SettingKey::ExpireHours, SettingKey::WebPort, SettingKey::WebIp]
        );
        assert!(form.error_for(SettingKey::WebPort).is_some());

        form.set(SettingKey::WebPort, "9090");
        assert!(form.error_for(SettingKey::WebPort).is_none());
    }

    #[test]
    fn valid_form_produces_basic_body() {
        let mut form = SettingsForm::default();
        form.set(SettingKey::ExpireHours, " 1.5 ");
        let basic = form.validate().unwrap();
        assert_eq!(basic.expire_hours(), Some("1.5"));
        assert_eq!(basic.get("web_ip"), Some("127.0.0.1"));
        assert_eq!(basic.0.len(), SettingKey::ALL.len());
        assert!(form.errors().is_empty());
    }
}
