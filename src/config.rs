//! Typing settings, the editable settings form, and startup config loading.

use crate::error::{Result, TyperError};
use crate::global_hotkey::parse_hotkey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::time::Duration;

pub const DEFAULT_BASE_DELAY: f64 = 0.1;
pub const DEFAULT_JITTER: f64 = 0.05;
pub const DEFAULT_START_DELAY: f64 = 3.0;
pub const DEFAULT_HOTKEY: &str = "f2";

/// Upper bound for every delay field: one day.
pub const MAX_SECONDS: f64 = 86_400.0;

/// The applied typing parameters. All delays are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Nominal pause after every injected character.
    pub base_delay: f64,
    /// Each pause is shifted by a uniform amount in `[-jitter, +jitter]`.
    #[serde(alias = "random_delay")]
    pub jitter: f64,
    /// Countdown before the first keystroke, to let the user focus a window.
    pub start_delay: f64,
    /// Global key combination that starts and stops typing.
    pub hotkey: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            jitter: DEFAULT_JITTER,
            start_delay: DEFAULT_START_DELAY,
            hotkey: DEFAULT_HOTKEY.to_string(),
        }
    }
}

impl Settings {
    /// Load startup settings from a JSON file. Missing fields take defaults.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| TyperError::config_load(path, e.to_string()))?;

        let settings: Settings = serde_json::from_str(&content)
            .map_err(|e| TyperError::config_load(path, e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        check_seconds("base delay", self.base_delay)?;
        check_seconds("jitter", self.jitter)?;
        check_seconds("start delay", self.start_delay)?;

        if self.hotkey.trim().is_empty() {
            return Err(TyperError::EmptyHotkey);
        }
        parse_hotkey(&self.hotkey)?;

        Ok(())
    }

    pub fn start_delay_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.start_delay.max(0.0)).unwrap_or(Duration::MAX)
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "base delay {}s, jitter ±{}s, start delay {}s, hotkey '{}'",
            self.base_delay, self.jitter, self.start_delay, self.hotkey
        )
    }
}

fn check_seconds(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(TyperError::invalid_settings_input(
            field,
            value.to_string(),
            "must be a finite number",
        ));
    }
    if value < 0.0 {
        return Err(TyperError::invalid_settings_input(
            field,
            value.to_string(),
            "must not be negative",
        ));
    }
    if value > MAX_SECONDS {
        return Err(TyperError::invalid_settings_input(
            field,
            value.to_string(),
            format!("must be at most {MAX_SECONDS} seconds"),
        ));
    }
    Ok(())
}

fn parse_seconds(field: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| TyperError::invalid_settings_input(field, raw, "not a number"))?;
    check_seconds(field, value).map_err(|e| match e {
        TyperError::InvalidSettingsInput { reason, .. } => {
            TyperError::invalid_settings_input(field, raw, reason)
        }
        other => other,
    })?;
    Ok(value)
}

/// The four editable input fields, held as raw text until applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    pub base_delay: String,
    pub jitter: String,
    pub start_delay: String,
    pub hotkey: String,
}

impl SettingsForm {
    /// Convert the raw fields into a validated `Settings` record.
    ///
    /// Nothing is mutated here; callers replace their settings only on `Ok`.
    pub fn parse(&self) -> Result<Settings> {
        let base_delay = parse_seconds("base delay", &self.base_delay)?;
        let jitter = parse_seconds("jitter", &self.jitter)?;
        let start_delay = parse_seconds("start delay", &self.start_delay)?;

        let hotkey = self.hotkey.trim();
        if hotkey.is_empty() {
            return Err(TyperError::EmptyHotkey);
        }

        let settings = Settings {
            base_delay,
            jitter,
            start_delay,
            hotkey: hotkey.to_string(),
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl From<&Settings> for SettingsForm {
    fn from(settings: &Settings) -> Self {
        Self {
            base_delay: settings.base_delay.to_string(),
            jitter: settings.jitter.to_string(),
            start_delay: settings.start_delay.to_string(),
            hotkey: settings.hotkey.clone(),
        }
    }
}
