//! Custom error types for auto-typer.
//!
//! Every error here is scoped to one action (applying settings) or one
//! typing session. None of them terminates the process.

use std::io;
use thiserror::Error;

/// Main error type for auto-typer operations.
#[derive(Error, Debug)]
pub enum TyperError {
    /// A delay field did not parse as a non-negative number.
    #[error("invalid value '{value}' for {field}: {reason}")]
    InvalidSettingsInput {
        field: String,
        value: String,
        reason: String,
    },

    /// The hotkey field was blank.
    #[error("hotkey cannot be empty")]
    EmptyHotkey,

    /// The specified key is invalid or unsupported.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Error parsing a key combination.
    #[error("invalid key combination '{combo}': {reason}")]
    InvalidKeyCombination { combo: String, reason: String },

    /// Error registering or handling hotkey.
    #[error("hotkey error: {0}")]
    Hotkey(String),

    /// Neither the editor buffer nor the clipboard had anything to type.
    #[error("no text found in text buffer or clipboard")]
    NoTextAvailable,

    /// The user pressed the hotkey again while a session was active.
    #[error("typing cancelled by user")]
    UserCancelled,

    /// The OS refused a synthetic keystroke.
    #[error("failed to inject '{ch}': {reason}")]
    Injection { ch: char, reason: String },

    /// A session ended early because of a platform failure.
    #[error("typing session failed: {0}")]
    SessionFailed(String),

    /// The system clipboard could not be read.
    #[error("clipboard error: {0}")]
    Clipboard(String),

    /// Error reading or parsing configuration file.
    #[error("failed to load config from '{path}': {reason}")]
    ConfigLoad { path: String, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for auto-typer operations.
pub type Result<T> = std::result::Result<T, TyperError>;

impl TyperError {
    /// Create a new InvalidSettingsInput error.
    pub fn invalid_settings_input(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSettingsInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a new InvalidKey error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a new InvalidKeyCombination error.
    pub fn invalid_key_combination(combo: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKeyCombination {
            combo: combo.into(),
            reason: reason.into(),
        }
    }

    /// Create a new Hotkey error.
    pub fn hotkey(message: impl Into<String>) -> Self {
        Self::Hotkey(message.into())
    }

    /// Create a new Injection error.
    pub fn injection(ch: char, reason: impl Into<String>) -> Self {
        Self::Injection {
            ch,
            reason: reason.into(),
        }
    }

    /// Create a new Clipboard error.
    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::Clipboard(message.into())
    }

    /// Create a new ConfigLoad error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from user input rather than the platform.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSettingsInput { .. }
                | Self::EmptyHotkey
                | Self::InvalidKey { .. }
                | Self::InvalidKeyCombination { .. }
        )
    }
}
