//! # Auto Typer
//!
//! Types text into whichever window has input focus, one character at a
//! time, with human-like pauses between keystrokes.
//!
//! ## Features
//!
//! - Global hotkey toggles typing on and off from any application
//! - Countdown before the first keystroke so the target window can be focused
//! - Base delay plus uniform random jitter for every keystroke
//! - Falls back to the clipboard when the text buffer is empty
//! - Stop requests take effect within 100 ms, mid-countdown or mid-text
//!
//! ## Example
//!
//! ```no_run
//! use auto_typer::{Settings, SessionController, SystemPlatform, Toggle};
//! use std::sync::Arc;
//!
//! let (status_tx, _status_rx) = tokio::sync::mpsc::unbounded_channel();
//! let controller = Arc::new(SessionController::new(
//!     Settings::default(),
//!     SystemPlatform,
//!     status_tx,
//! ));
//! controller.set_buffer("Hello from auto-typer");
//!
//! if let Ok(Toggle::Started(session)) = controller.toggle() {
//!     println!("{:?}", session.join());
//! }
//! ```
//!
//! ## Configuration
//!
//! Startup defaults can be provided via a JSON file:
//!
//! ```json
//! {
//!   "base_delay": 0.1,
//!   "jitter": 0.05,
//!   "start_delay": 3,
//!   "hotkey": "f2"
//! }
//! ```

pub mod clipboard;
pub mod config;
pub mod console;
pub mod error;
#[cfg(any(target_os = "windows", target_os = "macos"))]
pub mod event_loop;
pub mod global_hotkey;
pub mod key_sender;
pub mod session;

pub use config::{Settings, SettingsForm};
pub use console::Console;
pub use crate::global_hotkey::{HotkeyListener, HotkeyManager, RemoteBackend};
pub use error::{Result, TyperError};
pub use key_sender::{KeySender, KeystrokeSink};
pub use session::{SessionController, SessionOutcome, Status, SystemPlatform, Toggle};
