//! Typing sessions: admission, countdown, text resolution, and paced injection.
//!
//! A session moves Idle → CountingDown → Typing → Idle on a dedicated worker
//! thread. One atomic tri-state (idle, running, stopping) carries the shared
//! session state between the hotkey thread, the display thread, and the
//! worker:
//!
//! - idle → running is a compare-and-swap, so at most one session runs at a
//!   time.
//! - running → stopping is also a compare-and-swap, so a stop request can
//!   only land on a live session and is never wiped by a later start.
//! - The worker polls for stopping. Every sleep is sliced into waits of at
//!   most [`POLL_INTERVAL`], so a stop takes effect within that bound whether
//!   the worker is counting down or pausing between keys.
//!
//! The state returns to idle before the final [`Status::Finished`] is
//! reported.

use crate::clipboard::{ClipboardReader, SystemClipboard};
use crate::config::Settings;
use crate::error::{Result, TyperError};
use crate::key_sender::{KeySender, KeystrokeSink};
use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Upper bound on how long a stop request can go unnoticed.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Channel carrying status reports to the display thread.
pub type StatusSender = mpsc::UnboundedSender<Status>;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;

/// Factory for the OS collaborators a session talks to.
///
/// Sinks and clipboard readers are created on the worker thread, so they do
/// not need to be `Send` themselves.
pub trait Platform: Send + Sync + 'static {
    fn keystroke_sink(&self) -> Result<Box<dyn KeystrokeSink>>;
    fn clipboard(&self) -> Box<dyn ClipboardReader>;
}

/// `enigo` for injection and `arboard` for the clipboard.
pub struct SystemPlatform;

impl Platform for SystemPlatform {
    fn keystroke_sink(&self) -> Result<Box<dyn KeystrokeSink>> {
        Ok(Box::new(KeySender::new()?))
    }

    fn clipboard(&self) -> Box<dyn ClipboardReader> {
        Box::new(SystemClipboard)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Countdown,
    Typing,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed { typed: usize },
    Cancelled { phase: Phase, typed: usize },
    NoText,
    Failed { typed: usize, reason: String },
}

impl SessionOutcome {
    pub fn typed(&self) -> usize {
        match self {
            Self::Completed { typed }
            | Self::Cancelled { typed, .. }
            | Self::Failed { typed, .. } => *typed,
            Self::NoText => 0,
        }
    }

    /// The error kind this outcome corresponds to, if it is not a success.
    pub fn error(&self) -> Option<TyperError> {
        match self {
            Self::Completed { .. } => None,
            Self::Cancelled { .. } => Some(TyperError::UserCancelled),
            Self::NoText => Some(TyperError::NoTextAvailable),
            Self::Failed { reason, .. } => Some(TyperError::SessionFailed(reason.clone())),
        }
    }
}

/// Messages for the status display.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    HotkeyRegistered(String),
    SettingsRejected(String),
    CountingDown { seconds: f64 },
    Typing { chars: usize, from_clipboard: bool },
    StopRequested,
    Finished(SessionOutcome),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HotkeyRegistered(hotkey) => {
                write!(f, "Hotkey '{hotkey}' registered. Press it to start/stop typing.")
            }
            Self::SettingsRejected(reason) => write!(f, "Settings not applied: {reason}"),
            Self::CountingDown { seconds } => write!(
                f,
                "Typing will start in {seconds} seconds. Focus the target window now."
            ),
            Self::Typing {
                chars,
                from_clipboard,
            } => {
                let source = if *from_clipboard { "clipboard" } else { "text buffer" };
                write!(f, "Typing started ({chars} characters from {source}).")
            }
            Self::StopRequested => write!(f, "Stop requested. Stopping typing..."),
            Self::Finished(outcome) => match outcome {
                SessionOutcome::Completed { typed } => {
                    write!(f, "Typing completed ({typed} characters).")
                }
                SessionOutcome::Cancelled {
                    phase: Phase::Countdown,
                    ..
                } => write!(f, "Typing canceled before start."),
                SessionOutcome::Cancelled {
                    phase: Phase::Typing,
                    typed,
                } => write!(f, "Typing stopped by user after {typed} characters."),
                SessionOutcome::NoText => write!(f, "No text found in text box or clipboard."),
                SessionOutcome::Failed { reason, typed } => {
                    write!(f, "Typing failed after {typed} characters: {reason}")
                }
            },
        }
    }
}

/// Result of a hotkey toggle.
pub enum Toggle {
    Started(SessionHandle),
    StopRequested,
}

/// Handle to a running session's worker thread.
pub struct SessionHandle(JoinHandle<SessionOutcome>);

impl SessionHandle {
    pub fn join(self) -> SessionOutcome {
        self.0.join().unwrap_or_else(|_| SessionOutcome::Failed {
            typed: 0,
            reason: "typing worker panicked".to_string(),
        })
    }
}

/// Pause after one keystroke: `base + uniform(-jitter, +jitter)`, never negative.
pub fn keystroke_delay<R: Rng + ?Sized>(base: f64, jitter: f64, rng: &mut R) -> Duration {
    // Scaling a unit sample keeps the range finite for any finite jitter.
    let offset = if jitter > 0.0 {
        rng.gen_range(-1.0..=1.0) * jitter
    } else {
        0.0
    };
    Duration::try_from_secs_f64((base + offset).max(0.0)).unwrap_or(Duration::MAX)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the applied settings, the text buffer, and the session state.
pub struct SessionController {
    settings: Mutex<Settings>,
    buffer: Mutex<String>,
    state: AtomicU8,
    platform: Box<dyn Platform>,
    status: StatusSender,
    poll_interval: Duration,
}

impl SessionController {
    pub fn new(settings: Settings, platform: impl Platform, status: StatusSender) -> Self {
        Self {
            settings: Mutex::new(settings),
            buffer: Mutex::new(String::new()),
            state: AtomicU8::new(IDLE),
            platform: Box::new(platform),
            status,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn settings(&self) -> Settings {
        lock(&self.settings).clone()
    }

    /// Replace the whole settings record. Running sessions keep the
    /// snapshot they started with.
    pub fn replace_settings(&self, settings: Settings) {
        debug!(%settings, "settings replaced");
        *lock(&self.settings) = settings;
    }

    pub fn buffer(&self) -> String {
        lock(&self.buffer).clone()
    }

    pub fn set_buffer(&self, text: impl Into<String>) {
        *lock(&self.buffer) = text.into();
    }

    pub fn append_line(&self, line: &str) {
        let mut buffer = lock(&self.buffer);
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(line);
    }

    pub fn clear_buffer(&self) {
        lock(&self.buffer).clear();
    }

    /// True while a session is counting down or typing.
    pub fn is_in_progress(&self) -> bool {
        self.state.load(Ordering::Acquire) != IDLE
    }

    pub fn is_stop_requested(&self) -> bool {
        self.state.load(Ordering::Acquire) == STOPPING
    }

    /// Ask a running session to stop. Returns `false` when idle.
    pub fn request_stop(&self) -> bool {
        match self
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(current) => current == STOPPING,
        }
    }

    /// The hotkey action: start a session when idle, otherwise ask the
    /// running one to stop at its next check point.
    pub fn toggle(self: &Arc<Self>) -> Result<Toggle> {
        loop {
            if self
                .state
                .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
            if self.request_stop() {
                info!("stop requested");
                self.report(Status::StopRequested);
                return Ok(Toggle::StopRequested);
            }
            // The session went idle between the two exchanges.
        }

        let settings = self.settings();
        let controller = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("typing-session".into())
            .spawn(move || controller.run_session(&settings));

        match spawned {
            Ok(handle) => Ok(Toggle::Started(SessionHandle(handle))),
            Err(e) => {
                self.state.store(IDLE, Ordering::Release);
                Err(e.into())
            }
        }
    }

    fn run_session(&self, settings: &Settings) -> SessionOutcome {
        let outcome = {
            let _idle = IdleGuard(self);
            self.run_phases(settings)
        };
        info!(?outcome, "typing session finished");
        self.report(Status::Finished(outcome.clone()));
        outcome
    }

    fn run_phases(&self, settings: &Settings) -> SessionOutcome {
        info!(start_delay = settings.start_delay, "typing session started");
        self.report(Status::CountingDown {
            seconds: settings.start_delay,
        });
        if !self.sleep_unless_stopped(settings.start_delay_duration()) {
            return SessionOutcome::Cancelled {
                phase: Phase::Countdown,
                typed: 0,
            };
        }

        let (text, from_clipboard) = match self.resolve_text() {
            Ok(Some(found)) => found,
            Ok(None) => return SessionOutcome::NoText,
            Err(e) => {
                return SessionOutcome::Failed {
                    typed: 0,
                    reason: e.to_string(),
                }
            }
        };

        let mut sink = match self.platform.keystroke_sink() {
            Ok(sink) => sink,
            Err(e) => {
                return SessionOutcome::Failed {
                    typed: 0,
                    reason: e.to_string(),
                }
            }
        };

        self.report(Status::Typing {
            chars: text.chars().count(),
            from_clipboard,
        });
        self.type_text(&text, settings, sink.as_mut(), &mut rand::thread_rng())
    }

    /// Text buffer first, trimmed; otherwise the clipboard, untouched.
    fn resolve_text(&self) -> Result<Option<(String, bool)>> {
        let buffered = self.buffer().trim().to_string();
        if !buffered.is_empty() {
            return Ok(Some((buffered, false)));
        }

        let clipboard = self.platform.clipboard().read_text()?;
        if clipboard.is_empty() {
            return Ok(None);
        }
        debug!(chars = clipboard.chars().count(), "using clipboard text");
        Ok(Some((clipboard, true)))
    }

    fn type_text<R: Rng + ?Sized>(
        &self,
        text: &str,
        settings: &Settings,
        sink: &mut dyn KeystrokeSink,
        rng: &mut R,
    ) -> SessionOutcome {
        let mut typed = 0;
        for ch in text.chars() {
            if self.is_stop_requested() {
                return SessionOutcome::Cancelled {
                    phase: Phase::Typing,
                    typed,
                };
            }
            if let Err(e) = sink.send_char(ch) {
                warn!(error = %e, typed, "keystroke injection failed");
                return SessionOutcome::Failed {
                    typed,
                    reason: e.to_string(),
                };
            }
            typed += 1;

            // An interrupted pause is picked up by the check at the top.
            let pause = keystroke_delay(settings.base_delay, settings.jitter, rng);
            self.sleep_unless_stopped(pause);
        }
        SessionOutcome::Completed { typed }
    }

    /// Sleep for `total` in poll-sized slices. Returns `false` if a stop was
    /// requested before the time ran out.
    fn sleep_unless_stopped(&self, total: Duration) -> bool {
        let deadline = Instant::now().checked_add(total);
        loop {
            if self.is_stop_requested() {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => self.poll_interval,
            };
            if remaining.is_zero() {
                return true;
            }
            thread::sleep(remaining.min(self.poll_interval));
        }
    }

    fn report(&self, status: Status) {
        if self.status.send(status).is_err() {
            debug!("status display is gone, dropping report");
        }
    }
}

/// Returns the controller to idle however a session exits, which also
/// discards any pending stop request.
struct IdleGuard<'a>(&'a SessionController);

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        self.0.state.store(IDLE, Ordering::Release);
    }
}
