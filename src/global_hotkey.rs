//! Global hotkey registration and event dispatch.
//!
//! Exactly one binding is active at a time. [`HotkeyManager::rebind`] swaps
//! it by unregistering the old combination and registering the new one; if
//! the OS refuses the new one, the old binding is put back.
//!
//! Some platforms only accept registrations from the thread that runs the
//! OS event loop. [`RemoteBackend`] forwards registration calls to that
//! thread as [`HotkeyRequest`]s and waits for the answer.

use crate::error::{Result, TyperError};
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the listener thread wakes up to check for shutdown.
const LISTENER_POLL: Duration = Duration::from_millis(100);

/// How long a forwarded registration may wait for the owning thread.
const REMOTE_TIMEOUT: Duration = Duration::from_secs(2);

/// The OS side of hotkey registration.
pub trait HotkeyBackend {
    fn register(&self, hotkey: HotKey) -> Result<()>;
    fn unregister(&self, hotkey: HotKey) -> Result<()>;
}

impl HotkeyBackend for GlobalHotKeyManager {
    fn register(&self, hotkey: HotKey) -> Result<()> {
        GlobalHotKeyManager::register(self, hotkey).map_err(|e| TyperError::hotkey(e.to_string()))
    }

    fn unregister(&self, hotkey: HotKey) -> Result<()> {
        GlobalHotKeyManager::unregister(self, hotkey)
            .map_err(|e| TyperError::hotkey(e.to_string()))
    }
}

/// One registration call, to be run on the thread owning the OS manager.
pub enum HotkeyRequest {
    Register(HotKey, SyncSender<Result<()>>),
    Unregister(HotKey, SyncSender<Result<()>>),
}

impl HotkeyRequest {
    /// Run the call against `backend` and send the result back.
    pub fn serve<B: HotkeyBackend>(self, backend: &B) {
        let (result, reply) = match self {
            Self::Register(hotkey, reply) => (backend.register(hotkey), reply),
            Self::Unregister(hotkey, reply) => (backend.unregister(hotkey), reply),
        };
        if reply.send(result).is_err() {
            debug!("hotkey requester went away before the reply");
        }
    }
}

/// Where a [`RemoteBackend`] posts its requests.
pub trait RequestSink: Send {
    /// Returns `false` when the owning thread is gone.
    fn deliver(&self, request: HotkeyRequest) -> bool;
}

impl RequestSink for Sender<HotkeyRequest> {
    fn deliver(&self, request: HotkeyRequest) -> bool {
        self.send(request).is_ok()
    }
}

/// Backend that runs every call on another thread and blocks for the reply.
pub struct RemoteBackend<S: RequestSink> {
    sink: S,
}

impl<S: RequestSink> RemoteBackend<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    fn call(&self, request: impl FnOnce(SyncSender<Result<()>>) -> HotkeyRequest) -> Result<()> {
        let (reply, answer) = mpsc::sync_channel(1);
        if !self.sink.deliver(request(reply)) {
            return Err(TyperError::hotkey("hotkey thread is not running"));
        }
        answer
            .recv_timeout(REMOTE_TIMEOUT)
            .map_err(|_| TyperError::hotkey("hotkey thread did not answer"))?
    }
}

impl<S: RequestSink> HotkeyBackend for RemoteBackend<S> {
    fn register(&self, hotkey: HotKey) -> Result<()> {
        self.call(|reply| HotkeyRequest::Register(hotkey, reply))
    }

    fn unregister(&self, hotkey: HotKey) -> Result<()> {
        self.call(|reply| HotkeyRequest::Unregister(hotkey, reply))
    }
}

/// Id of the currently bound hotkey, shared with the listener thread.
///
/// Zero means nothing is bound.
#[derive(Debug, Clone, Default)]
pub struct ActiveBinding(Arc<AtomicU32>);

impl ActiveBinding {
    pub fn matches(&self, id: u32) -> bool {
        id != 0 && self.0.load(Ordering::Acquire) == id
    }

    pub fn is_bound(&self) -> bool {
        self.0.load(Ordering::Acquire) != 0
    }

    fn set(&self, id: u32) {
        self.0.store(id, Ordering::Release);
    }

    fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
struct Binding {
    combo: String,
    hotkey: HotKey,
}

/// Owns the single global hotkey binding.
pub struct HotkeyManager<B: HotkeyBackend = GlobalHotKeyManager> {
    backend: B,
    current: Option<Binding>,
    active: ActiveBinding,
}

impl HotkeyManager<GlobalHotKeyManager> {
    pub fn new() -> Result<Self> {
        let manager = GlobalHotKeyManager::new().map_err(|e| {
            TyperError::hotkey(format!("failed to create GlobalHotKeyManager: {e}"))
        })?;
        Ok(Self::with_backend(manager))
    }
}

impl<B: HotkeyBackend> HotkeyManager<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            current: None,
            active: ActiveBinding::default(),
        }
    }

    /// Replace the active binding with `combo`.
    ///
    /// On error the previous binding is still registered and still current.
    pub fn rebind(&mut self, combo: &str) -> Result<()> {
        let hotkey = parse_hotkey(combo)?;
        let combo = combo.trim().to_string();

        if let Some(binding) = self.current.as_mut() {
            if binding.hotkey == hotkey {
                debug!(hotkey = %combo, "hotkey unchanged, keeping registration");
                binding.combo = combo;
                return Ok(());
            }
            self.backend.unregister(binding.hotkey)?;
        }

        if let Err(e) = self.backend.register(hotkey) {
            warn!(hotkey = %combo, error = %e, "failed to register hotkey");
            if let Some(old) = &self.current {
                if let Err(restore) = self.backend.register(old.hotkey) {
                    warn!(
                        hotkey = %old.combo,
                        error = %restore,
                        "could not restore previous hotkey"
                    );
                    self.current = None;
                    self.active.clear();
                }
            }
            return Err(e);
        }

        self.active.set(hotkey.id());
        info!(hotkey = %combo, "global hotkey registered");
        self.current = Some(Binding { combo, hotkey });
        Ok(())
    }

    /// Remove the active binding, if any.
    pub fn unbind(&mut self) -> Result<()> {
        if let Some(binding) = self.current.take() {
            self.active.clear();
            self.backend.unregister(binding.hotkey)?;
            info!(hotkey = %binding.combo, "global hotkey unregistered");
        }
        Ok(())
    }

    pub fn current_combo(&self) -> Option<&str> {
        self.current.as_ref().map(|b| b.combo.as_str())
    }

    pub fn active_binding(&self) -> ActiveBinding {
        self.active.clone()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// Background thread forwarding presses of the active hotkey to a callback.
pub struct HotkeyListener {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HotkeyListener {
    /// Start listening. `on_press` runs on the listener thread and must not
    /// block; it should only flip flags or spawn work.
    pub fn spawn<F>(active: ActiveBinding, on_press: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let receiver = GlobalHotKeyEvent::receiver();
                while running_thread.load(Ordering::Acquire) {
                    match receiver.recv_timeout(LISTENER_POLL) {
                        Ok(event) => {
                            dispatch(&active, event.id, event.state, &on_press);
                        }
                        Err(e) if e.is_disconnected() => {
                            warn!("hotkey event channel closed");
                            break;
                        }
                        Err(_) => {}
                    }
                }
                debug!("hotkey listener stopped");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("hotkey listener thread panicked");
            }
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Invoke `on_press` for a key-down of the active binding. Releases and
/// stale ids from a previous binding are ignored.
pub fn dispatch<F: Fn()>(
    active: &ActiveBinding,
    id: u32,
    state: HotKeyState,
    on_press: &F,
) -> bool {
    if state == HotKeyState::Pressed && active.matches(id) {
        on_press();
        true
    } else {
        false
    }
}

/// Parse a combination like `ctrl+shift+f2` (case-insensitive).
pub fn parse_hotkey(hotkey_str: &str) -> Result<HotKey> {
    let binding = hotkey_str.trim().to_lowercase();
    if binding.is_empty() {
        return Err(TyperError::EmptyHotkey);
    }

    let mut modifiers = Modifiers::empty();
    let mut key_code = None;

    for part in binding.split('+').map(str::trim) {
        match part {
            "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
            "alt" => modifiers |= Modifiers::ALT,
            "shift" => modifiers |= Modifiers::SHIFT,
            "meta" | "cmd" | "super" => modifiers |= Modifiers::SUPER,
            "" => {
                return Err(TyperError::invalid_key_combination(
                    hotkey_str,
                    "empty segment",
                ))
            }
            key => {
                if key_code.is_some() {
                    return Err(TyperError::invalid_key_combination(
                        hotkey_str,
                        "multiple non-modifier keys",
                    ));
                }
                key_code = Some(parse_key_code(key)?);
            }
        }
    }

    let code = key_code
        .ok_or_else(|| TyperError::invalid_key_combination(hotkey_str, "no key specified"))?;

    Ok(HotKey::new(Some(modifiers), code))
}

const LETTERS: [Code; 26] = [
    Code::KeyA, Code::KeyB, Code::KeyC, Code::KeyD, Code::KeyE, Code::KeyF, Code::KeyG,
    Code::KeyH, Code::KeyI, Code::KeyJ, Code::KeyK, Code::KeyL, Code::KeyM, Code::KeyN,
    Code::KeyO, Code::KeyP, Code::KeyQ, Code::KeyR, Code::KeyS, Code::KeyT, Code::KeyU,
    Code::KeyV, Code::KeyW, Code::KeyX, Code::KeyY, Code::KeyZ,
];

const DIGITS: [Code; 10] = [
    Code::Digit0, Code::Digit1, Code::Digit2, Code::Digit3, Code::Digit4,
    Code::Digit5, Code::Digit6, Code::Digit7, Code::Digit8, Code::Digit9,
];

const FUNCTION_KEYS: [Code; 12] = [
    Code::F1, Code::F2, Code::F3, Code::F4, Code::F5, Code::F6,
    Code::F7, Code::F8, Code::F9, Code::F10, Code::F11, Code::F12,
];

fn parse_key_code(key: &str) -> Result<Code> {
    let mut chars = key.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_lowercase() {
            return Ok(LETTERS[(c as u8 - b'a') as usize]);
        }
        if c.is_ascii_digit() {
            return Ok(DIGITS[(c as u8 - b'0') as usize]);
        }
    }

    if let Some(n) = key.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
        if (1..=FUNCTION_KEYS.len()).contains(&n) {
            return Ok(FUNCTION_KEYS[n - 1]);
        }
    }

    let code = match key {
        "space" => Code::Space,
        "enter" | "return" => Code::Enter,
        "tab" => Code::Tab,
        "escape" | "esc" => Code::Escape,
        "backspace" => Code::Backspace,
        "delete" => Code::Delete,
        "insert" => Code::Insert,
        "home" => Code::Home,
        "end" => Code::End,
        "pageup" => Code::PageUp,
        "pagedown" => Code::PageDown,
        "up" | "arrowup" => Code::ArrowUp,
        "down" | "arrowdown" => Code::ArrowDown,
        "left" | "arrowleft" => Code::ArrowLeft,
        "right" | "arrowright" => Code::ArrowRight,
        _ => return Err(TyperError::invalid_key(key, "unsupported key")),
    };

    Ok(code)
}
