//! Keystroke injection into whichever window currently has input focus.

use crate::error::{Result, TyperError};
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::trace;

/// Anything that can deliver one typed character to the focused window.
pub trait KeystrokeSink {
    fn send_char(&mut self, ch: char) -> Result<()>;
}

/// Injects characters through the OS input facility via `enigo`.
pub struct KeySender {
    enigo: Enigo,
}

impl KeySender {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| TyperError::injection('\0', format!("failed to initialize enigo: {e}")))?;
        Ok(Self { enigo })
    }
}

impl KeystrokeSink for KeySender {
    fn send_char(&mut self, ch: char) -> Result<()> {
        trace!(?ch, "injecting");
        let sent = match special_key(ch) {
            Some(key) => self.enigo.key(key, Direction::Click),
            None => {
                let mut buf = [0u8; 4];
                self.enigo.text(ch.encode_utf8(&mut buf))
            }
        };
        sent.map_err(|e| TyperError::injection(ch, e.to_string()))
    }
}

/// Control characters that must go out as key presses rather than text.
fn special_key(ch: char) -> Option<Key> {
    match ch {
        '\n' => Some(Key::Return),
        '\t' => Some(Key::Tab),
        _ => None,
    }
}
