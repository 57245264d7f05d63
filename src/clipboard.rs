//! Read-only access to the system clipboard.

use crate::error::{Result, TyperError};
use arboard::Clipboard;

/// Fallback text source consulted when the text buffer is empty.
pub trait ClipboardReader {
    /// Current clipboard text; an empty string when there is none.
    fn read_text(&mut self) -> Result<String>;
}

pub struct SystemClipboard;

impl ClipboardReader for SystemClipboard {
    fn read_text(&mut self) -> Result<String> {
        let mut clipboard = Clipboard::new()
            .map_err(|e| TyperError::clipboard(format!("failed to open clipboard: {e}")))?;

        match clipboard.get_text() {
            Ok(text) => Ok(text),
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(TyperError::clipboard(e.to_string())),
        }
    }
}
