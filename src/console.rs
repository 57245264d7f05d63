//! Interactive console on the display thread.
//!
//! Reads one command per line from stdin, keeps the pending settings form,
//! and prints status reports that the typing worker sends over a channel.
//! Nothing here sleeps; long-running work belongs to the session worker.

use crate::config::{Settings, SettingsForm};
use crate::error::Result;
use crate::global_hotkey::{HotkeyBackend, HotkeyManager};
use crate::session::{SessionController, Status, Toggle};
use colored::Colorize;
use global_hotkey::GlobalHotKeyManager;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const HELP: &str = "\
Commands:
  text <line>       append a line to the text buffer
  clear             empty the text buffer
  show              print the text buffer
  base <seconds>    set the base delay between keystrokes
  jitter <seconds>  set the random variation around the base delay
  start <seconds>   set the countdown before typing starts
  hotkey <combo>    set the global hotkey, e.g. f2 or ctrl+shift+t
  apply             validate the fields, apply them and register the hotkey
  toggle            same as pressing the hotkey
  settings          show applied and pending settings
  status            show whether a session is running
  help              show this help
  quit              exit

If the text buffer is empty when typing starts, the clipboard is typed instead.";

/// An editable settings field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    BaseDelay,
    Jitter,
    StartDelay,
    Hotkey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Text(String),
    Clear,
    Show,
    Set(Field, String),
    Apply,
    Toggle,
    Settings,
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

/// Parse one console line. The argument of `text` keeps its inner spacing.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim_start();
    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest),
        None => (trimmed, ""),
    };

    match word.to_lowercase().as_str() {
        "" => Command::Empty,
        "text" => Command::Text(rest.to_string()),
        "clear" => Command::Clear,
        "show" => Command::Show,
        "base" => Command::Set(Field::BaseDelay, rest.trim().to_string()),
        "jitter" => Command::Set(Field::Jitter, rest.trim().to_string()),
        "start" => Command::Set(Field::StartDelay, rest.trim().to_string()),
        "hotkey" => Command::Set(Field::Hotkey, rest.trim().to_string()),
        "apply" => Command::Apply,
        "toggle" => Command::Toggle,
        "settings" => Command::Settings,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(word.to_string()),
    }
}

/// What the display should print after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Info(String),
    Error(String),
    Nothing,
    Quit,
}

pub struct Console<B: HotkeyBackend = GlobalHotKeyManager> {
    controller: Arc<SessionController>,
    hotkeys: Option<HotkeyManager<B>>,
    form: SettingsForm,
}

impl<B: HotkeyBackend> Console<B> {
    /// `hotkeys` is `None` when the OS offers no global hotkeys; `toggle`
    /// still works from the console then.
    pub fn new(controller: Arc<SessionController>, hotkeys: Option<HotkeyManager<B>>) -> Self {
        let form = SettingsForm::from(&controller.settings());
        Self {
            controller,
            hotkeys,
            form,
        }
    }

    pub fn hotkeys(&self) -> Option<&HotkeyManager<B>> {
        self.hotkeys.as_ref()
    }

    /// Validate the pending form, swap the hotkey binding, then replace the
    /// applied settings. Any failure leaves both untouched.
    pub fn apply(&mut self) -> Result<Settings> {
        let settings = self.form.parse()?;
        if let Some(hotkeys) = self.hotkeys.as_mut() {
            hotkeys.rebind(&settings.hotkey)?;
        }
        self.controller.replace_settings(settings.clone());
        Ok(settings)
    }

    pub fn execute(&mut self, command: Command) -> Reply {
        match command {
            Command::Text(line) => {
                self.controller.append_line(&line);
                Reply::Nothing
            }
            Command::Clear => {
                self.controller.clear_buffer();
                Reply::Info("Text buffer cleared.".to_string())
            }
            Command::Show => {
                let buffer = self.controller.buffer();
                if buffer.is_empty() {
                    Reply::Info("Text buffer is empty (clipboard will be used).".to_string())
                } else {
                    Reply::Info(buffer)
                }
            }
            Command::Set(field, value) => {
                let slot = match field {
                    Field::BaseDelay => &mut self.form.base_delay,
                    Field::Jitter => &mut self.form.jitter,
                    Field::StartDelay => &mut self.form.start_delay,
                    Field::Hotkey => &mut self.form.hotkey,
                };
                *slot = value;
                Reply::Nothing
            }
            Command::Apply => match self.apply() {
                Ok(settings) => {
                    let message = if self.hotkeys.is_some() {
                        Status::HotkeyRegistered(settings.hotkey).to_string()
                    } else {
                        "Settings applied. Global hotkeys unavailable, use 'toggle'.".to_string()
                    };
                    Reply::Info(message)
                }
                Err(e) => Reply::Error(Status::SettingsRejected(e.to_string()).to_string()),
            },
            Command::Toggle => match self.controller.toggle() {
                Ok(Toggle::Started(_) | Toggle::StopRequested) => Reply::Nothing,
                Err(e) => Reply::Error(format!("Could not start typing: {e}")),
            },
            Command::Settings => Reply::Info(format!(
                "applied: {}\npending: base {} / jitter {} / start {} / hotkey '{}'",
                self.controller.settings(),
                self.form.base_delay,
                self.form.jitter,
                self.form.start_delay,
                self.form.hotkey
            )),
            Command::Status => {
                let state = if self.controller.is_in_progress() {
                    "a typing session is running"
                } else {
                    "idle"
                };
                Reply::Info(format!("Status: {state}"))
            }
            Command::Help => Reply::Info(HELP.to_string()),
            Command::Quit => Reply::Quit,
            Command::Empty => Reply::Nothing,
            Command::Unknown(word) => {
                Reply::Error(format!("Unknown command '{word}'. Type 'help' for commands."))
            }
        }
    }

    /// Stop any running session and release the hotkey.
    pub fn shutdown(&mut self) {
        if self.controller.request_stop() {
            debug!("stopping running session on exit");
        }
        if let Some(hotkeys) = self.hotkeys.as_mut() {
            if let Err(e) = hotkeys.unbind() {
                warn!(error = %e, "failed to release hotkey");
            }
        }
    }

    /// Drive the console until `quit` or end of input.
    pub async fn run(mut self, mut status_rx: mpsc::UnboundedReceiver<Status>) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!("{}", "Auto Typer".bold());
        println!("{}", "Type 'help' for commands.".dimmed());
        let first = self.execute(Command::Apply);
        render(&first);
        if matches!(first, Reply::Error(_)) {
            println!("{}", "Status: Waiting for settings...".yellow());
        }

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let reply = self.execute(parse_command(&line));
                    if reply == Reply::Quit {
                        break;
                    }
                    render(&reply);
                }
                Some(status) = status_rx.recv() => render_status(&status),
            }
        }

        self.shutdown();
        Ok(())
    }
}

fn render(reply: &Reply) {
    match reply {
        Reply::Info(text) => println!("{text}"),
        Reply::Error(text) => println!("{}", text.red()),
        Reply::Nothing | Reply::Quit => {}
    }
}

fn render_status(status: &Status) {
    let line = format!("Status: {status}");
    let line = match status {
        Status::Finished(outcome) if outcome.error().is_none() => line.green(),
        Status::Finished(_) | Status::SettingsRejected(_) => line.red(),
        Status::StopRequested | Status::CountingDown { .. } => line.yellow(),
        Status::HotkeyRegistered(_) | Status::Typing { .. } => line.cyan(),
    };
    println!("{line}");
}
