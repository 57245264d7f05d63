use anyhow::Result;
use auto_typer::clipboard::ClipboardReader;
use auto_typer::console::{parse_command, Reply};
use auto_typer::global_hotkey::{parse_hotkey, HotkeyBackend};
use auto_typer::session::{Phase, Platform, SessionHandle};
use auto_typer::{
    Console, HotkeyManager, KeystrokeSink, SessionController, SessionOutcome, Settings, Status,
    Toggle, TyperError,
};
use global_hotkey::hotkey::HotKey;
use std::cell::RefCell;
use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

// Test doubles

#[derive(Clone, Default)]
struct MockPlatform {
    typed: Arc<Mutex<Vec<char>>>,
    clipboard: Arc<Mutex<String>>,
    fail_after: Option<usize>,
}

impl MockPlatform {
    fn with_clipboard(text: &str) -> Self {
        let platform = Self::default();
        *platform.clipboard.lock().unwrap() = text.to_string();
        platform
    }

    fn typed(&self) -> String {
        self.typed.lock().unwrap().iter().collect()
    }

    fn typed_len(&self) -> usize {
        self.typed.lock().unwrap().len()
    }
}

struct RecordingSink {
    typed: Arc<Mutex<Vec<char>>>,
    fail_after: Option<usize>,
}

impl KeystrokeSink for RecordingSink {
    fn send_char(&mut self, ch: char) -> auto_typer::Result<()> {
        let mut typed = self.typed.lock().unwrap();
        if self.fail_after.is_some_and(|n| typed.len() >= n) {
            return Err(TyperError::injection(ch, "display went away"));
        }
        typed.push(ch);
        Ok(())
    }
}

struct FixedClipboard(String);

impl ClipboardReader for FixedClipboard {
    fn read_text(&mut self) -> auto_typer::Result<String> {
        Ok(self.0.clone())
    }
}

impl Platform for MockPlatform {
    fn keystroke_sink(&self) -> auto_typer::Result<Box<dyn KeystrokeSink>> {
        Ok(Box::new(RecordingSink {
            typed: Arc::clone(&self.typed),
            fail_after: self.fail_after,
        }))
    }

    fn clipboard(&self) -> Box<dyn ClipboardReader> {
        Box::new(FixedClipboard(self.clipboard.lock().unwrap().clone()))
    }
}

#[derive(Default)]
struct FakeBackend {
    registered: RefCell<HashSet<u32>>,
}

impl HotkeyBackend for FakeBackend {
    fn register(&self, hotkey: HotKey) -> auto_typer::Result<()> {
        self.registered.borrow_mut().insert(hotkey.id());
        Ok(())
    }

    fn unregister(&self, hotkey: HotKey) -> auto_typer::Result<()> {
        self.registered.borrow_mut().remove(&hotkey.id());
        Ok(())
    }
}

// Helpers

fn settings(base_delay: f64, start_delay: f64) -> Settings {
    Settings {
        base_delay,
        jitter: 0.0,
        start_delay,
        hotkey: "f2".to_string(),
    }
}

fn controller(
    settings: Settings,
    platform: MockPlatform,
) -> (Arc<SessionController>, mpsc::UnboundedReceiver<Status>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = SessionController::new(settings, platform, tx)
        .with_poll_interval(Duration::from_millis(5));
    (Arc::new(controller), rx)
}

fn start(controller: &Arc<SessionController>) -> SessionHandle {
    match controller.toggle().unwrap() {
        Toggle::Started(handle) => handle,
        Toggle::StopRequested => panic!("expected a new session to start"),
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Status>) -> Vec<Status> {
    let mut statuses = Vec::new();
    while let Ok(status) = rx.try_recv() {
        statuses.push(status);
    }
    statuses
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in {timeout:?}");
        thread::sleep(Duration::from_millis(1));
    }
}

// Settings store

#[test]
fn test_apply_settings_updates_values_and_binds_one_hotkey() {
    let (controller, _rx) = controller(Settings::default(), MockPlatform::default());
    let mut console = Console::new(
        Arc::clone(&controller),
        Some(HotkeyManager::with_backend(FakeBackend::default())),
    );

    assert!(matches!(console.execute(parse_command("apply")), Reply::Info(_)));
    for line in ["base 0.02", "jitter 0.01", "start 0.5", "hotkey ctrl+shift+t"] {
        assert_eq!(console.execute(parse_command(line)), Reply::Nothing);
    }
    let reply = console.execute(parse_command("apply"));
    assert_eq!(
        reply,
        Reply::Info("Hotkey 'ctrl+shift+t' registered. Press it to start/stop typing.".to_string())
    );

    assert_eq!(
        controller.settings(),
        Settings {
            base_delay: 0.02,
            jitter: 0.01,
            start_delay: 0.5,
            hotkey: "ctrl+shift+t".to_string(),
        }
    );

    let hotkeys = console.hotkeys().unwrap();
    assert_eq!(
        *hotkeys.backend().registered.borrow(),
        HashSet::from([parse_hotkey("ctrl+shift+t").unwrap().id()])
    );
}

#[test]
fn test_invalid_input_leaves_settings_and_binding_unchanged() {
    let (controller, _rx) = controller(Settings::default(), MockPlatform::default());
    let mut console = Console::new(
        Arc::clone(&controller),
        Some(HotkeyManager::with_backend(FakeBackend::default())),
    );
    console.execute(parse_command("apply"));
    let before = controller.settings();

    for bad in [
        vec!["base slow", "hotkey f9"],
        vec!["jitter -1", "hotkey f9"],
        vec!["base 0.1", "jitter 0.05", "hotkey "],
        vec!["hotkey ctrl+nothing"],
    ] {
        for line in bad {
            console.execute(parse_command(line));
        }
        match console.execute(parse_command("apply")) {
            Reply::Error(message) => assert!(message.starts_with("Settings not applied")),
            other => panic!("expected an error, got {other:?}"),
        }
        assert_eq!(controller.settings(), before);
        assert_eq!(console.hotkeys().unwrap().current_combo(), Some("f2"));
        assert_eq!(
            *console.hotkeys().unwrap().backend().registered.borrow(),
            HashSet::from([parse_hotkey("f2").unwrap().id()])
        );
    }
}

#[test]
fn test_apply_without_global_hotkeys_still_validates() {
    let (controller, _rx) = controller(Settings::default(), MockPlatform::default());
    let mut console = Console::<FakeBackend>::new(Arc::clone(&controller), None);

    console.execute(parse_command("base 0.3"));
    assert!(matches!(console.execute(parse_command("apply")), Reply::Info(_)));
    assert_eq!(controller.settings().base_delay, 0.3);

    console.execute(parse_command("hotkey ctrl+alt"));
    assert!(matches!(console.execute(parse_command("apply")), Reply::Error(_)));
    assert_eq!(controller.settings().hotkey, "f2");
}

// Typing engine

#[test]
fn test_toggle_while_active_requests_stop_without_second_session() {
    let platform = MockPlatform::default();
    let (controller, mut rx) = controller(settings(0.0, 0.3), platform.clone());
    controller.set_buffer("never typed");

    let handle = start(&controller);
    assert!(controller.is_in_progress());

    assert!(matches!(controller.toggle().unwrap(), Toggle::StopRequested));
    assert!(matches!(controller.toggle().unwrap(), Toggle::StopRequested));

    let outcome = handle.join();
    assert_eq!(
        outcome,
        SessionOutcome::Cancelled {
            phase: Phase::Countdown,
            typed: 0
        }
    );
    assert_eq!(platform.typed(), "");
    assert!(!controller.is_in_progress());
    assert!(!controller.is_stop_requested());

    let statuses = drain(&mut rx);
    assert!(statuses.contains(&Status::CountingDown { seconds: 0.3 }));
    assert_eq!(statuses.last(), Some(&Status::Finished(outcome)));
    assert!(!statuses.iter().any(|s| matches!(s, Status::Typing { .. })));
}

#[test]
fn test_stop_during_countdown_is_prompt() {
    let platform = MockPlatform::default();
    let (controller, _rx) = controller(settings(0.0, 10.0), platform.clone());
    controller.set_buffer("abc");

    let handle = start(&controller);
    thread::sleep(Duration::from_millis(20));
    let stopped_at = Instant::now();
    controller.toggle().unwrap();
    let outcome = handle.join();

    assert!(stopped_at.elapsed() < Duration::from_secs(1));
    assert_eq!(outcome.typed(), 0);
    assert_eq!(platform.typed_len(), 0);
}

#[test]
fn test_stop_after_n_characters_types_at_most_one_more() {
    let text = "the quick brown fox jumps over the lazy dog";
    let platform = MockPlatform::default();
    let (controller, _rx) = controller(settings(0.05, 0.0), platform.clone());
    controller.set_buffer(text);

    let handle = start(&controller);
    wait_until(Duration::from_secs(5), || platform.typed_len() >= 2);
    let seen = platform.typed_len();
    assert!(matches!(controller.toggle().unwrap(), Toggle::StopRequested));
    let outcome = handle.join();

    let typed = platform.typed();
    assert!(typed.len() >= seen && typed.len() <= seen + 1, "typed {typed:?}");
    assert!(text.starts_with(&typed));
    assert_eq!(
        outcome,
        SessionOutcome::Cancelled {
            phase: Phase::Typing,
            typed: typed.chars().count()
        }
    );

    // Nothing arrives after the session has ended.
    thread::sleep(Duration::from_millis(120));
    assert_eq!(platform.typed(), typed);
}

#[test]
fn test_typing_duration_matches_base_delay_without_jitter() {
    let platform = MockPlatform::default();
    let (controller, _rx) = controller(settings(0.04, 0.0), platform.clone());
    controller.set_buffer("abc");

    let started = Instant::now();
    let outcome = start(&controller).join();
    let elapsed = started.elapsed();

    assert_eq!(outcome, SessionOutcome::Completed { typed: 3 });
    assert_eq!(platform.typed(), "abc");
    assert!(elapsed >= Duration::from_millis(120), "took {elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "took {elapsed:?}");
}

#[test]
fn test_no_text_anywhere_ends_immediately() {
    let platform = MockPlatform::default();
    let (controller, mut rx) = controller(settings(0.0, 0.0), platform.clone());

    let outcome = start(&controller).join();

    assert_eq!(outcome, SessionOutcome::NoText);
    assert!(matches!(outcome.error(), Some(TyperError::NoTextAvailable)));
    assert_eq!(platform.typed_len(), 0);
    assert!(!controller.is_in_progress());
    assert_eq!(
        drain(&mut rx).last(),
        Some(&Status::Finished(SessionOutcome::NoText))
    );
}

#[test]
fn test_empty_buffer_types_clipboard() {
    let platform = MockPlatform::with_clipboard("hello");
    let (controller, mut rx) = controller(settings(0.0, 0.0), platform.clone());

    let outcome = start(&controller).join();

    assert_eq!(outcome, SessionOutcome::Completed { typed: 5 });
    assert_eq!(platform.typed(), "hello");
    assert!(drain(&mut rx).contains(&Status::Typing {
        chars: 5,
        from_clipboard: true
    }));
}

#[test]
fn test_buffer_is_trimmed_and_preferred_over_clipboard() {
    let platform = MockPlatform::with_clipboard("from clipboard");
    let (controller, _rx) = controller(settings(0.0, 0.0), platform.clone());
    controller.set_buffer("  \n hi there \n");

    start(&controller).join();
    assert_eq!(platform.typed(), "hi there");
}

#[test]
fn test_whitespace_buffer_falls_back_to_untrimmed_clipboard() {
    let platform = MockPlatform::with_clipboard("  padded\n");
    let (controller, _rx) = controller(settings(0.0, 0.0), platform.clone());
    controller.set_buffer(" \t\n ");

    start(&controller).join();
    assert_eq!(platform.typed(), "  padded\n");
}

#[test]
fn test_buffer_is_read_after_countdown() {
    let platform = MockPlatform::default();
    let (controller, _rx) = controller(settings(0.0, 0.1), platform.clone());

    let handle = start(&controller);
    controller.set_buffer("late");
    handle.join();
    assert_eq!(platform.typed(), "late");
}

#[test]
fn test_injection_failure_ends_session_and_resets() {
    let platform = MockPlatform {
        fail_after: Some(2),
        ..MockPlatform::default()
    };
    let (controller, _rx) = controller(settings(0.0, 0.0), platform.clone());
    controller.set_buffer("abcdef");

    let outcome = start(&controller).join();
    assert!(matches!(outcome, SessionOutcome::Failed { typed: 2, .. }));
    assert_eq!(platform.typed(), "ab");
    assert!(!controller.is_in_progress());

    // The next toggle starts a fresh session rather than being read as a stop.
    assert!(matches!(controller.toggle().unwrap(), Toggle::Started(_)));
}

#[test]
fn test_settings_snapshot_is_taken_at_session_start() {
    let platform = MockPlatform::default();
    let (controller, _rx) = controller(settings(0.0, 0.1), platform.clone());
    controller.set_buffer("xy");

    let handle = start(&controller);
    controller.replace_settings(settings(5.0, 0.0));

    let started = Instant::now();
    assert_eq!(handle.join(), SessionOutcome::Completed { typed: 2 });
    assert!(started.elapsed() < Duration::from_secs(2));
}

// Configuration file

#[test]
fn test_config_file_operations() -> Result<()> {
    let mut temp_file = NamedTempFile::new()?;
    temp_file.write_all(
        br#"
    {
        "base_delay": 0.08,
        "random_delay": 0.02,
        "hotkey": "ctrl+alt+t"
    }
    "#,
    )?;

    let settings = Settings::from_file(temp_file.path().to_str().unwrap())?;
    assert_eq!(settings.base_delay, 0.08);
    assert_eq!(settings.jitter, 0.02);
    assert_eq!(settings.start_delay, 3.0);
    assert_eq!(settings.hotkey, "ctrl+alt+t");

    Ok(())
}

#[test]
fn test_config_file_errors() -> Result<()> {
    let mut temp_file = NamedTempFile::new()?;
    temp_file.write_all(br#"{ "base_delay": -1 }"#)?;
    let err = Settings::from_file(temp_file.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, TyperError::InvalidSettingsInput { .. }));

    let mut broken = NamedTempFile::new()?;
    broken.write_all(b"{ not json")?;
    let err = Settings::from_file(broken.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, TyperError::ConfigLoad { .. }));

    let err = Settings::from_file("/definitely/not/here.json").unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.json"));

    Ok(())
}
