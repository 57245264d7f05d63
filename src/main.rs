use anyhow::{Context, Result};
use auto_typer::global_hotkey::HotkeyBackend;
use auto_typer::{
    Console, HotkeyListener, HotkeyManager, SessionController, Settings, Status, SystemPlatform,
};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type StatusReceiver = mpsc::UnboundedReceiver<Status>;

/// Type text into the focused window with human-like timing.
#[derive(Parser, Debug)]
#[command(name = "autotyper", version, about)]
struct Cli {
    /// JSON file with startup settings
    #[arg(short, long)]
    config: Option<String>,

    /// Base delay between keystrokes, in seconds
    #[arg(long)]
    base_delay: Option<f64>,

    /// Random variation added to or subtracted from the base delay, in seconds
    #[arg(long)]
    jitter: Option<f64>,

    /// Countdown before typing starts, in seconds
    #[arg(long)]
    start_delay: Option<f64>,

    /// Global hotkey that starts and stops typing
    #[arg(long)]
    hotkey: Option<String>,

    /// Do not register a global hotkey; use the 'toggle' command instead
    #[arg(long)]
    no_hotkey: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn initial_settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };

        if let Some(base_delay) = self.base_delay {
            settings.base_delay = base_delay;
        }
        if let Some(jitter) = self.jitter {
            settings.jitter = jitter;
        }
        if let Some(start_delay) = self.start_delay {
            settings.start_delay = start_delay;
        }
        if let Some(hotkey) = &self.hotkey {
            settings.hotkey = hotkey.trim().to_string();
        }

        settings.validate().context("invalid startup settings")?;
        Ok(settings)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = cli.initial_settings()?;
    info!(%settings, "starting auto-typer v{}", env!("CARGO_PKG_VERSION"));

    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let controller = Arc::new(SessionController::new(settings, SystemPlatform, status_tx));

    run(&cli, controller, status_rx)?;

    info!("auto-typer exited");
    Ok(())
}

/// Linux/X11: `global-hotkey` runs its own event thread, so the console can
/// own the manager directly.
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn run(cli: &Cli, controller: Arc<SessionController>, status_rx: StatusReceiver) -> Result<()> {
    let hotkeys = if cli.no_hotkey {
        None
    } else {
        match HotkeyManager::new() {
            Ok(manager) => Some(manager),
            Err(e) => {
                warn!(error = %e, "global hotkeys unavailable");
                None
            }
        }
    };

    let _listener = spawn_listener(hotkeys.as_ref(), &controller)?;
    run_console(controller, hotkeys, status_rx)
}

/// Windows/macOS: the main thread owns the OS hotkey manager and pumps its
/// events. The console runs on its own thread and registers through it.
#[cfg(any(target_os = "windows", target_os = "macos"))]
fn run(cli: &Cli, controller: Arc<SessionController>, status_rx: StatusReceiver) -> Result<()> {
    use auto_typer::event_loop::{LoopEvent, MainLoop};
    use auto_typer::RemoteBackend;
    use global_hotkey::GlobalHotKeyManager;
    use std::thread;

    let main_loop = MainLoop::new();
    let proxy = main_loop.proxy();

    let manager = if cli.no_hotkey {
        None
    } else {
        match GlobalHotKeyManager::new() {
            Ok(manager) => Some(manager),
            Err(e) => {
                warn!(error = %e, "global hotkeys unavailable");
                None
            }
        }
    };
    let hotkeys = manager
        .as_ref()
        .map(|_| HotkeyManager::with_backend(RemoteBackend::new(proxy.clone())));

    let _listener = spawn_listener(hotkeys.as_ref(), &controller)?;
    let console = thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let result = run_console(controller, hotkeys, status_rx);
            if proxy.send_event(LoopEvent::Exit).is_err() {
                warn!("event loop already closed");
            }
            result
        })
        .context("failed to start console thread")?;

    main_loop.run(manager);

    console
        .join()
        .map_err(|_| anyhow::anyhow!("console thread panicked"))?
}

fn spawn_listener<B: HotkeyBackend>(
    hotkeys: Option<&HotkeyManager<B>>,
    controller: &Arc<SessionController>,
) -> Result<Option<HotkeyListener>> {
    let Some(manager) = hotkeys else {
        return Ok(None);
    };

    let controller = Arc::clone(controller);
    let listener = HotkeyListener::spawn(manager.active_binding(), move || {
        if let Err(e) = controller.toggle() {
            warn!(error = %e, "hotkey toggle failed");
        }
    })
    .context("failed to start hotkey listener")?;
    Ok(Some(listener))
}

fn run_console<B: HotkeyBackend>(
    controller: Arc<SessionController>,
    hotkeys: Option<HotkeyManager<B>>,
    status_rx: StatusReceiver,
) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let result = runtime.block_on(Console::new(controller, hotkeys).run(status_rx));
    // A pending stdin read would otherwise hold up the exit.
    runtime.shutdown_background();
    Ok(result?)
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        "auto_typer=debug,autotyper=debug"
    } else {
        "auto_typer=info,autotyper=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
