//! Main-thread event loop for platforms whose global hotkeys need one.
//!
//! On Windows and macOS the OS only delivers hotkey presses while the thread
//! that created the [`GlobalHotKeyManager`] pumps its event queue, and
//! registrations must come from that thread too. [`MainLoop`] runs on the
//! main thread, owns the manager, and serves [`HotkeyRequest`]s posted by a
//! [`RemoteBackend`] from the console thread.
//!
//! [`RemoteBackend`]: crate::global_hotkey::RemoteBackend

use crate::global_hotkey::{HotkeyRequest, RequestSink};
use global_hotkey::GlobalHotKeyManager;
use tao::event::Event;
use tao::event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy};
use tao::platform::run_return::EventLoopExtRunReturn;
use tracing::debug;

/// Work posted to the main thread.
pub enum LoopEvent {
    Hotkey(HotkeyRequest),
    Exit,
}

impl RequestSink for EventLoopProxy<LoopEvent> {
    fn deliver(&self, request: HotkeyRequest) -> bool {
        self.send_event(LoopEvent::Hotkey(request)).is_ok()
    }
}

pub struct MainLoop {
    event_loop: EventLoop<LoopEvent>,
}

impl MainLoop {
    /// Must be called on the main thread.
    pub fn new() -> Self {
        Self {
            event_loop: EventLoopBuilder::<LoopEvent>::with_user_event().build(),
        }
    }

    pub fn proxy(&self) -> EventLoopProxy<LoopEvent> {
        self.event_loop.create_proxy()
    }

    /// Pump OS events until [`LoopEvent::Exit`] arrives. Hotkey requests are
    /// served against `manager`; without one they are dropped and the
    /// requester sees an error.
    pub fn run(mut self, manager: Option<GlobalHotKeyManager>) {
        self.event_loop.run_return(move |event, _, control_flow| {
            *control_flow = ControlFlow::Wait;

            match event {
                Event::UserEvent(LoopEvent::Hotkey(request)) => match &manager {
                    Some(manager) => request.serve(manager),
                    None => debug!("no hotkey manager, dropping request"),
                },
                Event::UserEvent(LoopEvent::Exit) => {
                    debug!("exit requested, leaving event loop");
                    *control_flow = ControlFlow::Exit;
                }
                _ => {}
            }
        });
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}
