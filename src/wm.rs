//! The window manager: state, collaborators and the event loop.

use anyhow::Result;

use crate::bar::StatusBar;
use crate::config::{ParsedBinding, WmAction};
use crate::display::DisplaySession;
use crate::frame;
use crate::launcher::Launcher;
use crate::monitor::MonitorLayout;
use crate::render::TextRenderer;
use crate::state::WmState;
use crate::tracing::DUMP_ENTRIES;

pub struct Wm<D: DisplaySession> {
    pub(crate) display: D,
    pub(crate) state: WmState,
    pub(crate) text: Option<Box<dyn TextRenderer>>,
    pub(crate) launcher: Box<dyn Launcher>,
    pub(crate) bindings: Vec<(ParsedBinding, WmAction)>,
}

impl<D: DisplaySession> Wm<D> {
    /// Read the monitors, create the status bar and get ready to run.
    /// `text` may be `None` if no font could be loaded.
    pub fn new(
        mut display: D,
        bindings: Vec<(ParsedBinding, WmAction)>,
        text: Option<Box<dyn TextRenderer>>,
        launcher: Box<dyn Launcher>,
    ) -> Result<Self> {
        let reported = display.monitors().unwrap_or_else(|e| {
            log::warn!("Failed to query monitors: {:#}", e);
            Vec::new()
        });
        let monitors = MonitorLayout::new(reported, display.screen_rect());
        log::info!("Using {} monitor(s)", monitors.len());
        for (i, rect) in monitors.iter().enumerate() {
            log::debug!("Monitor {}: {:?}", i, rect);
        }
        let bar = StatusBar::create(&mut display, monitors.primary())?;

        let mut wm = Self {
            display,
            state: WmState::new(monitors, bar),
            text,
            launcher,
            bindings,
        };
        wm.refresh_bar()?;
        wm.display.flush()?;
        Ok(wm)
    }

    /// Process events until something asks us to stop
    pub fn run(&mut self) -> Result<()> {
        log::info!("Entering event loop");

        while self.state.running {
            let event = self.display.next_event()?;
            if let Err(e) = self.handle_event(event) {
                log::error!("Error handling event: {:#}", e);
            }

            #[cfg(debug_assertions)]
            for violation in self.state.validate() {
                log::error!("State violation {:?}: {}", violation.kind, violation.description);
            }

            self.display.flush()?;
        }

        log::info!("Exiting event loop");
        Ok(())
    }

    /// Hand focus back to the root and tear everything down
    pub fn shutdown(&mut self) {
        if self.state.registry.is_empty() {
            log::info!("Shutting down");
        } else {
            log::info!("Shutting down, releasing {} window(s)", self.state.registry.len());
        }

        if let Err(e) = self.display.reset_input_focus() {
            log::warn!("Failed to reset input focus: {:#}", e);
        }
        frame::teardown_all(&mut self.display, &mut self.state);
        if let Err(e) = self.state.bar.destroy(&mut self.display) {
            log::warn!("Failed to destroy status bar: {:#}", e);
        }
        if let Err(e) = self.display.flush() {
            log::warn!("Failed to flush on shutdown: {:#}", e);
        }

        self.state.tracer.dump(DUMP_ENTRIES);
    }
}
