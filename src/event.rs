//! Event handling.
//!
//! X11 events are decoded into [`WmEvent`] by the display session; this
//! module dispatches them to the registry, focus tracker, drag controller
//! and frame lifecycle, and runs keybinding actions.

use anyhow::Result;
use x11rb::protocol::xproto::{ConfigureWindowAux, Window};

use crate::config::{WmAction, MENU_COMMAND};
use crate::display::DisplaySession;
use crate::drag::BUTTON_RESIZE;
use crate::frame;
use crate::state::StateTransition;
use crate::wm::Wm;

/// Everything the window manager reacts to
#[derive(Debug, Clone)]
pub enum WmEvent {
    /// A top-level window wants to be mapped
    MapRequest { window: Window },
    PropertyChange { window: Window, title_changed: bool },
    /// A grabbed key; `child` is the top-level window under the pointer, or 0
    KeyPress { keysym: u32, modifiers: u16, child: Window },
    ButtonPress { button: u8, child: Window },
    PointerMotion,
    ButtonRelease { button: u8 },
    EnterNotify { window: Window },
    UnmapNotify { window: Window },
    ConfigureRequest { window: Window, aux: ConfigureWindowAux },
    Expose { window: Window },
    ShutdownRequested,
}

impl WmEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WmEvent::MapRequest { .. } => "map_request",
            WmEvent::PropertyChange { .. } => "property_change",
            WmEvent::KeyPress { .. } => "key_press",
            WmEvent::ButtonPress { .. } => "button_press",
            WmEvent::PointerMotion => "pointer_motion",
            WmEvent::ButtonRelease { .. } => "button_release",
            WmEvent::EnterNotify { .. } => "enter_notify",
            WmEvent::UnmapNotify { .. } => "unmap_notify",
            WmEvent::ConfigureRequest { .. } => "configure_request",
            WmEvent::Expose { .. } => "expose",
            WmEvent::ShutdownRequested => "shutdown_requested",
        }
    }

    /// The window the event is about, if any
    pub fn window(&self) -> Option<Window> {
        match self {
            WmEvent::MapRequest { window }
            | WmEvent::PropertyChange { window, .. }
            | WmEvent::EnterNotify { window }
            | WmEvent::UnmapNotify { window }
            | WmEvent::ConfigureRequest { window, .. }
            | WmEvent::Expose { window } => Some(*window),
            WmEvent::KeyPress { child, .. } | WmEvent::ButtonPress { child, .. } if *child != 0 => Some(*child),
            _ => None,
        }
    }
}

impl<D: DisplaySession> Wm<D> {
    pub fn handle_event(&mut self, event: WmEvent) -> Result<()> {
        // Motion is too chatty to trace
        if !matches!(event, WmEvent::PointerMotion) {
            self.state.tracer.event(&event);
        }

        match event {
            WmEvent::MapRequest { window } => {
                log::debug!("MapRequest for window 0x{:x}", window);
                if frame::wrap(&mut self.display, &mut self.state, window)?.is_some() {
                    self.refresh_bar()?;
                }
            }

            WmEvent::PropertyChange { window, title_changed } => {
                if title_changed {
                    self.handle_title_change(window)?;
                }
            }

            WmEvent::KeyPress { keysym, modifiers, child } => {
                self.handle_key_press(keysym, modifiers, child)?;
            }

            WmEvent::ButtonPress { button, child } => {
                self.handle_button_press(button, child)?;
            }

            WmEvent::PointerMotion => {
                let monitor = self.state.monitors.primary();
                self.state.drag.motion(&mut self.display, &self.state.registry, monitor)?;
            }

            WmEvent::ButtonRelease { button } => {
                log::debug!("ButtonRelease: button={}", button);
                if let Some(frame) = self.state.drag.end(&mut self.display)? {
                    self.state.record(StateTransition::DragEnded { frame });
                }
            }

            WmEvent::EnterNotify { window } => {
                if self.focus_frame(window) {
                    self.refresh_bar()?;
                }
            }

            WmEvent::UnmapNotify { window } => {
                log::debug!("UnmapNotify for window 0x{:x}", window);
                if frame::unmap_cleanup(&mut self.display, &mut self.state, window)? {
                    self.refresh_bar()?;
                }
            }

            WmEvent::ConfigureRequest { window, aux } => {
                // Managed clients get their geometry from the frame
                if self.state.registry.find_by_client(window).is_some() {
                    log::debug!("Ignoring ConfigureRequest from managed window 0x{:x}", window);
                } else {
                    self.display.configure_window(window, &aux)?;
                }
            }

            WmEvent::Expose { window } => {
                if window == self.state.bar.window() {
                    self.refresh_bar()?;
                }
            }

            WmEvent::ShutdownRequested => {
                log::info!("Shutdown requested");
                self.state.running = false;
            }
        }

        Ok(())
    }

    fn handle_title_change(&mut self, window: Window) -> Result<()> {
        if self.state.registry.find_by_client(window).is_none() {
            return Ok(());
        }
        let title = self.display.get_title(window)?;
        if !self.state.registry.update_title(window, &title) {
            return Ok(());
        }
        if let Some(stored) = self.state.registry.find_by_client(window).map(|w| w.title.clone()) {
            log::debug!("Title of 0x{:x} is now '{}'", window, stored);
            self.state.focus.refresh_title(window, &stored);
        }
        self.refresh_bar()
    }

    fn handle_button_press(&mut self, button: u8, child: Window) -> Result<()> {
        if child == 0 {
            return Ok(());
        }
        log::debug!("ButtonPress: button={} child=0x{:x}", button, child);

        if self.state.registry.find_by_frame(child).is_some() {
            self.focus_frame(child);
            self.display.raise_window(child)?;
            self.refresh_bar()?;
        }

        if self.state.drag.begin(&mut self.display, &self.state.registry, child, button)? {
            self.state.record(StateTransition::DragStarted {
                frame: child,
                resize: button == BUTTON_RESIZE,
            });
        }
        Ok(())
    }

    fn handle_key_press(&mut self, keysym: u32, modifiers: u16, child: Window) -> Result<()> {
        log::debug!("KeyPress: keysym=0x{:x}, state=0x{:x}, child=0x{:x}", keysym, modifiers, child);

        let action = self
            .bindings
            .iter()
            .find(|(binding, _)| binding.matches(keysym, modifiers))
            .map(|(_, action)| *action);

        match action {
            Some(action) => self.execute_action(action, child),
            None => Ok(()),
        }
    }

    /// Run a keybinding action. `child` is the window the key was pressed over.
    pub fn execute_action(&mut self, action: WmAction, child: Window) -> Result<()> {
        log::debug!("Executing {:?} on 0x{:x}", action, child);
        match action {
            WmAction::Quit => {
                log::info!("Quit requested");
                self.state.running = false;
            }
            WmAction::KillWindow => {
                frame::kill(&mut self.display, &mut self.state, child)?;
                self.refresh_bar()?;
            }
            WmAction::RaiseWindow => {
                if self.state.registry.find_by_frame(child).is_some() {
                    self.focus_frame(child);
                    self.display.raise_window(child)?;
                    self.refresh_bar()?;
                }
            }
            WmAction::LaunchMenu => self.launcher.launch(MENU_COMMAND),
            WmAction::ToggleBar => {
                let selection = self.state.selection();
                self.state.bar.toggle(&mut self.display, self.text.as_deref(), &selection)?;
                let visible = self.state.bar.is_visible();
                self.state.record(StateTransition::BarToggled { visible });
            }
        }
        Ok(())
    }

    /// Make `frame` current, recording the change. Returns whether it took.
    fn focus_frame(&mut self, frame: Window) -> bool {
        let previous = self.state.selection().client();
        if !self.state.focus.set_current(&mut self.display, &self.state.registry, frame) {
            return false;
        }
        let current = self.state.selection().client();
        if current != previous {
            self.state.record(StateTransition::FocusChanged { from: previous, to: current });
        }
        true
    }

    pub fn refresh_bar(&mut self) -> Result<()> {
        let selection = self.state.selection();
        self.state.bar.refresh(&mut self.display, self.text.as_deref(), &selection)
    }
}
