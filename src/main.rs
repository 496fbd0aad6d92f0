//! frwm - Framed floating window manager
//!
//! A minimal X11 window manager. Every client is wrapped in a frame with a
//! title strip, windows float and are moved or resized with Mod4 and the
//! mouse, and a status bar on the primary monitor shows the focused title.

mod atoms;
mod bar;
mod config;
mod display;
mod drag;
mod event;
mod focus;
mod frame;
mod launcher;
mod monitor;
mod registry;
mod render;
mod shutdown;
mod state;
#[cfg(test)]
mod testing;
mod tracing;
mod types;
mod window_query;
mod wm;
mod x11;

use anyhow::Result;

use config::{parse_keybindings, FONT_NAME, FONT_SIZE};
use launcher::ProcessLauncher;
use render::{FontRenderer, TextRenderer};
use wm::Wm;
use x11::X11Session;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting frwm");

    let mut session = X11Session::connect(None)?;
    session.become_wm()?;

    let bindings = parse_keybindings();
    let keys: Vec<_> = bindings.iter().map(|(binding, _)| *binding).collect();
    session.grab_keys(&keys)?;
    session.grab_buttons()?;

    // Before any other thread exists, so every thread inherits the blocked mask
    shutdown::spawn_signal_watcher(session.shutdown_handle())?;

    let text: Option<Box<dyn TextRenderer>> = match FontRenderer::new(FONT_NAME, FONT_SIZE) {
        Ok(renderer) => Some(Box::new(renderer)),
        Err(e) => {
            log::warn!("Failed to load font, status bar will have no text: {:#}", e);
            None
        }
    };

    let mut wm = Wm::new(session, bindings, text, Box::new(ProcessLauncher))?;
    let result = wm.run();
    wm.shutdown();

    log::info!("frwm exited");
    result
}
