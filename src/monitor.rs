//! Monitor geometry.
//!
//! Monitors are read once at startup through RandR and never refreshed. The
//! first monitor in the layout is the primary one: it hosts the status bar
//! and bounds interactive moves.

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::randr;
use x11rb::protocol::xproto::Window;
use x11rb::rust_connection::RustConnection;

use crate::config::MAX_MONITORS;
use crate::types::Rect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorLayout {
    monitors: Vec<Rect>,
}

impl MonitorLayout {
    /// Build a layout from reported monitors, primary first.
    ///
    /// Zero-sized entries are dropped and at most [`MAX_MONITORS`] are kept.
    /// If nothing usable is left, `screen` becomes the only monitor.
    pub fn new(reported: Vec<Rect>, screen: Rect) -> Self {
        let mut monitors: Vec<Rect> = reported.into_iter().filter(|r| !r.is_empty()).collect();
        if monitors.len() > MAX_MONITORS {
            log::warn!("Ignoring {} monitor(s) past the first {}", monitors.len() - MAX_MONITORS, MAX_MONITORS);
            monitors.truncate(MAX_MONITORS);
        }
        if monitors.is_empty() {
            log::warn!("No monitors detected, using the whole screen");
            monitors.push(screen);
        }
        Self { monitors }
    }

    pub fn primary(&self) -> Rect {
        // Never empty after construction
        self.monitors.first().copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rect> {
        self.monitors.iter()
    }
}

impl Default for MonitorLayout {
    fn default() -> Self {
        Self::new(Vec::new(), Rect::new(0, 0, 0, 0))
    }
}

/// Ask RandR for the active monitors, primary first
pub fn query_monitors(conn: &RustConnection, root: Window) -> Result<Vec<Rect>> {
    let reply = randr::get_monitors(conn, root, true)?
        .reply()
        .context("Failed to get monitors from RandR")?;

    log::info!("RandR reports {} monitor(s)", reply.monitors.len());

    let mut monitors = Vec::with_capacity(reply.monitors.len());
    for info in &reply.monitors {
        let geometry = Rect::new(info.x as i32, info.y as i32, info.width as u32, info.height as u32);
        log::info!(
            "Monitor {}x{}+{}+{}{}",
            geometry.width,
            geometry.height,
            geometry.x,
            geometry.y,
            if info.primary { " (primary)" } else { "" }
        );
        if info.primary {
            monitors.insert(0, geometry);
        } else {
            monitors.push(geometry);
        }
    }
    Ok(monitors)
}

/// Size of the first screen, used when RandR has nothing to say
pub fn screen_rect(conn: &RustConnection, screen_num: usize) -> Rect {
    conn.setup()
        .roots
        .get(screen_num)
        .map(|s| Rect::new(0, 0, s.width_in_pixels as u32, s.height_in_pixels as u32))
        .unwrap_or_default()
}
