//! Interactive move/resize.
//!
//! ```text
//!            press(frame, 1)                 release
//!   Idle ───────────────────► Moving ─────────────────► Idle
//!     │      press(frame, 3)                 release      ▲
//!     └─────────────────────► Resizing ───────────────────┘
//! ```
//!
//! Motion events only do work while a session is active. Positions are
//! re-read from the server on every step rather than tracked locally.

use anyhow::{Context, Result};
use serde::Serialize;
use x11rb::protocol::xproto::Window;

use crate::config::{MIN_HEIGHT, MIN_WIDTH};
use crate::display::{CursorGlyph, DisplaySession};
use crate::frame;
use crate::registry::WindowRegistry;
use crate::types::Rect;

pub const BUTTON_MOVE: u8 = 1;
pub const BUTTON_RESIZE: u8 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DragMode {
    #[default]
    Idle,
    Moving { frame: Window },
    Resizing { frame: Window },
}

impl DragMode {
    pub fn target(&self) -> Option<Window> {
        match self {
            DragMode::Idle => None,
            DragMode::Moving { frame } | DragMode::Resizing { frame } => Some(*frame),
        }
    }
}

#[derive(Debug, Default)]
pub struct DragController {
    mode: DragMode,
    grab_owned: bool,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> DragMode {
        self.mode
    }

    pub fn is_active(&self) -> bool {
        self.mode != DragMode::Idle
    }

    /// Start a drag on `frame` if `button` is a drag button and nothing else
    /// is in progress. Returns whether a session started.
    pub fn begin(
        &mut self,
        display: &mut dyn DisplaySession,
        registry: &WindowRegistry,
        frame: Window,
        button: u8,
    ) -> Result<bool> {
        if self.is_active() || registry.find_by_frame(frame).is_none() {
            return Ok(false);
        }

        let (mode, warp_x, warp_y, cursor) = match button {
            BUTTON_MOVE => (DragMode::Moving { frame }, 0, 0, CursorGlyph::Fleur),
            BUTTON_RESIZE => {
                let geom = display.get_geometry(frame).context("Failed to read frame geometry")?;
                (
                    DragMode::Resizing { frame },
                    geom.width.min(i16::MAX as u32) as i16,
                    geom.height.min(i16::MAX as u32) as i16,
                    CursorGlyph::Sizing,
                )
            }
            _ => return Ok(false),
        };

        self.mode = mode;
        display.warp_pointer(frame, warp_x, warp_y)?;
        // The server puts the cursor back when the grab goes away
        self.grab_owned = display.grab_pointer(cursor)?;
        if !self.grab_owned {
            log::warn!("Pointer grab refused, drag of 0x{:x} continues ungrabbed", frame);
        }
        log::debug!("Drag started: {:?}", self.mode);
        Ok(true)
    }

    /// Follow the pointer while a session is active
    pub fn motion(
        &mut self,
        display: &mut dyn DisplaySession,
        registry: &WindowRegistry,
        monitor: Rect,
    ) -> Result<()> {
        match self.mode {
            DragMode::Idle => Ok(()),
            DragMode::Moving { frame } => {
                let (px, py) = display.query_pointer()?;
                let geom = display.get_geometry(frame)?;
                let (x, y) = clamp_move(px, py, geom, monitor);
                display.move_window(frame, x, y)
            }
            DragMode::Resizing { frame } => {
                let (px, py) = display.query_pointer()?;
                let geom = display.get_geometry(frame)?;
                match resize_candidate(px, py, geom) {
                    Some((width, height)) => frame::resize(display, registry, frame, width, height),
                    None => Ok(()),
                }
            }
        }
    }

    /// Finish the session, if any. Returns the frame that was being dragged.
    pub fn end(&mut self, display: &mut dyn DisplaySession) -> Result<Option<Window>> {
        let Some(target) = self.mode.target() else {
            return Ok(None);
        };
        self.release(display)?;
        log::debug!("Drag ended on 0x{:x}", target);
        Ok(Some(target))
    }

    /// Drop a session whose frame is going away
    pub fn cancel_for(&mut self, display: &mut dyn DisplaySession, frame: Window) -> Result<()> {
        if self.mode.target() == Some(frame) {
            log::debug!("Cancelling drag of vanished frame 0x{:x}", frame);
            self.release(display)?;
        }
        Ok(())
    }

    fn release(&mut self, display: &mut dyn DisplaySession) -> Result<()> {
        self.mode = DragMode::Idle;
        if std::mem::take(&mut self.grab_owned) {
            display.ungrab_pointer()?;
        }
        Ok(())
    }
}

/// New frame origin for a move: follow the pointer but keep the frame's far
/// edges inside the monitor. The near edges are not clamped.
pub fn clamp_move(px: i32, py: i32, frame: Rect, monitor: Rect) -> (i32, i32) {
    let x = px.min(monitor.right() - frame.width as i32);
    let y = py.min(monitor.bottom() - frame.height as i32);
    (x, y)
}

/// New frame size for a resize, or `None` if either side would go under the minimum
pub fn resize_candidate(px: i32, py: i32, frame: Rect) -> Option<(u32, u32)> {
    let width = px - frame.x;
    let height = py - frame.y;
    if width < MIN_WIDTH as i32 || height < MIN_HEIGHT as i32 {
        return None;
    }
    Some((width as u32, height as u32))
}
