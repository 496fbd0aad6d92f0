//! Status bar showing the current window's title.

use anyhow::{Context, Result};
use x11rb::protocol::xproto::{EventMask, Window};

use crate::config::{BAR_HEIGHT, BAR_TEXT_OPACITY, BAR_TEXT_X, BAR_TEXT_Y, COLOR_BAR, COLOR_BAR_TEXT};
use crate::display::{DisplaySession, WindowSpec};
use crate::focus::CurrentSelection;
use crate::render::TextRenderer;
use crate::types::Rect;

#[derive(Debug)]
pub struct StatusBar {
    window: Window,
    rect: Rect,
    visible: bool,
}

impl StatusBar {
    /// Create and map the bar across the top of `monitor`
    pub fn create(display: &mut dyn DisplaySession, monitor: Rect) -> Result<Self> {
        let rect = Rect::new(monitor.x, monitor.y, monitor.width, BAR_HEIGHT);
        let window = display
            .create_window(&WindowSpec {
                rect,
                border_width: 0,
                background: COLOR_BAR,
                border: COLOR_BAR,
                override_redirect: true,
                event_mask: EventMask::BUTTON_PRESS | EventMask::EXPOSURE,
            })
            .context("Failed to create status bar")?;
        display.map_window(window)?;
        log::debug!("Status bar 0x{:x} at {:?}", window, rect);

        Ok(Self { window, rect, visible: true })
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Redraw: clear to the background, then the title of the current
    /// window if there is one and a renderer to draw it with
    pub fn refresh(
        &self,
        display: &mut dyn DisplaySession,
        text: Option<&dyn TextRenderer>,
        selection: &CurrentSelection,
    ) -> Result<()> {
        if !self.visible {
            return Ok(());
        }
        display.fill_rectangle(self.window, COLOR_BAR, Rect::new(0, 0, self.rect.width, self.rect.height))?;

        let CurrentSelection::Window { title, .. } = selection else {
            return Ok(());
        };
        let Some(bitmap) = text.and_then(|r| r.rasterize(title, COLOR_BAR_TEXT, BAR_TEXT_OPACITY, COLOR_BAR))
        else {
            return Ok(());
        };
        display.put_image(self.window, BAR_TEXT_X, BAR_TEXT_Y, &bitmap)
    }

    /// Show or hide the bar
    pub fn toggle(
        &mut self,
        display: &mut dyn DisplaySession,
        text: Option<&dyn TextRenderer>,
        selection: &CurrentSelection,
    ) -> Result<()> {
        self.visible = !self.visible;
        if self.visible {
            display.map_window(self.window)?;
        } else {
            display.unmap_window(self.window)?;
        }
        self.refresh(display, text, selection)
    }

    pub fn destroy(&self, display: &mut dyn DisplaySession) -> Result<()> {
        display.unmap_window(self.window)?;
        display.destroy_window(self.window)
    }
}
