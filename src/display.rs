//! The display session as seen by the window manager core.
//!
//! Everything frwm asks of the X server goes through [`DisplaySession`].
//! The production implementation lives in `x11.rs`; tests use the recording
//! double in `testing.rs`.

use anyhow::Result;
use x11rb::protocol::xproto::{ConfigureWindowAux, EventMask, Window};

use crate::event::WmEvent;
use crate::render::TextBitmap;
use crate::types::Rect;

/// Parameters for a new top-level window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub rect: Rect,
    pub border_width: u32,
    pub background: u32,
    pub border: u32,
    pub override_redirect: bool,
    pub event_mask: EventMask,
}

/// ICCCM client protocols we speak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmProtocol {
    DeleteWindow,
    TakeFocus,
}

/// Cursor glyphs from the core cursor font
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorGlyph {
    LeftPtr,
    Fleur,
    Sizing,
}

impl CursorGlyph {
    /// Glyph index in the X11 "cursor" font (see X11/cursorfont.h)
    pub fn font_index(self) -> u16 {
        match self {
            CursorGlyph::LeftPtr => 68,
            CursorGlyph::Fleur => 52,
            CursorGlyph::Sizing => 120,
        }
    }
}

/// ICCCM WM_STATE values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcccmState {
    Withdrawn = 0,
    Normal = 1,
}

/// Request/reply surface of the display server.
///
/// Requests are buffered until [`flush`](DisplaySession::flush) or the next
/// round-trip; replies block the calling thread.
pub trait DisplaySession {
    fn root(&self) -> Window;

    fn create_window(&mut self, spec: &WindowSpec) -> Result<Window>;
    fn destroy_window(&mut self, window: Window) -> Result<()>;
    fn map_window(&mut self, window: Window) -> Result<()>;
    fn unmap_window(&mut self, window: Window) -> Result<()>;
    fn reparent_window(&mut self, window: Window, parent: Window, x: i16, y: i16) -> Result<()>;
    fn move_window(&mut self, window: Window, x: i32, y: i32) -> Result<()>;
    fn resize_window(&mut self, window: Window, width: u32, height: u32) -> Result<()>;
    fn raise_window(&mut self, window: Window) -> Result<()>;
    /// Apply a client's configure request as-is
    fn configure_window(&mut self, window: Window, aux: &ConfigureWindowAux) -> Result<()>;

    fn get_geometry(&mut self, window: Window) -> Result<Rect>;
    /// Read WM_NAME
    fn get_title(&mut self, window: Window) -> Result<String>;
    /// Subscribe to the events we need from a client window
    fn select_client_events(&mut self, window: Window) -> Result<()>;
    fn set_border_color(&mut self, window: Window, color: u32) -> Result<()>;
    fn set_wm_state(&mut self, window: Window, state: IcccmState) -> Result<()>;

    fn set_input_focus(&mut self, window: Window) -> Result<()>;
    /// Return keyboard focus to PointerRoot
    fn reset_input_focus(&mut self) -> Result<()>;
    fn supports_protocol(&mut self, window: Window, protocol: WmProtocol) -> bool;
    fn send_protocol(&mut self, window: Window, protocol: WmProtocol) -> Result<()>;

    fn warp_pointer(&mut self, window: Window, x: i16, y: i16) -> Result<()>;
    /// Grab the pointer on the root for a drag, showing `cursor` until the
    /// grab is released. Returns whether the grab succeeded.
    fn grab_pointer(&mut self, cursor: CursorGlyph) -> Result<bool>;
    fn ungrab_pointer(&mut self) -> Result<()>;
    /// Pointer position in root coordinates
    fn query_pointer(&mut self) -> Result<(i32, i32)>;

    /// Fill a rectangle using a graphics context that lives only for this call
    fn fill_rectangle(&mut self, window: Window, color: u32, rect: Rect) -> Result<()>;
    fn put_image(&mut self, window: Window, x: i32, y: i32, bitmap: &TextBitmap) -> Result<()>;

    /// Active monitors, primary first. May be empty.
    fn monitors(&mut self) -> Result<Vec<Rect>>;
    /// The whole screen, used when no monitor is reported
    fn screen_rect(&self) -> Rect;

    /// Tear down a managed window at shutdown: kill the client, destroy the frame
    fn teardown_window(&mut self, client: Window, frame: Window) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
    /// Block until the next event the window manager cares about
    fn next_event(&mut self) -> Result<WmEvent>;
}
