//! Recording display double for unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};
use x11rb::protocol::xproto::{ConfigureWindowAux, Window};

use crate::display::{CursorGlyph, DisplaySession, IcccmState, WindowSpec, WmProtocol};
use crate::event::WmEvent;
use crate::launcher::Launcher;
use crate::render::{TextBitmap, TextRenderer};
use crate::types::Rect;

pub const ROOT: Window = 1;

/// One outbound request, as seen by the server
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CreateWindow(Window, WindowSpec),
    DestroyWindow(Window),
    MapWindow(Window),
    UnmapWindow(Window),
    Reparent { window: Window, parent: Window, x: i16, y: i16 },
    Move { window: Window, x: i32, y: i32 },
    Resize { window: Window, width: u32, height: u32 },
    Raise(Window),
    Configure(Window),
    SelectClientEvents(Window),
    SetBorderColor(Window, u32),
    SetWmState(Window, IcccmState),
    SetInputFocus(Window),
    ResetInputFocus,
    SendProtocol(Window, WmProtocol),
    WarpPointer { window: Window, x: i16, y: i16 },
    GrabPointer(CursorGlyph),
    UngrabPointer,
    FillRectangle { window: Window, color: u32, rect: Rect },
    PutImage { window: Window, x: i32, y: i32, width: u32, height: u32 },
    Teardown { client: Window, frame: Window },
}

/// A fake server that records requests and keeps just enough window state
/// (geometry, titles, pointer) to answer queries.
pub struct RecordingDisplay {
    pub requests: Vec<Request>,
    pub geometries: HashMap<Window, Rect>,
    pub titles: HashMap<Window, String>,
    pub protocols: HashMap<Window, Vec<WmProtocol>>,
    pub pointer: (i32, i32),
    pub monitors: Vec<Rect>,
    pub events: VecDeque<WmEvent>,
    pub failing_geometry: HashSet<Window>,
    pub failing_borders: HashSet<Window>,
    pub grab_succeeds: bool,
    pub events_delivered: usize,
    next_id: Window,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            geometries: HashMap::new(),
            titles: HashMap::new(),
            protocols: HashMap::new(),
            pointer: (0, 0),
            monitors: vec![Rect::new(0, 0, 1920, 1080)],
            events: VecDeque::new(),
            failing_geometry: HashSet::new(),
            failing_borders: HashSet::new(),
            grab_succeeds: true,
            events_delivered: 0,
            next_id: 0x200000,
        }
    }

    /// Pretend a client exists with the given geometry and title
    pub fn add_client(&mut self, window: Window, rect: Rect, title: &str) {
        self.geometries.insert(window, rect);
        self.titles.insert(window, title.to_string());
    }

    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    pub fn count(&self, pred: impl Fn(&Request) -> bool) -> usize {
        self.requests.iter().filter(|r| pred(r)).count()
    }

    pub fn sent(&self, request: &Request) -> bool {
        self.requests.contains(request)
    }
}

impl DisplaySession for RecordingDisplay {
    fn root(&self) -> Window {
        ROOT
    }

    fn create_window(&mut self, spec: &WindowSpec) -> Result<Window> {
        self.next_id += 1;
        let window = self.next_id;
        self.geometries.insert(window, spec.rect);
        self.requests.push(Request::CreateWindow(window, *spec));
        Ok(window)
    }

    fn destroy_window(&mut self, window: Window) -> Result<()> {
        self.geometries.remove(&window);
        self.requests.push(Request::DestroyWindow(window));
        Ok(())
    }

    fn map_window(&mut self, window: Window) -> Result<()> {
        self.requests.push(Request::MapWindow(window));
        Ok(())
    }

    fn unmap_window(&mut self, window: Window) -> Result<()> {
        self.requests.push(Request::UnmapWindow(window));
        Ok(())
    }

    fn reparent_window(&mut self, window: Window, parent: Window, x: i16, y: i16) -> Result<()> {
        self.requests.push(Request::Reparent { window, parent, x, y });
        Ok(())
    }

    fn move_window(&mut self, window: Window, x: i32, y: i32) -> Result<()> {
        if let Some(rect) = self.geometries.get_mut(&window) {
            rect.x = x;
            rect.y = y;
        }
        self.requests.push(Request::Move { window, x, y });
        Ok(())
    }

    fn resize_window(&mut self, window: Window, width: u32, height: u32) -> Result<()> {
        if let Some(rect) = self.geometries.get_mut(&window) {
            rect.width = width;
            rect.height = height;
        }
        self.requests.push(Request::Resize { window, width, height });
        Ok(())
    }

    fn raise_window(&mut self, window: Window) -> Result<()> {
        self.requests.push(Request::Raise(window));
        Ok(())
    }

    fn configure_window(&mut self, window: Window, _aux: &ConfigureWindowAux) -> Result<()> {
        self.requests.push(Request::Configure(window));
        Ok(())
    }

    fn get_geometry(&mut self, window: Window) -> Result<Rect> {
        if self.failing_geometry.contains(&window) {
            bail!("BadDrawable for 0x{:x}", window);
        }
        self.geometries
            .get(&window)
            .copied()
            .ok_or_else(|| anyhow!("BadDrawable for 0x{:x}", window))
    }

    fn get_title(&mut self, window: Window) -> Result<String> {
        self.titles
            .get(&window)
            .cloned()
            .ok_or_else(|| anyhow!("BadWindow for 0x{:x}", window))
    }

    fn select_client_events(&mut self, window: Window) -> Result<()> {
        self.requests.push(Request::SelectClientEvents(window));
        Ok(())
    }

    fn set_border_color(&mut self, window: Window, color: u32) -> Result<()> {
        self.requests.push(Request::SetBorderColor(window, color));
        if self.failing_borders.contains(&window) {
            bail!("BadWindow for 0x{:x}", window);
        }
        Ok(())
    }

    fn set_wm_state(&mut self, window: Window, state: IcccmState) -> Result<()> {
        self.requests.push(Request::SetWmState(window, state));
        Ok(())
    }

    fn set_input_focus(&mut self, window: Window) -> Result<()> {
        self.requests.push(Request::SetInputFocus(window));
        Ok(())
    }

    fn reset_input_focus(&mut self) -> Result<()> {
        self.requests.push(Request::ResetInputFocus);
        Ok(())
    }

    fn supports_protocol(&mut self, window: Window, protocol: WmProtocol) -> bool {
        self.protocols
            .get(&window)
            .map(|list| list.contains(&protocol))
            .unwrap_or(false)
    }

    fn send_protocol(&mut self, window: Window, protocol: WmProtocol) -> Result<()> {
        self.requests.push(Request::SendProtocol(window, protocol));
        Ok(())
    }

    fn warp_pointer(&mut self, window: Window, x: i16, y: i16) -> Result<()> {
        if let Some(rect) = self.geometries.get(&window) {
            self.pointer = (rect.x + x as i32, rect.y + y as i32);
        }
        self.requests.push(Request::WarpPointer { window, x, y });
        Ok(())
    }

    fn grab_pointer(&mut self, cursor: CursorGlyph) -> Result<bool> {
        self.requests.push(Request::GrabPointer(cursor));
        Ok(self.grab_succeeds)
    }

    fn ungrab_pointer(&mut self) -> Result<()> {
        self.requests.push(Request::UngrabPointer);
        Ok(())
    }

    fn query_pointer(&mut self) -> Result<(i32, i32)> {
        Ok(self.pointer)
    }

    fn fill_rectangle(&mut self, window: Window, color: u32, rect: Rect) -> Result<()> {
        self.requests.push(Request::FillRectangle { window, color, rect });
        Ok(())
    }

    fn put_image(&mut self, window: Window, x: i32, y: i32, bitmap: &TextBitmap) -> Result<()> {
        self.requests.push(Request::PutImage {
            window,
            x,
            y,
            width: bitmap.width,
            height: bitmap.height,
        });
        Ok(())
    }

    fn monitors(&mut self) -> Result<Vec<Rect>> {
        Ok(self.monitors.clone())
    }

    fn screen_rect(&self) -> Rect {
        Rect::new(0, 0, 1920, 1080)
    }

    fn teardown_window(&mut self, client: Window, frame: Window) -> Result<()> {
        self.requests.push(Request::Teardown { client, frame });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_event(&mut self) -> Result<WmEvent> {
        let event = self
            .events
            .pop_front()
            .ok_or_else(|| anyhow!("connection closed"))?;
        self.events_delivered += 1;
        Ok(event)
    }
}

/// Renderer that produces a fixed-size bitmap per character and remembers
/// what it was asked to draw
#[derive(Default)]
pub struct FakeRenderer {
    pub drawn: Rc<RefCell<Vec<String>>>,
}

impl TextRenderer for FakeRenderer {
    fn rasterize(&self, text: &str, _color: u32, _opacity: f32, _background: u32) -> Option<TextBitmap> {
        if text.is_empty() {
            return None;
        }
        self.drawn.borrow_mut().push(text.to_string());
        let width = text.chars().count() as u32 * 6;
        Some(TextBitmap {
            width,
            height: 12,
            pixels: vec![0; (width * 12 * 4) as usize],
        })
    }
}

/// Launcher that records commands instead of running them
#[derive(Default, Clone)]
pub struct RecordingLauncher {
    pub launched: Rc<RefCell<Vec<String>>>,
}

impl Launcher for RecordingLauncher {
    fn launch(&self, command: &str) {
        self.launched.borrow_mut().push(command.to_string());
    }
}
