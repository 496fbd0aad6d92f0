//! X11 implementation of the display session.
//!
//! Owns the connection and everything tied to it: atoms, cursors, the
//! keyboard map and the hidden wake window used for shutdown requests.
//! Raw protocol events are decoded into [`WmEvent`] here; events the window
//! manager doesn't care about never leave this module.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::COPY_DEPTH_FROM_PARENT;

use crate::atoms::Atoms;
use crate::config::{ParsedBinding, PRIMARY_MODIFIER};
use crate::display::{CursorGlyph, DisplaySession, IcccmState, WindowSpec, WmProtocol};
use crate::drag::{BUTTON_MOVE, BUTTON_RESIZE};
use crate::event::WmEvent;
use crate::monitor;
use crate::render::TextBitmap;
use crate::shutdown::ShutdownHandle;
use crate::types::Rect;
use crate::window_query;

/// `PointerRoot` as a focus target
const POINTER_ROOT: Window = 1;

struct Cursors {
    left_ptr: Cursor,
    fleur: Cursor,
    sizing: Cursor,
}

impl Cursors {
    fn new(conn: &RustConnection) -> Result<Self> {
        let font = conn.generate_id()?;
        conn.open_font(font, b"cursor")?;

        let create = |glyph: CursorGlyph| -> Result<Cursor> {
            let cursor = conn.generate_id()?;
            let index = glyph.font_index();
            conn.create_glyph_cursor(cursor, font, font, index, index + 1, 0, 0, 0, 0xffff, 0xffff, 0xffff)?;
            Ok(cursor)
        };
        let cursors = Self {
            left_ptr: create(CursorGlyph::LeftPtr)?,
            fleur: create(CursorGlyph::Fleur)?,
            sizing: create(CursorGlyph::Sizing)?,
        };

        conn.close_font(font)?;
        Ok(cursors)
    }

    fn get(&self, glyph: CursorGlyph) -> Cursor {
        match glyph {
            CursorGlyph::LeftPtr => self.left_ptr,
            CursorGlyph::Fleur => self.fleur,
            CursorGlyph::Sizing => self.sizing,
        }
    }
}

pub struct X11Session {
    conn: RustConnection,
    display_name: Option<String>,
    screen_num: usize,
    root: Window,
    root_depth: u8,
    atoms: Atoms,
    cursors: Cursors,
    wake_window: Window,
    /// First keysym of every keycode
    keymap: HashMap<Keycode, u32>,
    grabbed: Vec<ParsedBinding>,
}

impl X11Session {
    /// Connect to `display_name` (or `$DISPLAY`)
    pub fn connect(display_name: Option<&str>) -> Result<Self> {
        let (conn, screen_num) = RustConnection::connect(display_name)
            .context("Failed to connect to X11 server")?;

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let root_depth = screen.root_depth;
        log::info!(
            "Connected to X11, screen {}, root window 0x{:x}, {}x{}",
            screen_num,
            root,
            screen.width_in_pixels,
            screen.height_in_pixels
        );

        let atoms = Atoms::new(&conn)?;
        let cursors = Cursors::new(&conn)?;

        let wake_window = conn.generate_id()?;
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            wake_window,
            root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )?;

        let mut session = Self {
            conn,
            display_name: display_name.map(str::to_string),
            screen_num,
            root,
            root_depth,
            atoms,
            cursors,
            wake_window,
            keymap: HashMap::new(),
            grabbed: Vec::new(),
        };
        session.load_keymap()?;
        Ok(session)
    }

    /// Become the window manager by requesting SubstructureRedirect on root
    pub fn become_wm(&self) -> Result<()> {
        let event_mask =
            EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY | EventMask::PROPERTY_CHANGE;

        let result = self.conn.change_window_attributes(
            self.root,
            &ChangeWindowAttributesAux::new()
                .event_mask(event_mask)
                .cursor(self.cursors.get(CursorGlyph::LeftPtr)),
        );
        self.conn.flush()?;

        if let Err(e) = result?.check() {
            bail!("Another window manager is already running! Error: {:?}", e);
        }

        log::info!("Successfully became the window manager");
        Ok(())
    }

    /// A handle that can wake the event loop from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.display_name.clone(), self.wake_window)
    }

    fn load_keymap(&mut self) -> Result<()> {
        let setup = self.conn.setup();
        let min_keycode = setup.min_keycode;
        let max_keycode = setup.max_keycode;

        let mapping = self
            .conn
            .get_keyboard_mapping(min_keycode, max_keycode - min_keycode + 1)?
            .reply()
            .context("Failed to read keyboard mapping")?;

        let per_keycode = mapping.keysyms_per_keycode as usize;
        self.keymap.clear();
        if per_keycode == 0 {
            return Ok(());
        }
        for (i, chunk) in mapping.keysyms.chunks(per_keycode).enumerate() {
            if let Some(&keysym) = chunk.first() {
                self.keymap.insert(min_keycode.wrapping_add(i as u8), keysym);
            }
        }
        Ok(())
    }

    fn keycodes_for(&self, keysym: u32) -> Vec<Keycode> {
        let mut codes: Vec<Keycode> = self
            .keymap
            .iter()
            .filter(|(_, &sym)| sym == keysym)
            .map(|(&code, _)| code)
            .collect();
        codes.sort_unstable();
        codes
    }

    /// Grab every binding on the root, with and without NumLock/CapsLock
    pub fn grab_keys(&mut self, bindings: &[ParsedBinding]) -> Result<()> {
        self.conn.ungrab_key(Grab::ANY, self.root, ModMask::ANY)?;

        for binding in bindings {
            let keycodes = self.keycodes_for(binding.keysym);
            if keycodes.is_empty() {
                log::warn!("No keycode for keysym 0x{:x}", binding.keysym);
                continue;
            }
            for keycode in keycodes {
                self.grab_with_locks(ModMask::from(binding.modifiers), |mods| {
                    self.conn
                        .grab_key(false, self.root, mods, keycode, GrabMode::ASYNC, GrabMode::ASYNC)
                        .map(|_| ())
                })?;
                log::debug!("Grabbed keycode {} (mods 0x{:x})", keycode, binding.modifiers);
            }
        }

        self.grabbed = bindings.to_vec();
        self.conn.flush()?;
        Ok(())
    }

    /// Grab the last set of bindings again after the keymap changed.
    /// The set is kept even if grabbing fails, so the next change retries it.
    fn regrab_keys(&mut self) -> Result<()> {
        let bindings = self.grabbed.clone();
        self.grab_keys(&bindings)
    }

    /// Grab the move and resize buttons with the primary modifier
    pub fn grab_buttons(&self) -> Result<()> {
        for button in [BUTTON_MOVE, BUTTON_RESIZE] {
            let index = ButtonIndex::from(button);
            self.grab_with_locks(ModMask::from(PRIMARY_MODIFIER), |mods| {
                self.conn
                    .grab_button(
                        false,
                        self.root,
                        EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE,
                        GrabMode::ASYNC,
                        GrabMode::ASYNC,
                        self.root,
                        x11rb::NONE,
                        index,
                        mods,
                    )
                    .map(|_| ())
            })?;
        }
        self.conn.flush()?;
        Ok(())
    }

    fn grab_with_locks<F>(&self, modifiers: ModMask, mut grab: F) -> Result<()>
    where
        F: FnMut(ModMask) -> std::result::Result<(), x11rb::errors::ConnectionError>,
    {
        for extra in [ModMask::from(0u16), ModMask::LOCK, ModMask::M2, ModMask::LOCK | ModMask::M2] {
            grab(modifiers | extra)?;
        }
        Ok(())
    }

    /// Turn a protocol event into something the window manager handles
    fn decode(&mut self, event: Event) -> Result<Option<WmEvent>> {
        let decoded = match event {
            Event::MapRequest(e) => Some(WmEvent::MapRequest { window: e.window }),
            Event::PropertyNotify(e) => Some(WmEvent::PropertyChange {
                window: e.window,
                title_changed: e.atom == u32::from(AtomEnum::WM_NAME),
            }),
            Event::KeyPress(e) => {
                let keysym = self.keymap.get(&e.detail).copied().unwrap_or(0);
                Some(WmEvent::KeyPress { keysym, modifiers: u16::from(e.state), child: e.child })
            }
            Event::ButtonPress(e) => Some(WmEvent::ButtonPress { button: e.detail, child: e.child }),
            Event::MotionNotify(_) => Some(WmEvent::PointerMotion),
            Event::ButtonRelease(e) => Some(WmEvent::ButtonRelease { button: e.detail }),
            Event::EnterNotify(e) => Some(WmEvent::EnterNotify { window: e.event }),
            Event::UnmapNotify(e) => Some(WmEvent::UnmapNotify { window: e.window }),
            Event::ConfigureRequest(e) => Some(WmEvent::ConfigureRequest {
                window: e.window,
                aux: ConfigureWindowAux::from_configure_request(&e),
            }),
            Event::Expose(e) if e.count == 0 => Some(WmEvent::Expose { window: e.window }),
            Event::ClientMessage(e) if e.window == self.wake_window && e.type_ == self.atoms.frwm_shutdown => {
                Some(WmEvent::ShutdownRequested)
            }
            Event::MappingNotify(e) => {
                if e.request != Mapping::POINTER {
                    log::info!("Keyboard mapping changed, re-grabbing keys");
                    self.load_keymap()?;
                    self.regrab_keys()?;
                }
                None
            }
            Event::Error(e) => {
                log::debug!("X11 error: {:?}", e);
                None
            }
            _ => None,
        };
        Ok(decoded)
    }

    fn scratch_gc(&self, drawable: Window, foreground: u32) -> Result<Gcontext> {
        let gc = self.conn.generate_id()?;
        self.conn.create_gc(gc, drawable, &CreateGCAux::new().foreground(foreground))?;
        Ok(gc)
    }
}

fn clamp_u16(value: u32) -> u16 {
    value.clamp(1, u16::MAX as u32) as u16
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

impl DisplaySession for X11Session {
    fn root(&self) -> Window {
        self.root
    }

    fn create_window(&mut self, spec: &WindowSpec) -> Result<Window> {
        let window = self.conn.generate_id()?;
        self.conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            window,
            self.root,
            clamp_i16(spec.rect.x),
            clamp_i16(spec.rect.y),
            clamp_u16(spec.rect.width),
            clamp_u16(spec.rect.height),
            spec.border_width as u16,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .background_pixel(spec.background)
                .border_pixel(spec.border)
                .override_redirect(u32::from(spec.override_redirect))
                .event_mask(spec.event_mask),
        )?;
        Ok(window)
    }

    fn destroy_window(&mut self, window: Window) -> Result<()> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn map_window(&mut self, window: Window) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&mut self, window: Window) -> Result<()> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn reparent_window(&mut self, window: Window, parent: Window, x: i16, y: i16) -> Result<()> {
        self.conn.reparent_window(window, parent, x, y)?;
        Ok(())
    }

    fn move_window(&mut self, window: Window, x: i32, y: i32) -> Result<()> {
        self.conn.configure_window(window, &ConfigureWindowAux::new().x(x).y(y))?;
        Ok(())
    }

    fn resize_window(&mut self, window: Window, width: u32, height: u32) -> Result<()> {
        // Zero is not a valid size on the wire
        let aux = ConfigureWindowAux::new().width(width.max(1)).height(height.max(1));
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    fn raise_window(&mut self, window: Window) -> Result<()> {
        self.conn.configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))?;
        Ok(())
    }

    fn configure_window(&mut self, window: Window, aux: &ConfigureWindowAux) -> Result<()> {
        self.conn.configure_window(window, aux)?;
        Ok(())
    }

    fn get_geometry(&mut self, window: Window) -> Result<Rect> {
        let geom = self.conn.get_geometry(window)?.reply()?;
        Ok(Rect::new(geom.x as i32, geom.y as i32, geom.width as u32, geom.height as u32))
    }

    fn get_title(&mut self, window: Window) -> Result<String> {
        window_query::get_window_title(&self.conn, window)
    }

    fn select_client_events(&mut self, window: Window) -> Result<()> {
        let mask = EventMask::PROPERTY_CHANGE | EventMask::STRUCTURE_NOTIFY;
        self.conn
            .change_window_attributes(window, &ChangeWindowAttributesAux::new().event_mask(mask))?;
        Ok(())
    }

    fn set_border_color(&mut self, window: Window, color: u32) -> Result<()> {
        self.conn
            .change_window_attributes(window, &ChangeWindowAttributesAux::new().border_pixel(color))?;
        Ok(())
    }

    fn set_wm_state(&mut self, window: Window, state: IcccmState) -> Result<()> {
        window_query::set_wm_state(&self.conn, &self.atoms, window, state)
    }

    fn set_input_focus(&mut self, window: Window) -> Result<()> {
        self.conn.set_input_focus(InputFocus::POINTER_ROOT, window, x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn reset_input_focus(&mut self) -> Result<()> {
        self.conn.set_input_focus(InputFocus::POINTER_ROOT, POINTER_ROOT, x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn supports_protocol(&mut self, window: Window, protocol: WmProtocol) -> bool {
        window_query::supports_protocol(&self.conn, &self.atoms, window, protocol)
    }

    fn send_protocol(&mut self, window: Window, protocol: WmProtocol) -> Result<()> {
        window_query::send_protocol(&self.conn, &self.atoms, window, protocol)
    }

    fn warp_pointer(&mut self, window: Window, x: i16, y: i16) -> Result<()> {
        self.conn.warp_pointer(x11rb::NONE, window, 0, 0, 0, 0, x, y)?;
        Ok(())
    }

    fn grab_pointer(&mut self, cursor: CursorGlyph) -> Result<bool> {
        let reply = self
            .conn
            .grab_pointer(
                false,
                self.root,
                EventMask::BUTTON_RELEASE | EventMask::BUTTON_MOTION | EventMask::POINTER_MOTION_HINT,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                self.cursors.get(cursor),
                x11rb::CURRENT_TIME,
            )?
            .reply()?;
        Ok(reply.status == GrabStatus::SUCCESS)
    }

    fn ungrab_pointer(&mut self) -> Result<()> {
        self.conn.ungrab_pointer(x11rb::CURRENT_TIME)?;
        Ok(())
    }

    fn query_pointer(&mut self) -> Result<(i32, i32)> {
        let reply = self.conn.query_pointer(self.root)?.reply()?;
        Ok((reply.root_x as i32, reply.root_y as i32))
    }

    fn fill_rectangle(&mut self, window: Window, color: u32, rect: Rect) -> Result<()> {
        let gc = self.scratch_gc(window, color)?;
        let rectangle = Rectangle {
            x: clamp_i16(rect.x),
            y: clamp_i16(rect.y),
            width: clamp_u16(rect.width),
            height: clamp_u16(rect.height),
        };
        let drawn = self.conn.poly_fill_rectangle(window, gc, &[rectangle]);
        self.conn.free_gc(gc)?;
        drawn?;
        Ok(())
    }

    fn put_image(&mut self, window: Window, x: i32, y: i32, bitmap: &TextBitmap) -> Result<()> {
        // BGRX is only meaningful for 24/32-bit TrueColor visuals
        if self.root_depth != 24 && self.root_depth != 32 {
            log::warn!("Cannot draw text at depth {}", self.root_depth);
            return Ok(());
        }
        let gc = self.scratch_gc(window, 0)?;
        let drawn = self.conn.put_image(
            ImageFormat::Z_PIXMAP,
            window,
            gc,
            clamp_u16(bitmap.width),
            clamp_u16(bitmap.height),
            clamp_i16(x),
            clamp_i16(y),
            0,
            self.root_depth,
            &bitmap.pixels,
        );
        self.conn.free_gc(gc)?;
        drawn?;
        Ok(())
    }

    fn monitors(&mut self) -> Result<Vec<Rect>> {
        monitor::query_monitors(&self.conn, self.root)
    }

    fn screen_rect(&self) -> Rect {
        monitor::screen_rect(&self.conn, self.screen_num)
    }

    fn teardown_window(&mut self, client: Window, frame: Window) -> Result<()> {
        self.conn.kill_client(client)?;
        self.conn.unmap_window(frame)?;
        self.conn.destroy_window(frame)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }

    fn next_event(&mut self) -> Result<WmEvent> {
        loop {
            let event = self.conn.wait_for_event().context("Lost connection to X11 server")?;
            if let Some(decoded) = self.decode(event)? {
                return Ok(decoded);
            }
        }
    }
}
