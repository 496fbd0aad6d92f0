//! Atoms interned at startup.

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, ConnectionExt};

/// Client message type used to wake the event loop for shutdown
pub const SHUTDOWN_ATOM_NAME: &[u8] = b"_FRWM_SHUTDOWN";

/// ICCCM atoms plus our private shutdown message type
#[derive(Debug, Clone, Copy)]
pub struct Atoms {
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub wm_state: Atom,
    pub wm_take_focus: Atom,
    pub frwm_shutdown: Atom,
}

impl Atoms {
    pub fn new(conn: &impl Connection) -> Result<Self> {
        Ok(Self {
            wm_protocols: intern(conn, b"WM_PROTOCOLS")?,
            wm_delete_window: intern(conn, b"WM_DELETE_WINDOW")?,
            wm_state: intern(conn, b"WM_STATE")?,
            wm_take_focus: intern(conn, b"WM_TAKE_FOCUS")?,
            frwm_shutdown: intern(conn, SHUTDOWN_ATOM_NAME)?,
        })
    }
}

pub fn intern(conn: &impl Connection, name: &[u8]) -> Result<Atom> {
    let atom = conn
        .intern_atom(false, name)?
        .reply()
        .with_context(|| format!("Failed to intern {}", String::from_utf8_lossy(name)))?
        .atom;
    Ok(atom)
}
