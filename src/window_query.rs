//! Window property queries and ICCCM client messages.
//!
//! Stateless helpers over a connection; the display session wraps them.

use anyhow::Result;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::wrapper::ConnectionExt as _;

use crate::atoms::Atoms;
use crate::display::{IcccmState, WmProtocol};
use crate::registry::MAX_TITLE_BYTES;

/// Read WM_NAME, at most [`MAX_TITLE_BYTES`] of it. Invalid UTF-8 is replaced.
pub fn get_window_title(conn: &impl Connection, window: Window) -> Result<String> {
    // Length is in 32-bit units; ask for one unit more than we keep
    let long_length = (MAX_TITLE_BYTES as u32 + 3) / 4 + 1;
    let reply = conn
        .get_property(false, window, AtomEnum::WM_NAME, AtomEnum::ANY, 0, long_length)?
        .reply()?;
    Ok(decode_title(&reply.value))
}

fn decode_title(raw: &[u8]) -> String {
    // Some clients include the terminating NUL
    let raw = raw.split(|b| *b == 0).next().unwrap_or_default();
    String::from_utf8_lossy(raw).into_owned()
}

fn protocol_atom(atoms: &Atoms, protocol: WmProtocol) -> Atom {
    match protocol {
        WmProtocol::DeleteWindow => atoms.wm_delete_window,
        WmProtocol::TakeFocus => atoms.wm_take_focus,
    }
}

/// Does the window list `protocol` in WM_PROTOCOLS?
pub fn supports_protocol(conn: &impl Connection, atoms: &Atoms, window: Window, protocol: WmProtocol) -> bool {
    let wanted = protocol_atom(atoms, protocol);
    let Ok(cookie) = conn.get_property(false, window, atoms.wm_protocols, AtomEnum::ATOM, 0, 32) else {
        return false;
    };
    match cookie.reply() {
        Ok(reply) => reply.value32().is_some_and(|mut list| list.any(|a| a == wanted)),
        Err(_) => false,
    }
}

/// Send a WM_PROTOCOLS client message
pub fn send_protocol(conn: &impl Connection, atoms: &Atoms, window: Window, protocol: WmProtocol) -> Result<()> {
    let data = ClientMessageData::from([protocol_atom(atoms, protocol), x11rb::CURRENT_TIME, 0, 0, 0]);
    let event = ClientMessageEvent::new(32, window, atoms.wm_protocols, data);
    conn.send_event(false, window, EventMask::NO_EVENT, event)?;
    Ok(())
}

/// Set the ICCCM WM_STATE property (state, no icon window)
pub fn set_wm_state(conn: &impl Connection, atoms: &Atoms, window: Window, state: IcccmState) -> Result<()> {
    conn.change_property32(
        PropMode::REPLACE,
        window,
        atoms.wm_state,
        atoms.wm_state,
        &[state as u32, x11rb::NONE],
    )?;
    Ok(())
}
