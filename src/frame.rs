//! Frame lifecycle: wrapping clients, resizing, closing and cleanup.
//!
//! A frame is an override-redirect window with an 18 px band at the top; the
//! client is reparented just below the band. Every managed client has
//! exactly one frame for as long as it is in the registry.

use anyhow::{Context, Result};
use x11rb::protocol::xproto::{EventMask, Window};

use crate::config::{
    COLOR_FRAME_BACK, COLOR_FRAME_BORDER_UNFOCUS, FRAME_BAR_HEIGHT, FRAME_BORDER_WIDTH,
};
use crate::display::{DisplaySession, IcccmState, WindowSpec, WmProtocol};
use crate::registry::WindowRegistry;
use crate::state::{StateTransition, UnmanageReason, WmState};
use crate::types::Rect;

/// Events we want on every frame
fn frame_event_mask() -> EventMask {
    EventMask::BUTTON_PRESS | EventMask::EXPOSURE | EventMask::ENTER_WINDOW | EventMask::SUBSTRUCTURE_REDIRECT
}

/// Take `client` under management. Returns the new frame, or `None` if the
/// client was already managed or the registry is full.
pub fn wrap(display: &mut dyn DisplaySession, state: &mut WmState, client: Window) -> Result<Option<Window>> {
    if state.registry.find_by_client(client).is_some() {
        log::debug!("Window 0x{:x} is already managed", client);
        return Ok(None);
    }
    if state.registry.is_full() {
        log::warn!(
            "Refusing to manage 0x{:x}: already managing {} windows",
            client,
            state.registry.capacity()
        );
        return Ok(None);
    }

    let geom = display
        .get_geometry(client)
        .with_context(|| format!("Failed to get geometry of 0x{:x}", client))?;
    let title = display.get_title(client).unwrap_or_else(|e| {
        log::debug!("No title for 0x{:x}: {}", client, e);
        String::new()
    });

    let frame = display
        .create_window(&WindowSpec {
            rect: Rect::new(0, 0, geom.width, geom.height + FRAME_BAR_HEIGHT),
            border_width: FRAME_BORDER_WIDTH,
            background: COLOR_FRAME_BACK,
            border: COLOR_FRAME_BORDER_UNFOCUS,
            override_redirect: true,
            event_mask: frame_event_mask(),
        })
        .with_context(|| format!("Failed to create frame for 0x{:x}", client))?;

    if let Err(e) = attach(display, &mut state.registry, client, frame, &title) {
        abandon_frame(display, client, frame);
        return Err(e);
    }

    display.set_wm_state(client, IcccmState::Normal)?;
    display.map_window(client)?;
    display.map_window(frame)?;

    log::info!("Managing 0x{:x} '{}' in frame 0x{:x}", client, title, frame);
    state.record(StateTransition::WindowManaged { window: client, frame });

    let previous = state.selection().client();
    if state.focus.set_current(display, &state.registry, frame) {
        state.record(StateTransition::FocusChanged { from: previous, to: Some(client) });
    }
    Ok(Some(frame))
}

/// Put the client inside the frame and record the pair
fn attach(
    display: &mut dyn DisplaySession,
    registry: &mut WindowRegistry,
    client: Window,
    frame: Window,
    title: &str,
) -> Result<()> {
    display.select_client_events(client)?;
    display.reparent_window(client, frame, 0, FRAME_BAR_HEIGHT as i16)?;
    registry.register(client, frame, title)?;
    Ok(())
}

/// Undo a half-finished wrap: hand the client back to the root and drop the frame
fn abandon_frame(display: &mut dyn DisplaySession, client: Window, frame: Window) {
    let root = display.root();
    if let Err(e) = display.reparent_window(client, root, 0, 0) {
        log::warn!("Failed to reparent 0x{:x} back to root: {}", client, e);
    }
    if let Err(e) = display.destroy_window(frame) {
        log::warn!("Failed to destroy frame 0x{:x}: {}", frame, e);
    }
}

/// Resize a frame and its client, then repaint the frame background
pub fn resize(
    display: &mut dyn DisplaySession,
    registry: &WindowRegistry,
    frame: Window,
    width: u32,
    height: u32,
) -> Result<()> {
    let Some(window) = registry.find_by_frame(frame) else {
        return Ok(());
    };
    let client = window.client;

    display.resize_window(frame, width, height)?;
    display.resize_window(client, width, height.saturating_sub(FRAME_BAR_HEIGHT))?;
    display.fill_rectangle(frame, COLOR_FRAME_BACK, Rect::new(0, 0, width, height))
}

/// Ask the client in `frame` to close and hide its frame.
///
/// The registry entry stays until the client unmaps itself.
pub fn kill(display: &mut dyn DisplaySession, state: &mut WmState, frame: Window) -> Result<()> {
    let Some(client) = state.registry.find_by_frame(frame).map(|w| w.client) else {
        log::debug!("kill: 0x{:x} is not a managed frame", frame);
        return Ok(());
    };

    log::info!("Closing 0x{:x}", client);
    display.send_protocol(client, WmProtocol::DeleteWindow)?;
    display.unmap_window(frame)?;

    let previous = state.selection().client();
    state.focus.clear();
    if previous.is_some() {
        state.record(StateTransition::FocusChanged { from: previous, to: None });
    }
    Ok(())
}

/// Forget a client that unmapped itself and get rid of its frame. Returns
/// whether `client` was managed.
pub fn unmap_cleanup(display: &mut dyn DisplaySession, state: &mut WmState, client: Window) -> Result<bool> {
    let Some(window) = state.registry.remove(client) else {
        return Ok(false);
    };
    let frame = window.frame;
    log::info!("Unmanaging 0x{:x} (frame 0x{:x})", client, frame);

    // Bookkeeping first so the state is consistent even if the server
    // rejects any of the requests below
    state.focus.forget(client);
    state.drag.cancel_for(display, frame)?;
    state.record(StateTransition::WindowUnmanaged {
        window: client,
        reason: UnmanageReason::ClientUnmapped,
    });

    let root = display.root();
    display.unmap_window(frame)?;
    display.set_wm_state(client, IcccmState::Withdrawn)?;
    display.reparent_window(client, root, 0, 0)?;
    display.destroy_window(client)?;
    display.destroy_window(frame)?;
    Ok(true)
}

/// Tear down every managed window at exit, one request per window
pub fn teardown_all(display: &mut dyn DisplaySession, state: &mut WmState) {
    state.focus.clear();
    for window in state.registry.drain() {
        if let Err(e) = display.teardown_window(window.client, window.frame) {
            log::warn!("Failed to tear down 0x{:x}: {}", window.client, e);
        }
        state.record(StateTransition::WindowUnmanaged {
            window: window.client,
            reason: UnmanageReason::Shutdown,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bar::StatusBar;
    use crate::config::{COLOR_FRAME_BORDER_FOCUS, MAX_WINDOWS};
    use crate::focus::CurrentSelection;
    use crate::monitor::MonitorLayout;
    use crate::testing::{RecordingDisplay, Request, ROOT};

    fn setup() -> (RecordingDisplay, WmState) {
        let mut display = RecordingDisplay::new();
        let monitors = MonitorLayout::new(display.monitors.clone(), Rect::default());
        let bar = StatusBar::create(&mut display, monitors.primary()).unwrap();
        display.clear_requests();
        (display, WmState::new(monitors, bar))
    }

    #[test]
    fn test_wrap_builds_frame() {
        let (mut display, mut state) = setup();
        display.add_client(0x100, Rect::new(40, 40, 640, 480), "xterm");

        let frame = wrap(&mut display, &mut state, 0x100).unwrap().unwrap();

        match &display.requests[0] {
            Request::CreateWindow(window, spec) => {
                assert_eq!(*window, frame);
                assert_eq!(spec.rect, Rect::new(0, 0, 640, 480 + FRAME_BAR_HEIGHT));
                assert_eq!(spec.border_width, FRAME_BORDER_WIDTH);
                assert_eq!(spec.background, COLOR_FRAME_BACK);
                assert!(spec.override_redirect);
                assert!(spec.event_mask.contains(EventMask::SUBSTRUCTURE_REDIRECT));
            }
            other => panic!("unexpected request {:?}", other),
        }
        assert!(display.sent(&Request::SelectClientEvents(0x100)));
        assert!(display.sent(&Request::Reparent {
            window: 0x100,
            parent: frame,
            x: 0,
            y: FRAME_BAR_HEIGHT as i16
        }));
        assert!(display.sent(&Request::SetWmState(0x100, IcccmState::Normal)));

        // Client is mapped before its frame
        let map_client = display.requests.iter().position(|r| *r == Request::MapWindow(0x100));
        let map_frame = display.requests.iter().position(|r| *r == Request::MapWindow(frame));
        assert!(map_client.unwrap() < map_frame.unwrap());

        let managed = state.registry.find_by_client(0x100).unwrap();
        assert_eq!(managed.frame, frame);
        assert_eq!(managed.title, "xterm");

        assert_eq!(state.selection().frame(), Some(frame));
        assert!(display.sent(&Request::SetBorderColor(frame, COLOR_FRAME_BORDER_FOCUS)));
        assert!(display.sent(&Request::SetInputFocus(frame)));
    }

    #[test]
    fn test_wrap_twice_is_ignored() {
        let (mut display, mut state) = setup();
        display.add_client(0x100, Rect::new(0, 0, 100, 100), "a");
        wrap(&mut display, &mut state, 0x100).unwrap();
        display.clear_requests();

        assert_eq!(wrap(&mut display, &mut state, 0x100).unwrap(), None);
        assert!(display.requests.is_empty());
        assert_eq!(state.registry.len(), 1);
    }

    #[test]
    fn test_wrap_refused_when_full() {
        let (mut display, mut state) = setup();
        for i in 1..=MAX_WINDOWS as u32 {
            state.registry.register(i, 0x1000 + i, "").unwrap();
        }
        display.add_client(0x100, Rect::new(0, 0, 100, 100), "overflow");

        assert_eq!(wrap(&mut display, &mut state, 0x100).unwrap(), None);
        assert!(display.requests.is_empty());
        assert!(state.registry.find_by_client(0x100).is_none());
    }

    #[test]
    fn test_wrap_aborts_without_geometry() {
        let (mut display, mut state) = setup();
        display.add_client(0x100, Rect::new(0, 0, 100, 100), "a");
        display.failing_geometry.insert(0x100);

        assert!(wrap(&mut display, &mut state, 0x100).is_err());
        assert!(display.requests.is_empty());
        assert!(state.registry.is_empty());
        assert_eq!(state.selection(), CurrentSelection::None);
    }

    #[test]
    fn test_wrap_registration_failure_releases_frame() {
        let (mut display, mut state) = setup();
        display.add_client(0x100, Rect::new(0, 0, 100, 100), "a");
        // The next frame handle is already claimed by another entry
        let next_frame = state.bar.window() + 1;
        state.registry.register(0x50, next_frame, "").unwrap();

        assert!(wrap(&mut display, &mut state, 0x100).is_err());
        assert!(display.sent(&Request::Reparent { window: 0x100, parent: ROOT, x: 0, y: 0 }));
        assert!(display.sent(&Request::DestroyWindow(next_frame)));
        assert!(state.registry.find_by_client(0x100).is_none());
        assert!(!display.sent(&Request::MapWindow(0x100)));
    }

    #[test]
    fn test_resize_frame_and_client() {
        let (mut display, mut state) = setup();
        state.registry.register(0x100, 0x300, "").unwrap();

        resize(&mut display, &state.registry, 0x300, 400, 300).unwrap();
        assert_eq!(
            display.requests,
            vec![
                Request::Resize { window: 0x300, width: 400, height: 300 },
                Request::Resize { window: 0x100, width: 400, height: 300 - FRAME_BAR_HEIGHT },
                Request::FillRectangle { window: 0x300, color: COLOR_FRAME_BACK, rect: Rect::new(0, 0, 400, 300) },
            ]
        );

        display.clear_requests();
        resize(&mut display, &state.registry, 0x999, 400, 300).unwrap();
        assert!(display.requests.is_empty());
    }

    #[test]
    fn test_resize_short_frame_saturates_client_height() {
        let (mut display, mut state) = setup();
        state.registry.register(0x100, 0x300, "").unwrap();

        resize(&mut display, &state.registry, 0x300, 100, 10).unwrap();
        assert!(display.sent(&Request::Resize { window: 0x100, width: 100, height: 0 }));
    }

    #[test]
    fn test_kill_sends_one_delete_and_clears_focus() {
        let (mut display, mut state) = setup();
        display.add_client(0x100, Rect::new(0, 0, 100, 100), "a");
        let frame = wrap(&mut display, &mut state, 0x100).unwrap().unwrap();
        display.clear_requests();

        kill(&mut display, &mut state, frame).unwrap();
        assert_eq!(
            display.requests,
            vec![
                Request::SendProtocol(0x100, WmProtocol::DeleteWindow),
                Request::UnmapWindow(frame),
            ]
        );
        assert_eq!(state.selection(), CurrentSelection::None);
        // Entry stays until the client goes away
        assert!(state.registry.find_by_client(0x100).is_some());
    }

    #[test]
    fn test_kill_unfocused_window_still_clears_focus() {
        let (mut display, mut state) = setup();
        display.add_client(0x100, Rect::new(0, 0, 100, 100), "a");
        display.add_client(0x101, Rect::new(0, 0, 100, 100), "b");
        let first = wrap(&mut display, &mut state, 0x100).unwrap().unwrap();
        wrap(&mut display, &mut state, 0x101).unwrap();

        kill(&mut display, &mut state, first).unwrap();
        assert_eq!(state.selection(), CurrentSelection::None);
    }

    #[test]
    fn test_kill_unknown_frame_is_noop() {
        let (mut display, mut state) = setup();
        kill(&mut display, &mut state, 0x999).unwrap();
        assert!(display.requests.is_empty());
    }

    #[test]
    fn test_unmap_cleanup() {
        let (mut display, mut state) = setup();
        display.add_client(0x100, Rect::new(0, 0, 100, 100), "a");
        let frame = wrap(&mut display, &mut state, 0x100).unwrap().unwrap();
        display.clear_requests();

        assert!(unmap_cleanup(&mut display, &mut state, 0x100).unwrap());
        assert_eq!(
            display.requests,
            vec![
                Request::UnmapWindow(frame),
                Request::SetWmState(0x100, IcccmState::Withdrawn),
                Request::Reparent { window: 0x100, parent: ROOT, x: 0, y: 0 },
                Request::DestroyWindow(0x100),
                Request::DestroyWindow(frame),
            ]
        );
        assert!(state.registry.is_empty());
        assert_eq!(state.selection(), CurrentSelection::None);
        assert!(state.validate().is_empty());
    }

    #[test]
    fn test_unmap_cleanup_ignores_unknown_and_frames() {
        let (mut display, mut state) = setup();
        state.registry.register(0x100, 0x300, "").unwrap();

        assert!(!unmap_cleanup(&mut display, &mut state, 0x999).unwrap());
        assert!(!unmap_cleanup(&mut display, &mut state, 0x300).unwrap());
        assert!(display.requests.is_empty());
        assert_eq!(state.registry.len(), 1);
    }

    #[test]
    fn test_unmap_cleanup_cancels_drag() {
        let (mut display, mut state) = setup();
        display.add_client(0x100, Rect::new(0, 0, 100, 100), "a");
        let frame = wrap(&mut display, &mut state, 0x100).unwrap().unwrap();
        state.drag.begin(&mut display, &state.registry, frame, 1).unwrap();

        unmap_cleanup(&mut display, &mut state, 0x100).unwrap();
        assert!(!state.drag.is_active());
        assert!(display.sent(&Request::UngrabPointer));
    }

    #[test]
    fn test_teardown_all_once_per_window() {
        let (mut display, mut state) = setup();
        for client in [0x100, 0x101, 0x102] {
            display.add_client(client, Rect::new(0, 0, 100, 100), "w");
            wrap(&mut display, &mut state, client).unwrap();
        }
        display.clear_requests();

        teardown_all(&mut display, &mut state);
        assert_eq!(display.count(|r| matches!(r, Request::Teardown { .. })), 3);
        for client in [0x100, 0x101, 0x102] {
            assert_eq!(display.count(|r| matches!(r, Request::Teardown { client: c, .. } if *c == client)), 1);
        }
        assert!(state.registry.is_empty());
        assert_eq!(state.selection(), CurrentSelection::None);
    }
}
