//! Current-window tracking.
//!
//! The tracker owns the single "current selection" slot and the border
//! colors that mirror it on the server.

use serde::Serialize;
use x11rb::protocol::xproto::Window;

use crate::config::{COLOR_FRAME_BORDER_FOCUS, COLOR_FRAME_BORDER_UNFOCUS};
use crate::display::{DisplaySession, WmProtocol};
use crate::registry::WindowRegistry;

/// The focused window, or none (the root)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CurrentSelection {
    #[default]
    None,
    Window {
        frame: Window,
        client: Window,
        title: String,
    },
}

impl CurrentSelection {
    pub fn frame(&self) -> Option<Window> {
        match self {
            CurrentSelection::None => None,
            CurrentSelection::Window { frame, .. } => Some(*frame),
        }
    }

    pub fn client(&self) -> Option<Window> {
        match self {
            CurrentSelection::None => None,
            CurrentSelection::Window { client, .. } => Some(*client),
        }
    }
}

#[derive(Debug, Default)]
pub struct FocusTracker {
    selection: CurrentSelection,
}

impl FocusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The selection with stale references resolved to `None`
    pub fn current(&self, registry: &WindowRegistry) -> CurrentSelection {
        match &self.selection {
            CurrentSelection::Window { client, .. } if registry.find_by_client(*client).is_some() => {
                self.selection.clone()
            }
            _ => CurrentSelection::None,
        }
    }

    /// The selection as stored, without checking it against the registry
    pub fn raw(&self) -> &CurrentSelection {
        &self.selection
    }

    /// Make `frame` the current window.
    ///
    /// A frame that doesn't resolve to a managed window leaves the selection
    /// alone. Returns whether the selection changed hands.
    pub fn set_current(
        &mut self,
        display: &mut dyn DisplaySession,
        registry: &WindowRegistry,
        frame: Window,
    ) -> bool {
        let Some(window) = registry.find_by_frame(frame) else {
            log::debug!("set_current: 0x{:x} is not a managed frame", frame);
            return false;
        };
        let client = window.client;
        let title = window.title.clone();

        // Both border updates go out even if one fails, so no frame is left
        // wearing the focused color.
        if let Some(previous) = self.current(registry).frame() {
            if let Err(e) = display.set_border_color(previous, COLOR_FRAME_BORDER_UNFOCUS) {
                log::warn!("Failed to unfocus border of 0x{:x}: {}", previous, e);
            }
        }
        if let Err(e) = display.set_border_color(frame, COLOR_FRAME_BORDER_FOCUS) {
            log::warn!("Failed to focus border of 0x{:x}: {}", frame, e);
        }

        self.selection = CurrentSelection::Window { frame, client, title };

        if let Err(e) = display.set_input_focus(frame) {
            log::warn!("Failed to set input focus to 0x{:x}: {}", frame, e);
        }
        if display.supports_protocol(client, WmProtocol::TakeFocus) {
            if let Err(e) = display.send_protocol(client, WmProtocol::TakeFocus) {
                log::warn!("Failed to send WM_TAKE_FOCUS to 0x{:x}: {}", client, e);
            }
        }

        log::debug!("Current window is now 0x{:x} (frame 0x{:x})", client, frame);
        true
    }

    /// Point the selection back at the root
    pub fn clear(&mut self) {
        self.selection = CurrentSelection::None;
    }

    /// Drop the selection if it refers to `client`
    pub fn forget(&mut self, client: Window) {
        if self.selection.client() == Some(client) {
            self.selection = CurrentSelection::None;
        }
    }

    /// Keep the cached title in step with the registry
    pub fn refresh_title(&mut self, client: Window, text: &str) {
        if let CurrentSelection::Window { client: current, title, .. } = &mut self.selection {
            if *current == client {
                *title = text.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingDisplay, Request};

    fn setup() -> (RecordingDisplay, WindowRegistry, FocusTracker) {
        let mut registry = WindowRegistry::new();
        registry.register(100, 200, "first").unwrap();
        registry.register(101, 201, "second").unwrap();
        (RecordingDisplay::new(), registry, FocusTracker::new())
    }

    #[test]
    fn test_set_current_focuses_frame() {
        let (mut display, registry, mut focus) = setup();

        assert!(focus.set_current(&mut display, &registry, 200));
        assert_eq!(
            focus.current(&registry),
            CurrentSelection::Window { frame: 200, client: 100, title: "first".to_string() }
        );
        assert_eq!(
            display.requests,
            vec![
                Request::SetBorderColor(200, COLOR_FRAME_BORDER_FOCUS),
                Request::SetInputFocus(200),
            ]
        );
    }

    #[test]
    fn test_switching_unfocuses_previous() {
        let (mut display, registry, mut focus) = setup();
        focus.set_current(&mut display, &registry, 200);
        display.clear_requests();

        focus.set_current(&mut display, &registry, 201);
        assert_eq!(
            display.requests,
            vec![
                Request::SetBorderColor(200, COLOR_FRAME_BORDER_UNFOCUS),
                Request::SetBorderColor(201, COLOR_FRAME_BORDER_FOCUS),
                Request::SetInputFocus(201),
            ]
        );
        assert_eq!(focus.current(&registry).client(), Some(101));
    }

    #[test]
    fn test_unknown_frame_is_noop() {
        let (mut display, registry, mut focus) = setup();
        focus.set_current(&mut display, &registry, 200);
        display.clear_requests();

        assert!(!focus.set_current(&mut display, &registry, 999));
        assert_eq!(focus.current(&registry).frame(), Some(200));
        assert!(display.requests.is_empty());

        // A client handle is not a frame handle
        assert!(!focus.set_current(&mut display, &registry, 101));
        assert_eq!(focus.current(&registry).frame(), Some(200));
    }

    #[test]
    fn test_border_failure_does_not_skip_second_update() {
        let (mut display, registry, mut focus) = setup();
        focus.set_current(&mut display, &registry, 200);
        display.failing_borders.insert(200);
        display.clear_requests();

        assert!(focus.set_current(&mut display, &registry, 201));
        assert!(display.sent(&Request::SetBorderColor(200, COLOR_FRAME_BORDER_UNFOCUS)));
        assert!(display.sent(&Request::SetBorderColor(201, COLOR_FRAME_BORDER_FOCUS)));
        assert!(display.sent(&Request::SetInputFocus(201)));
    }

    #[test]
    fn test_stale_selection_reads_as_none() {
        let (mut display, mut registry, mut focus) = setup();
        focus.set_current(&mut display, &registry, 200);

        registry.remove(100);
        assert_eq!(focus.current(&registry), CurrentSelection::None);

        // No unfocus request goes to a frame that is no longer managed
        display.clear_requests();
        focus.set_current(&mut display, &registry, 201);
        assert_eq!(display.count(|r| matches!(r, Request::SetBorderColor(200, _))), 0);
    }

    #[test]
    fn test_take_focus_sent_when_supported() {
        let (mut display, registry, mut focus) = setup();
        display.protocols.insert(101, vec![WmProtocol::TakeFocus]);

        focus.set_current(&mut display, &registry, 201);
        assert!(display.sent(&Request::SendProtocol(101, WmProtocol::TakeFocus)));

        display.clear_requests();
        focus.set_current(&mut display, &registry, 200);
        assert_eq!(display.count(|r| matches!(r, Request::SendProtocol(..))), 0);
    }

    #[test]
    fn test_forget_and_refresh_title() {
        let (mut display, registry, mut focus) = setup();
        focus.set_current(&mut display, &registry, 200);

        focus.refresh_title(100, "Editor");
        focus.refresh_title(101, "ignored");
        match focus.current(&registry) {
            CurrentSelection::Window { title, .. } => assert_eq!(title, "Editor"),
            other => panic!("unexpected selection {:?}", other),
        }

        focus.forget(101);
        assert_eq!(focus.current(&registry).client(), Some(100));
        focus.forget(100);
        assert_eq!(focus.current(&registry), CurrentSelection::None);
    }

    #[test]
    fn test_selection_serialization() {
        let json = serde_json::to_string(&CurrentSelection::None).unwrap();
        assert_eq!(json, r#"{"state":"none"}"#);

        let selection = CurrentSelection::Window { frame: 2, client: 1, title: "t".into() };
        let json = serde_json::to_string(&selection).unwrap();
        assert!(json.contains("\"window\""));
        assert!(json.contains("\"frame\":2"));
    }
}
