//! Window manager state aggregate, transitions and validation.
//!
//! All mutable state lives in [`WmState`], owned by the event loop and
//! passed by `&mut` into each component. Transitions are recorded in the
//! event tracer; [`WmState::validate`] checks the invariants that must hold
//! between events.
//!
//! ```text
//!            MapRequest                UnmapNotify
//!   (unmanaged) ──────► Managed ─────────────────────► (gone)
//!                        │   ▲
//!              kill      │   │ focus / enter / press
//!                        ▼   │
//!                    frame unmapped
//! ```

use serde::{Deserialize, Serialize};
use x11rb::protocol::xproto::Window;

use crate::bar::StatusBar;
use crate::drag::DragController;
use crate::focus::{CurrentSelection, FocusTracker};
use crate::monitor::MonitorLayout;
use crate::registry::WindowRegistry;
use crate::tracing::TraceLog;

pub struct WmState {
    pub registry: WindowRegistry,
    pub focus: FocusTracker,
    pub drag: DragController,
    pub monitors: MonitorLayout,
    pub bar: StatusBar,
    pub running: bool,
    pub tracer: TraceLog,
}

impl WmState {
    pub fn new(monitors: MonitorLayout, bar: StatusBar) -> Self {
        Self {
            registry: WindowRegistry::new(),
            focus: FocusTracker::new(),
            drag: DragController::new(),
            monitors,
            bar,
            running: true,
            tracer: TraceLog::new(),
        }
    }

    pub fn selection(&self) -> CurrentSelection {
        self.focus.current(&self.registry)
    }

    pub fn record(&mut self, transition: StateTransition) {
        log::debug!("{:?}", transition);
        self.tracer.transition(&transition);
    }

    /// Check cross-component invariants
    pub fn validate(&self) -> Vec<StateViolation> {
        let mut violations = Vec::new();

        if self.registry.len() > self.registry.capacity() {
            violations.push(StateViolation::new(
                ViolationKind::CapacityExceeded,
                format!("{} windows with capacity {}", self.registry.len(), self.registry.capacity()),
            ));
        }

        for window in self.registry.iter() {
            if window.client == 0 || window.frame == 0 || window.client == window.frame {
                violations.push(StateViolation::new(
                    ViolationKind::InvalidHandle,
                    format!("client 0x{:x} frame 0x{:x}", window.client, window.frame),
                ));
            }
            let by_frame = self.registry.find_by_frame(window.frame).map(|w| w.client);
            if by_frame != Some(window.client) {
                violations.push(StateViolation::new(
                    ViolationKind::IndexMismatch,
                    format!("frame 0x{:x} resolves to {:?}, expected 0x{:x}", window.frame, by_frame, window.client),
                ));
            }
        }

        if let Some(client) = self.focus.raw().client() {
            if self.registry.find_by_client(client).is_none() {
                violations.push(StateViolation::new(
                    ViolationKind::StaleFocus,
                    format!("selection refers to unmanaged client 0x{:x}", client),
                ));
            }
        }

        if let Some(frame) = self.drag.mode().target() {
            if self.registry.find_by_frame(frame).is_none() {
                violations.push(StateViolation::new(
                    ViolationKind::DragTargetMissing,
                    format!("drag targets unmanaged frame 0x{:x}", frame),
                ));
            }
        }

        violations
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateViolation {
    pub kind: ViolationKind,
    pub description: String,
}

impl StateViolation {
    fn new(kind: ViolationKind, description: String) -> Self {
        Self { kind, description }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// More windows than the registry may hold
    CapacityExceeded,
    /// A zero or self-referencing handle in the registry
    InvalidHandle,
    /// Client and frame lookups disagree
    IndexMismatch,
    /// The current selection outlived its window
    StaleFocus,
    /// A drag session targets a frame that is gone
    DragTargetMissing,
}

/// State transition events that can be traced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum StateTransition {
    WindowManaged { window: Window, frame: Window },
    WindowUnmanaged { window: Window, reason: UnmanageReason },
    FocusChanged { from: Option<Window>, to: Option<Window> },
    DragStarted { frame: Window, resize: bool },
    DragEnded { frame: Window },
    BarToggled { visible: bool },
}

/// Reason a window was unmanaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmanageReason {
    /// Client unmapped the window
    ClientUnmapped,
    /// Window manager shut down
    Shutdown,
}
