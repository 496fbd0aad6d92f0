//! Event tracing for debugging frwm.
//!
//! A bounded log of recent events and state transitions. The tail is dumped
//! as JSON at debug level when the window manager shuts down, which is
//! usually enough to see what led up to a problem.

use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;
use x11rb::protocol::xproto::Window;

use crate::event::WmEvent;
use crate::state::StateTransition;

const TRACE_CAPACITY: usize = 512;

/// Number of entries written out on shutdown
pub const DUMP_ENTRIES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub seq: u64,
    /// Milliseconds since the log was created
    pub at_ms: u64,
    pub kind: &'static str,
    pub window: Option<Window>,
    pub details: String,
}

pub struct TraceLog {
    buf: VecDeque<TraceEntry>,
    capacity: usize,
    next_seq: u64,
    epoch: Instant,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::bounded(TRACE_CAPACITY)
    }

    /// A log that keeps at most `capacity` entries, dropping the oldest
    pub fn bounded(capacity: usize) -> Self {
        Self { buf: VecDeque::with_capacity(capacity), capacity, next_seq: 1, epoch: Instant::now() }
    }

    pub fn event(&mut self, event: &WmEvent) {
        self.push(event.name(), event.window(), format!("{:?}", event));
    }

    pub fn transition(&mut self, transition: &StateTransition) {
        use StateTransition::*;

        let (kind, window) = match *transition {
            WindowManaged { window, .. } => ("window_managed", Some(window)),
            WindowUnmanaged { window, .. } => ("window_unmanaged", Some(window)),
            FocusChanged { to, .. } => ("focus_changed", to),
            DragStarted { frame, .. } => ("drag_started", Some(frame)),
            DragEnded { frame } => ("drag_ended", Some(frame)),
            BarToggled { .. } => ("bar_toggled", None),
        };
        let details = serde_json::to_string(transition).unwrap_or_default();
        self.push(kind, window, details);
    }

    fn push(&mut self, kind: &'static str, window: Option<Window>, details: String) {
        if self.capacity == 0 {
            return;
        }
        while self.buf.len() >= self.capacity {
            self.buf.pop_front();
        }

        let at_ms = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.buf.push_back(TraceEntry { seq: self.next_seq, at_ms, kind, window, details });
        self.next_seq += 1;
    }

    pub fn entries(&self) -> impl Iterator<Item = &TraceEntry> {
        self.buf.iter()
    }

    /// The newest `n` entries, oldest first
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &TraceEntry> {
        self.entries().skip(self.buf.len().saturating_sub(n))
    }

    /// Write the newest `n` entries to the debug log as JSON
    pub fn dump(&self, n: usize) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        let tail: Vec<&TraceEntry> = self.tail(n).collect();
        match serde_json::to_string_pretty(&tail) {
            Ok(json) => log::debug!("Last {} traced events:\n{}", tail.len(), json),
            Err(e) => log::warn!("Failed to serialize event trace: {}", e),
        }
    }
}

impl Default for TraceLog {
    fn default() -> Self {
        Self::new()
    }
}
