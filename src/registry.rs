//! Registry of managed client windows and their frames.
//!
//! Entries live in a [`SlotMap`] arena pre-sized to [`MAX_WINDOWS`], with
//! handle → key maps for both the client and the frame so lookups from either
//! side are O(1). The capacity is a hard bound: registering past it fails
//! without touching the table.

use std::collections::HashMap;

use serde::Serialize;
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;
use x11rb::protocol::xproto::Window;

use crate::config::MAX_WINDOWS;

/// Longest title kept for a window, in bytes
pub const MAX_TITLE_BYTES: usize = 63;

new_key_type! {
    /// Arena slot of a managed window
    pub struct WindowKey;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("window registry is full ({capacity} windows)")]
    CapacityExceeded { capacity: usize },
    #[error("window handle 0 cannot be registered")]
    InvalidHandle,
    #[error("window 0x{0:x} is already managed")]
    AlreadyManaged(Window),
}

/// A client window wrapped in a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedWindow {
    pub client: Window,
    pub frame: Window,
    pub title: String,
    pub visible: bool,
}

/// Cut a title down to [`MAX_TITLE_BYTES`] without splitting a character
pub fn bounded_title(text: &str) -> String {
    if text.len() <= MAX_TITLE_BYTES {
        return text.to_string();
    }
    let mut end = MAX_TITLE_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[derive(Debug)]
pub struct WindowRegistry {
    windows: SlotMap<WindowKey, ManagedWindow>,
    by_client: HashMap<Window, WindowKey>,
    by_frame: HashMap<Window, WindowKey>,
    capacity: usize,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::with_capacity(MAX_WINDOWS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            windows: SlotMap::with_capacity_and_key(capacity),
            by_client: HashMap::with_capacity(capacity),
            by_frame: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Register a client/frame pair. Returns the client handle, which is the
    /// key other components use to refer to the entry.
    pub fn register(&mut self, client: Window, frame: Window, title: &str) -> Result<Window, RegistryError> {
        if client == 0 || frame == 0 {
            return Err(RegistryError::InvalidHandle);
        }
        if self.by_client.contains_key(&client) {
            return Err(RegistryError::AlreadyManaged(client));
        }
        if self.by_frame.contains_key(&frame) {
            return Err(RegistryError::AlreadyManaged(frame));
        }
        if self.is_full() {
            return Err(RegistryError::CapacityExceeded { capacity: self.capacity });
        }

        let key = self.windows.insert(ManagedWindow {
            client,
            frame,
            title: bounded_title(title),
            visible: true,
        });
        self.by_client.insert(client, key);
        self.by_frame.insert(frame, key);
        Ok(client)
    }

    pub fn find_by_client(&self, client: Window) -> Option<&ManagedWindow> {
        self.by_client.get(&client).and_then(|&key| self.windows.get(key))
    }

    pub fn find_by_frame(&self, frame: Window) -> Option<&ManagedWindow> {
        self.by_frame.get(&frame).and_then(|&key| self.windows.get(key))
    }

    /// Replace a window's title. Unknown clients are ignored since title
    /// updates can race with removal. Returns whether an entry was updated.
    pub fn update_title(&mut self, client: Window, text: &str) -> bool {
        let Some(&key) = self.by_client.get(&client) else {
            return false;
        };
        match self.windows.get_mut(key) {
            Some(window) => {
                window.title = bounded_title(text);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, client: Window) -> Option<ManagedWindow> {
        let key = self.by_client.remove(&client)?;
        let window = self.windows.remove(key)?;
        self.by_frame.remove(&window.frame);
        Some(window)
    }

    /// Remove every entry, handing them back in arena order
    pub fn drain(&mut self) -> Vec<ManagedWindow> {
        self.by_client.clear();
        self.by_frame.clear();
        self.windows.drain().map(|(_, window)| window).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedWindow> {
        self.windows.values()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.windows.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}
