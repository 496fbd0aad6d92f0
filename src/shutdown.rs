//! Orderly shutdown on SIGINT/SIGTERM.
//!
//! The signals are blocked in every thread and collected by a watcher thread
//! with `sigwait`. The watcher can't touch window manager state, so it opens
//! its own connection and sends a client message to a hidden window owned by
//! the main connection. The event loop sees that as a regular event.

use std::io;
use std::mem::MaybeUninit;
use std::thread;

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ClientMessageEvent, ConnectionExt, EventMask, Window};
use x11rb::rust_connection::RustConnection;

use crate::atoms::{intern, SHUTDOWN_ATOM_NAME};

/// Wakes the event loop with a shutdown request
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    display_name: Option<String>,
    wake_window: Window,
}

impl ShutdownHandle {
    pub fn new(display_name: Option<String>, wake_window: Window) -> Self {
        Self { display_name, wake_window }
    }

    pub fn request(&self) -> Result<()> {
        let (conn, _) = RustConnection::connect(self.display_name.as_deref())
            .context("Failed to open shutdown connection")?;
        let message_type = intern(&conn, SHUTDOWN_ATOM_NAME)?;

        let event = ClientMessageEvent::new(32, self.wake_window, message_type, [0u32; 5]);
        conn.send_event(false, self.wake_window, EventMask::NO_EVENT, event)?;
        conn.flush()?;
        Ok(())
    }
}

fn termination_signals() -> io::Result<libc::sigset_t> {
    let mut set = MaybeUninit::<libc::sigset_t>::uninit();
    // SAFETY: sigemptyset initializes the set before sigaddset reads it
    unsafe {
        if libc::sigemptyset(set.as_mut_ptr()) != 0 {
            return Err(io::Error::last_os_error());
        }
        let mut set = set.assume_init();
        for signal in [libc::SIGINT, libc::SIGTERM] {
            if libc::sigaddset(&mut set, signal) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(set)
    }
}

/// Block SIGINT and SIGTERM and start a thread that turns them into a
/// shutdown request. Call before spawning any other thread so they all
/// inherit the mask.
pub fn spawn_signal_watcher(handle: ShutdownHandle) -> Result<()> {
    let set = termination_signals().context("Failed to build signal set")?;

    // SAFETY: `set` is a valid, initialized signal set
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc)).context("Failed to block termination signals");
    }

    thread::Builder::new()
        .name("signal-watcher".into())
        .spawn(move || loop {
            let mut signal: libc::c_int = 0;
            // SAFETY: `set` is initialized and `signal` is a valid out pointer
            let rc = unsafe { libc::sigwait(&set, &mut signal) };
            if rc != 0 {
                log::error!("sigwait failed: {}", io::Error::from_raw_os_error(rc));
                return;
            }

            log::info!("Received signal {}, requesting shutdown", signal);
            match handle.request() {
                Ok(()) => return,
                Err(e) => log::error!("Failed to request shutdown: {:#}", e),
            }
        })
        .context("Failed to spawn signal watcher")?;

    Ok(())
}
