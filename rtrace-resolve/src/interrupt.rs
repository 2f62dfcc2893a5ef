//! SIGINT handling
//!
//! The handler only raises a flag. Passes poll it once per line and stop
//! early, leaving the output written so far in place.

#![allow(unsafe_code)] // signal() requires unsafe

use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};

static ABORT: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_signal: libc::c_int) {
    ABORT.store(true, Ordering::Relaxed);
}

/// Routes SIGINT to the abort flag instead of terminating the process.
pub fn install_handler() {
    let handler = on_sigint as extern "C" fn(libc::c_int);
    // Safety: the handler only stores to an atomic, which is async-signal-safe.
    let previous = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
    if previous == libc::SIG_ERR {
        debug!("failed to install SIGINT handler");
    }
}

/// Flag raised by SIGINT.
#[must_use]
pub fn flag() -> &'static AtomicBool {
    &ABORT
}
