//! Abort shim
//!
//! The external stack calls `abort()` when one of its internal consistency
//! checks fails. A long-running host cannot let a subordinate library take
//! the whole image down, so the call is turned into a structured failure on
//! the host's own error channel instead.
//!
//! The host installs a raise handler: a function that performs its
//! non-local exit (longjmp to the nearest error frame, unwinding to the
//! interpreter loop, ...) and therefore never returns. Until one is
//! installed, faults are turned into a Rust panic.

use core::fmt;

use spin::Mutex;

/// Which host error category a fault is surfaced as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCategory {
    /// Generic runtime failure (the stack called `abort()`).
    Runtime,
    /// The stack gave up after an allocation failure.
    Memory,
    /// A stack assertion fired.
    Assertion,
}

/// An unrecoverable fault reported by the external stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub category: FaultCategory,
    pub message: &'static str,
}

impl Fault {
    pub const fn new(category: FaultCategory, message: &'static str) -> Self {
        Self { category, message }
    }

    /// The fault raised by the stack's plain `abort()`.
    pub const fn abort_called() -> Self {
        Self::new(FaultCategory::Runtime, "abort() called")
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = match self.category {
            FaultCategory::Runtime => "RuntimeError",
            FaultCategory::Memory => "MemoryError",
            FaultCategory::Assertion => "AssertionError",
        };
        write!(f, "{}: {}", category, self.message)
    }
}

/// Host non-local exit. Must not return.
pub type RaiseHandler = fn(&Fault) -> !;

static RAISE_HANDLER: Mutex<Option<RaiseHandler>> = Mutex::new(None);

/// Install the host raise handler, returning the previous one.
pub fn set_raise_handler(handler: RaiseHandler) -> Option<RaiseHandler> {
    RAISE_HANDLER.lock().replace(handler)
}

/// Remove the raise handler (faults fall back to a panic).
pub fn clear_raise_handler() -> Option<RaiseHandler> {
    RAISE_HANDLER.lock().take()
}

/// Escalate `fault` to the host. Never returns.
pub fn fatal(fault: Fault) -> ! {
    log::error!("[ABORT] {}", fault);
    // Copy out first: the handler leaves this frame for good and must not
    // take the lock with it.
    let handler = *RAISE_HANDLER.lock();
    match handler {
        Some(raise) => raise(&fault),
        None => panic!("{}", fault),
    }
}

/// Entry point for the stack's `abort()`.
pub fn abort_called() -> ! {
    fatal(Fault::abort_called())
}

#[cfg(feature = "c-abi")]
#[no_mangle]
pub extern "C" fn abort_() -> ! {
    abort_called()
}
