//! Serial link interface.
//!
//! The UART driver itself is outside this crate; the transport only needs
//! non-blocking byte I/O and a way to change line settings.

use core::fmt;

/// Serial link errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Nothing can be transferred right now. Not a failure; retry next poll.
    WouldBlock,
    /// Link went away (cable pulled, device closed).
    Disconnected,
    /// Requested line settings not supported.
    Unsupported,
    /// Driver-specific hardware error.
    Hardware(u32),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WouldBlock => write!(f, "would block"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Unsupported => write!(f, "unsupported line settings"),
            Self::Hardware(code) => write!(f, "hardware error {:#x}", code),
        }
    }
}

/// Byte-stream link to the controller.
///
/// # Contract
/// - `read` and `write` MUST return immediately (no waiting for I/O)
/// - Bytes not yet read stay buffered in the link
pub trait SerialLink {
    /// Copy available bytes into `buf`.
    ///
    /// - `Ok(0)` or `Err(LinkError::WouldBlock)`: nothing available
    /// - `Ok(n)`: `n` bytes copied
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;

    /// Queue bytes for transmission; may accept only a prefix.
    fn write(&mut self, data: &[u8]) -> Result<usize, LinkError>;

    /// Change baud rate and flow control.
    fn reconfigure(&mut self, baudrate: u32, flow_control: bool) -> Result<(), LinkError>;

    /// Receiver is ready for more data (CTS asserted).
    fn clear_to_send(&self) -> bool {
        true
    }
}
