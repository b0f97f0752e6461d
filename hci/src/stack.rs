//! Interface to the external HCI core (the Bluetooth host stack).

use core::fmt;

use crate::chipset::ChipsetStrategy;
use crate::config::TransportConfig;

/// Controller power request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCommand {
    On,
    Off,
}

/// Failure reported by the HCI core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// Request not valid in the core's current state.
    Rejected,
    /// Core has no transport.
    NotBound,
    /// Controller returned an HCI status code.
    Controller(u8),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => write!(f, "request rejected"),
            Self::NotBound => write!(f, "no transport bound"),
            Self::Controller(status) => write!(f, "controller status {:#04x}", status),
        }
    }
}

/// Calls the power controller makes into the stack.
///
/// Packet delivery in the other direction goes through
/// [`PacketHandler`](crate::transport::PacketHandler).
pub trait HciCore {
    /// Attach the core to a transport with the given link settings.
    fn bind_transport(&mut self, config: &TransportConfig) -> Result<(), CoreError>;

    fn select_chipset(&mut self, chipset: &'static ChipsetStrategy);

    /// Start or stop the controller bring-up sequence.
    fn power_control(&mut self, cmd: PowerCommand) -> Result<(), CoreError>;

    /// Release the transport. `bind_transport` must be called again before
    /// the next power-on.
    fn close(&mut self);
}
