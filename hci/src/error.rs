//! HCI bridge error types

use core::fmt;

use crate::link::LinkError;
use crate::power::PowerState;
use crate::stack::CoreError;

pub type Result<T> = core::result::Result<T, HciError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HciError {
    /// A transport session already exists.
    AlreadyBound,
    /// No transport session.
    NotBound,
    /// Transport is pumping bytes; power off first.
    TransportRunning,
    /// `init` called twice.
    AlreadyInitialized,
    /// Operation outside the `init`..`deinit` bracket.
    NotInitialized,
    /// Life-cycle operation not allowed in the current power state.
    InvalidPowerState {
        /// Rejected operation.
        op: &'static str,
        /// State at the time of the call.
        state: PowerState,
    },
    /// Link configuration rejected.
    InvalidConfig(&'static str),
    /// TX queue cannot take the whole packet right now.
    QueueFull,
    /// Packet larger than the transport buffers.
    PacketTooLarge {
        /// Payload length offered.
        len: usize,
        /// Largest payload accepted.
        max: usize,
    },
    /// Serial link failure.
    Link(LinkError),
    /// External stack refused a request.
    Core(CoreError),
}

impl fmt::Display for HciError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyBound => write!(f, "HCI transport already bound"),
            Self::NotBound => write!(f, "HCI transport not bound"),
            Self::TransportRunning => write!(f, "HCI transport running; power off first"),
            Self::AlreadyInitialized => write!(f, "Bluetooth already initialized"),
            Self::NotInitialized => write!(f, "Bluetooth not initialized"),
            Self::InvalidPowerState { op, state } => {
                write!(f, "cannot {} while controller is {}", op, state)
            }
            Self::InvalidConfig(msg) => write!(f, "invalid transport config: {}", msg),
            Self::QueueFull => write!(f, "HCI TX queue full"),
            Self::PacketTooLarge { len, max } => {
                write!(f, "HCI packet too large: {} bytes (max {})", len, max)
            }
            Self::Link(e) => write!(f, "serial link error: {}", e),
            Self::Core(e) => write!(f, "HCI core error: {}", e),
        }
    }
}

impl From<LinkError> for HciError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<CoreError> for HciError {
    fn from(e: CoreError) -> Self {
        Self::Core(e)
    }
}

/// A call that took ownership of its arguments failed; the arguments come
/// back with the error so the caller can retry.
pub struct Rejected<T> {
    pub error: HciError,
    pub parts: T,
}

impl<T> Rejected<T> {
    pub fn new(error: HciError, parts: T) -> Self {
        Self { error, parts }
    }

    pub fn into_parts(self) -> (HciError, T) {
        (self.error, self.parts)
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T> From<Rejected<T>> for HciError {
    fn from(r: Rejected<T>) -> Self {
        r.error
    }
}
