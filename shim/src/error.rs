//! Arena setup errors

use core::fmt;

pub type Result<T> = core::result::Result<T, HeapError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// `init` called on an arena that already owns a region.
    AlreadyInitialized,
    /// Operation needs an initialized arena.
    NotInitialized,
    /// Region pointer is null or misaligned.
    InvalidRegion,
    /// Region is smaller than the arena minimum.
    RegionTooSmall {
        /// Size that was offered.
        size: usize,
        /// Minimum accepted size.
        min: usize,
    },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInitialized => write!(f, "arena already initialized"),
            Self::NotInitialized => write!(f, "arena not initialized"),
            Self::InvalidRegion => write!(f, "invalid arena region"),
            Self::RegionTooSmall { size, min } => {
                write!(f, "arena region too small: {} bytes (minimum {})", size, min)
            }
        }
    }
}
