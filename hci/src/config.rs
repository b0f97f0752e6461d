//! Transport configuration.

use crate::error::{HciError, Result};

/// Link settings for one HCI UART transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Baud rate the controller boots at.
    pub initial_baudrate: u32,
    /// Baud rate for normal operation (0 = stay at the initial rate).
    pub main_baudrate: u32,
    /// RTS/CTS hardware flow control.
    pub flow_control: bool,
    /// Host device identifier (e.g. "/dev/ttyACM0"), if the link has one.
    pub device_name: Option<&'static str>,
}

impl TransportConfig {
    /// Fixed-rate link without a named device.
    pub const fn new(initial_baudrate: u32, flow_control: bool) -> Self {
        Self {
            initial_baudrate,
            main_baudrate: 0,
            flow_control,
            device_name: None,
        }
    }

    pub const fn with_main_baudrate(mut self, baudrate: u32) -> Self {
        self.main_baudrate = baudrate;
        self
    }

    pub const fn with_device(mut self, name: &'static str) -> Self {
        self.device_name = Some(name);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_baudrate == 0 {
            return Err(HciError::InvalidConfig("initial baud rate is zero"));
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    /// 1 Mbaud, keep rate, flow control on.
    fn default() -> Self {
        Self::new(1_000_000, true)
    }
}

/// Retry/timeout parameters the external stack reads from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimeouts {
    /// Resend HCI_Reset if the controller has not answered after this long.
    pub reset_resend_ms: u32,
    /// Give up on a command without Command Complete/Status after this long.
    pub command_ms: u32,
}

impl TransportTimeouts {
    pub const fn new(reset_resend_ms: u32, command_ms: u32) -> Self {
        Self {
            reset_resend_ms,
            command_ms,
        }
    }
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self::new(200, 2000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_h4_port() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.initial_baudrate, 1_000_000);
        assert_eq!(cfg.main_baudrate, 0);
        assert!(cfg.flow_control);
        assert_eq!(cfg.device_name, None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_baudrate_rejected() {
        let cfg = TransportConfig::new(0, false);
        assert_eq!(
            cfg.validate(),
            Err(HciError::InvalidConfig("initial baud rate is zero"))
        );
    }

    #[test]
    fn test_builders() {
        let cfg = TransportConfig::new(115_200, true)
            .with_main_baudrate(3_000_000)
            .with_device("/dev/ttyUSB0");
        assert_eq!(cfg.main_baudrate, 3_000_000);
        assert_eq!(cfg.device_name, Some("/dev/ttyUSB0"));
    }
}
