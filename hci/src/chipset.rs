//! Controller chipset quirks.
//!
//! The external stack talks plain HCI; what differs between controllers
//! is the boot baud rate, whether they can be switched to a faster rate
//! and how patient the stack must be with HCI_Reset.

use crate::config::TransportTimeouts;

/// Per-chipset transport parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipsetStrategy {
    pub name: &'static str,
    /// Resend HCI_Reset after this long without an answer.
    pub reset_resend_timeout_ms: u32,
    pub command_timeout_ms: u32,
    /// Rate the controller boots at; `None` keeps the configured rate.
    pub initial_baudrate: Option<u32>,
    /// Rate to switch to once the controller is up; `None` stays put.
    pub main_baudrate: Option<u32>,
    /// Vendor command that changes the controller's UART rate.
    pub baudrate_opcode: Option<u16>,
}

/// Zephyr `hci_uart` controller firmware.
pub const ZEPHYR: ChipsetStrategy = ChipsetStrategy {
    name: "zephyr",
    reset_resend_timeout_ms: 1000,
    command_timeout_ms: 2000,
    initial_baudrate: Some(1_000_000),
    main_baudrate: None,
    baudrate_opcode: None,
};

/// Infineon/Cypress CYW43xxx (Broadcom vendor commands).
pub const CYW43: ChipsetStrategy = ChipsetStrategy {
    name: "cyw43",
    reset_resend_timeout_ms: 1000,
    command_timeout_ms: 2000,
    initial_baudrate: Some(115_200),
    main_baudrate: Some(3_000_000),
    // OGF 0x3F, OCF 0x18: Update UART Baud Rate
    baudrate_opcode: Some(0xFC18),
};

/// Any standards-compliant controller.
pub const GENERIC: ChipsetStrategy = ChipsetStrategy {
    name: "generic",
    reset_resend_timeout_ms: 200,
    command_timeout_ms: 2000,
    initial_baudrate: None,
    main_baudrate: None,
    baudrate_opcode: None,
};

const CATALOGUE: [&ChipsetStrategy; 3] = [&ZEPHYR, &CYW43, &GENERIC];

/// Look a chipset up by name (case-insensitive).
pub fn by_name(name: &str) -> Option<&'static ChipsetStrategy> {
    CATALOGUE
        .iter()
        .copied()
        .find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Length of the encoded vendor baud-rate command (header + 6 parameters).
pub const BAUDRATE_COMMAND_LEN: usize = 3 + 6;

impl ChipsetStrategy {
    pub fn timeouts(&self) -> TransportTimeouts {
        TransportTimeouts::new(self.reset_resend_timeout_ms, self.command_timeout_ms)
    }

    /// Can switch rate at run time.
    pub fn negotiates_baudrate(&self) -> bool {
        self.main_baudrate.is_some() && self.baudrate_opcode.is_some()
    }

    /// Encode the vendor baud-rate command (HCI command packet, indicator
    /// excluded) into `out`. Returns the encoded length.
    ///
    /// Parameters: two reserved zero bytes, then the rate as LE32.
    pub fn baudrate_command(&self, baudrate: u32, out: &mut [u8]) -> Option<usize> {
        let opcode = self.baudrate_opcode?;
        if out.len() < BAUDRATE_COMMAND_LEN {
            return None;
        }
        let op = opcode.to_le_bytes();
        out[0] = op[0];
        out[1] = op[1];
        out[2] = 6;
        out[3] = 0;
        out[4] = 0;
        out[5..9].copy_from_slice(&baudrate.to_le_bytes());
        Some(BAUDRATE_COMMAND_LEN)
    }
}
