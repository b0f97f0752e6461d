//! HCI transport and power sequencing for a hosted BLE stack
//!
//! Drives an external Bluetooth stack's UART (H4) transport from a
//! single-threaded, poll-driven host. Nothing here blocks: the host's
//! scheduler calls [`PowerController::poll`] on every tick and each call
//! does a bounded amount of work before returning.
//!
//! # Architecture
//!
//! ```text
//!   host scheduler tick
//!          │
//!          ▼
//! ┌──────────────────────┐   power_control / close   ┌──────────────────┐
//! │  PowerController     │ ────────────────────────► │ HciCore          │
//! │  OFF→STARTING→ACTIVE │ ◄──────────────────────── │ (external stack) │
//! └─────────┬────────────┘   on_controller_ready     └────────▲─────────┘
//!           │ poll(state)                                     │ on_packet
//!           ▼                                                 │
//! ┌──────────────────────┐    bytes    ┌──────────────┐       │
//! │  H4Transport         │ ──────────► │  H4Framer    │ ──────┘
//! │  session + TX queue  │             └──────────────┘
//! └─────────┬────────────┘
//!           │ read / write / reconfigure
//!           ▼
//! ┌──────────────────────┐   ISR   ┌──────────────┐
//! │  SerialLink          │ ◄────── │  RxRing      │ ◄── UART RX interrupt
//! └──────────────────────┘         └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use bluebridge_hci::{chipset, PowerController, TransportConfig};
//!
//! let mut ble = PowerController::new(stack, &chipset::ZEPHYR, TransportConfig::default());
//! ble.init(uart, stack_packet_handler)?;
//! ble.start()?;
//!
//! // every scheduler tick:
//! ble.poll()?;
//!
//! // from the stack's "controller ready" callback:
//! ble.on_controller_ready();
//! ```

#![cfg_attr(not(test), no_std)]

pub mod chipset;
pub mod config;
pub mod error;
pub mod h4;
pub mod link;
pub mod power;
pub mod ring;
pub mod stack;
pub mod transport;

pub use chipset::ChipsetStrategy;
pub use config::{TransportConfig, TransportTimeouts};
pub use error::{HciError, Rejected, Result};
pub use h4::{H4Framer, HciPacket, PacketKind};
pub use link::{LinkError, SerialLink};
pub use power::{PowerController, PowerState};
pub use ring::{RingLink, RxDrain, RxFeeder, RxRing};
pub use stack::{CoreError, HciCore, PowerCommand};
pub use transport::{H4Transport, PacketHandler, PollReport, TransportState, TransportStats};
