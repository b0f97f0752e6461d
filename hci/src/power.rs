//! Controller power and life cycle.
//!
//! ```text
//!        start            on_controller_ready
//!  OFF ─────────► STARTING ───────────────────► ACTIVE
//!   ▲                │                             │
//!   └─────stop───────┴────────────stop─────────────┘
//! ```
//!
//! `init`/`deinit` bracket the whole thing: they create and destroy the
//! transport session and bind the external core to it. Power state only
//! changes inside that bracket.

use core::fmt;

use bluebridge_shim::{fatal, Fault};

use crate::chipset::{ChipsetStrategy, BAUDRATE_COMMAND_LEN};
use crate::config::TransportConfig;
use crate::error::{HciError, Rejected, Result};
use crate::h4::PacketKind;
use crate::link::SerialLink;
use crate::stack::{HciCore, PowerCommand};
use crate::transport::{H4Transport, PacketHandler, PollReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Off,
    /// Power-on issued, controller not ready yet.
    Starting,
    Active,
}

impl PowerState {
    /// Transport may move bytes.
    pub fn is_powered(self) -> bool {
        matches!(self, Self::Starting | Self::Active)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "OFF"),
            Self::Starting => write!(f, "STARTING"),
            Self::Active => write!(f, "ACTIVE"),
        }
    }
}

/// Sequences the external core and the H4 transport through power-up and
/// power-down.
pub struct PowerController<C, L, H>
where
    C: HciCore,
    L: SerialLink,
    H: PacketHandler,
{
    core: C,
    chipset: &'static ChipsetStrategy,
    config: TransportConfig,
    transport: Option<H4Transport<L, H>>,
    state: PowerState,
    core_bound: bool,
}

impl<C, L, H> PowerController<C, L, H>
where
    C: HciCore,
    L: SerialLink,
    H: PacketHandler,
{
    pub fn new(core: C, chipset: &'static ChipsetStrategy, config: TransportConfig) -> Self {
        Self {
            core,
            chipset,
            config,
            transport: None,
            state: PowerState::Off,
            core_bound: false,
        }
    }

    /// Create the transport for `link`, bind it and attach the core.
    ///
    /// Does not power the controller on. On error nothing stays bound and
    /// the link and handler are handed back.
    pub fn init(&mut self, link: L, handler: H) -> core::result::Result<(), Rejected<(L, H)>> {
        if self.transport.is_some() {
            return Err(Rejected::new(HciError::AlreadyInitialized, (link, handler)));
        }
        if let Err(e) = self.config.validate() {
            return Err(Rejected::new(e, (link, handler)));
        }
        if self.config.main_baudrate != 0 && !self.chipset.negotiates_baudrate() {
            log::warn!(
                "[POWER] {} cannot change baud rate, staying at initial rate",
                self.chipset.name
            );
        }

        if let Err(e) = self.core.bind_transport(&self.config) {
            log::error!("[POWER] core rejected transport: {}", e);
            return Err(Rejected::new(e.into(), (link, handler)));
        }
        let mut transport = H4Transport::instance_for(link);
        if let Err(rejected) = transport.bind(self.config, handler) {
            self.core.close();
            let (e, handler) = rejected.into_parts();
            return Err(Rejected::new(e, (transport.into_link(), handler)));
        }
        self.core_bound = true;
        self.core.select_chipset(self.chipset);

        self.transport = Some(transport);
        self.state = PowerState::Off;
        log::info!("[POWER] initialized, chipset {}", self.chipset.name);
        Ok(())
    }

    /// Power the controller on: `OFF → STARTING`.
    pub fn start(&mut self) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(HciError::NotInitialized)?;
        if self.state != PowerState::Off {
            return Err(HciError::InvalidPowerState {
                op: "start",
                state: self.state,
            });
        }

        // a previous stop closed the core
        if !self.core_bound {
            self.core.bind_transport(&self.config)?;
            self.core_bound = true;
            self.core.select_chipset(self.chipset);
        }
        transport.apply_chipset(self.chipset)?;

        if let Err(e) = self.core.power_control(PowerCommand::On) {
            log::error!("[POWER] power-on rejected: {}", e);
            return Err(e.into());
        }
        self.transition(PowerState::Starting);
        Ok(())
    }

    /// Controller finished HCI bring-up: `STARTING → ACTIVE`.
    ///
    /// Kicks off the switch to the chipset's operating baud rate if it has
    /// one. Ignored in any other state.
    pub fn on_controller_ready(&mut self) {
        if self.state != PowerState::Starting {
            log::warn!("[POWER] controller ready while {}, ignored", self.state);
            return;
        }
        self.transition(PowerState::Active);

        let Some(baudrate) = self.main_baudrate() else {
            return;
        };
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if baudrate == transport.baudrate() {
            return;
        }

        let mut cmd = [0u8; BAUDRATE_COMMAND_LEN];
        if let Some(n) = self.chipset.baudrate_command(baudrate, &mut cmd) {
            if let Err(e) = transport.send(PacketKind::Command, &cmd[..n]) {
                log::warn!("[POWER] baud rate command not sent: {}", e);
                return;
            }
        }
        if let Err(e) = transport.schedule_baudrate(baudrate) {
            log::warn!("[POWER] baud rate change not scheduled: {}", e);
            return;
        }
        log::info!("[POWER] switching to {} baud", baudrate);
    }

    /// Power the controller off from `STARTING` or `ACTIVE`.
    ///
    /// The core is always told to power off and close, even if one of those
    /// steps fails.
    pub fn stop(&mut self) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(HciError::NotInitialized)?;
        if self.state == PowerState::Off {
            return Err(HciError::InvalidPowerState {
                op: "stop",
                state: self.state,
            });
        }

        if let Err(e) = self.core.power_control(PowerCommand::Off) {
            log::warn!("[POWER] power-off failed: {}", e);
        }
        self.core.close();
        self.core_bound = false;
        transport.halt();

        self.transition(PowerState::Off);
        Ok(())
    }

    /// Tear the session down and return the link and packet handler.
    ///
    /// Only from `OFF`.
    pub fn deinit(&mut self) -> Result<(L, H)> {
        if self.transport.is_none() {
            return Err(HciError::NotInitialized);
        }
        if self.state != PowerState::Off {
            return Err(HciError::InvalidPowerState {
                op: "deinit",
                state: self.state,
            });
        }

        let mut transport = self.transport.take().ok_or(HciError::NotInitialized)?;
        let handler = match transport.unbind() {
            Ok(h) => h,
            Err(e) => {
                self.transport = Some(transport);
                return Err(e);
            }
        };
        if self.core_bound {
            self.core.close();
            self.core_bound = false;
        }
        log::info!("[POWER] deinitialized");
        Ok((transport.into_link(), handler))
    }

    /// Host tick. Moves bytes only while the controller is powered.
    pub fn poll(&mut self) -> Result<PollReport> {
        match self.transport.as_mut() {
            Some(transport) => transport.poll(self.state),
            None => Ok(PollReport::default()),
        }
    }

    /// Queue an outgoing packet from the stack.
    pub fn send(&mut self, kind: PacketKind, packet: &[u8]) -> Result<()> {
        self.transport
            .as_mut()
            .ok_or(HciError::NotInitialized)?
            .send(kind, packet)
    }

    /// The stack hit a fault it cannot recover from.
    ///
    /// Powers down what is still up, then raises into the host. The host
    /// must `deinit` and `init` again before the next `start`.
    pub fn fail(&mut self, fault: Fault) -> ! {
        if self.state.is_powered() {
            if let Err(e) = self.core.power_control(PowerCommand::Off) {
                log::warn!("[POWER] power-off failed: {}", e);
            }
            self.core.close();
            self.core_bound = false;
            if let Some(transport) = self.transport.as_mut() {
                transport.halt();
            }
            self.transition(PowerState::Off);
        }
        fatal(fault)
    }

    fn main_baudrate(&self) -> Option<u32> {
        if !self.chipset.negotiates_baudrate() {
            return None;
        }
        match self.config.main_baudrate {
            0 => self.chipset.main_baudrate,
            rate => Some(rate),
        }
    }

    fn transition(&mut self, next: PowerState) {
        log::info!("[POWER] {} -> {}", self.state, next);
        self.state = next;
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.transport.is_some()
    }

    pub fn chipset(&self) -> &'static ChipsetStrategy {
        self.chipset
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }

    pub fn transport(&self) -> Option<&H4Transport<L, H>> {
        self.transport.as_ref()
    }

    pub fn transport_mut(&mut self) -> Option<&mut H4Transport<L, H>> {
        self.transport.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_powered_states() {
        assert!(!PowerState::Off.is_powered());
        assert!(PowerState::Starting.is_powered());
        assert!(PowerState::Active.is_powered());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(PowerState::Starting.to_string(), "STARTING");
        let err = HciError::InvalidPowerState {
            op: "start",
            state: PowerState::Active,
        };
        assert_eq!(err.to_string(), "cannot start while controller is ACTIVE");
    }
}
