//! H4 transport driver.
//!
//! Owns the serial link, the RX framer and the TX queue for one HCI
//! session. All I/O happens inside [`H4Transport::poll`], which the host
//! calls once per scheduler tick.
//!
//! # State machine
//!
//! ```text
//!  Unbound ──bind──► Bound ──first powered poll──► Running
//!     ▲                │ ▲                            │
//!     └─────unbind─────┘ └───────────halt─────────────┘
//! ```

use heapless::Deque;

use crate::chipset::ChipsetStrategy;
use crate::config::{TransportConfig, TransportTimeouts};
use crate::error::{HciError, Rejected, Result};
use crate::h4::{H4Framer, HciPacket, PacketKind, PACKET_BUFFER_SIZE};
use crate::link::{LinkError, SerialLink};
use crate::power::PowerState;

/// Queued outgoing bytes (indicator + packet) across all pending packets.
pub const TX_QUEUE_SIZE: usize = 2048;

/// Max bytes pulled from the link per poll.
pub const RX_BUDGET: usize = 1024;

/// Link read granularity.
const RX_CHUNK: usize = 64;

/// Receiver of complete inbound packets (the stack's packet handler).
pub trait PacketHandler {
    fn on_packet(&mut self, packet: HciPacket<'_>);
}

impl<F> PacketHandler for F
where
    F: FnMut(HciPacket<'_>),
{
    fn on_packet(&mut self, packet: HciPacket<'_>) {
        self(packet)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// No session.
    Unbound,
    /// Session stored, no I/O yet.
    Bound,
    /// Pumping bytes.
    Running,
}

/// Work done by one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub rx_bytes: usize,
    pub tx_bytes: usize,
    /// Packets delivered to the handler.
    pub packets: usize,
}

impl PollReport {
    pub fn is_idle(&self) -> bool {
        self.rx_bytes == 0 && self.tx_bytes == 0
    }
}

/// Lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub packets: u64,
    pub resyncs: u64,
    pub oversize: u64,
}

struct TransportSession<H> {
    config: TransportConfig,
    handler: H,
}

/// UART (H4) transport instance.
pub struct H4Transport<L: SerialLink, H: PacketHandler> {
    link: L,
    session: Option<TransportSession<H>>,
    state: TransportState,
    framer: H4Framer,
    tx: Deque<u8, TX_QUEUE_SIZE>,
    timeouts: TransportTimeouts,
    baudrate: u32,
    pending_baudrate: Option<u32>,
    rx_bytes: u64,
    tx_bytes: u64,
}

impl<L: SerialLink, H: PacketHandler> H4Transport<L, H> {
    /// Transport instance for `link`, unbound.
    pub fn instance_for(link: L) -> Self {
        Self {
            link,
            session: None,
            state: TransportState::Unbound,
            framer: H4Framer::new(),
            tx: Deque::new(),
            timeouts: TransportTimeouts::default(),
            baudrate: 0,
            pending_baudrate: None,
            rx_bytes: 0,
            tx_bytes: 0,
        }
    }

    /// Start a session delivering inbound packets to `handler`.
    ///
    /// On error the handler is handed back.
    pub fn bind(
        &mut self,
        config: TransportConfig,
        handler: H,
    ) -> core::result::Result<(), Rejected<H>> {
        if self.session.is_some() {
            return Err(Rejected::new(HciError::AlreadyBound, handler));
        }
        if let Err(e) = config.validate() {
            return Err(Rejected::new(e, handler));
        }

        self.baudrate = config.initial_baudrate;
        self.session = Some(TransportSession { config, handler });
        self.state = TransportState::Bound;
        log::debug!("[H4] bound at {} baud", config.initial_baudrate);
        Ok(())
    }

    /// End the session and hand the packet handler back.
    pub fn unbind(&mut self) -> Result<H> {
        match self.state {
            TransportState::Running => return Err(HciError::TransportRunning),
            TransportState::Unbound => return Err(HciError::NotBound),
            TransportState::Bound => {}
        }
        let session = self.session.take().ok_or(HciError::NotBound)?;

        self.state = TransportState::Unbound;
        self.tx.clear();
        self.framer.reset();
        self.pending_baudrate = None;
        log::debug!("[H4] unbound");
        Ok(session.handler)
    }

    /// Adopt a chipset's timeouts and put the link at its boot rate.
    pub fn apply_chipset(&mut self, chipset: &ChipsetStrategy) -> Result<()> {
        let config = self.session.as_ref().ok_or(HciError::NotBound)?.config;
        let baudrate = chipset.initial_baudrate.unwrap_or(config.initial_baudrate);

        self.timeouts = chipset.timeouts();
        self.link.reconfigure(baudrate, config.flow_control)?;
        self.baudrate = baudrate;
        log::info!(
            "[H4] chipset {}: {} baud, flow control {}",
            chipset.name,
            baudrate,
            if config.flow_control { "on" } else { "off" }
        );
        Ok(())
    }

    /// Queue one outgoing packet. All or nothing.
    ///
    /// `packet` is the HCI header and payload; the indicator is added here.
    pub fn send(&mut self, kind: PacketKind, packet: &[u8]) -> Result<()> {
        if self.session.is_none() {
            return Err(HciError::NotBound);
        }
        if packet.len() > PACKET_BUFFER_SIZE {
            return Err(HciError::PacketTooLarge {
                len: packet.len(),
                max: PACKET_BUFFER_SIZE,
            });
        }
        if TX_QUEUE_SIZE - self.tx.len() < packet.len() + 1 {
            return Err(HciError::QueueFull);
        }

        for &b in core::iter::once(&kind.indicator()).chain(packet) {
            self.tx
                .push_back(b)
                .map_err(|_| HciError::QueueFull)?;
        }
        Ok(())
    }

    /// Switch the link to `baudrate` once every queued byte has been written.
    pub fn schedule_baudrate(&mut self, baudrate: u32) -> Result<()> {
        if self.session.is_none() {
            return Err(HciError::NotBound);
        }
        self.pending_baudrate = Some(baudrate);
        Ok(())
    }

    /// Stop pumping: `Running → Bound`. Queued TX and any partial RX packet
    /// are dropped.
    pub fn halt(&mut self) {
        if self.state == TransportState::Running {
            self.state = TransportState::Bound;
        }
        self.tx.clear();
        self.framer.reset();
        self.pending_baudrate = None;
    }

    /// One scheduler tick of I/O.
    ///
    /// Does nothing unless the controller is powered; unread bytes stay in
    /// the link until then.
    pub fn poll(&mut self, power: PowerState) -> Result<PollReport> {
        let mut report = PollReport::default();

        if !power.is_powered() {
            return Ok(report);
        }
        let session = match self.session.as_mut() {
            Some(s) => s,
            None => return Ok(report),
        };
        if self.state == TransportState::Bound {
            self.state = TransportState::Running;
            log::debug!("[H4] running");
        }

        // Phase 1: RX, link → framer → handler
        let mut chunk = [0u8; RX_CHUNK];
        while report.rx_bytes < RX_BUDGET {
            let want = RX_CHUNK.min(RX_BUDGET - report.rx_bytes);
            let n = match self.link.read(&mut chunk[..want]) {
                Ok(0) | Err(LinkError::WouldBlock) => break,
                Ok(n) => n,
                Err(e) => {
                    log::error!("[H4] read failed: {}", e);
                    self.rx_bytes += report.rx_bytes as u64;
                    return Err(e.into());
                }
            };
            report.rx_bytes += n;
            for &b in &chunk[..n] {
                if let Some(packet) = self.framer.push(b) {
                    session.handler.on_packet(packet);
                    report.packets += 1;
                }
            }
        }
        self.rx_bytes += report.rx_bytes as u64;

        // Phase 2: TX drain, enqueue order
        let flow_control = session.config.flow_control;
        loop {
            if flow_control && !self.link.clear_to_send() {
                break;
            }
            let written = {
                let (front, _) = self.tx.as_slices();
                if front.is_empty() {
                    break;
                }
                match self.link.write(front) {
                    Ok(n) => n,
                    Err(LinkError::WouldBlock) => 0,
                    Err(e) => {
                        log::error!("[H4] write failed: {}", e);
                        self.tx_bytes += report.tx_bytes as u64;
                        return Err(e.into());
                    }
                }
            };
            if written == 0 {
                break;
            }
            for _ in 0..written {
                self.tx.pop_front();
            }
            report.tx_bytes += written;
        }
        self.tx_bytes += report.tx_bytes as u64;

        // Phase 3: deferred rate change, only with an empty queue
        if self.tx.is_empty() {
            if let Some(baudrate) = self.pending_baudrate {
                self.link.reconfigure(baudrate, flow_control)?;
                self.pending_baudrate = None;
                self.baudrate = baudrate;
                log::info!("[H4] switched to {} baud", baudrate);
            }
        }

        Ok(report)
    }

    /// Give the link back. Any session is dropped.
    pub fn into_link(self) -> L {
        self.link
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_bound(&self) -> bool {
        self.session.is_some()
    }

    pub fn config(&self) -> Option<&TransportConfig> {
        self.session.as_ref().map(|s| &s.config)
    }

    pub fn timeouts(&self) -> TransportTimeouts {
        self.timeouts
    }

    /// Current link rate.
    pub fn baudrate(&self) -> u32 {
        self.baudrate
    }

    pub fn pending_baudrate(&self) -> Option<u32> {
        self.pending_baudrate
    }

    /// Bytes queued for TX.
    pub fn tx_pending(&self) -> usize {
        self.tx.len()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn stats(&self) -> TransportStats {
        let framer = self.framer.stats();
        TransportStats {
            rx_bytes: self.rx_bytes,
            tx_bytes: self.tx_bytes,
            packets: framer.packets,
            resyncs: framer.resyncs,
            oversize: framer.oversize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chipset;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct LoopLink {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
        rates: Vec<(u32, bool)>,
        /// Max bytes accepted per write.
        write_limit: Option<usize>,
        cts: bool,
        /// Drained RX reports a dead link instead of `WouldBlock`.
        drop_when_drained: bool,
    }

    impl LoopLink {
        fn new() -> Self {
            Self {
                cts: true,
                ..Default::default()
            }
        }
    }

    impl SerialLink for LoopLink {
        fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, LinkError> {
            if self.rx.is_empty() {
                if self.drop_when_drained {
                    return Err(LinkError::Disconnected);
                }
                return Err(LinkError::WouldBlock);
            }
            let n = buf.len().min(self.rx.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.rx.pop_front().unwrap();
            }
            Ok(n)
        }

        fn write(&mut self, data: &[u8]) -> core::result::Result<usize, LinkError> {
            let n = self.write_limit.map_or(data.len(), |l| l.min(data.len()));
            self.tx.extend_from_slice(&data[..n]);
            Ok(n)
        }

        fn reconfigure(&mut self, baudrate: u32, flow: bool) -> core::result::Result<(), LinkError> {
            self.rates.push((baudrate, flow));
            Ok(())
        }

        fn clear_to_send(&self) -> bool {
            self.cts
        }
    }

    type Events = Vec<(PacketKind, Vec<u8>)>;

    type Nop = fn(HciPacket<'_>);

    fn nop(_packet: HciPacket<'_>) {}

    fn bound() -> H4Transport<LoopLink, Nop> {
        let mut t = H4Transport::instance_for(LoopLink::new());
        t.bind(TransportConfig::default(), nop as Nop).unwrap();
        t
    }

    #[test]
    fn test_bind_twice_rejected() {
        let mut t = bound();
        assert_eq!(t.state(), TransportState::Bound);
        let err = t.bind(TransportConfig::default(), nop as Nop).unwrap_err();
        assert_eq!(err.error, HciError::AlreadyBound);
    }

    #[test]
    fn test_bind_validates_config() {
        let mut t = H4Transport::instance_for(LoopLink::new());
        let err = t.bind(TransportConfig::new(0, true), nop as Nop).unwrap_err();
        assert!(matches!(err.error, HciError::InvalidConfig(_)));
        assert_eq!(t.state(), TransportState::Unbound);
    }

    #[test]
    fn test_unpowered_poll_leaves_bytes_in_link() {
        let mut t = bound();
        t.link_mut().rx.extend([0x04, 0x13, 0x00]);
        let report = t.poll(PowerState::Off).unwrap();
        assert!(report.is_idle());
        assert_eq!(t.link().rx.len(), 3);
        assert_eq!(t.state(), TransportState::Bound);
    }

    #[test]
    fn test_rx_packets_delivered_in_order() {
        let mut events: Events = Vec::new();
        {
            let mut t = H4Transport::instance_for(LoopLink::new());
            t.bind(TransportConfig::default(), |p: HciPacket<'_>| {
                events.push((p.kind, p.data.to_vec()))
            })
            .unwrap();
            t.link_mut()
                .rx
                .extend([0x04, 0x13, 0x01, 0xAA, 0x02, 0x01, 0x00, 0x02, 0x00, 0x05, 0x06]);

            let report = t.poll(PowerState::Starting).unwrap();
            assert_eq!(report.packets, 2);
            assert_eq!(report.rx_bytes, 11);
            assert_eq!(t.state(), TransportState::Running);
        }
        assert_eq!(
            events,
            vec![
                (PacketKind::Event, vec![0x13, 0x01, 0xAA]),
                (PacketKind::Acl, vec![0x01, 0x00, 0x02, 0x00, 0x05, 0x06]),
            ]
        );
    }

    #[test]
    fn test_rx_budget_bounds_one_poll() {
        let mut t = bound();
        t.link_mut().rx.extend(core::iter::repeat(0xFF).take(RX_BUDGET + 10));
        let report = t.poll(PowerState::Active).unwrap();
        assert_eq!(report.rx_bytes, RX_BUDGET);
        assert_eq!(t.link().rx.len(), 10);
        assert_eq!(t.stats().resyncs, RX_BUDGET as u64);
    }

    #[test]
    fn test_send_is_all_or_nothing() {
        let mut t = bound();
        let big = [0u8; PACKET_BUFFER_SIZE];
        t.send(PacketKind::Acl, &big).unwrap();
        // second copy fits only partially
        assert_eq!(t.send(PacketKind::Acl, &big), Err(HciError::QueueFull));
        assert_eq!(t.tx_pending(), PACKET_BUFFER_SIZE + 1);

        let too_big = [0u8; PACKET_BUFFER_SIZE + 1];
        assert_eq!(
            t.send(PacketKind::Acl, &too_big),
            Err(HciError::PacketTooLarge {
                len: PACKET_BUFFER_SIZE + 1,
                max: PACKET_BUFFER_SIZE
            })
        );
    }

    #[test]
    fn test_send_unbound() {
        let mut t: H4Transport<LoopLink, Nop> =
            H4Transport::instance_for(LoopLink::new());
        assert_eq!(
            t.send(PacketKind::Command, &[0x03, 0x0C, 0x00]),
            Err(HciError::NotBound)
        );
    }

    #[test]
    fn test_tx_partial_writes_keep_order() {
        let mut t = bound();
        t.link_mut().write_limit = Some(3);
        t.send(PacketKind::Command, &[0x03, 0x0C, 0x00]).unwrap();
        t.send(PacketKind::Command, &[0x01, 0x10, 0x00]).unwrap();

        let report = t.poll(PowerState::Starting).unwrap();
        assert_eq!(report.tx_bytes, 8);
        assert_eq!(
            t.link().tx,
            vec![0x01, 0x03, 0x0C, 0x00, 0x01, 0x01, 0x10, 0x00]
        );
        assert_eq!(t.tx_pending(), 0);
    }

    #[test]
    fn test_tx_waits_for_cts() {
        let mut t = bound();
        t.link_mut().cts = false;
        t.send(PacketKind::Command, &[0x03, 0x0C, 0x00]).unwrap();
        assert_eq!(t.poll(PowerState::Starting).unwrap().tx_bytes, 0);
        assert_eq!(t.tx_pending(), 4);

        t.link_mut().cts = true;
        assert_eq!(t.poll(PowerState::Starting).unwrap().tx_bytes, 4);
    }

    #[test]
    fn test_cts_ignored_without_flow_control() {
        let mut t = H4Transport::instance_for(LoopLink::new());
        t.bind(TransportConfig::new(115_200, false), nop as Nop)
            .unwrap();
        t.link_mut().cts = false;
        t.send(PacketKind::Command, &[0x03, 0x0C, 0x00]).unwrap();
        assert_eq!(t.poll(PowerState::Active).unwrap().tx_bytes, 4);
    }

    #[test]
    fn test_baudrate_change_waits_for_empty_queue() {
        let mut t = bound();
        t.link_mut().cts = false;
        t.send(PacketKind::Command, &[0x18, 0xFC, 0x00]).unwrap();
        t.schedule_baudrate(3_000_000).unwrap();

        t.poll(PowerState::Active).unwrap();
        assert!(t.link().rates.is_empty());
        assert_eq!(t.pending_baudrate(), Some(3_000_000));

        t.link_mut().cts = true;
        t.poll(PowerState::Active).unwrap();
        assert_eq!(t.link().rates, vec![(3_000_000, true)]);
        assert_eq!(t.baudrate(), 3_000_000);
        assert_eq!(t.pending_baudrate(), None);
    }

    #[test]
    fn test_apply_chipset() {
        let mut t = bound();
        t.apply_chipset(&chipset::CYW43).unwrap();
        assert_eq!(t.link().rates, vec![(115_200, true)]);
        assert_eq!(t.timeouts().reset_resend_ms, 1000);

        t.apply_chipset(&chipset::GENERIC).unwrap();
        assert_eq!(t.baudrate(), 1_000_000);
        assert_eq!(t.timeouts().reset_resend_ms, 200);
    }

    #[test]
    fn test_unbind_rules() {
        let mut t = bound();
        t.poll(PowerState::Starting).unwrap();
        assert!(matches!(t.unbind(), Err(HciError::TransportRunning)));

        t.send(PacketKind::Command, &[0x03, 0x0C, 0x00]).unwrap();
        t.link_mut().cts = false;
        t.poll(PowerState::Active).unwrap();
        t.halt();
        assert_eq!(t.state(), TransportState::Bound);
        assert_eq!(t.tx_pending(), 0);

        assert!(t.unbind().is_ok());
        assert!(matches!(t.unbind(), Err(HciError::NotBound)));
    }

    #[test]
    fn test_read_error_keeps_counters() {
        let mut t = bound();
        t.link_mut().rx.extend([0x04, 0x13, 0x00]);
        t.link_mut().drop_when_drained = true;

        assert_eq!(
            t.poll(PowerState::Active),
            Err(HciError::Link(LinkError::Disconnected))
        );
        let stats = t.stats();
        assert_eq!(stats.rx_bytes, 3);
        assert_eq!(stats.packets, 1);
    }

    #[test]
    fn test_read_error_propagates() {
        struct DeadLink;
        impl SerialLink for DeadLink {
            fn read(&mut self, _buf: &mut [u8]) -> core::result::Result<usize, LinkError> {
                Err(LinkError::Disconnected)
            }
            fn write(&mut self, _data: &[u8]) -> core::result::Result<usize, LinkError> {
                Err(LinkError::Disconnected)
            }
            fn reconfigure(&mut self, _b: u32, _f: bool) -> core::result::Result<(), LinkError> {
                Ok(())
            }
        }

        let mut t = H4Transport::instance_for(DeadLink);
        t.bind(TransportConfig::default(), nop as Nop).unwrap();
        assert_eq!(
            t.poll(PowerState::Active),
            Err(HciError::Link(LinkError::Disconnected))
        );
    }
}
