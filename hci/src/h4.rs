//! H4 (UART) packet framing.
//!
//! Every packet on the wire is a one-byte packet indicator followed by the
//! HCI header of that packet type and the payload:
//!
//! | Indicator | Kind    | Header | Payload length field       |
//! |-----------|---------|--------|----------------------------|
//! | 0x01      | Command | 3      | u8 at offset 2             |
//! | 0x02      | ACL     | 4      | u16 LE at offset 2         |
//! | 0x03      | SCO     | 3      | u8 at offset 2             |
//! | 0x04      | Event   | 2      | u8 at offset 1             |
//! | 0x05      | ISO     | 4      | 14-bit LE at offset 2      |
//!
//! The framer consumes one byte at a time so it can sit directly behind a
//! serial FIFO. It never blocks and never allocates.

/// Largest ACL payload the controller may send.
pub const HCI_ACL_PAYLOAD_SIZE: usize = 1021;

/// Longest HCI header (ACL and ISO).
pub const MAX_HEADER_LEN: usize = 4;

/// Reassembly buffer: header + largest accepted payload, indicator excluded.
pub const PACKET_BUFFER_SIZE: usize = MAX_HEADER_LEN + HCI_ACL_PAYLOAD_SIZE;

/// H4 packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    Command = 0x01,
    Acl = 0x02,
    Sco = 0x03,
    Event = 0x04,
    Iso = 0x05,
}

impl PacketKind {
    pub fn from_indicator(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Command),
            0x02 => Some(Self::Acl),
            0x03 => Some(Self::Sco),
            0x04 => Some(Self::Event),
            0x05 => Some(Self::Iso),
            _ => None,
        }
    }

    #[inline]
    pub const fn indicator(self) -> u8 {
        self as u8
    }

    pub const fn header_len(self) -> usize {
        match self {
            Self::Command | Self::Sco => 3,
            Self::Acl | Self::Iso => 4,
            Self::Event => 2,
        }
    }

    /// Payload length announced by a complete header.
    ///
    /// `header` must be at least `header_len()` bytes.
    pub fn payload_len(self, header: &[u8]) -> usize {
        match self {
            Self::Command | Self::Sco => header[2] as usize,
            Self::Event => header[1] as usize,
            Self::Acl => u16::from_le_bytes([header[2], header[3]]) as usize,
            Self::Iso => (u16::from_le_bytes([header[2], header[3]]) & 0x3FFF) as usize,
        }
    }
}

/// One complete HCI packet, indicator stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HciPacket<'a> {
    pub kind: PacketKind,
    /// Header followed by payload.
    pub data: &'a [u8],
}

impl<'a> HciPacket<'a> {
    pub fn header(&self) -> &'a [u8] {
        &self.data[..self.kind.header_len()]
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.data[self.kind.header_len()..]
    }
}

/// Framing counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    /// Packets delivered.
    pub packets: u64,
    /// Bytes thrown away while hunting for a packet indicator.
    pub resyncs: u64,
    /// Packets skipped because they did not fit the buffer.
    pub oversize: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Indicator,
    Header(PacketKind),
    Payload { kind: PacketKind, total: usize },
    Discard { remaining: usize },
}

/// Byte-at-a-time H4 reassembler.
pub struct H4Framer {
    phase: Phase,
    buf: [u8; PACKET_BUFFER_SIZE],
    pos: usize,
    stats: FramerStats,
}

impl H4Framer {
    pub const fn new() -> Self {
        Self {
            phase: Phase::Indicator,
            buf: [0; PACKET_BUFFER_SIZE],
            pos: 0,
            stats: FramerStats {
                packets: 0,
                resyncs: 0,
                oversize: 0,
            },
        }
    }

    /// Feed one byte. Returns a packet when `byte` completes one.
    pub fn push(&mut self, byte: u8) -> Option<HciPacket<'_>> {
        match self.phase {
            Phase::Indicator => {
                match PacketKind::from_indicator(byte) {
                    Some(kind) => {
                        self.pos = 0;
                        self.phase = Phase::Header(kind);
                    }
                    None => {
                        self.stats.resyncs += 1;
                        log::trace!("[H4] resync: dropped {:#04x}", byte);
                    }
                }
                None
            }
            Phase::Header(kind) => {
                self.buf[self.pos] = byte;
                self.pos += 1;
                let header_len = kind.header_len();
                if self.pos < header_len {
                    return None;
                }
                let payload = kind.payload_len(&self.buf[..header_len]);
                if header_len + payload > PACKET_BUFFER_SIZE {
                    self.stats.oversize += 1;
                    log::warn!(
                        "[H4] dropping oversize {:?} packet: {} byte payload",
                        kind,
                        payload
                    );
                    self.phase = Phase::Discard { remaining: payload };
                    return None;
                }
                if payload == 0 {
                    return Some(self.complete(kind));
                }
                self.phase = Phase::Payload {
                    kind,
                    total: header_len + payload,
                };
                None
            }
            Phase::Payload { kind, total } => {
                self.buf[self.pos] = byte;
                self.pos += 1;
                if self.pos == total {
                    Some(self.complete(kind))
                } else {
                    None
                }
            }
            Phase::Discard { remaining } => {
                self.phase = if remaining > 1 {
                    Phase::Discard {
                        remaining: remaining - 1,
                    }
                } else {
                    Phase::Indicator
                };
                None
            }
        }
    }

    fn complete(&mut self, kind: PacketKind) -> HciPacket<'_> {
        self.phase = Phase::Indicator;
        self.stats.packets += 1;
        HciPacket {
            kind,
            data: &self.buf[..self.pos],
        }
    }

    /// Drop any partial packet. Counters are kept.
    pub fn reset(&mut self) {
        self.phase = Phase::Indicator;
        self.pos = 0;
    }

    /// Between packets (no partial packet buffered).
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Indicator
    }

    pub fn stats(&self) -> FramerStats {
        self.stats
    }
}

impl Default for H4Framer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(framer: &mut H4Framer, bytes: &[u8]) -> Vec<(PacketKind, Vec<u8>)> {
        let mut out = Vec::new();
        for &b in bytes {
            if let Some(pkt) = framer.push(b) {
                out.push((pkt.kind, pkt.data.to_vec()));
            }
        }
        out
    }

    #[test]
    fn test_command_complete_event() {
        // HCI_Reset Command Complete: 04 0E 04 01 03 0C 00
        let mut framer = H4Framer::new();
        let pkts = feed(&mut framer, &[0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00]);
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].0, PacketKind::Event);
        assert_eq!(pkts[0].1, vec![0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00]);
        assert!(framer.is_idle());
    }

    #[test]
    fn test_acl_length_little_endian() {
        let mut bytes = vec![0x02, 0x01, 0x20, 0x00, 0x01];
        bytes.extend(core::iter::repeat(0xAB).take(256));
        let mut framer = H4Framer::new();
        let pkts = feed(&mut framer, &bytes);
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].0, PacketKind::Acl);
        assert_eq!(pkts[0].1.len(), 4 + 256);
    }

    #[test]
    fn test_header_and_payload_views() {
        let mut framer = H4Framer::new();
        let mut seen = false;
        for &b in &[0x01u8, 0x03, 0x0C, 0x02, 0xAA, 0xBB] {
            if let Some(pkt) = framer.push(b) {
                assert_eq!(pkt.header(), &[0x03, 0x0C, 0x02]);
                assert_eq!(pkt.payload(), &[0xAA, 0xBB]);
                seen = true;
            }
        }
        assert!(seen);
    }

    #[test]
    fn test_zero_length_payload_completes_on_header() {
        let mut framer = H4Framer::new();
        let pkts = feed(&mut framer, &[0x01, 0x03, 0x0C, 0x00]);
        assert_eq!(pkts, vec![(PacketKind::Command, vec![0x03, 0x0C, 0x00])]);
    }

    #[test]
    fn test_iso_length_is_14_bits() {
        // top two bits of the length word carry flags
        let mut bytes = vec![0x05, 0x00, 0x00, 0x03, 0xC0];
        bytes.extend([1, 2, 3]);
        let mut framer = H4Framer::new();
        let pkts = feed(&mut framer, &bytes);
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].1, vec![0x00, 0x00, 0x03, 0xC0, 1, 2, 3]);
    }

    #[test]
    fn test_garbage_before_packet_is_skipped() {
        let mut framer = H4Framer::new();
        let pkts = feed(&mut framer, &[0x00, 0xFF, 0x7E, 0x04, 0x13, 0x00]);
        assert_eq!(pkts, vec![(PacketKind::Event, vec![0x13, 0x00])]);
        assert_eq!(framer.stats().resyncs, 3);
    }

    #[test]
    fn test_oversize_packet_skipped_then_recovers() {
        let len = (HCI_ACL_PAYLOAD_SIZE + 1) as u16;
        let mut bytes = vec![0x02, 0x00, 0x00];
        bytes.extend(len.to_le_bytes());
        bytes.extend(core::iter::repeat(0x55).take(len as usize));
        bytes.extend([0x04, 0x13, 0x01, 0x09]);

        let mut framer = H4Framer::new();
        let pkts = feed(&mut framer, &bytes);
        assert_eq!(pkts, vec![(PacketKind::Event, vec![0x13, 0x01, 0x09])]);
        assert_eq!(framer.stats().oversize, 1);
        assert_eq!(framer.stats().packets, 1);
    }

    #[test]
    fn test_max_acl_payload_fits() {
        let len = HCI_ACL_PAYLOAD_SIZE as u16;
        let mut bytes = vec![0x02, 0x00, 0x00];
        bytes.extend(len.to_le_bytes());
        bytes.extend(core::iter::repeat(0x11).take(len as usize));
        let mut framer = H4Framer::new();
        let pkts = feed(&mut framer, &bytes);
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].1.len(), PACKET_BUFFER_SIZE);
    }

    #[test]
    fn test_reset_drops_partial_packet() {
        let mut framer = H4Framer::new();
        assert!(feed(&mut framer, &[0x04, 0x0E, 0x04, 0x01]).is_empty());
        assert!(!framer.is_idle());
        framer.reset();
        let pkts = feed(&mut framer, &[0x04, 0x13, 0x00]);
        assert_eq!(pkts, vec![(PacketKind::Event, vec![0x13, 0x00])]);
    }
}
