//! Interrupt-to-poll receive ring.
//!
//! The UART RX interrupt only enqueues bytes; framing and packet delivery
//! happen later from `poll`. One producer (ISR), one consumer (poll loop),
//! lock-free.

use heapless::spsc::{Consumer, Producer, Queue};

use crate::link::{LinkError, SerialLink};

/// Backing storage for an RX ring. Holds `N - 1` bytes.
pub struct RxRing<const N: usize> {
    queue: Queue<u8, N>,
}

impl<const N: usize> RxRing<N> {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
        }
    }

    /// Split into the interrupt half and the poll half.
    pub fn split(&mut self) -> (RxFeeder<'_, N>, RxDrain<'_, N>) {
        let (producer, consumer) = self.queue.split();
        (
            RxFeeder {
                producer,
                overruns: 0,
            },
            RxDrain { consumer },
        )
    }
}

impl<const N: usize> Default for RxRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// ISR side of the ring.
pub struct RxFeeder<'a, const N: usize> {
    producer: Producer<'a, u8, N>,
    overruns: u32,
}

impl<'a, const N: usize> RxFeeder<'a, N> {
    /// Enqueue one received byte. A full ring drops the byte and counts an
    /// overrun.
    #[inline]
    pub fn push(&mut self, byte: u8) -> bool {
        match self.producer.enqueue(byte) {
            Ok(()) => true,
            Err(_) => {
                self.overruns = self.overruns.wrapping_add(1);
                false
            }
        }
    }

    /// Enqueue a burst (e.g. a drained hardware FIFO). Returns bytes kept.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        bytes.iter().filter(|&&b| self.push(b)).count()
    }

    /// Bytes lost to a full ring.
    pub fn overruns(&self) -> u32 {
        self.overruns
    }
}

/// Poll side of the ring.
pub struct RxDrain<'a, const N: usize> {
    consumer: Consumer<'a, u8, N>,
}

impl<'a, const N: usize> RxDrain<'a, N> {
    pub fn read_into(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.consumer.dequeue() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`SerialLink`] reading from an RX ring and writing through another link.
pub struct RingLink<'a, T: SerialLink, const N: usize> {
    rx: RxDrain<'a, N>,
    tx: T,
}

impl<'a, T: SerialLink, const N: usize> RingLink<'a, T, N> {
    pub fn new(rx: RxDrain<'a, N>, tx: T) -> Self {
        Self { rx, tx }
    }

    pub fn into_parts(self) -> (RxDrain<'a, N>, T) {
        (self.rx, self.tx)
    }
}

impl<'a, T: SerialLink, const N: usize> SerialLink for RingLink<'a, T, N> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        match self.rx.read_into(buf) {
            0 => Err(LinkError::WouldBlock),
            n => Ok(n),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, LinkError> {
        self.tx.write(data)
    }

    fn reconfigure(&mut self, baudrate: u32, flow_control: bool) -> Result<(), LinkError> {
        self.tx.reconfigure(baudrate, flow_control)
    }

    fn clear_to_send(&self) -> bool {
        self.tx.clear_to_send()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullTx {
        written: Vec<u8>,
    }

    impl SerialLink for NullTx {
        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, LinkError> {
            Err(LinkError::Unsupported)
        }
        fn write(&mut self, data: &[u8]) -> Result<usize, LinkError> {
            self.written.extend_from_slice(data);
            Ok(data.len())
        }
        fn reconfigure(&mut self, _baudrate: u32, _flow: bool) -> Result<(), LinkError> {
            Ok(())
        }
    }

    #[test]
    fn test_feed_and_drain_in_order() {
        let mut ring: RxRing<16> = RxRing::new();
        let (mut feeder, mut drain) = ring.split();
        assert_eq!(feeder.feed(&[1, 2, 3, 4]), 4);
        let mut buf = [0u8; 3];
        assert_eq!(drain.read_into(&mut buf), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(drain.len(), 1);
        assert_eq!(drain.read_into(&mut buf), 1);
        assert_eq!(buf[0], 4);
        assert!(drain.is_empty());
    }

    #[test]
    fn test_overrun_counted() {
        let mut ring: RxRing<4> = RxRing::new();
        let (mut feeder, _drain) = ring.split();
        // capacity is N - 1
        assert_eq!(feeder.feed(&[9; 5]), 3);
        assert_eq!(feeder.overruns(), 2);
    }

    #[test]
    fn test_ring_link() {
        let mut ring: RxRing<8> = RxRing::new();
        let (mut feeder, drain) = ring.split();
        let mut link = RingLink::new(drain, NullTx { written: Vec::new() });

        let mut buf = [0u8; 8];
        assert_eq!(link.read(&mut buf), Err(LinkError::WouldBlock));

        feeder.feed(&[0x04, 0x13]);
        assert_eq!(link.read(&mut buf), Ok(2));
        assert_eq!(link.write(&[0x01, 0x03, 0x0C, 0x00]), Ok(4));
        assert!(link.clear_to_send());

        let (_rx, tx) = link.into_parts();
        assert_eq!(tx.written, vec![0x01, 0x03, 0x0C, 0x00]);
    }
}
