//! Bounded formatted output
//!
//! The stack formats diagnostic strings into fixed buffers it owns. Whatever
//! the format arguments expand to, nothing is written past the declared
//! capacity: output is cut at `capacity - 1` bytes and the buffer is always
//! NUL-terminated. Truncation is reported, never an overflow.

use core::fmt::{self, Write};

/// Result of one bounded format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOutcome {
    /// Bytes stored, excluding the terminating NUL.
    pub written: usize,
    /// Bytes the full output would have needed, excluding the NUL.
    pub required: usize,
    /// Output did not fit.
    pub truncated: bool,
}

/// `fmt::Write` sink over a fixed buffer that reserves one byte for NUL.
pub struct BoundedWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
    required: usize,
}

impl<'a> BoundedWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            required: 0,
        }
    }

    /// Bytes available for text (capacity minus the NUL slot).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len().saturating_sub(1)
    }

    /// Text written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    /// Terminate the buffer and report what happened.
    pub fn finish(self) -> FormatOutcome {
        if let Some(slot) = self.buf.get_mut(self.pos) {
            *slot = 0;
        }
        FormatOutcome {
            written: self.pos,
            required: self.required,
            truncated: self.required > self.pos,
        }
    }
}

impl Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.required += s.len();
        let room = self.capacity() - self.pos;
        let take = room.min(s.len());
        self.buf[self.pos..self.pos + take].copy_from_slice(&s.as_bytes()[..take]);
        self.pos += take;
        // Keep going so `required` covers the whole output.
        Ok(())
    }
}

/// Format `args` into `buf`, truncating and NUL-terminating as needed.
pub fn format_into(buf: &mut [u8], args: fmt::Arguments<'_>) -> FormatOutcome {
    let mut writer = BoundedWriter::new(buf);
    // The writer never fails; an error can only come from a Display impl.
    let _ = writer.write_fmt(args);
    writer.finish()
}

/// `snprintf`-style helper: `bounded_format!(buf, "x={}", x)`.
#[macro_export]
macro_rules! bounded_format {
    ($buf:expr, $($arg:tt)*) => {
        $crate::format::format_into($buf, format_args!($($arg)*))
    };
}
