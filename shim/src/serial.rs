//! Serial log sink
//!
//! Routes `log` records to whatever byte-out primitive the host has for its
//! debug console (a UART, a semihosting call, the REPL's stdout). No
//! buffering beyond one line, no allocation.
//!
//! ```ignore
//! fn puts(s: &str) { /* write to debug UART */ }
//! bluebridge_shim::init_serial_logger(puts, log::LevelFilter::Info)?;
//! log::info!("[POWER] OFF -> STARTING");
//! ```

use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

use crate::format::BoundedWriter;

/// Host console output.
pub type PutStr = fn(&str);

/// Longest line emitted; longer records are cut.
pub const LINE_CAPACITY: usize = 192;

/// `log::Log` implementation writing one line per record.
pub struct SerialLogger {
    puts: Mutex<Option<PutStr>>,
    level: Mutex<LevelFilter>,
}

impl SerialLogger {
    pub const fn new() -> Self {
        Self {
            puts: Mutex::new(None),
            level: Mutex::new(LevelFilter::Info),
        }
    }

    /// Point the logger at a console.
    pub fn attach(&self, puts: PutStr) {
        *self.puts.lock() = Some(puts);
    }

    pub fn set_level(&self, level: LevelFilter) {
        *self.level.lock() = level;
    }

    pub fn detach(&self) {
        *self.puts.lock() = None;
    }
}

impl Default for SerialLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= *self.level.lock()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(puts) = *self.puts.lock() else {
            return;
        };

        let mut line = [0u8; LINE_CAPACITY];
        let mut writer = BoundedWriter::new(&mut line);
        let _ = write!(writer, "{:<5} {}", record.level(), record.args());
        let len = writer.finish().written;

        // Cut on a char boundary so the console never sees half a code point.
        let text = match core::str::from_utf8(&line[..len]) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&line[..e.valid_up_to()]).unwrap_or(""),
        };
        puts(text);
        puts("\n");
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger::new();

/// Install the serial logger as the global `log` backend.
pub fn init_serial_logger(puts: PutStr, level: LevelFilter) -> Result<(), SetLoggerError> {
    LOGGER.attach(puts);
    LOGGER.set_level(level);
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use std::sync::Mutex as StdMutex;

    fn emit(logger: &SerialLogger, level: Level, args: core::fmt::Arguments<'_>) {
        logger.log(&Record::builder().level(level).args(args).build());
    }

    #[test]
    fn test_logger_writes_lines_and_filters_level() {
        static CAPTURED: StdMutex<String> = StdMutex::new(String::new());
        fn capture(s: &str) {
            CAPTURED.lock().unwrap().push_str(s);
        }

        let logger = SerialLogger::new();
        logger.attach(capture);
        logger.set_level(LevelFilter::Info);

        emit(&logger, Level::Info, format_args!("[POWER] OFF -> STARTING"));
        emit(&logger, Level::Debug, format_args!("hidden"));
        emit(&logger, Level::Warn, format_args!("[H4] resync"));

        let out = CAPTURED.lock().unwrap().clone();
        assert_eq!(out, "INFO  [POWER] OFF -> STARTING\nWARN  [H4] resync\n");
    }

    #[test]
    fn test_detached_logger_is_silent() {
        static CAPTURED: StdMutex<String> = StdMutex::new(String::new());
        fn capture(s: &str) {
            CAPTURED.lock().unwrap().push_str(s);
        }

        let logger = SerialLogger::new();
        logger.attach(capture);
        logger.detach();
        emit(&logger, Level::Error, format_args!("dropped"));
        assert!(CAPTURED.lock().unwrap().is_empty());
    }

    #[test]
    fn test_long_record_is_cut_to_line_capacity() {
        static CAPTURED: StdMutex<String> = StdMutex::new(String::new());
        fn capture(s: &str) {
            CAPTURED.lock().unwrap().push_str(s);
        }

        let logger = SerialLogger::new();
        logger.attach(capture);

        let long = "x".repeat(LINE_CAPACITY * 2);
        emit(&logger, Level::Error, format_args!("{}", long));

        let out = CAPTURED.lock().unwrap().clone();
        // One line of text (capacity minus the NUL slot) plus the newline.
        assert_eq!(out.len(), LINE_CAPACITY);
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_init_installs_global_logger() {
        fn discard(_: &str) {}
        assert!(init_serial_logger(discard, LevelFilter::Warn).is_ok());
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }
}
