//! Runtime shims for a hosted BLE stack
//!
//! The external Bluetooth stack was written for a conventional C runtime: it
//! calls `malloc`/`free`/`realloc`, formats into fixed buffers and calls
//! `abort()` when it finds itself in an inconsistent state. None of that is
//! acceptable inside a collected, long-running host, so every one of those
//! entry points is redirected here.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   External BLE stack                         │
//! └───────┬─────────────────────┬─────────────────────┬──────────┘
//!         │ malloc/free/realloc │ snprintf            │ abort()
//!         ▼                     ▼                     ▼
//! ┌───────────────┐     ┌───────────────┐     ┌───────────────┐
//! │ bridge        │     │ format        │     │ abort         │
//! │ (global lock) │     │ BoundedWriter │     │ raise handler │
//! └───────┬───────┘     └───────────────┘     └───────┬───────┘
//!         ▼                                           ▼
//! ┌───────────────┐                           host error channel
//! │ StackHeap     │──── RootSet ────► host collector (root scan)
//! │  arena + live │
//! │  table        │
//! └───────────────┘
//! ```
//!
//! # Memory contract
//!
//! The arena is a region the host hands over once and never collects. Every
//! block the stack owns is recorded in a fixed-size live table, which the
//! host's collector walks as a root set. Nothing in the arena moves, and a
//! block is only reused after the stack has released it (or the whole
//! subsystem has been torn down).
//!
//! # Usage
//!
//! ```ignore
//! use bluebridge_shim::bridge;
//!
//! // Once, before the stack starts:
//! unsafe { bridge::install(region_ptr, region_len)?; }
//!
//! // From the collector's mark phase:
//! bridge::for_each_root(&mut |region| mark_conservative(region));
//! ```

#![cfg_attr(not(test), no_std)]

pub mod abort;
pub mod arena;
pub mod bridge;
pub mod error;
pub mod format;
pub mod registry;
pub mod roots;
pub mod serial;

pub use abort::{fatal, set_raise_handler, Fault, FaultCategory, RaiseHandler};
pub use arena::{HeapStats, StackHeap, MIN_ARENA_SIZE};
pub use error::{HeapError, Result};
pub use format::{format_into, BoundedWriter, FormatOutcome};
pub use registry::{Allocation, LiveTable, MALLOC_ALIGN, MAX_LIVE_ALLOCATIONS};
pub use roots::{RootRegion, RootSet};
pub use serial::{init_serial_logger, PutStr, SerialLogger};
