//! Stack Heap - dedicated arena for allocations made by the external stack
//!
//! Backed by `linked_list_allocator` over a region the host hands over once.
//! The host collector never moves or reclaims that region; blocks inside it
//! are tracked in a [`LiveTable`] so the collector can treat them as roots.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Host-supplied region (never collected)         │
//! │                                                             │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │         linked_list_allocator::Heap                 │   │
//! │  │   [blk] [free] [blk] [blk] [free ...............]   │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!            ▲                         │
//!            │ base/size per block     ▼
//!     ┌──────────────┐         ┌──────────────┐
//!     │  LiveTable   │ ──────► │  RootSet     │ ──► collector
//!     └──────────────┘         └──────────────┘
//! ```
//!
//! # Guarantees
//!
//! - A block is never moved. `reallocate` either resizes in place or copies
//!   into a new block and only then frees the old one.
//! - A block is never handed out twice while live.
//! - Releasing an unknown pointer is ignored; heap metadata is only touched
//!   for blocks that are in the live table.

use core::alloc::Layout;
use core::ptr::{self, NonNull};

use linked_list_allocator::Heap;

use crate::error::{HeapError, Result};
use crate::registry::{block_size, Allocation, LiveTable, MALLOC_ALIGN};
use crate::roots::{RootRegion, RootSet};

/// Smallest region accepted as an arena.
pub const MIN_ARENA_SIZE: usize = 4096;

/// Arena statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Arena size in bytes.
    pub total: usize,
    /// Bytes carved out of the arena (including allocator rounding).
    pub used: usize,
    /// Bytes still available.
    pub free: usize,
    /// Number of blocks the stack currently owns.
    pub live_allocations: usize,
    /// Bytes the stack asked for across live blocks.
    pub live_bytes: usize,
    /// High-water mark of `used`.
    pub peak_used: usize,
    /// High-water mark of `live_allocations`.
    pub peak_allocations: usize,
}

impl HeapStats {
    /// Get usage percentage
    pub fn usage_percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.used * 100) / self.total) as u8
    }
}

/// Arena that serves the external stack's dynamic memory.
pub struct StackHeap {
    heap: Heap,
    base: usize,
    size: usize,
    live: LiveTable,
    peak_used: usize,
}

impl StackHeap {
    /// Create an empty (uninitialized) arena.
    pub const fn empty() -> Self {
        Self {
            heap: Heap::empty(),
            base: 0,
            size: 0,
            live: LiveTable::new(),
            peak_used: 0,
        }
    }

    /// Take ownership of `size` bytes at `region`.
    ///
    /// The start is rounded up to [`MALLOC_ALIGN`].
    ///
    /// # Safety
    /// - The region must be valid for reads and writes for as long as the
    ///   arena is in use
    /// - The host must neither move nor reclaim the region, nor use it for
    ///   anything else
    pub unsafe fn init(&mut self, region: *mut u8, size: usize) -> Result<()> {
        if self.is_initialized() {
            return Err(HeapError::AlreadyInitialized);
        }
        if region.is_null() {
            return Err(HeapError::InvalidRegion);
        }

        let start = region as usize;
        let aligned = (start + MALLOC_ALIGN - 1) & !(MALLOC_ALIGN - 1);
        let usable = size.saturating_sub(aligned - start);
        if usable < MIN_ARENA_SIZE {
            return Err(HeapError::RegionTooSmall {
                size,
                min: MIN_ARENA_SIZE,
            });
        }

        self.heap.init(aligned as *mut u8, usable);
        self.base = aligned;
        self.size = usable;
        self.peak_used = 0;
        self.live.clear();

        log::info!("[HEAP] arena at {:#x}, size {:#x} bytes", aligned, usable);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.size != 0
    }

    /// Carve a block of at least `size` bytes.
    ///
    /// Returns `None` when the arena or the live table is exhausted; the stack
    /// sees that exactly like a failed `malloc`.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        if !self.is_initialized() {
            log::warn!("[HEAP] allocate({}) before arena init", size);
            return None;
        }
        if self.live.is_full() {
            log::warn!("[HEAP] live table full, refusing allocate({})", size);
            return None;
        }

        let Some(block) = block_size(size) else {
            log::warn!("[HEAP] allocate({}) exceeds address space", size);
            return None;
        };
        let ptr = self.carve(block)?;
        // Cannot fail: fullness was checked above.
        let _ = self.live.insert(Allocation::new(ptr.as_ptr() as usize, size, block));
        log::trace!("[HEAP] allocate({}) -> {:p}", size, ptr);
        Some(ptr)
    }

    /// Return a block to the arena.
    ///
    /// Returns `false` (and leaves the arena untouched) for null, unknown or
    /// already-released pointers.
    pub fn release(&mut self, ptr: *mut u8) -> bool {
        if ptr.is_null() {
            return false;
        }
        let Some(allocation) = self.live.remove(ptr as usize) else {
            log::warn!("[HEAP] release of unknown pointer {:p} ignored", ptr);
            return false;
        };
        self.free_block(&allocation);
        log::trace!("[HEAP] release({:p}) size {}", ptr, allocation.size);
        true
    }

    /// Resize a block, preserving the first `min(old, new)` bytes.
    ///
    /// On failure the original block stays live and unchanged. A null `ptr`
    /// behaves like [`allocate`](Self::allocate).
    pub fn reallocate(&mut self, ptr: *mut u8, new_size: usize) -> Option<NonNull<u8>> {
        if ptr.is_null() {
            return self.allocate(new_size);
        }
        let Some(old) = self.live.find(ptr as usize).copied() else {
            log::warn!("[HEAP] reallocate of unknown pointer {:p} refused", ptr);
            return None;
        };

        let Some(new_block) = block_size(new_size) else {
            log::warn!("[HEAP] reallocate({:p}, {}) exceeds address space", ptr, new_size);
            return None;
        };

        // Fits in the existing block: keep the address.
        if new_block <= old.block {
            self.live
                .replace(old.base, Allocation::new(old.base, new_size, old.block));
            return NonNull::new(ptr);
        }

        // Copy the whole old block: bytes left behind by an earlier in-place
        // shrink travel with it.
        let fresh = self.carve(new_block)?;
        unsafe {
            ptr::copy_nonoverlapping(ptr as *const u8, fresh.as_ptr(), old.block.min(new_size));
        }
        self.live.remove(old.base);
        self.free_block(&old);
        let _ = self.live.insert(Allocation::new(
            fresh.as_ptr() as usize,
            new_size,
            new_block,
        ));
        log::trace!("[HEAP] reallocate({:p}, {}) -> {:p}", ptr, new_size, fresh);
        Some(fresh)
    }

    /// Requested size of the live block starting at `ptr`.
    pub fn size_of(&self, ptr: *const u8) -> Option<usize> {
        self.live.find(ptr as usize).map(|a| a.size)
    }

    /// Is `ptr` the start of a live block?
    pub fn owns(&self, ptr: *const u8) -> bool {
        self.live.find(ptr as usize).is_some()
    }

    /// Iterate over every live block.
    pub fn live(&self) -> impl Iterator<Item = &Allocation> {
        self.live.iter()
    }

    /// The whole arena, for collectors that prefer one conservative range.
    pub fn arena_region(&self) -> Option<RootRegion> {
        if self.is_initialized() {
            Some(RootRegion::new(self.base, self.size))
        } else {
            None
        }
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            total: self.size,
            used: self.heap.used(),
            free: self.heap.free(),
            live_allocations: self.live.len(),
            live_bytes: self.live.live_bytes(),
            peak_used: self.peak_used,
            peak_allocations: self.live.peak(),
        }
    }

    /// Drop every block at once.
    ///
    /// Only valid once the external stack is fully shut down and holds no
    /// pointer into the arena (soft reset of the Bluetooth subsystem).
    pub fn teardown(&mut self) {
        if !self.is_initialized() {
            return;
        }
        let dropped = self.live.len();
        self.live.clear();
        self.heap = Heap::empty();
        unsafe { self.heap.init(self.base as *mut u8, self.size) };
        log::info!("[HEAP] teardown, dropped {} live blocks", dropped);
    }

    /// Carve a block of exactly `block` bytes (already rounded).
    fn carve(&mut self, block: usize) -> Option<NonNull<u8>> {
        let layout = Layout::from_size_align(block, MALLOC_ALIGN).ok()?;
        match self.heap.allocate_first_fit(layout) {
            Ok(ptr) => {
                self.peak_used = self.peak_used.max(self.heap.used());
                Some(ptr)
            }
            Err(_) => {
                log::debug!("[HEAP] arena exhausted for {} bytes", block);
                None
            }
        }
    }

    fn free_block(&mut self, allocation: &Allocation) {
        if let (Some(nn), Some(layout)) = (NonNull::new(allocation.base as *mut u8), allocation.layout()) {
            unsafe { self.heap.deallocate(nn, layout) };
        }
    }
}

impl RootSet for StackHeap {
    fn for_each_root(&self, visit: &mut dyn FnMut(RootRegion)) {
        for allocation in self.live.iter() {
            visit(RootRegion::new(allocation.base, allocation.block));
        }
    }

    fn root_count(&self) -> usize {
        self.live.len()
    }
}

impl Default for StackHeap {
    fn default() -> Self {
        Self::empty()
    }
}
