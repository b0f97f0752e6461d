//! Live-allocation table
//!
//! Every block handed to the external stack gets one entry here until the
//! stack releases it. The table is what makes bridge memory visible to the
//! host collector, and it is also the only source of truth for block sizes:
//! the stack's `free`/`realloc` calls carry no layout, so the size has to be
//! looked up by base address.

use core::alloc::Layout;

/// Maximum number of blocks the stack may hold at once.
///
/// The stack is configured with fixed-capacity buffers and allocates rarely
/// after start-up; running out of entries is treated like heap exhaustion.
pub const MAX_LIVE_ALLOCATIONS: usize = 128;

/// Alignment of every bridge block, matching what a C `malloc` guarantees.
pub const MALLOC_ALIGN: usize = 2 * core::mem::size_of::<usize>();

/// One block owned by the external stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Address returned to the stack.
    pub base: usize,
    /// Size the stack asked for (may be zero).
    pub size: usize,
    /// Size of the block actually carved out of the arena.
    pub block: usize,
}

impl Allocation {
    /// Build an entry for a freshly carved block.
    pub const fn new(base: usize, size: usize, block: usize) -> Self {
        Self { base, size, block }
    }

    /// One past the last byte of the underlying block.
    #[inline]
    pub const fn end(&self) -> usize {
        self.base + self.block
    }

    /// Does this block contain `addr`?
    #[inline]
    pub const fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.end()
    }

    /// Do two blocks share any byte?
    #[inline]
    pub const fn overlaps(&self, other: &Allocation) -> bool {
        self.base < other.end() && other.base < self.end()
    }

    /// Layout the block was carved with.
    pub fn layout(&self) -> Option<Layout> {
        Layout::from_size_align(self.block, MALLOC_ALIGN).ok()
    }
}

/// Block size used for a request of `size` bytes.
///
/// Zero-byte requests still get a distinct block so that every live pointer
/// is unique. `None` when the rounded size cannot describe a valid layout.
#[inline]
pub const fn block_size(size: usize) -> Option<usize> {
    let size = if size == 0 { MALLOC_ALIGN } else { size };
    let rounded = match size.checked_add(MALLOC_ALIGN - 1) {
        Some(n) => n & !(MALLOC_ALIGN - 1),
        None => return None,
    };
    if rounded > isize::MAX as usize {
        return None;
    }
    Some(rounded)
}

/// Fixed-capacity table of live blocks.
pub struct LiveTable {
    entries: heapless::Vec<Allocation, MAX_LIVE_ALLOCATIONS>,
    peak: usize,
}

impl LiveTable {
    /// Empty table.
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
            peak: 0,
        }
    }

    /// Record a block. Hands the entry back if the table is full.
    pub fn insert(&mut self, allocation: Allocation) -> Result<(), Allocation> {
        debug_assert!(
            !self.entries.iter().any(|a| a.overlaps(&allocation)),
            "overlapping live allocation"
        );
        self.entries.push(allocation)?;
        self.peak = self.peak.max(self.entries.len());
        Ok(())
    }

    /// Forget the block starting at `base`.
    pub fn remove(&mut self, base: usize) -> Option<Allocation> {
        let idx = self.entries.iter().position(|a| a.base == base)?;
        Some(self.entries.swap_remove(idx))
    }

    /// Look up the block starting at `base`.
    pub fn find(&self, base: usize) -> Option<&Allocation> {
        self.entries.iter().find(|a| a.base == base)
    }

    /// Replace the entry for `base` in place.
    pub fn replace(&mut self, base: usize, allocation: Allocation) -> bool {
        match self.entries.iter_mut().find(|a| a.base == base) {
            Some(slot) => {
                *slot = allocation;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Allocation> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// High-water mark of simultaneously live blocks.
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Sum of requested sizes of every live block.
    pub fn live_bytes(&self) -> usize {
        self.entries.iter().map(|a| a.size).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for LiveTable {
    fn default() -> Self {
        Self::new()
    }
}
