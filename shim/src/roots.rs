//! Root-visibility contract with the host collector.
//!
//! The external stack keeps pointers into bridge memory (and, through that
//! memory, possibly into host objects) in places the collector cannot trace
//! precisely. The collector therefore treats every live bridge block as a
//! root region and scans it conservatively: any word that looks like a heap
//! address is considered a reference.

use core::mem::size_of;

/// A contiguous range the collector must treat as always reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootRegion {
    pub base: usize,
    pub len: usize,
}

impl RootRegion {
    pub const fn new(base: usize, len: usize) -> Self {
        Self { base, len }
    }

    pub const fn end(&self) -> usize {
        self.base + self.len
    }

    pub const fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.end()
    }

    /// Visit every pointer-aligned word inside the region.
    ///
    /// # Safety
    /// The whole region must be mapped and readable for the duration of the
    /// call.
    pub unsafe fn scan_words(&self, visit: &mut dyn FnMut(usize)) {
        let word = size_of::<usize>();
        let mut addr = (self.base + word - 1) & !(word - 1);
        while addr + word <= self.end() {
            visit(core::ptr::read(addr as *const usize));
            addr += word;
        }
    }
}

/// Anything that owns memory the collector must not reclaim.
pub trait RootSet {
    /// Report every root region.
    fn for_each_root(&self, visit: &mut dyn FnMut(RootRegion));

    /// Number of regions `for_each_root` will report.
    fn root_count(&self) -> usize;
}
