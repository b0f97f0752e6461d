//! Global allocator bridge
//!
//! The external stack links against plain `malloc`/`free`/`realloc` and has
//! no notion of a heap handle, so the arena lives in one global slot behind a
//! spin lock. The lock only guards against re-entry from interrupt context;
//! the stack itself runs on the host's single cooperative thread.
//!
//! With the `c-abi` feature the C symbols are exported directly so the stack
//! can be linked without a wrapper layer.

use core::ptr;

use spin::Mutex;

use crate::arena::{HeapStats, StackHeap};
use crate::error::Result;
use crate::roots::{RootRegion, RootSet};

static BRIDGE: Mutex<StackHeap> = Mutex::new(StackHeap::empty());

/// Hand the arena region to the bridge.
///
/// # Safety
/// Same contract as [`StackHeap::init`]: the region must stay valid,
/// unmoved and uncollected until [`teardown`] and beyond.
pub unsafe fn install(region: *mut u8, size: usize) -> Result<()> {
    BRIDGE.lock().init(region, size)
}

/// Is the arena ready to serve the stack?
pub fn is_installed() -> bool {
    BRIDGE.lock().is_initialized()
}

/// `malloc` semantics: null on exhaustion.
pub fn allocate(size: usize) -> *mut u8 {
    BRIDGE
        .lock()
        .allocate(size)
        .map_or(ptr::null_mut(), |p| p.as_ptr())
}

/// `free` semantics: null and unknown pointers are ignored.
pub fn release(ptr: *mut u8) {
    BRIDGE.lock().release(ptr);
}

/// `realloc` semantics: null on failure, original block untouched.
pub fn reallocate(ptr: *mut u8, size: usize) -> *mut u8 {
    BRIDGE
        .lock()
        .reallocate(ptr, size)
        .map_or(ptr::null_mut(), |p| p.as_ptr())
}

pub fn stats() -> HeapStats {
    BRIDGE.lock().stats()
}

/// Report every live stack block to the collector.
///
/// Called from the collector's root-marking phase. The visitor must not
/// call back into the bridge.
pub fn for_each_root(visit: &mut dyn FnMut(RootRegion)) {
    BRIDGE.lock().for_each_root(visit);
}

/// Whole-arena range for collectors that scan one conservative region.
pub fn arena_region() -> Option<RootRegion> {
    BRIDGE.lock().arena_region()
}

/// Drop every stack block (subsystem soft reset).
pub fn teardown() {
    BRIDGE.lock().teardown();
}

#[cfg(feature = "c-abi")]
mod c_abi {
    use core::ffi::c_void;

    #[no_mangle]
    pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
        super::allocate(size) as *mut c_void
    }

    #[no_mangle]
    pub unsafe extern "C" fn free(ptr: *mut c_void) {
        super::release(ptr as *mut u8)
    }

    #[no_mangle]
    pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
        super::reallocate(ptr as *mut u8, size) as *mut c_void
    }
}
