//! A spin-locked heap usable as the global allocator
use core::{
    alloc::{GlobalAlloc, Layout},
    ptr::{self, NonNull},
};

use crate::{Config, TinyHeap};

/// [`TinyHeap`] as a global allocator.
///
/// The heap is protected by a spinlock. It starts out empty; every
/// allocation fails until [`init`](Self::init) hands it a buffer.
///
/// Allocations requiring an alignment larger than [`Config::ALIGN`] always
/// fail.
///
/// ```rust,no_run
/// use tinyheap::{DefaultConfig, GlobalTinyHeap};
///
/// #[global_allocator]
/// static HEAP: GlobalTinyHeap<DefaultConfig> = GlobalTinyHeap::new();
///
/// static mut POOL: [u8; 4064] = [0; 4064];
///
/// fn main() {
///     unsafe { HEAP.init(&mut *core::ptr::addr_of_mut!(POOL)) };
/// }
/// ```
pub struct GlobalTinyHeap<C: Config> {
    inner: spin::Mutex<TinyHeap<'static, C>>,
}

impl<C: Config> GlobalTinyHeap<C> {
    /// Construct an empty heap.
    pub const fn new() -> Self {
        Self {
            inner: spin::Mutex::new(TinyHeap::INIT),
        }
    }

    /// Take over `pool`. See [`TinyHeap::init`].
    ///
    /// # Safety
    ///
    /// This must not be called again while allocations from the previous
    /// buffer are alive.
    pub unsafe fn init(&self, pool: &'static mut [u8]) -> usize {
        self.inner.lock().init(pool)
    }

    /// Lock the heap for direct access.
    #[inline]
    pub fn lock(&self) -> spin::MutexGuard<'_, TinyHeap<'static, C>> {
        self.inner.lock()
    }

    /// See [`TinyHeap::free_bytes`].
    pub fn free_bytes(&self) -> Option<usize> {
        self.inner.lock().free_bytes()
    }
}

impl<C: Config> Default for GlobalTinyHeap<C> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<C: Config> GlobalAlloc for GlobalTinyHeap<C> {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > C::ALIGN {
            return ptr::null_mut();
        }
        self.inner
            .lock()
            .allocate(layout.size())
            .map(NonNull::as_ptr)
            .unwrap_or(ptr::null_mut())
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        // Safety: All allocations are non-null
        let ptr = NonNull::new_unchecked(ptr);
        // Safety: `ptr` denotes a previous allocation
        self.inner.lock().deallocate(ptr);
    }
}
