//! This crate implements a fixed-block memory allocator whose bookkeeping is
//! embedded in the managed buffer and packed into a few bits per region.
//!
//!  - **The memory pool is provided by an application.** The allocator never
//!    grows it, never returns it to anyone, and doesn't need an operating
//!    system.
//!
//!  - **Tiny headers.** Each region starts with a single header word (as
//!    small as two bytes) holding a free flag, an optional parity bit, and the
//!    block distances to the neighbouring headers. The distances replace
//!    pointers, so the word width bounds the heap size: a `u16` header
//!    addresses at most 127 blocks.
//!
//!  - **Configurable at compile time.** The block size, header width, search
//!    strategy ([`NoHint`], [`LastFree`], [`MinMax`]), fit strategy
//!    ([`FirstFit`], [`BestFit`], [`GoodEnoughFit`]), and integrity checks
//!    (parity, boundary, double-free) are chosen by a [`Config`].
//!
//!  - **This crate supports `#![no_std]`.** It can be used in bare-metal and
//!    RTOS-based applications.
//!
//! # Examples
//!
//! ## `TinyHeap`: Core API
//!
//! ```rust
//! use tinyheap::{DefaultConfig, TinyHeap};
//!
//! let mut pool = [0u8; 2048];
//!
//! // `DefaultConfig`: 32-byte blocks, 16-bit headers (up to 127 blocks)
//! let mut heap: TinyHeap<'_, DefaultConfig> = TinyHeap::INIT;
//! let capacity = heap.init(&mut pool);
//!
//! let ptr1 = heap.allocate(20).unwrap().cast::<u32>();
//! let ptr2 = heap.allocate(100).unwrap().cast::<u32>();
//! assert_eq!(heap.free_bytes(), Some(capacity - 32 - 128));
//!
//! unsafe {
//!     ptr1.as_ptr().write(42);
//!     ptr2.as_ptr().write(56);
//!     assert_eq!(*ptr1.as_ptr(), 42);
//!     assert_eq!(*ptr2.as_ptr(), 56);
//!     heap.deallocate(ptr1.cast());
//!     heap.deallocate(ptr2.cast());
//! }
//! assert_eq!(heap.free_bytes(), Some(capacity));
//! ```
//!
//! ## `Hooks`: Instrumentation
//!
//! ```rust
//! use tinyheap::{Corruption, DefaultConfig, Hooks, TinyHeap};
//!
//! #[derive(Default)]
//! struct Pattern {
//!     corruptions: usize,
//! }
//!
//! impl Hooks for Pattern {
//!     fn on_allocated(&mut self, payload: &mut [u8]) {
//!         payload.fill(0xaa);
//!     }
//!
//!     fn corrupted(&mut self, _: Corruption) {
//!         self.corruptions += 1;
//!     }
//! }
//!
//! let mut pool = [0u8; 512];
//! let mut heap: TinyHeap<'_, DefaultConfig, _> = TinyHeap::with_hooks(Pattern::default());
//! heap.init(&mut pool);
//!
//! let ptr = heap.allocate(4).unwrap();
//! assert_eq!(unsafe { *ptr.as_ptr() }, 0xaa);
//!
//! unsafe {
//!     heap.deallocate(ptr);
//!     heap.deallocate(ptr);
//! }
//! assert_eq!(heap.hooks().corruptions, 1);
//! ```
//!
//! # Details
//!
//! ## Allocation
//!
//! A request of `size` bytes takes `ceil((size + PAYLOAD_OFFSET) /
//! BLOCK_SIZE)` blocks. The search starts at a hint supplied by the search
//! strategy (or the first region) and goes around the chain at most once.
//! The fit strategy decides whether a large-enough free region is taken
//! immediately or whether the search continues for a tighter one. The chosen
//! region is split if it's larger than necessary.
//!
//! ## Deallocation
//!
//! A freed region is merged with a free successor and into a free
//! predecessor right away, so no two adjacent regions are ever both free.
//!
//! ## Corruption
//!
//! The optional checks report to [`Hooks::corrupted`], which panics by
//! default. The allocator never tries to repair a corrupted chain.
#![no_std]

mod config;
mod global;
mod header;
mod heap;
mod hooks;
mod init;
pub mod int;
mod pick;
mod seek;
pub use self::{
    config::*,
    global::*,
    heap::{Dump, Region, Regions, TinyHeap},
    hooks::*,
    init::*,
    pick::*,
    seek::*,
};
