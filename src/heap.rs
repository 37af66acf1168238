//! The heap engine
use core::{
    fmt,
    marker::PhantomData,
    mem, ops,
    ptr::{self, NonNull},
    slice,
};

use crate::{
    config::Config,
    header::Header,
    hooks::{Corruption, Hooks, NoHooks},
    int::HeaderWord,
    pick::PickStrategy,
    seek::SeekStrategy,
    Init,
};

mod dump;
pub use self::dump::Dump;

/// A heap carved out of a single caller-supplied buffer.
///
/// # Data Structure Overview
///
/// The buffer is divided into blocks of [`Config::BLOCK_SIZE`] bytes. Every
/// region, free or allocated, starts with a block header encoding whether the
/// region is free and how many blocks away the next and the previous headers
/// are. There is no separate free list; the headers form a chain covering the
/// whole buffer.
///
#[doc = svgbobdoc::transform!(
/// <center>
///
/// ```svgbob
///          prev: 0              prev: 2           prev: 3          prev: 1
///          next: 2              next: 3           next: 1          next: 4
///          BUSY                 FREE              BUSY             FREE
///          |                    |                 |                |
///          v                    v                 v                v
///         +---+-------+-------+---+-------+-------+---+-------+---+-------+-------+-------+-------+
///  base → | H | payload       | H |                   | H |       | H |                           |
///         +---+-------+-------+---+-------+-------+---+-------+---+-------+-------+-------+-------+
///         '-------- 2 --------'------------ 3 --------'---- 1 ----'-------------- 4 --------------'
/// ```
///
/// </center>
)]
///
/// The payload of an allocated region starts at a fixed offset from its
/// header: the header size rounded up to [`Config::ALIGN`].
///
/// # Properties
///
///  - No two adjacent regions are both free after `allocate` or `deallocate`
///    returns.
///  - Allocation takes at most one pass over the chain. Deallocation takes
///    constant time.
///  - The heap can manage at most `2^(addressing bits - 1) - 1` blocks. The
///    rest of a larger buffer is left unused.
///
pub struct TinyHeap<'pool, C: Config, H = NoHooks> {
    base: NonNull<u8>,
    blocks: usize,
    free: usize,
    cycles: usize,
    seek: C::Seek,
    hooks: H,
    _phantom: PhantomData<&'pool mut [u8]>,
}

// Safety: The block headers referenced by a particular instance of `TinyHeap`
//         are logically owned by that `TinyHeap` and have no interior
//         mutability, so these are safe.
unsafe impl<C: Config, H: Send> Send for TinyHeap<'_, C, H> {}

unsafe impl<C: Config, H: Sync> Sync for TinyHeap<'_, C, H> {}

/// A region in a [`TinyHeap`], as reported by [`TinyHeap::regions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// The byte offset of the region's header from the start of the heap.
    pub offset: usize,
    /// The length of the region in bytes, including the header.
    pub len: usize,
    /// Whether the region is free.
    pub free: bool,
    /// The distance to the previous region's header in blocks.
    pub prev_span: usize,
    /// Whether the header's parity bit is intact. `None` if parity is
    /// disabled.
    pub parity_ok: Option<bool>,
}

/// A view of the block chain. Block indices passed to its methods must be
/// less than `blocks`.
struct Chain<C> {
    base: NonNull<u8>,
    blocks: usize,
    _phantom: PhantomData<fn() -> C>,
}

impl<C> Clone for Chain<C> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Chain<C> {}

impl<C: Config> Chain<C> {
    #[inline]
    fn header_ptr(self, index: usize) -> *mut C::Word {
        debug_assert!(index < self.blocks);
        self.base
            .as_ptr()
            .wrapping_add(index * C::BLOCK_SIZE)
            .cast()
    }

    #[inline]
    unsafe fn load(self, index: usize) -> C::Word {
        ptr::read_unaligned(self.header_ptr(index))
    }

    #[inline]
    unsafe fn header(self, index: usize) -> Header {
        Header::decode(self.load(index)).0
    }

    /// Read a header, optionally verifying its parity. With
    /// `C::CHECK_BOUNDARY`, a region that is empty or extends past the end of
    /// the heap is reported.
    #[inline]
    unsafe fn checked_header(self, index: usize, parity: bool) -> Result<Header, Corruption> {
        let word = self.load(index);
        if parity && !Header::check(word) {
            return Err(Corruption::Parity {
                offset: index * C::BLOCK_SIZE,
            });
        }
        let hdr = Header::decode(word).0;
        if C::CHECK_BOUNDARY && (hdr.next == 0 || hdr.next > self.blocks - index) {
            return Err(Corruption::Boundary {
                offset: index * C::BLOCK_SIZE,
            });
        }
        Ok(hdr)
    }

    #[inline]
    unsafe fn store(self, index: usize, hdr: Header) {
        debug_assert!(hdr.next >= 1 && index + hdr.next <= self.blocks);
        // A backward span of zero marks the first region. Every region is at
        // least one block long, so this can't be a real distance.
        debug_assert_eq!(hdr.prev == 0, index == 0);
        ptr::write_unaligned(self.header_ptr(index), hdr.encode(C::PARITY.is_some()));
    }

    /// The index of the header following a region of `span` blocks at
    /// `index`, unless the region is the last one.
    #[inline]
    fn next_of(self, index: usize, span: usize) -> Option<usize> {
        let next = index + span;
        if next < self.blocks {
            Some(next)
        } else {
            None
        }
    }

    #[inline]
    fn payload_ptr(self, index: usize) -> NonNull<u8> {
        // Safety: `base` is non-null, and the payload lies within the pool
        unsafe {
            NonNull::new_unchecked(
                self.base
                    .as_ptr()
                    .wrapping_add(index * C::BLOCK_SIZE + payload_offset::<C>()),
            )
        }
    }

    /// The payload of the region of `span` blocks at `index`.
    ///
    /// # Safety
    ///
    /// The region must not be accessed through any other reference while the
    /// returned slice is alive.
    #[inline]
    unsafe fn payload<'a>(self, index: usize, span: usize) -> &'a mut [u8] {
        slice::from_raw_parts_mut(
            self.payload_ptr(index).as_ptr(),
            span * C::BLOCK_SIZE - payload_offset::<C>(),
        )
    }

    /// Find the header index for an allocation. Returns the offending byte
    /// offset if `ptr` isn't a payload start within the chain.
    #[inline]
    fn index_of(self, ptr: NonNull<u8>) -> Result<usize, usize> {
        let offset = (ptr.as_ptr() as usize)
            .wrapping_sub(self.base.as_ptr() as usize)
            .wrapping_sub(payload_offset::<C>());
        let index = offset / C::BLOCK_SIZE;
        if offset % C::BLOCK_SIZE == 0 && index < self.blocks {
            Ok(index)
        } else {
            Err(offset)
        }
    }
}

/// The distance from a header to the payload it precedes.
#[inline]
const fn payload_offset<C: Config>() -> usize {
    (mem::size_of::<C::Word>() + C::ALIGN - 1) & !(C::ALIGN - 1)
}

impl<C: Config, H: Init> Default for TinyHeap<'_, C, H> {
    fn default() -> Self {
        Self::INIT
    }
}

impl<C: Config, H: Init> Init for TinyHeap<'_, C, H> {
    const INIT: Self = Self::INIT;
}

impl<'pool, C: Config, H: Init> TinyHeap<'pool, C, H> {
    /// A heap with no buffer. Every allocation fails until
    /// [`init`](Self::init) is called.
    pub const INIT: Self = Self::with_hooks(H::INIT);
}

impl<'pool, C: Config, H> TinyHeap<'pool, C, H> {
    /// The distance from a block header to the payload it precedes.
    pub const PAYLOAD_OFFSET: usize = payload_offset::<C>();

    /// The maximum number of blocks a heap of this type can manage.
    pub const MAX_BLOCKS: usize = <C::Word as HeaderWord>::MAX_SPAN as usize;

    /// Evaluates successfully if the configuration is valid.
    const VALID: () = {
        if !C::ALIGN.is_power_of_two() {
            panic!("`ALIGN` must be a power of two");
        }
        if C::BLOCK_SIZE == 0 || C::BLOCK_SIZE % C::ALIGN != 0 {
            panic!("`BLOCK_SIZE` must be a non-zero multiple of `ALIGN`");
        }
        if payload_offset::<C>() > C::BLOCK_SIZE {
            panic!("`BLOCK_SIZE` is too small to hold a block header");
        }
    };

    /// Construct a heap with no buffer, using the given hooks.
    pub const fn with_hooks(hooks: H) -> Self {
        let () = Self::VALID;
        Self {
            base: NonNull::dangling(),
            blocks: 0,
            free: 0,
            cycles: 0,
            seek: C::Seek::INIT,
            hooks,
            _phantom: PhantomData,
        }
    }

    #[inline]
    fn chain(&self) -> Chain<C> {
        Chain {
            base: self.base,
            blocks: self.blocks,
            _phantom: PhantomData,
        }
    }

    /// The number of bytes under management.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.blocks * C::BLOCK_SIZE
    }

    /// The number of free bytes, headers included. `None` unless
    /// [`Config::CALC_FREE`] is enabled.
    #[inline]
    pub fn free_bytes(&self) -> Option<usize> {
        if C::CALC_FREE {
            Some(self.free * C::BLOCK_SIZE)
        } else {
            None
        }
    }

    /// The total number of headers visited by free-region searches since
    /// initialization. `None` unless [`Config::COUNT_SEARCH_CYCLES`] is
    /// enabled.
    #[inline]
    pub fn search_cycles(&self) -> Option<usize> {
        if C::COUNT_SEARCH_CYCLES {
            Some(self.cycles)
        } else {
            None
        }
    }

    #[inline]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    #[inline]
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Iterate over the regions of the heap in address order.
    pub fn regions(&self) -> Regions<'_, C> {
        Regions {
            chain: self.chain(),
            index: 0,
            _phantom: PhantomData,
        }
    }

    /// Get an object that renders the heap's state when formatted with
    /// `{}`.
    pub fn dump(&self) -> Dump<'_, 'pool, C, H> {
        Dump { heap: self }
    }
}

impl<'pool, C: Config, H: Hooks> TinyHeap<'pool, C, H> {
    /// Take over a buffer specified by a slice pointer, replacing the
    /// current one (if any).
    ///
    /// The start of the buffer is rounded up to [`Config::ALIGN`], and the
    /// rest is divided into at most [`Self::MAX_BLOCKS`] blocks. Returns the
    /// number of bytes under management, which may be less than the buffer's
    /// length; the remainder is never touched. If the buffer can't hold a
    /// single block, the heap is left empty and `0` is returned.
    ///
    /// # Time Complexity
    ///
    /// This method will complete in constant time.
    ///
    /// # Safety
    ///
    /// The buffer will be considered owned by `self`. It must be valid for
    /// reads and writes, initialized, and must outlive `self`. Allocations made
    /// from the previous buffer must not be passed to `deallocate` anymore.
    pub unsafe fn init_ptr(&mut self, pool: NonNull<[u8]>) -> usize {
        let len = pool.len();
        let start = pool.cast::<u8>();

        // Round up the starting address
        let unaligned_start = start.as_ptr() as usize;
        let pad = unaligned_start.wrapping_neg() & (C::ALIGN - 1);

        self.base = NonNull::dangling();
        self.blocks = 0;
        self.free = 0;
        self.cycles = 0;
        self.seek = C::Seek::INIT;

        let blocks = match len.checked_sub(pad) {
            Some(len) => (len / C::BLOCK_SIZE).min(Self::MAX_BLOCKS),
            None => 0,
        };
        if blocks == 0 {
            log::trace!("init: {:p}+{} is too small for a block", start, len);
            return 0;
        }

        self.base = NonNull::new_unchecked(start.as_ptr().wrapping_add(pad));
        self.blocks = blocks;
        self.free = blocks;

        let chain = self.chain();
        chain.store(
            0,
            Header {
                free: true,
                next: blocks,
                prev: 0,
            },
        );
        self.hooks.on_freed(chain.payload(0, blocks));

        log::trace!(
            "init: {} blocks at {:p} ({} of {} bytes unused)",
            blocks,
            self.base,
            len - blocks * C::BLOCK_SIZE,
            len
        );

        self.capacity()
    }

    /// Take over a buffer specified by a slice. See
    /// [`init_ptr`](Self::init_ptr).
    ///
    /// # Examples
    ///
    /// ```
    /// use tinyheap::{DefaultConfig, TinyHeap};
    /// let mut pool = [0u8; 1024];
    /// let mut heap: TinyHeap<'_, DefaultConfig> = TinyHeap::INIT;
    /// let capacity = heap.init(&mut pool);
    /// assert!(capacity > 1024 - 32);
    /// assert_eq!(heap.free_bytes(), Some(capacity));
    /// ```
    ///
    /// The buffer must outlive `self`:
    ///
    /// ```rust,compile_fail
    /// use tinyheap::{DefaultConfig, TinyHeap};
    /// let mut heap: TinyHeap<'_, DefaultConfig> = TinyHeap::INIT;
    /// let mut pool = [0u8; 1024];
    /// heap.init(&mut pool);
    /// drop(pool); // dropping the buffer first is not allowed
    /// drop(heap);
    /// ```
    #[inline]
    pub fn init(&mut self, pool: &'pool mut [u8]) -> usize {
        // Safety: `pool` is a mutable reference, which guarantees the absence
        // of aliasing references. Being `'pool` means it will outlive `self`.
        // Any allocations from a previous buffer can only be freed through
        // the unsafe `deallocate`.
        unsafe { self.init_ptr(NonNull::from(pool)) }
    }

    /// Attempt to allocate `size` bytes.
    ///
    /// Returns the start of the payload, aligned to [`Config::ALIGN`], on
    /// success; `None` if `size` is zero or no free region is large enough.
    ///
    /// # Time Complexity
    ///
    /// This method will complete in linear time (`O(regions)`).
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }

        self.lock().allocate_locked(size)
    }

    fn allocate_locked(&mut self, size: usize) -> Option<NonNull<u8>> {
        let chain = self.chain();
        let needed =
            size.checked_add(Self::PAYLOAD_OFFSET + C::BLOCK_SIZE - 1)? / C::BLOCK_SIZE;
        if needed > chain.blocks {
            log::trace!("allocate({}): {} blocks exceed the heap", size, needed);
            return None;
        }

        let start = self
            .seek
            .start(needed)
            .filter(|&i| i < chain.blocks)
            .unwrap_or(0);

        // Safety: `start` is a header index (hints never name merged-away
        //         headers)
        let index = match unsafe { self.find_free(chain, needed, start) } {
            Ok(Some(index)) => index,
            Ok(None) => {
                log::trace!("allocate({}): no region of {} blocks", size, needed);
                return None;
            }
            Err(corruption) => {
                self.report(corruption);
                return None;
            }
        };

        // Safety: `index` is a free region of at least `needed` blocks
        unsafe { self.split_off(chain, index, needed) };

        let ptr = chain.payload_ptr(index);
        log::trace!("allocate({}) = {:p} ({} blocks)", size, ptr, needed);
        Some(ptr)
    }

    /// Scan the chain once, circularly, starting at `start`, for a free
    /// region of at least `needed` blocks, as chosen by `C::Pick`.
    unsafe fn find_free(
        &mut self,
        chain: Chain<C>,
        needed: usize,
        start: usize,
    ) -> Result<Option<usize>, Corruption> {
        let parity = C::PARITY.map_or(false, |level| level.on_allocate());

        // `(delta, index)` of the best candidate so far
        let mut best: Option<(usize, usize)> = None;
        let mut traversed = 0;
        let mut index = start;

        loop {
            let hdr = chain.checked_header(index, parity)?;

            if hdr.free && hdr.next >= needed {
                let delta = hdr.next - needed;
                if C::Pick::accept(delta) {
                    return Ok(Some(index));
                } else if best.map_or(true, |(best_delta, _)| delta < best_delta) {
                    best = Some((delta, index));
                }
            }

            if C::COUNT_SEARCH_CYCLES {
                self.cycles = self.cycles.wrapping_add(1);
            }

            if C::CHECK_BOUNDARY {
                traversed += hdr.next;
                if traversed > chain.blocks {
                    return Err(Corruption::Boundary {
                        offset: index * C::BLOCK_SIZE,
                    });
                }
            }

            // Wrap around at the end of the heap
            index = chain.next_of(index, hdr.next).unwrap_or(0);
            if index == start {
                return Ok(best.map(|(_, index)| index));
            }
        }
    }

    /// Turn the free region at `index` into an allocated region of `needed`
    /// blocks, splitting off the rest as a new free region.
    unsafe fn split_off(&mut self, chain: Chain<C>, index: usize, needed: usize) {
        let hdr = chain.header(index);
        debug_assert!(hdr.free);
        debug_assert!(hdr.next >= needed);

        chain.store(
            index,
            Header {
                free: false,
                next: needed,
                prev: hdr.prev,
            },
        );
        self.seek.forget(index);

        if C::CALC_FREE {
            self.free -= needed;
        }

        self.hooks.on_allocated(chain.payload(index, needed));

        if hdr.next == needed {
            // The allocation completely fills this free region. The next
            // header's `prev` is still correct.
            return;
        }

        let rest = index + needed;
        let rest_span = hdr.next - needed;
        chain.store(
            rest,
            Header {
                free: true,
                next: rest_span,
                prev: needed,
            },
        );
        self.seek
            .offer(rest, rest_span, |i| unsafe { chain.header(i).free });
        self.hooks.on_split_freed(chain.payload(rest, rest_span));

        if let Some(after) = chain.next_of(rest, rest_span) {
            let mut after_hdr = chain.header(after);

            // Invariant: No two adjacent free regions
            debug_assert!(!after_hdr.free);

            after_hdr.prev = rest_span;
            chain.store(after, after_hdr);
        }
    }

    /// Deallocate a previously allocated region, merging it with its free
    /// neighbours.
    ///
    /// Corruptions detected by the enabled checks are reported to
    /// [`Hooks::corrupted`]; if that returns, the heap is left untouched.
    ///
    /// # Time Complexity
    ///
    /// This method will complete in constant time.
    ///
    /// # Safety
    ///
    ///  - `ptr` must denote a region previously allocated via `self` from the
    ///    current buffer.
    ///  - The region must not have been deallocated already. (This is
    ///    detected if [`Config::CHECK_FREE_OF_FREE`] is enabled.)
    ///
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        let mut heap = self.lock();
        if let Err(corruption) = heap.deallocate_locked(ptr) {
            heap.report(corruption);
        }
    }

    unsafe fn deallocate_locked(&mut self, ptr: NonNull<u8>) -> Result<(), Corruption> {
        let chain = self.chain();
        let parity = C::PARITY.map_or(false, |level| level.on_free());

        let index = match chain.index_of(ptr) {
            Ok(index) => index,
            Err(offset) => {
                debug_assert!(
                    C::CHECK_BOUNDARY,
                    "{:p} was not allocated from this heap",
                    ptr
                );
                return Err(Corruption::Boundary { offset });
            }
        };

        // Validate everything before modifying anything
        let hdr = chain.checked_header(index, parity)?;
        if C::CHECK_FREE_OF_FREE && hdr.free {
            return Err(Corruption::DoubleFree {
                offset: index * C::BLOCK_SIZE,
            });
        }

        let next = match chain.next_of(index, hdr.next) {
            Some(next) => Some((next, chain.checked_header(next, parity)?)),
            None => None,
        };

        let prev = if hdr.prev > 0 {
            let prev = index
                .checked_sub(hdr.prev)
                .ok_or(Corruption::Boundary {
                    offset: index * C::BLOCK_SIZE,
                })?;
            Some((prev, chain.checked_header(prev, parity)?))
        } else {
            None
        };

        // The header following the merged region, whose `prev` we should
        // update
        let after = match next {
            Some((next, next_hdr)) if next_hdr.free => {
                match chain.next_of(next, next_hdr.next) {
                    Some(after) => Some((after, chain.checked_header(after, parity)?)),
                    None => None,
                }
            }
            next => next,
        };

        if C::CALC_FREE {
            self.free += hdr.next;
        }

        let mut block = index;
        let mut block_hdr = Header {
            free: true,
            next: hdr.next,
            prev: hdr.prev,
        };

        // Merge with the next region if it's free
        if let Some((next, next_hdr)) = next {
            if next_hdr.free {
                block_hdr.next += next_hdr.next;
                self.seek.forget(next);
            }
        }

        // Merge into the previous region if it's free. `block` moves to where
        // the previous region is located.
        if let Some((prev, prev_hdr)) = prev {
            if prev_hdr.free {
                block_hdr.next += prev_hdr.next;
                block_hdr.prev = prev_hdr.prev;
                self.seek.forget(index);
                self.seek.forget(prev);
                block = prev;
            }
        }

        chain.store(block, block_hdr);
        self.seek
            .offer(block, block_hdr.next, |i| unsafe { chain.header(i).free });
        self.hooks.on_freed(chain.payload(block, block_hdr.next));

        if let Some((after, mut after_hdr)) = after {
            debug_assert_eq!(Some(after), chain.next_of(block, block_hdr.next));
            after_hdr.prev = block_hdr.next;
            chain.store(after, after_hdr);
        }

        log::trace!(
            "deallocate({:p}): free region of {} blocks at {}",
            ptr,
            block_hdr.next,
            block
        );

        Ok(())
    }

    #[cold]
    fn report(&mut self, corruption: Corruption) {
        log::error!("heap corrupted: {}", corruption);
        self.hooks.corrupted(corruption);
    }

    /// Call [`Hooks::lock`]. The returned guard calls [`Hooks::unlock`] when
    /// dropped, even while unwinding.
    #[inline]
    fn lock(&mut self) -> Locked<'_, 'pool, C, H> {
        self.hooks.lock();
        Locked { heap: self }
    }
}

/// A [`TinyHeap`] between [`Hooks::lock`] and [`Hooks::unlock`].
struct Locked<'a, 'pool, C: Config, H: Hooks> {
    heap: &'a mut TinyHeap<'pool, C, H>,
}

impl<'pool, C: Config, H: Hooks> ops::Deref for Locked<'_, 'pool, C, H> {
    type Target = TinyHeap<'pool, C, H>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.heap
    }
}

impl<C: Config, H: Hooks> ops::DerefMut for Locked<'_, '_, C, H> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.heap
    }
}

impl<C: Config, H: Hooks> Drop for Locked<'_, '_, C, H> {
    #[inline]
    fn drop(&mut self) {
        self.heap.hooks.unlock();
    }
}

impl<C: Config, H> fmt::Debug for TinyHeap<'_, C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TinyHeap")
            .field("base", &self.base)
            .field("blocks", &self.blocks)
            .field("free", &self.free)
            .field("seek", &self.seek)
            .finish()
    }
}

/// An iterator over the regions of a [`TinyHeap`]. Created by
/// [`TinyHeap::regions`].
pub struct Regions<'a, C> {
    chain: Chain<C>,
    index: usize,
    _phantom: PhantomData<&'a ()>,
}

impl<C: Config> Iterator for Regions<'_, C> {
    type Item = Region;

    fn next(&mut self) -> Option<Region> {
        if self.index >= self.chain.blocks {
            return None;
        }

        // Safety: `index` is a header index within the chain
        let word = unsafe { self.chain.load(self.index) };
        let hdr = Header::decode(word).0;
        let region = Region {
            offset: self.index * C::BLOCK_SIZE,
            len: hdr.next * C::BLOCK_SIZE,
            free: hdr.free,
            prev_span: hdr.prev,
            parity_ok: C::PARITY.map(|_| Header::check(word)),
        };

        // Stop at a zero-length region instead of looping forever
        self.index = if hdr.next == 0 {
            self.chain.blocks
        } else {
            self.index + hdr.next
        };

        Some(region)
    }
}
