//! Diagnostic rendering of a heap's state
use core::fmt;

use super::{payload_offset, TinyHeap};
use crate::{
    config::{Config, ParityCheck},
    int::HeaderWord,
    pick::PickStrategy,
    seek::SeekStrategy,
};

/// The number of payload bytes shown for each region.
const PREVIEW_LEN: usize = 16;

/// Renders the state of a [`TinyHeap`] when formatted with `{}`. Created by
/// [`TinyHeap::dump`].
///
/// The output looks like this:
///
/// ```text
/// heap data:0x7ffd5a4c1e40  size:320  blocksize:32  addr.bits:8
/// heap free:256
/// heap parity check: always
/// heap seek strategy: min max  small:None  big:Some(2)  med:96
/// heap pick strategy: good enough +-32
/// heap traverse:
///   0x7ffd5a4c1e40 BUSY prv:0000 nxt:0002 len:0064 OK
///     aa aa aa aa aa aa aa aa aa aa aa aa aa aa aa aa
///   0x7ffd5a4c1e80 FREE prv:0002 nxt:0008 len:0256 OK
///     ff ff ff ff ff ff ff ff ff ff ff ff ff ff ff ff
/// ```
pub struct Dump<'a, 'pool, C: Config, H> {
    pub(super) heap: &'a TinyHeap<'pool, C, H>,
}

impl<C: Config, H> fmt::Display for Dump<'_, '_, C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heap = self.heap;
        let chain = heap.chain();

        writeln!(
            f,
            "heap data:{:p}  size:{}  blocksize:{}  addr.bits:{}",
            heap.base,
            heap.capacity(),
            C::BLOCK_SIZE,
            <C::Word as HeaderWord>::BITS / 2
        )?;

        if let Some(free) = heap.free_bytes() {
            writeln!(f, "heap free:{}", free)?;
        }

        if let Some(level) = C::PARITY {
            let when = match level {
                ParityCheck::DuringFree => "during free",
                ParityCheck::DuringAllocate => "during allocate",
                ParityCheck::Always => "always",
            };
            writeln!(f, "heap parity check: {}", when)?;
        }

        f.write_str("heap seek strategy: ")?;
        heap.seek.describe(f, C::BLOCK_SIZE)?;
        f.write_str("\nheap pick strategy: ")?;
        C::Pick::describe(f, C::BLOCK_SIZE)?;
        f.write_str("\n")?;

        if let Some(cycles) = heap.search_cycles() {
            writeln!(f, "heap search cycles:{}", cycles)?;
        }

        writeln!(f, "heap traverse:")?;

        for region in heap.regions() {
            let index = region.offset / C::BLOCK_SIZE;
            write!(
                f,
                "  {:p} {} prv:{:04} nxt:{:04} len:{:04}",
                chain.header_ptr(index),
                if region.free { "FREE" } else { "BUSY" },
                region.prev_span,
                region.len / C::BLOCK_SIZE,
                region.len
            )?;
            match region.parity_ok {
                Some(true) => f.write_str(" OK")?,
                Some(false) => f.write_str(" BAD")?,
                None => {}
            }
            f.write_str("\n   ")?;

            let payload = chain.payload_ptr(index).as_ptr();
            // A corrupted span may claim bytes past the end of the heap
            let len = region
                .len
                .min(heap.capacity() - region.offset)
                .saturating_sub(payload_offset::<C>())
                .min(PREVIEW_LEN);
            for i in 0..len {
                // Safety: The pool is initialized and `i` is within the
                //         region's payload
                let byte = unsafe { payload.add(i).read() };
                write!(f, " {:02x}", byte)?;
            }
            f.write_str("\n")?;
        }

        Ok(())
    }
}

impl<C: Config, H> fmt::Debug for Dump<'_, '_, C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
