//! Callbacks injected into a heap
use core::fmt;

use crate::Init;

/// A heap corruption detected by one of the optional checks.
///
/// Each variant carries the byte offset, from the start of the heap, of the
/// block header where the problem was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// A header's parity bit doesn't match its contents.
    Parity { offset: usize },
    /// The region being freed is already free.
    DoubleFree { offset: usize },
    /// The chain leads outside the heap, or a pointer being freed doesn't
    /// belong to it.
    Boundary { offset: usize },
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Parity { offset } => {
                write!(f, "parity mismatch in block header at offset {}", offset)
            }
            Self::DoubleFree { offset } => {
                write!(f, "double free of region at offset {}", offset)
            }
            Self::Boundary { offset } => {
                write!(f, "block chain out of bounds at offset {}", offset)
            }
        }
    }
}

/// Callbacks invoked by [`TinyHeap`](crate::TinyHeap).
///
/// Every method has a default. All of them do nothing, except for
/// [`corrupted`](Self::corrupted), which panics.
pub trait Hooks {
    /// Called on entry to `allocate` and `deallocate`.
    #[inline]
    fn lock(&mut self) {}

    /// Called on every exit from `allocate` and `deallocate`, including
    /// unwinding out of [`corrupted`](Self::corrupted).
    #[inline]
    fn unlock(&mut self) {}

    /// Called when a check fails. The heap is not repaired; if this method
    /// returns, the operation is abandoned without touching the chain
    /// (`allocate` returns `None`).
    #[cold]
    fn corrupted(&mut self, corruption: Corruption) {
        panic!("heap corrupted: {}", corruption);
    }

    /// Called with the payload of a newly allocated region.
    #[inline]
    fn on_allocated(&mut self, _payload: &mut [u8]) {}

    /// Called with the payload of a region after it was freed and merged
    /// with its neighbours.
    #[inline]
    fn on_freed(&mut self, _payload: &mut [u8]) {}

    /// Called with the payload of the free region split off an allocation.
    #[inline]
    fn on_split_freed(&mut self, _payload: &mut [u8]) {}
}

/// The default [`Hooks`]: no-ops, and a panic on corruption.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl Init for NoHooks {
    const INIT: Self = Self;
}

impl Hooks for NoHooks {}
