//! Compile-time heap configuration
use crate::{
    int::HeaderWord,
    pick::{GoodEnoughFit, PickStrategy},
    seek::{MinMax, SeekStrategy},
};

/// When block header parity is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParityCheck {
    /// Check the headers touched by [`TinyHeap::deallocate`].
    ///
    /// [`TinyHeap::deallocate`]: crate::TinyHeap::deallocate
    DuringFree,
    /// Check every header visited while searching for a free region.
    DuringAllocate,
    /// Both of the above.
    Always,
}

impl ParityCheck {
    #[inline]
    pub(crate) const fn on_free(self) -> bool {
        matches!(self, Self::DuringFree | Self::Always)
    }

    #[inline]
    pub(crate) const fn on_allocate(self) -> bool {
        matches!(self, Self::DuringAllocate | Self::Always)
    }
}

/// The configuration of a [`TinyHeap`], bound into the heap's type.
///
/// Only [`Word`](Self::Word), [`Seek`](Self::Seek), [`Pick`](Self::Pick), and
/// [`BLOCK_SIZE`](Self::BLOCK_SIZE) have to be given; everything else
/// defaults to the safest setting.
///
/// Invalid combinations are rejected when the heap type is instantiated:
///
///  - `ALIGN` must be a power of two.
///  - `BLOCK_SIZE` must be a multiple of `ALIGN`.
///  - `BLOCK_SIZE` must be large enough to hold the header and its padding.
///
/// ```rust
/// use tinyheap::{BestFit, Config, LastFree, ParityCheck};
///
/// struct Small;
///
/// impl Config for Small {
///     type Word = u32;
///     type Seek = LastFree;
///     type Pick = BestFit;
///     const BLOCK_SIZE: usize = 16;
///     const PARITY: Option<ParityCheck> = Some(ParityCheck::DuringFree);
/// }
/// ```
///
/// [`TinyHeap`]: crate::TinyHeap
pub trait Config {
    /// The header storage. Its width sets the addressing bits (half of the
    /// width), which bounds the number of blocks a heap can manage to
    /// `2^(addressing bits - 1) - 1`.
    type Word: HeaderWord;

    /// The free-region search strategy.
    type Seek: SeekStrategy;

    /// The fit strategy.
    type Pick: PickStrategy;

    /// The size of a block in bytes.
    const BLOCK_SIZE: usize;

    /// The alignment of returned pointers. Defaults to the pointer width.
    const ALIGN: usize = core::mem::align_of::<usize>();

    /// Keep track of the number of free bytes.
    const CALC_FREE: bool = true;

    /// Detect chain traversals that run past the end of the heap, and pointers
    /// passed to `deallocate` that don't belong to the heap.
    const CHECK_BOUNDARY: bool = true;

    /// Detect freeing a region that is already free.
    const CHECK_FREE_OF_FREE: bool = true;

    /// Maintain a parity bit in each header and verify it at the given
    /// points. `None` disables parity altogether.
    const PARITY: Option<ParityCheck> = Some(ParityCheck::Always);

    /// Count the headers visited by free-region searches.
    const COUNT_SEARCH_CYCLES: bool = false;
}

/// The stock configuration: 8 addressing bits (at most 127 blocks), 32-byte
/// blocks, every check enabled, min-max seeking with a median of 3 blocks,
/// and a good-enough fit accepting up to one block of slack.
#[derive(Debug)]
pub struct DefaultConfig;

impl Config for DefaultConfig {
    type Word = u16;
    type Seek = MinMax<3>;
    type Pick = GoodEnoughFit<1>;
    const BLOCK_SIZE: usize = 32;
}
