//! Fit strategies
use core::fmt;

/// Decides which free region satisfying a request is taken.
///
/// While scanning, a candidate whose leftover (`span - requested`, in
/// blocks) is accepted by [`accept`](Self::accept) is taken immediately.
/// Otherwise the candidate with the smallest leftover is remembered and taken
/// once the scan has visited every region.
pub trait PickStrategy {
    /// The largest leftover, in blocks, that is taken without looking further.
    const TOLERANCE: usize;

    #[inline]
    fn accept(delta: usize) -> bool {
        delta <= Self::TOLERANCE
    }

    /// Describe the strategy for [`Dump`](crate::Dump).
    fn describe(f: &mut fmt::Formatter<'_>, block_size: usize) -> fmt::Result;
}

/// Take the first region that is large enough.
#[derive(Debug)]
pub struct FirstFit;

impl PickStrategy for FirstFit {
    const TOLERANCE: usize = usize::MAX;

    fn describe(f: &mut fmt::Formatter<'_>, _: usize) -> fmt::Result {
        write!(f, "first found")
    }
}

/// Take a region that fits exactly, or the one with the smallest leftover.
#[derive(Debug)]
pub struct BestFit;

impl PickStrategy for BestFit {
    const TOLERANCE: usize = 0;

    fn describe(f: &mut fmt::Formatter<'_>, _: usize) -> fmt::Result {
        write!(f, "best fit")
    }
}

/// Take the first region leaving at most `TOLERANCE` blocks unused; failing
/// that, the one with the smallest leftover. `GoodEnoughFit<0>` behaves like
/// [`BestFit`].
#[derive(Debug)]
pub struct GoodEnoughFit<const TOLERANCE: usize>;

impl<const TOLERANCE: usize> PickStrategy for GoodEnoughFit<TOLERANCE> {
    const TOLERANCE: usize = TOLERANCE;

    fn describe(f: &mut fmt::Formatter<'_>, block_size: usize) -> fmt::Result {
        write!(f, "good enough +-{}", TOLERANCE.saturating_mul(block_size))
    }
}
