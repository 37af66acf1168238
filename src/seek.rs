//! Free-region search strategies
//!
//! A strategy remembers *hints*: indices of block headers that were recently
//! seen free. A hint only decides where a search starts. It may name a header
//! that has since been allocated, in which case the search merely starts at a
//! less useful place and the hint is replaced by the next offer. The heap
//! calls [`SeekStrategy::forget`] for every header it merges away, so a hint
//! never names a location that isn't a header.
use core::fmt;

use crate::Init;

/// Chooses where the free-region search starts.
pub trait SeekStrategy: Init + fmt::Debug + Send + Sync {
    /// The block index to start searching at for a request of `blocks`
    /// blocks. `None` starts at the first header.
    fn start(&self, blocks: usize) -> Option<usize>;

    /// A free region of `span` blocks now starts at `index`. `is_free` tells
    /// whether the header at a hinted index is currently free.
    fn offer(&mut self, index: usize, span: usize, is_free: impl Fn(usize) -> bool);

    /// The header at `index` is about to stop being a free region header.
    fn forget(&mut self, index: usize);

    /// Describe the strategy and its current hints for
    /// [`Dump`](crate::Dump).
    fn describe(&self, f: &mut fmt::Formatter<'_>, block_size: usize) -> fmt::Result;
}

/// Always start searching at the first header.
#[derive(Debug)]
pub struct NoHint;

impl Init for NoHint {
    const INIT: Self = Self;
}

impl SeekStrategy for NoHint {
    #[inline]
    fn start(&self, _: usize) -> Option<usize> {
        None
    }

    #[inline]
    fn offer(&mut self, _: usize, _: usize, _: impl Fn(usize) -> bool) {}

    #[inline]
    fn forget(&mut self, _: usize) {}

    fn describe(&self, f: &mut fmt::Formatter<'_>, _: usize) -> fmt::Result {
        write!(f, "none")
    }
}

/// Start searching at the most recently freed (or split-off) region.
#[derive(Debug)]
pub struct LastFree {
    last: Option<usize>,
}

impl Init for LastFree {
    const INIT: Self = Self { last: None };
}

impl SeekStrategy for LastFree {
    #[inline]
    fn start(&self, _: usize) -> Option<usize> {
        self.last
    }

    #[inline]
    fn offer(&mut self, index: usize, _: usize, _: impl Fn(usize) -> bool) {
        self.last = Some(index);
    }

    #[inline]
    fn forget(&mut self, index: usize) {
        if self.last == Some(index) {
            self.last = None;
        }
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>, _: usize) -> fmt::Result {
        write!(f, "last free  last:{:?}", self.last)
    }
}

/// Keep one hint for small free regions (at most `MEDIAN` blocks) and one for
/// big ones. Small requests start at the small hint, big requests at the big
/// one, each falling back to the other.
#[derive(Debug)]
pub struct MinMax<const MEDIAN: usize> {
    small: Option<usize>,
    big: Option<usize>,
}

impl<const MEDIAN: usize> Init for MinMax<MEDIAN> {
    const INIT: Self = Self {
        small: None,
        big: None,
    };
}

impl<const MEDIAN: usize> SeekStrategy for MinMax<MEDIAN> {
    #[inline]
    fn start(&self, blocks: usize) -> Option<usize> {
        if blocks <= MEDIAN {
            self.small.or(self.big)
        } else {
            self.big.or(self.small)
        }
    }

    #[inline]
    fn offer(&mut self, index: usize, span: usize, is_free: impl Fn(usize) -> bool) {
        let hint = if span <= MEDIAN {
            &mut self.small
        } else {
            &mut self.big
        };

        // Keep a hint that still names a free region
        if hint.map_or(true, |i| !is_free(i)) {
            *hint = Some(index);
        }
    }

    #[inline]
    fn forget(&mut self, index: usize) {
        if self.small == Some(index) {
            self.small = None;
        }
        if self.big == Some(index) {
            self.big = None;
        }
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>, block_size: usize) -> fmt::Result {
        write!(
            f,
            "min max  small:{:?}  big:{:?}  med:{}",
            self.small,
            self.big,
            MEDIAN.saturating_mul(block_size)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_free() {
        let mut seek = LastFree::INIT;
        assert_eq!(seek.start(1), None);
        seek.offer(4, 2, |_| unreachable!());
        assert_eq!(seek.start(100), Some(4));
        seek.forget(3);
        assert_eq!(seek.start(1), Some(4));
        seek.forget(4);
        assert_eq!(seek.start(1), None);
    }

    #[test]
    fn min_max_partitions_by_median() {
        let mut seek = MinMax::<3>::INIT;
        seek.offer(10, 3, |_| true);
        assert_eq!(seek.small, Some(10));
        seek.offer(20, 4, |_| true);
        assert_eq!(seek.big, Some(20));

        assert_eq!(seek.start(1), Some(10));
        assert_eq!(seek.start(3), Some(10));
        assert_eq!(seek.start(4), Some(20));

        // Fall back to the other hint
        seek.forget(10);
        assert_eq!(seek.start(1), Some(20));
        seek.forget(20);
        seek.offer(30, 1, |_| true);
        assert_eq!(seek.start(50), Some(30));
    }

    #[test]
    fn min_max_keeps_live_hint() {
        let mut seek = MinMax::<3>::INIT;
        seek.offer(10, 2, |_| true);

        // The current hint is still free
        seek.offer(20, 2, |i| i == 10);
        assert_eq!(seek.small, Some(10));

        // The current hint has been allocated
        seek.offer(20, 2, |_| false);
        assert_eq!(seek.small, Some(20));
    }
}
