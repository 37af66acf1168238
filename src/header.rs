//! The block header codec
use crate::int::HeaderWord;

/// A decoded block header.
///
/// # Layout
///
/// In a header word of `2 * A` bits (`A` being the addressing bits):
///
/// | Bits         | Field                       |
/// | ------------ | --------------------------- |
/// | `0`          | [`free`](Self::free)        |
/// | `1..A`       | [`next`](Self::next)        |
/// | `A`          | parity                      |
/// | `A + 1..2 A` | [`prev`](Self::prev)        |
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    /// Whether the region is free.
    pub free: bool,
    /// The number of blocks from this header to the next one.
    pub next: usize,
    /// The number of blocks from this header back to the previous one. `0`
    /// means this is the first region.
    pub prev: usize,
}

impl Header {
    /// Calculate the parity bit for this header.
    ///
    /// This only mixes the lowest bit of each field, so it catches roughly
    /// half of the possible corruptions. It is not a checksum.
    #[inline]
    pub fn parity(&self) -> bool {
        ((!self.free as usize) ^ self.next ^ self.prev) & 1 != 0
    }

    /// Pack `self` into a header word. The parity bit is set only if
    /// `with_parity` is `true`; otherwise it's left cleared.
    #[inline]
    pub fn encode<W: HeaderWord>(&self, with_parity: bool) -> W {
        let addr_bits = W::BITS / 2;
        debug_assert!(self.next as u64 <= W::MAX_SPAN);
        debug_assert!(self.prev as u64 <= W::MAX_SPAN);

        let parity = with_parity && self.parity();
        W::from_u64_truncating(
            self.free as u64
                | (self.next as u64) << 1
                | (parity as u64) << addr_bits
                | (self.prev as u64) << (addr_bits + 1),
        )
    }

    /// Unpack a header word. Returns the header and the stored parity bit.
    #[inline]
    pub fn decode<W: HeaderWord>(word: W) -> (Self, bool) {
        let addr_bits = W::BITS / 2;
        let word = word.to_u64();
        let hdr = Self {
            free: word & 1 != 0,
            next: ((word >> 1) & W::MAX_SPAN) as usize,
            prev: ((word >> (addr_bits + 1)) & W::MAX_SPAN) as usize,
        };
        (hdr, (word >> addr_bits) & 1 != 0)
    }

    /// Check whether the parity bit stored in `word` matches its contents.
    #[inline]
    pub fn check<W: HeaderWord>(word: W) -> bool {
        let (hdr, parity) = Self::decode(word);
        hdr.parity() == parity
    }
}
