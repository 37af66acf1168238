//! Provides `HeaderWord`, a trait for the unsigned integer types a block header
//! can be packed into.
use core::fmt;

/// An unsigned integer type used as the storage of a block header.
///
/// A header word of `N` bits holds two spans of `N / 2 - 1` bits each, plus a
/// free flag and a parity bit. The word type therefore determines the
/// *addressing bits* (`N / 2`) of a heap and the maximum number of blocks it
/// can manage.
///
/// This trait is sealed; it's implemented for `u8`, `u16`, `u32`, and `u64`.
pub trait HeaderWord: private::Sealed + Copy + fmt::Debug + fmt::LowerHex + Eq + 'static {
    /// The number of bits in `Self`.
    const BITS: u32;

    /// Convert `Self` into `u64` (zero-extending).
    fn to_u64(self) -> u64;

    /// Convert `u64` into `Self`, discarding the bits that don't fit.
    fn from_u64_truncating(x: u64) -> Self;

    /// The number of bits available to each span field.
    const SPAN_BITS: u32 = Self::BITS / 2 - 1;

    /// The largest value a span field can hold.
    const MAX_SPAN: u64 = (1u64 << Self::SPAN_BITS) - 1;
}

mod private {
    pub trait Sealed {}
}

macro_rules! impl_header_word {
    ($($ty:ty),*) => {$(
        impl private::Sealed for $ty {}

        impl HeaderWord for $ty {
            const BITS: u32 = core::mem::size_of::<$ty>() as u32 * 8;

            #[inline]
            fn to_u64(self) -> u64 {
                self as u64
            }

            #[inline]
            fn from_u64_truncating(x: u64) -> Self {
                x as $ty
            }
        }
    )*};
}

impl_header_word!(u8, u16, u32, u64);
