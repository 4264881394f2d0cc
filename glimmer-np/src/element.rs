use core::fmt;
use core::ops::{Add, Div, Mul, Sub};

mod sealed {
    pub trait Sealed {}
}

/// A numeric type that can be stored in an
/// [`NpArray`](crate::NpArray).
///
/// The trait is sealed: the ten implementations below are exactly the element
/// types the `.npy` codec understands.
pub trait Element:
    sealed::Sealed
    + Copy
    + Default
    + PartialEq
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + 'static
{
    /// The `.npy` type descriptor, without the byte-order marker (`"u1"`,
    /// `"i4"`, `"f8"`, ...).
    const DESCR: &'static str;

    /// Element width in bytes.
    const SIZE: usize;

    /// The lowest representable value (`-inf` for the float types).
    const LOWEST: Self;

    /// The highest representable value (`+inf` for the float types).
    const HIGHEST: Self;

    /// Decode one element from its little-endian byte representation.
    ///
    /// # Panics
    /// Panics if `bytes.len() != Self::SIZE`.
    fn from_le(bytes: &[u8]) -> Self;

    /// Append this element's little-endian byte representation to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Widening conversion, used by the `f64`-valued reductions.
    fn to_f64(self) -> f64;

    /// Narrowing `as`-cast from `f64`.
    fn from_f64(v: f64) -> Self;

    /// `as`-cast from `u64`, used when re-typing files on load.
    fn from_u64(v: u64) -> Self;

    /// `as`-cast from `i64`, used when re-typing files on load.
    fn from_i64(v: i64) -> Self;

    /// `as`-cast to `u64`.
    fn to_u64(self) -> u64;

    /// `as`-cast to `i64`.
    fn to_i64(self) -> i64;

    /// Absolute value. The identity for unsigned types.
    fn abs_value(self) -> Self;

    /// Negation, wrapping for the integer types.
    fn neg_value(self) -> Self;

    /// Absolute difference, safe against unsigned underflow.
    fn absdiff(self, rhs: Self) -> Self {
        if self >= rhs {
            self - rhs
        } else {
            rhs - self
        }
    }
}

macro_rules! element_common {
    ($t:ty, $descr:literal) => {
        const DESCR: &'static str = $descr;
        const SIZE: usize = core::mem::size_of::<$t>();

        fn from_le(bytes: &[u8]) -> Self {
            <$t>::from_le_bytes(bytes.try_into().expect("element byte width"))
        }

        fn write_le(self, out: &mut Vec<u8>) {
            out.extend_from_slice(&self.to_le_bytes());
        }

        fn to_f64(self) -> f64 {
            self as f64
        }

        fn from_f64(v: f64) -> Self {
            v as $t
        }

        fn from_u64(v: u64) -> Self {
            v as $t
        }

        fn from_i64(v: i64) -> Self {
            v as $t
        }

        fn to_u64(self) -> u64 {
            self as u64
        }

        fn to_i64(self) -> i64 {
            self as i64
        }
    };
}

macro_rules! unsigned_element {
    ($t:ty, $descr:literal) => {
        impl sealed::Sealed for $t {}
        impl Element for $t {
            element_common!($t, $descr);
            const LOWEST: Self = <$t>::MIN;
            const HIGHEST: Self = <$t>::MAX;

            fn abs_value(self) -> Self {
                self
            }

            fn neg_value(self) -> Self {
                self.wrapping_neg()
            }
        }
    };
}

macro_rules! signed_element {
    ($t:ty, $descr:literal) => {
        impl sealed::Sealed for $t {}
        impl Element for $t {
            element_common!($t, $descr);
            const LOWEST: Self = <$t>::MIN;
            const HIGHEST: Self = <$t>::MAX;

            fn abs_value(self) -> Self {
                self.wrapping_abs()
            }

            fn neg_value(self) -> Self {
                self.wrapping_neg()
            }
        }
    };
}

macro_rules! float_element {
    ($t:ty, $descr:literal) => {
        impl sealed::Sealed for $t {}
        impl Element for $t {
            element_common!($t, $descr);
            const LOWEST: Self = <$t>::NEG_INFINITY;
            const HIGHEST: Self = <$t>::INFINITY;

            fn abs_value(self) -> Self {
                self.abs()
            }

            fn neg_value(self) -> Self {
                -self
            }
        }
    };
}

unsigned_element!(u8, "u1");
unsigned_element!(u16, "u2");
unsigned_element!(u32, "u4");
unsigned_element!(u64, "u8");
signed_element!(i8, "i1");
signed_element!(i16, "i2");
signed_element!(i32, "i4");
signed_element!(i64, "i8");
float_element!(f32, "f4");
float_element!(f64, "f8");
