//! Fixed-width values that can be moved through the adapters as raw bytes.
//!
//! Values are encoded in the platform's native byte order, exactly as they sit in memory. Data meant
//! to cross machines needs its endianness handled by the caller.

mod sealed {
    pub trait Sealed {}
}

/// A plain numeric type with a fixed size and no padding.
pub trait Scalar: Copy + sealed::Sealed {
    /// `[u8; size_of::<Self>()]`
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default;

    fn to_bytes(self) -> Self::Bytes;

    fn from_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Scalar for $ty {
                type Bytes = [u8; core::mem::size_of::<$ty>()];

                #[inline]
                fn to_bytes(self) -> Self::Bytes {
                    self.to_ne_bytes()
                }

                #[inline]
                fn from_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_ne_bytes(bytes)
                }
            }
        )*
    };
}

impl_scalar!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);
