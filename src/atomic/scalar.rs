//! Numeric seam shared by the CAS-loop cells.
//!
//! [`AtomicScalar`] maps each supported primitive to its atomic backing store
//! so that [`Clamp`](crate::atomic::Clamp), [`MinMax`](crate::atomic::MinMax),
//! and [`BoundCounter`](crate::atomic::BoundCounter) can share one
//! load-check-CAS skeleton. Integers use their native atomics; `f32`/`f64`
//! live in bit-cast `AtomicU32`/`AtomicU64`, so a CAS compares bit patterns
//! and every NaN payload round-trips unchanged.
//!
//! All accesses are `Relaxed`: the cells carry no ordering obligations beyond
//! the variable itself. `is_nan` returns `false` for integers, so the NaN
//! branches in the cells monomorphize away for integer instantiations.

use std::sync::atomic::{
    AtomicI32, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering,
};

mod sealed {
    pub trait Sealed {}
}

/// A primitive numeric type usable inside the atomic cell family.
///
/// Implemented for `i32`, `i64`, `u32`, `u64`, `usize`, `f32`, and `f64`.
/// The trait is sealed; the hidden items are implementation detail of the
/// cells and not meant to be called directly.
pub trait AtomicScalar:
    Copy
    + PartialOrd
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + Send
    + Sync
    + sealed::Sealed
    + 'static
{
    #[doc(hidden)]
    type Atomic: Send + Sync;

    #[doc(hidden)]
    const ZERO: Self;

    #[doc(hidden)]
    fn atomic_new(value: Self) -> Self::Atomic;

    #[doc(hidden)]
    fn atomic_load(cell: &Self::Atomic) -> Self;

    #[doc(hidden)]
    fn atomic_compare_exchange_weak(
        cell: &Self::Atomic,
        current: Self,
        new: Self,
    ) -> Result<Self, Self>;

    #[doc(hidden)]
    #[inline]
    fn is_nan(self) -> bool {
        false
    }

    #[doc(hidden)]
    fn is_negative(self) -> bool;
}

macro_rules! impl_signed_scalar {
    ($($ty:ty => $atomic:ty),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}

        impl AtomicScalar for $ty {
            type Atomic = $atomic;

            const ZERO: Self = 0;

            #[inline]
            fn atomic_new(value: Self) -> Self::Atomic {
                <$atomic>::new(value)
            }

            #[inline]
            fn atomic_load(cell: &Self::Atomic) -> Self {
                cell.load(Ordering::Relaxed)
            }

            #[inline]
            fn atomic_compare_exchange_weak(
                cell: &Self::Atomic,
                current: Self,
                new: Self,
            ) -> Result<Self, Self> {
                cell.compare_exchange_weak(current, new, Ordering::Relaxed, Ordering::Relaxed)
            }

            #[inline]
            fn is_negative(self) -> bool {
                self < 0
            }
        }
    )*};
}

macro_rules! impl_unsigned_scalar {
    ($($ty:ty => $atomic:ty),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}

        impl AtomicScalar for $ty {
            type Atomic = $atomic;

            const ZERO: Self = 0;

            #[inline]
            fn atomic_new(value: Self) -> Self::Atomic {
                <$atomic>::new(value)
            }

            #[inline]
            fn atomic_load(cell: &Self::Atomic) -> Self {
                cell.load(Ordering::Relaxed)
            }

            #[inline]
            fn atomic_compare_exchange_weak(
                cell: &Self::Atomic,
                current: Self,
                new: Self,
            ) -> Result<Self, Self> {
                cell.compare_exchange_weak(current, new, Ordering::Relaxed, Ordering::Relaxed)
            }

            #[inline]
            fn is_negative(self) -> bool {
                false
            }
        }
    )*};
}

macro_rules! impl_float_scalar {
    ($($ty:ty => $atomic:ty),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}

        impl AtomicScalar for $ty {
            type Atomic = $atomic;

            const ZERO: Self = 0.0;

            #[inline]
            fn atomic_new(value: Self) -> Self::Atomic {
                <$atomic>::new(value.to_bits())
            }

            #[inline]
            fn atomic_load(cell: &Self::Atomic) -> Self {
                <$ty>::from_bits(cell.load(Ordering::Relaxed))
            }

            #[inline]
            fn atomic_compare_exchange_weak(
                cell: &Self::Atomic,
                current: Self,
                new: Self,
            ) -> Result<Self, Self> {
                cell.compare_exchange_weak(
                    current.to_bits(),
                    new.to_bits(),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .map(<$ty>::from_bits)
                .map_err(<$ty>::from_bits)
            }

            #[inline]
            fn is_nan(self) -> bool {
                <$ty>::is_nan(self)
            }

            #[inline]
            fn is_negative(self) -> bool {
                self < 0.0
            }
        }
    )*};
}

impl_signed_scalar!(i32 => AtomicI32, i64 => AtomicI64);
impl_unsigned_scalar!(u32 => AtomicU32, u64 => AtomicU64, usize => AtomicUsize);
impl_float_scalar!(f32 => AtomicU32, f64 => AtomicU64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_values_round_trip_through_bits() {
        let cell = <f64 as AtomicScalar>::atomic_new(1.5);
        assert_eq!(<f64 as AtomicScalar>::atomic_load(&cell), 1.5);
        // weak CAS may fail spuriously, so retry
        while <f64 as AtomicScalar>::atomic_compare_exchange_weak(&cell, 1.5, -2.25).is_err() {}
        assert_eq!(<f64 as AtomicScalar>::atomic_load(&cell), -2.25);
    }

    #[test]
    fn nan_payload_survives_cas() {
        let nan = f64::from_bits(0x7ff8_0000_0000_1234);
        let cell = <f64 as AtomicScalar>::atomic_new(nan);
        let loaded = <f64 as AtomicScalar>::atomic_load(&cell);
        assert_eq!(loaded.to_bits(), nan.to_bits());
        while <f64 as AtomicScalar>::atomic_compare_exchange_weak(&cell, loaded, 0.0).is_err() {}
        assert_eq!(<f64 as AtomicScalar>::atomic_load(&cell), 0.0);
    }

    #[test]
    fn integer_is_nan_is_always_false() {
        assert!(!AtomicScalar::is_nan(i64::MIN));
        assert!(!AtomicScalar::is_nan(u32::MAX));
    }

    #[test]
    fn negativity_matches_sign() {
        assert!(AtomicScalar::is_negative(-1i32));
        assert!(!AtomicScalar::is_negative(0i32));
        assert!(!AtomicScalar::is_negative(3usize));
        assert!(AtomicScalar::is_negative(-0.5f64));
    }

    #[test]
    fn failed_cas_reports_current_value() {
        let cell = <u64 as AtomicScalar>::atomic_new(10);
        let err = <u64 as AtomicScalar>::atomic_compare_exchange_weak(&cell, 3, 4);
        assert_eq!(err, Err(10));
    }
}
