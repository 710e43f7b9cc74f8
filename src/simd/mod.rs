// src/simd/mod.rs
//! 16-lane i16 vector kernel used by the NNUE accumulators and output layer.
//!
//! Every backend implements [`SimdKernel`] and must produce bit-identical results
//! to [`Scalar`]. The vector width is fixed at 256 bits (16 x i16); memory only
//! moves in and out of vectors through the 32-byte aligned [`Lanes`] buffer.
//!
//! Backends: AVX2 on x86_64 when the build enables `avx2`, NEON on aarch64,
//! scalar everywhere else.

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
mod avx2;

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
pub use avx2::Avx2;

#[cfg(target_arch = "aarch64")]
mod neon;

#[cfg(target_arch = "aarch64")]
pub use neon::Neon;

use crate::constants::{HIDDEN_CHUNKS, SIMD_LANES};

/// One vector worth of i16 lanes, aligned for 256-bit loads and stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C, align(32))]
pub struct Lanes(pub [i16; SIMD_LANES]);

/// A full hidden layer as a sequence of aligned lane blocks.
pub type HiddenVector = [Lanes; HIDDEN_CHUNKS];

pub const ZERO_HIDDEN: HiddenVector = [Lanes([0; SIMD_LANES]); HIDDEN_CHUNKS];

/// Fixed-width i16 vector operations.
///
/// `add` and `sub` wrap on overflow. `mulhi` keeps the upper 16 bits of the
/// signed 32-bit product. `hsum` widens every lane to i32 before summing.
pub trait SimdKernel {
    type Vector: Copy;

    fn zero() -> Self::Vector;
    fn splat(value: i16) -> Self::Vector;
    fn load(src: &Lanes) -> Self::Vector;
    fn store(dst: &mut Lanes, v: Self::Vector);
    fn add(a: Self::Vector, b: Self::Vector) -> Self::Vector;
    fn sub(a: Self::Vector, b: Self::Vector) -> Self::Vector;
    fn mulhi(a: Self::Vector, b: Self::Vector) -> Self::Vector;
    fn min(a: Self::Vector, b: Self::Vector) -> Self::Vector;
    fn max(a: Self::Vector, b: Self::Vector) -> Self::Vector;
    fn hsum(v: Self::Vector) -> i32;
}

/// Kernel selected at build time.
#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
pub type NativeKernel = Avx2;

#[cfg(target_arch = "aarch64")]
pub type NativeKernel = Neon;

#[cfg(not(any(
    all(target_arch = "x86_64", target_feature = "avx2"),
    target_arch = "aarch64"
)))]
pub type NativeKernel = Scalar;

/// Portable reference backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scalar;

impl Scalar {
    #[inline(always)]
    fn zip(a: [i16; SIMD_LANES], b: [i16; SIMD_LANES], f: impl Fn(i16, i16) -> i16) -> [i16; SIMD_LANES] {
        let mut out = [0i16; SIMD_LANES];
        for i in 0..SIMD_LANES {
            out[i] = f(a[i], b[i]);
        }
        out
    }
}

impl SimdKernel for Scalar {
    type Vector = [i16; SIMD_LANES];

    #[inline(always)]
    fn zero() -> Self::Vector {
        [0; SIMD_LANES]
    }

    #[inline(always)]
    fn splat(value: i16) -> Self::Vector {
        [value; SIMD_LANES]
    }

    #[inline(always)]
    fn load(src: &Lanes) -> Self::Vector {
        src.0
    }

    #[inline(always)]
    fn store(dst: &mut Lanes, v: Self::Vector) {
        dst.0 = v;
    }

    #[inline(always)]
    fn add(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        Self::zip(a, b, i16::wrapping_add)
    }

    #[inline(always)]
    fn sub(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        Self::zip(a, b, i16::wrapping_sub)
    }

    #[inline(always)]
    fn mulhi(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        Self::zip(a, b, |x, y| ((x as i32 * y as i32) >> 16) as i16)
    }

    #[inline(always)]
    fn min(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        Self::zip(a, b, i16::min)
    }

    #[inline(always)]
    fn max(a: Self::Vector, b: Self::Vector) -> Self::Vector {
        Self::zip(a, b, i16::max)
    }

    #[inline(always)]
    fn hsum(v: Self::Vector) -> i32 {
        v.iter().map(|&x| x as i32).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lanes(f: impl Fn(usize) -> i16) -> Lanes {
        let mut out = Lanes::default();
        for (i, v) in out.0.iter_mut().enumerate() {
            *v = f(i);
        }
        out
    }

    fn check_kernel<K: SimdKernel>() {
        let a = lanes(|i| i16::MAX - i as i16);
        let b = lanes(|i| (i as i16 - 8) * 1234);
        let (va, vb) = (K::load(&a), K::load(&b));

        let mut out = Lanes::default();
        K::store(&mut out, K::add(va, vb));
        assert_eq!(out.0, Scalar::add(a.0, b.0));
        K::store(&mut out, K::sub(va, vb));
        assert_eq!(out.0, Scalar::sub(a.0, b.0));
        K::store(&mut out, K::mulhi(va, vb));
        assert_eq!(out.0, Scalar::mulhi(a.0, b.0));
        K::store(&mut out, K::min(va, vb));
        assert_eq!(out.0, Scalar::min(a.0, b.0));
        K::store(&mut out, K::max(va, vb));
        assert_eq!(out.0, Scalar::max(a.0, b.0));
        assert_eq!(K::hsum(va), Scalar::hsum(a.0));
        assert_eq!(K::hsum(K::splat(-3)), -48);
        assert_eq!(K::hsum(K::zero()), 0);
    }

    #[test]
    fn test_scalar_semantics() {
        assert_eq!(Scalar::add([i16::MAX; 16], [1; 16]), [i16::MIN; 16]);
        assert_eq!(Scalar::mulhi([16384; 16], [8; 16]), [2; 16]);
        assert_eq!(Scalar::mulhi([-1; 16], [1; 16]), [-1; 16]);
        assert_eq!(Scalar::hsum([i16::MAX; 16]), 16 * i16::MAX as i32);
    }

    #[test]
    fn test_native_matches_scalar() {
        check_kernel::<Scalar>();
        check_kernel::<NativeKernel>();
    }

    // Only built with RUSTFLAGS="-C target-feature=+avx2" (or target-cpu=native).
    #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
    #[test]
    fn test_avx2_matches_scalar() {
        check_kernel::<Avx2>();
    }

    #[cfg(target_arch = "aarch64")]
    #[test]
    fn test_neon_matches_scalar() {
        check_kernel::<Neon>();
    }

    #[test]
    fn test_kernel_edge_values() {
        fn check<K: SimdKernel>() {
            let a = lanes(|i| if i % 2 == 0 { i16::MIN } else { i16::MAX });
            let b = lanes(|i| if i < 8 { i16::MIN } else { -1 });
            let mut out = Lanes::default();
            K::store(&mut out, K::mulhi(K::load(&a), K::load(&b)));
            assert_eq!(out.0, Scalar::mulhi(a.0, b.0));
            assert_eq!(K::hsum(K::load(&a)), 8 * (i16::MIN as i32 + i16::MAX as i32));
        }
        check::<Scalar>();
        check::<NativeKernel>();
    }

    #[test]
    fn test_lanes_alignment() {
        assert_eq!(std::mem::align_of::<Lanes>(), 32);
        assert_eq!(std::mem::size_of::<HiddenVector>(), HIDDEN_CHUNKS * 32);
    }
}
