// src/simd/avx2.rs
//! AVX2 backend. Only compiled when the build enables the `avx2` target feature,
//! so the intrinsics below are always available at run time.

use super::{Lanes, SimdKernel};
use std::arch::x86_64::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct Avx2;

impl SimdKernel for Avx2 {
    type Vector = __m256i;

    #[inline(always)]
    fn zero() -> __m256i {
        unsafe { _mm256_setzero_si256() }
    }

    #[inline(always)]
    fn splat(value: i16) -> __m256i {
        unsafe { _mm256_set1_epi16(value) }
    }

    #[inline(always)]
    fn load(src: &Lanes) -> __m256i {
        // Lanes is 32-byte aligned.
        unsafe { _mm256_load_si256(src.0.as_ptr() as *const __m256i) }
    }

    #[inline(always)]
    fn store(dst: &mut Lanes, v: __m256i) {
        unsafe { _mm256_store_si256(dst.0.as_mut_ptr() as *mut __m256i, v) }
    }

    #[inline(always)]
    fn add(a: __m256i, b: __m256i) -> __m256i {
        unsafe { _mm256_add_epi16(a, b) }
    }

    #[inline(always)]
    fn sub(a: __m256i, b: __m256i) -> __m256i {
        unsafe { _mm256_sub_epi16(a, b) }
    }

    #[inline(always)]
    fn mulhi(a: __m256i, b: __m256i) -> __m256i {
        unsafe { _mm256_mulhi_epi16(a, b) }
    }

    #[inline(always)]
    fn min(a: __m256i, b: __m256i) -> __m256i {
        unsafe { _mm256_min_epi16(a, b) }
    }

    #[inline(always)]
    fn max(a: __m256i, b: __m256i) -> __m256i {
        unsafe { _mm256_max_epi16(a, b) }
    }

    #[inline(always)]
    fn hsum(v: __m256i) -> i32 {
        unsafe {
            // Pairwise widen to 8 x i32, then fold 256 -> 128 -> 64 -> 32 bits.
            let pairs = _mm256_madd_epi16(v, _mm256_set1_epi16(1));
            let lo = _mm256_castsi256_si128(pairs);
            let hi = _mm256_extracti128_si256::<1>(pairs);
            let sum4 = _mm_add_epi32(lo, hi);
            let sum2 = _mm_add_epi32(sum4, _mm_shuffle_epi32::<0b01_00_11_10>(sum4));
            let sum1 = _mm_add_epi32(sum2, _mm_shuffle_epi32::<0b10_11_00_01>(sum2));
            _mm_cvtsi128_si32(sum1)
        }
    }
}
