// src/simd/neon.rs
//! NEON backend for aarch64, where NEON is part of the base target. One
//! 16-lane vector is carried as a pair of 128-bit registers.

use super::{Lanes, SimdKernel};
use std::arch::aarch64::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct Neon;

#[derive(Clone, Copy)]
pub struct NeonVector {
    lo: int16x8_t,
    hi: int16x8_t,
}

/// Apply a 128-bit intrinsic to both halves.
macro_rules! lanewise {
    ($f:ident, $a:expr, $b:expr) => {{
        let (a, b) = ($a, $b);
        unsafe {
            NeonVector {
                lo: $f(a.lo, b.lo),
                hi: $f(a.hi, b.hi),
            }
        }
    }};
}

#[inline(always)]
unsafe fn mulhi8(x: int16x8_t, y: int16x8_t) -> int16x8_t {
    // Widen to i32 products, then narrow the upper halves back.
    let low = vmull_s16(vget_low_s16(x), vget_low_s16(y));
    let high = vmull_high_s16(x, y);
    vcombine_s16(vshrn_n_s32::<16>(low), vshrn_n_s32::<16>(high))
}

impl SimdKernel for Neon {
    type Vector = NeonVector;

    #[inline(always)]
    fn zero() -> NeonVector {
        Self::splat(0)
    }

    #[inline(always)]
    fn splat(value: i16) -> NeonVector {
        unsafe {
            let v = vdupq_n_s16(value);
            NeonVector { lo: v, hi: v }
        }
    }

    #[inline(always)]
    fn load(src: &Lanes) -> NeonVector {
        unsafe {
            let ptr = src.0.as_ptr();
            NeonVector {
                lo: vld1q_s16(ptr),
                hi: vld1q_s16(ptr.add(8)),
            }
        }
    }

    #[inline(always)]
    fn store(dst: &mut Lanes, v: NeonVector) {
        unsafe {
            let ptr = dst.0.as_mut_ptr();
            vst1q_s16(ptr, v.lo);
            vst1q_s16(ptr.add(8), v.hi);
        }
    }

    #[inline(always)]
    fn add(a: NeonVector, b: NeonVector) -> NeonVector {
        lanewise!(vaddq_s16, a, b)
    }

    #[inline(always)]
    fn sub(a: NeonVector, b: NeonVector) -> NeonVector {
        lanewise!(vsubq_s16, a, b)
    }

    #[inline(always)]
    fn mulhi(a: NeonVector, b: NeonVector) -> NeonVector {
        lanewise!(mulhi8, a, b)
    }

    #[inline(always)]
    fn min(a: NeonVector, b: NeonVector) -> NeonVector {
        lanewise!(vminq_s16, a, b)
    }

    #[inline(always)]
    fn max(a: NeonVector, b: NeonVector) -> NeonVector {
        lanewise!(vmaxq_s16, a, b)
    }

    #[inline(always)]
    fn hsum(v: NeonVector) -> i32 {
        unsafe { vaddvq_s32(vpaddlq_s16(v.lo)) + vaddvq_s32(vpaddlq_s16(v.hi)) }
    }
}
