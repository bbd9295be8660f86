//! x86_64 kernels: AVX2 quantize and dequantize, SSE2 register-tile transposes.
//!
//! Only constructed after `is_x86_feature_detected!("avx2")` succeeded, which
//! is what makes the `target_feature` calls below sound. SSE2 is part of the
//! x86_64 baseline.

use super::{scalar, transpose_tiled, KernelPath, Preprocess};
use std::arch::x86_64::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct Avx2;

impl Preprocess for Avx2 {
    fn path(&self) -> KernelPath { KernelPath::Avx2 }

    fn quantize(&self, input: &[f32], scale: f32, output: &mut [i8]) {
        assert!(input.len() >= output.len(), "quantize: input shorter than output");
        unsafe { quantize_avx2(input, scale, output) }
    }

    fn transpose_i8(&self, input: &[i8], rows: usize, cols: usize, output: &mut [i8]) {
        transpose_tiled(input, rows, cols, output, 16, transpose_16x16_i8)
    }

    fn transpose_i16(&self, input: &[i16], rows: usize, cols: usize, output: &mut [i16]) {
        transpose_tiled(input, rows, cols, output, 8, transpose_8x8_i16)
    }

    fn transpose_i32(&self, input: &[i32], rows: usize, cols: usize, output: &mut [i32]) {
        transpose_tiled(input, rows, cols, output, 4, transpose_4x4_i32)
    }

    fn unquantize_add_bias(&self, input: &[i32], bias: &[f32], unquant_multiplier: f32, rows: usize, cols: usize, output: &mut [f32]) {
        let n = rows * cols;
        assert!(input.len() >= n && output.len() >= n && bias.len() >= cols, "unquantize_add_bias: short buffers");
        unsafe { unquantize_add_bias_avx2(input, bias, unquant_multiplier, rows, cols, output) }
    }
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn scale_round_clamp(p: *const f32, scale: __m256, lo: __m256, hi: __m256) -> __m256i {
    let v = _mm256_mul_ps(_mm256_loadu_ps(p), scale);
    // Zero NaN lanes, otherwise cvtps yields i32::MIN.
    let v = _mm256_and_ps(v, _mm256_cmp_ps(v, v, _CMP_ORD_Q));
    let v = _mm256_min_ps(_mm256_max_ps(v, lo), hi);
    // Default MXCSR rounding is round-half-to-even.
    _mm256_cvtps_epi32(v)
}

#[target_feature(enable = "avx2")]
unsafe fn quantize_avx2(input: &[f32], scale: f32, output: &mut [i8]) {
    let n = output.len();
    let scale_v = _mm256_set1_ps(scale);
    let lo = _mm256_set1_ps(-127.0);
    let hi = _mm256_set1_ps(127.0);
    // packs works per 128-bit lane; this restores element order.
    let order = _mm256_setr_epi32(0, 4, 1, 5, 2, 6, 3, 7);
    let src = input.as_ptr();
    let dst = output.as_mut_ptr();
    let mut i = 0;
    while i + 32 <= n {
        let a = scale_round_clamp(src.add(i), scale_v, lo, hi);
        let b = scale_round_clamp(src.add(i + 8), scale_v, lo, hi);
        let c = scale_round_clamp(src.add(i + 16), scale_v, lo, hi);
        let d = scale_round_clamp(src.add(i + 24), scale_v, lo, hi);
        let ab = _mm256_packs_epi32(a, b);
        let cd = _mm256_packs_epi32(c, d);
        let abcd = _mm256_packs_epi16(ab, cd);
        _mm256_storeu_si256(dst.add(i) as *mut __m256i, _mm256_permutevar8x32_epi32(abcd, order));
        i += 32;
    }
    scalar::quantize(&input[i..n], scale, &mut output[i..n]);
}

#[target_feature(enable = "avx2")]
unsafe fn unquantize_add_bias_avx2(input: &[i32], bias: &[f32], unquant_multiplier: f32, rows: usize, cols: usize, output: &mut [f32]) {
    let mult = _mm256_set1_ps(unquant_multiplier);
    for i in 0..rows {
        let row_in = input.as_ptr().add(i * cols);
        let row_out = output.as_mut_ptr().add(i * cols);
        let mut j = 0;
        while j + 8 <= cols {
            let acc = _mm256_cvtepi32_ps(_mm256_loadu_si256(row_in.add(j) as *const __m256i));
            // mul then add, no fma: must match the scalar rounding exactly.
            let v = _mm256_add_ps(_mm256_mul_ps(acc, mult), _mm256_loadu_ps(bias.as_ptr().add(j)));
            _mm256_storeu_ps(row_out.add(j), v);
            j += 8;
        }
        while j < cols {
            *row_out.add(j) = *row_in.add(j) as f32 * unquant_multiplier + bias[j];
            j += 1;
        }
    }
}

// Register-tile transposes. Each round pairs register r with r + n/2 and
// interleaves them; element (row, col) moves to the position whose bit string
// row||col is rotated left by one. log2(n) rounds rotate by log2(n), swapping
// row and col bits.

unsafe fn transpose_16x16_i8(src: *const i8, src_stride: usize, dst: *mut i8, dst_stride: usize) {
    let mut r = [_mm_setzero_si128(); 16];
    for (k, reg) in r.iter_mut().enumerate() {
        *reg = _mm_loadu_si128(src.add(k * src_stride) as *const __m128i);
    }
    for _ in 0..4 {
        let mut next = [_mm_setzero_si128(); 16];
        for i in 0..8 {
            next[2 * i] = _mm_unpacklo_epi8(r[i], r[i + 8]);
            next[2 * i + 1] = _mm_unpackhi_epi8(r[i], r[i + 8]);
        }
        r = next;
    }
    for (k, reg) in r.iter().enumerate() {
        _mm_storeu_si128(dst.add(k * dst_stride) as *mut __m128i, *reg);
    }
}

unsafe fn transpose_8x8_i16(src: *const i16, src_stride: usize, dst: *mut i16, dst_stride: usize) {
    let mut r = [_mm_setzero_si128(); 8];
    for (k, reg) in r.iter_mut().enumerate() {
        *reg = _mm_loadu_si128(src.add(k * src_stride) as *const __m128i);
    }
    for _ in 0..3 {
        let mut next = [_mm_setzero_si128(); 8];
        for i in 0..4 {
            next[2 * i] = _mm_unpacklo_epi16(r[i], r[i + 4]);
            next[2 * i + 1] = _mm_unpackhi_epi16(r[i], r[i + 4]);
        }
        r = next;
    }
    for (k, reg) in r.iter().enumerate() {
        _mm_storeu_si128(dst.add(k * dst_stride) as *mut __m128i, *reg);
    }
}

unsafe fn transpose_4x4_i32(src: *const i32, src_stride: usize, dst: *mut i32, dst_stride: usize) {
    let mut r = [_mm_setzero_si128(); 4];
    for (k, reg) in r.iter_mut().enumerate() {
        *reg = _mm_loadu_si128(src.add(k * src_stride) as *const __m128i);
    }
    for _ in 0..2 {
        let next = [
            _mm_unpacklo_epi32(r[0], r[2]),
            _mm_unpackhi_epi32(r[0], r[2]),
            _mm_unpacklo_epi32(r[1], r[3]),
            _mm_unpackhi_epi32(r[1], r[3]),
        ];
        r = next;
    }
    for (k, reg) in r.iter().enumerate() {
        _mm_storeu_si128(dst.add(k * dst_stride) as *mut __m128i, *reg);
    }
}
