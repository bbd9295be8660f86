//! aarch64 NEON kernels. NEON is mandatory on aarch64, no runtime check needed.

use super::{scalar, transpose_tiled, KernelPath, Preprocess};
use std::arch::aarch64::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct Neon;

impl Preprocess for Neon {
    fn path(&self) -> KernelPath { KernelPath::Neon }

    fn quantize(&self, input: &[f32], scale: f32, output: &mut [i8]) {
        assert!(input.len() >= output.len(), "quantize: input shorter than output");
        unsafe { quantize_neon(input, scale, output) }
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
        unsafe { unquantize_add_bias_neon(input, bias, unquant_multiplier, rows, cols, output) }
    }
}

unsafe fn quantize_neon(input: &[f32], scale: f32, output: &mut [i8]) {
    let n = output.len();
    let floor = vdup_n_s8(-127);
    let src = input.as_ptr();
    let dst = output.as_mut_ptr();
    let mut i = 0;
    while i + 8 <= n {
        // vcvtn rounds half to even; NaN converts to 0.
        let lo = vcvtnq_s32_f32(vmulq_n_f32(vld1q_f32(src.add(i)), scale));
        let hi = vcvtnq_s32_f32(vmulq_n_f32(vld1q_f32(src.add(i + 4)), scale));
        let s16 = vcombine_s16(vqmovn_s32(lo), vqmovn_s32(hi));
        // Saturating narrow stops at -128.
        let s8 = vmax_s8(vqmovn_s16(s16), floor);
        vst1_s8(dst.add(i), s8);
        i += 8;
    }
    scalar::quantize(&input[i..n], scale, &mut output[i..n]);
}

unsafe fn unquantize_add_bias_neon(input: &[i32], bias: &[f32], unquant_multiplier: f32, rows: usize, cols: usize, output: &mut [f32]) {
    for i in 0..rows {
        let row_in = input.as_ptr().add(i * cols);
        let row_out = output.as_mut_ptr().add(i * cols);
        let mut j = 0;
        while j + 4 <= cols {
            let acc = vcvtq_f32_s32(vld1q_s32(row_in.add(j)));
            let v = vaddq_f32(vmulq_n_f32(acc, unquant_multiplier), vld1q_f32(bias.as_ptr().add(j)));
            vst1q_f32(row_out.add(j), v);
            j += 4;
        }
        while j < cols {
            *row_out.add(j) = *row_in.add(j) as f32 * unquant_multiplier + bias[j];
            j += 1;
        }
    }
}

// Same perfect-shuffle network as the x86 tiles, with zip1/zip2 as the interleave.

unsafe fn transpose_16x16_i8(src: *const i8, src_stride: usize, dst: *mut i8, dst_stride: usize) {
    let mut r = [vdupq_n_s8(0); 16];
    for (k, reg) in r.iter_mut().enumerate() {
        *reg = vld1q_s8(src.add(k * src_stride));
    }
    for _ in 0..4 {
        let mut next = [vdupq_n_s8(0); 16];
        for i in 0..8 {
            next[2 * i] = vzip1q_s8(r[i], r[i + 8]);
            next[2 * i + 1] = vzip2q_s8(r[i], r[i + 8]);
        }
        r = next;
    }
    for (k, reg) in r.iter().enumerate() {
        vst1q_s8(dst.add(k * dst_stride), *reg);
    }
}

unsafe fn transpose_8x8_i16(src: *const i16, src_stride: usize, dst: *mut i16, dst_stride: usize) {
    let mut r = [vdupq_n_s16(0); 8];
    for (k, reg) in r.iter_mut().enumerate() {
        *reg = vld1q_s16(src.add(k * src_stride));
    }
    for _ in 0..3 {
        let mut next = [vdupq_n_s16(0); 8];
        for i in 0..4 {
            next[2 * i] = vzip1q_s16(r[i], r[i + 4]);
            next[2 * i + 1] = vzip2q_s16(r[i], r[i + 4]);
        }
        r = next;
    }
    for (k, reg) in r.iter().enumerate() {
        vst1q_s16(dst.add(k * dst_stride), *reg);
    }
}

unsafe fn transpose_4x4_i32(src: *const i32, src_stride: usize, dst: *mut i32, dst_stride: usize) {
    let mut r = [vdupq_n_s32(0); 4];
    for (k, reg) in r.iter_mut().enumerate() {
        *reg = vld1q_s32(src.add(k * src_stride));
    }
    for _ in 0..2 {
        r = [vzip1q_s32(r[0], r[2]), vzip2q_s32(r[0], r[2]), vzip1q_s32(r[1], r[3]), vzip2q_s32(r[1], r[3])];
    }
    for (k, reg) in r.iter().enumerate() {
        vst1q_s32(dst.add(k * dst_stride), *reg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_matches_scalar() {
        let input: Vec<f32> = (0..70).map(|i| (i as f32 - 35.0) * 0.41).collect();
        let mut fast = vec![0i8; 70];
        let mut reference = vec![0i8; 70];
        Neon.quantize(&input, 9.0, &mut fast);
        scalar::quantize(&input, 9.0, &mut reference);
        assert_eq!(fast, reference);
    }

    #[test]
    fn transpose_matches_scalar() {
        let (rows, cols) = (32, 24);
        let input: Vec<i8> = (0..rows * cols).map(|v| (v % 253) as i8).collect();
        let mut fast = vec![0i8; rows * cols];
        let mut reference = vec![0i8; rows * cols];
        Neon.transpose_i8(&input, rows, cols, &mut fast);
        scalar::transpose(&input, rows, cols, &mut reference);
        assert_eq!(fast, reference);
    }
}
