//! Portable reference kernels. Every SIMD path must agree with these bit for bit.

use super::{KernelPath, Preprocess};

#[derive(Debug, Clone, Copy, Default)]
pub struct Scalar;

impl Preprocess for Scalar {
    fn path(&self) -> KernelPath { KernelPath::Scalar }

    fn quantize(&self, input: &[f32], scale: f32, output: &mut [i8]) { quantize(input, scale, output) }

    fn transpose_i8(&self, input: &[i8], rows: usize, cols: usize, output: &mut [i8]) {
        transpose(input, rows, cols, output)
    }

    fn transpose_i16(&self, input: &[i16], rows: usize, cols: usize, output: &mut [i16]) {
        transpose(input, rows, cols, output)
    }

    fn transpose_i32(&self, input: &[i32], rows: usize, cols: usize, output: &mut [i32]) {
        transpose(input, rows, cols, output)
    }

    fn unquantize_add_bias(&self, input: &[i32], bias: &[f32], unquant_multiplier: f32, rows: usize, cols: usize, output: &mut [f32]) {
        unquantize_add_bias(input, bias, unquant_multiplier, rows, cols, output)
    }
}

#[inline]
pub fn quantize_one(value: f32, scale: f32) -> i8 {
    // NaN survives clamp and casts to 0.
    (scale * value).round_ties_even().clamp(-127.0, 127.0) as i8
}

pub fn quantize(input: &[f32], scale: f32, output: &mut [i8]) {
    assert!(input.len() >= output.len(), "quantize: input shorter than output");
    for (o, &x) in output.iter_mut().zip(input) {
        *o = quantize_one(x, scale);
    }
}

pub fn transpose<T: Copy>(input: &[T], rows: usize, cols: usize, output: &mut [T]) {
    let n = rows * cols;
    assert!(input.len() >= n && output.len() >= n, "transpose: buffers shorter than {}x{}", rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            output[j * rows + i] = input[i * cols + j];
        }
    }
}

pub fn unquantize_add_bias(input: &[i32], bias: &[f32], unquant_multiplier: f32, rows: usize, cols: usize, output: &mut [f32]) {
    let n = rows * cols;
    assert!(input.len() >= n && output.len() >= n && bias.len() >= cols, "unquantize_add_bias: short buffers");
    if cols == 0 { return; }
    for (row_out, row_in) in output[..n].chunks_exact_mut(cols).zip(input[..n].chunks_exact(cols)) {
        for j in 0..cols {
            row_out[j] = row_in[j] as f32 * unquant_multiplier + bias[j];
        }
    }
}
