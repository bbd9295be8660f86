//! Integer GEMM primitives producing exact i32 accumulators.
//! Rows of A are independent, so large multiplies fan out over rayon.

use crate::layout::{BlockedLayout, BLOCK_COLS, QUAD};
use rayon::prelude::*;

#[inline]
fn dot_i8(a: &[i8], b: &[i8]) -> i32 {
    a.iter().zip(b).map(|(&x, &y)| x as i32 * y as i32).sum()
}

fn for_each_row<F>(out: &mut [i32], cols: usize, parallel: bool, f: F)
where
    F: Fn(usize, &mut [i32]) + Send + Sync,
{
    if cols == 0 { return; }
    if parallel {
        out.par_chunks_mut(cols).enumerate().for_each(|(i, row)| f(i, row));
    } else {
        out.chunks_mut(cols).enumerate().for_each(|(i, row)| f(i, row));
    }
}

/// `out = A * B` with A row-major signed `rows x width` and B column-major signed `width x cols`.
pub fn multiply_signed(a: &[i8], b: &[i8], rows: usize, width: usize, cols: usize, out: &mut [i32], parallel_min_rows: usize) {
    assert!(a.len() >= rows * width && b.len() >= width * cols && out.len() >= rows * cols, "multiply_signed: short buffers");
    let parallel = rows >= parallel_min_rows;
    for_each_row(&mut out[..rows * cols], cols, parallel, |i, out_row| {
        let a_row = &a[i * width..(i + 1) * width];
        for (j, o) in out_row.iter_mut().enumerate() {
            *o = dot_i8(a_row, &b[j * width..(j + 1) * width]);
        }
    });
}

/// `out = A * B` with A row-major unsigned bytes (stored in an i8 buffer) and
/// B signed in [`BlockedLayout`]. `width` must be a multiple of 4, `cols` of 8.
pub fn multiply_shifted(a: &[i8], b: &[i8], rows: usize, width: usize, cols: usize, out: &mut [i32], parallel_min_rows: usize) {
    assert!(a.len() >= rows * width && b.len() >= width * cols && out.len() >= rows * cols, "multiply_shifted: short buffers");
    assert!(width % QUAD == 0 && cols % BLOCK_COLS == 0, "multiply_shifted: {}x{} not blockable", width, cols);
    let layout = BlockedLayout { width, cols };
    let parallel = rows >= parallel_min_rows;
    for_each_row(&mut out[..rows * cols], cols, parallel, |i, out_row| {
        let a_row = &a[i * width..(i + 1) * width];
        for (cb, out_block) in out_row.chunks_exact_mut(BLOCK_COLS).enumerate() {
            let block = &b[cb * layout.block_len()..(cb + 1) * layout.block_len()];
            let mut acc = [0i32; BLOCK_COLS];
            for (a_quad, b_quads) in a_row.chunks_exact(QUAD).zip(block.chunks_exact(BLOCK_COLS * QUAD)) {
                for (c, b_quad) in b_quads.chunks_exact(QUAD).enumerate() {
                    // u8 x i8 four-way dot product
                    acc[c] += a_quad.iter().zip(b_quad).map(|(&x, &y)| x as u8 as i32 * y as i32).sum::<i32>();
                }
            }
            out_block.copy_from_slice(&acc);
        }
    });
}
