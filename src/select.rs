//! Column selection over prepared B. Output keeps the input's physical layout
//! with `cols.len()` columns, so it feeds the same multiply.

use crate::layout::{BlockedLayout, QUAD};
use crate::shape::Index;

/// Column-major B: each column is `width` contiguous bytes, copied whole.
pub fn select_columns_col_major(input: &[i8], width: usize, cols: &[Index], output: &mut [i8]) {
    for (c, &src) in cols.iter().enumerate() {
        let src = src as usize;
        output[c * width..(c + 1) * width].copy_from_slice(&input[src * width..(src + 1) * width]);
    }
}

/// Blocked B: a column is scattered in 4-byte quads with a stride of one block row, gathered quad by quad.
pub fn select_columns_blocked(input: &[i8], width: usize, cols_b: usize, cols: &[Index], output: &mut [i8]) {
    let src_layout = BlockedLayout { width, cols: cols_b };
    let dst_layout = BlockedLayout { width, cols: cols.len() };
    for (c, &src) in cols.iter().enumerate() {
        for kq in 0..width / QUAD {
            let from = src_layout.quad_offset(kq, src as usize);
            let to = dst_layout.quad_offset(kq, c);
            output[to..to + QUAD].copy_from_slice(&input[from..from + QUAD]);
        }
    }
}
