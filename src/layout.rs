use crate::shape::Index;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    RowMajor,
    ColMajor,
}

/// Shape plus storage order of a flat matrix buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub rows: usize,
    pub cols: usize,
    pub order: Order,
}

impl Layout {
    pub fn new(rows: usize, cols: usize, order: Order) -> Self { Self { rows, cols, order } }
    pub fn row_major(rows: usize, cols: usize) -> Self { Self::new(rows, cols, Order::RowMajor) }
    pub fn col_major(rows: usize, cols: usize) -> Self { Self::new(rows, cols, Order::ColMajor) }

    pub fn num_elem(&self) -> usize { self.rows * self.cols }

    #[inline]
    pub fn index(&self, i: usize, j: usize) -> usize {
        match self.order {
            Order::RowMajor => i * self.cols + j,
            Order::ColMajor => j * self.rows + i,
        }
    }

    /// Layout of the transposed matrix stored with the same order.
    pub fn transpose(&self) -> Self { Self::new(self.cols, self.rows, self.order) }
}

/// Columns per block of the blocked B layout.
pub const BLOCK_COLS: usize = 8;
/// Consecutive k values stored together per column.
pub const QUAD: usize = 4;

/// B layout consumed by the unsigned x signed multiply: 8-column blocks, and
/// inside a block `QUAD` consecutive rows of one column are contiguous, so a
/// block row-quad is 32 bytes `[c0k0..c0k3, c1k0..c1k3, .., c7k0..c7k3]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedLayout {
    pub width: usize,
    pub cols: usize,
}

impl BlockedLayout {
    pub fn new(width: Index, cols: Index) -> Self { Self { width: width as usize, cols: cols as usize } }

    pub fn block_len(&self) -> usize { BLOCK_COLS * self.width }

    /// Start of the `QUAD` contiguous bytes holding rows `kq*4..kq*4+4` of column `j`.
    #[inline]
    pub fn quad_offset(&self, kq: usize, j: usize) -> usize {
        (j / BLOCK_COLS) * self.block_len() + kq * BLOCK_COLS * QUAD + (j % BLOCK_COLS) * QUAD
    }

    #[inline]
    pub fn index(&self, k: usize, j: usize) -> usize { self.quad_offset(k / QUAD, j) + k % QUAD }
}

/// Packs a column-major `width x cols` matrix into the blocked layout.
pub fn pack_blocked_from_col_major(input: &[i8], layout: BlockedLayout, output: &mut [i8]) {
    let width = layout.width;
    for j in 0..layout.cols {
        let column = &input[j * width..(j + 1) * width];
        for (kq, quad) in column.chunks_exact(QUAD).enumerate() {
            let at = layout.quad_offset(kq, j);
            output[at..at + QUAD].copy_from_slice(quad);
        }
    }
}

/// Inverse of [`pack_blocked_from_col_major`].
pub fn unpack_blocked_to_col_major(input: &[i8], layout: BlockedLayout, output: &mut [i8]) {
    let width = layout.width;
    for j in 0..layout.cols {
        let column = &mut output[j * width..(j + 1) * width];
        for (kq, quad) in column.chunks_exact_mut(QUAD).enumerate() {
            let at = layout.quad_offset(kq, j);
            quad.copy_from_slice(&input[at..at + QUAD]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_and_col_major_index() {
        let r = Layout::row_major(3, 5);
        let c = Layout::col_major(3, 5);
        assert_eq!(r.index(2, 1), 11);
        assert_eq!(c.index(2, 1), 5);
        assert_eq!(r.transpose(), Layout::row_major(5, 3));
    }

    #[test]
    fn blocked_index_is_a_permutation() {
        let l = BlockedLayout::new(8, 16);
        let mut seen = vec![false; 8 * 16];
        for k in 0..8 {
            for j in 0..16 {
                let at = l.index(k, j);
                assert!(!seen[at]);
                seen[at] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(l.index(0, 8), 64);
        assert_eq!(l.index(5, 1), 32 + 4 + 1);
    }

    #[test]
    fn pack_unpack_restores_columns() {
        let l = BlockedLayout::new(8, 8);
        let col_major: Vec<i8> = (0..64).map(|v| v as i8).collect();
        let mut blocked = vec![0i8; 64];
        pack_blocked_from_col_major(&col_major, l, &mut blocked);
        assert_eq!(blocked[..8], [0, 1, 2, 3, 8, 9, 10, 11]);
        let mut back = vec![0i8; 64];
        unpack_blocked_to_col_major(&blocked, l, &mut back);
        assert_eq!(back, col_major);
    }
}
