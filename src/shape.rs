//! Dimension and buffer contracts shared by every entry point.
//!
//! Conventions: A is `rows_a x width`, B is `width x cols_b`, the product and
//! its bias are `rows_a x cols_b` and `1 x cols_b`.

use crate::error::{GemmError, Result};

/// Dimension type of the C interface.
pub type Index = u32;

/// Interface tiling contract on the shared inner dimension.
pub const WIDTH_MULTIPLE: Index = 64;
/// Interface tiling contract on the columns of B (and on selected columns).
pub const COLS_MULTIPLE: Index = 8;
/// Smallest width granularity the kernels themselves rely on (one k-quad of the blocked layout).
pub const KERNEL_WIDTH_MULTIPLE: Index = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub rows_a: Index,
    pub width: Index,
    pub cols_b: Index,
}

impl Shape {
    pub fn new(rows_a: Index, width: Index, cols_b: Index) -> Self { Self { rows_a, width, cols_b } }

    pub fn a_len(&self) -> usize { self.rows_a as usize * self.width as usize }
    pub fn b_len(&self) -> usize { self.width as usize * self.cols_b as usize }
    pub fn out_len(&self) -> usize { self.rows_a as usize * self.cols_b as usize }

    /// Checks what the kernels need to stay in bounds and produce correct output.
    pub fn check(&self) -> Result<()> {
        check_width(self.width, KERNEL_WIDTH_MULTIPLE)?;
        check_cols(self.cols_b)
    }

    /// Checks the full interface tiling contract (`width % 64`, `cols_b % 8`).
    pub fn check_interface(&self) -> Result<()> {
        check_width(self.width, WIDTH_MULTIPLE)?;
        check_cols(self.cols_b)
    }
}

fn check_width(width: Index, multiple: Index) -> Result<()> {
    if width % multiple != 0 {
        return Err(GemmError::Width { width, multiple });
    }
    Ok(())
}

fn check_cols(cols: Index) -> Result<()> {
    if cols % COLS_MULTIPLE != 0 {
        return Err(GemmError::Cols { cols, multiple: COLS_MULTIPLE });
    }
    Ok(())
}

/// Buffers may be longer than the contract requires; only the prefix is used.
pub fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if actual < expected {
        return Err(GemmError::BufferLength { what, expected, actual });
    }
    Ok(())
}

pub fn check_scale(what: &'static str, value: f32) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(GemmError::Scale { what, value });
    }
    Ok(())
}

pub fn check_columns(cols: &[Index], cols_b: Index) -> Result<()> {
    if cols.len() % COLS_MULTIPLE as usize != 0 {
        return Err(GemmError::SelectCount { count: cols.len(), multiple: COLS_MULTIPLE });
    }
    if let Some(&index) = cols.iter().find(|&&c| c >= cols_b) {
        return Err(GemmError::ColumnOutOfRange { index, cols_b });
    }
    Ok(())
}
