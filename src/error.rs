use crate::shape::Index;
use thiserror::Error;

/// Contract violations detected by the checked entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GemmError {
    #[error("width {width} is not a multiple of {multiple}")]
    Width { width: Index, multiple: Index },

    #[error("cols_B {cols} is not a multiple of {multiple}")]
    Cols { cols: Index, multiple: Index },

    #[error("{what}: buffer holds {actual} elements, contract needs {expected}")]
    BufferLength { what: &'static str, expected: usize, actual: usize },

    #[error("column index {index} out of range for cols_B {cols_b}")]
    ColumnOutOfRange { index: Index, cols_b: Index },

    #[error("number of selected columns {count} is not a multiple of {multiple}")]
    SelectCount { count: usize, multiple: Index },

    #[error("{what} must be finite and positive, got {value}")]
    Scale { what: &'static str, value: f32 },

    #[error("{0} pointer is null")]
    NullPointer(&'static str),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

pub type Result<T, E = GemmError> = std::result::Result<T, E>;
