//! Owned, backend-tagged prepared operands.
//!
//! A `PreparedB<SignedBackend>` cannot be passed where a
//! `PreparedB<ShiftedBackend>` is expected, so layouts are never mixed.

use crate::aligned::AlignedVec;
use crate::backend::{Backend, QuantParams};
use crate::error::{GemmError, Result};
use crate::shape::Index;
use std::marker::PhantomData;

#[derive(Debug, Clone)]
pub struct PreparedA<B> {
    data: AlignedVec<i8>,
    quant: QuantParams,
    rows: Index,
    width: Index,
    _backend: PhantomData<B>,
}

impl<B> PreparedA<B> {
    pub fn as_slice(&self) -> &[i8] { &self.data }
    pub fn quant(&self) -> QuantParams { self.quant }
    pub fn rows(&self) -> Index { self.rows }
    pub fn width(&self) -> Index { self.width }
}

#[derive(Debug, Clone)]
pub struct PreparedB<B> {
    data: AlignedVec<i8>,
    quant: QuantParams,
    width: Index,
    cols: Index,
    _backend: PhantomData<B>,
}

impl<B> PreparedB<B> {
    pub fn as_slice(&self) -> &[i8] { &self.data }
    pub fn quant(&self) -> QuantParams { self.quant }
    pub fn width(&self) -> Index { self.width }
    pub fn cols(&self) -> Index { self.cols }
}

/// Bias prepared against a specific B and A scale.
#[derive(Debug, Clone)]
pub struct PreparedBias<B> {
    data: Vec<f32>,
    quant_a: QuantParams,
    _backend: PhantomData<B>,
}

impl<B> PreparedBias<B> {
    pub fn as_slice(&self) -> &[f32] { &self.data }
    pub fn cols(&self) -> usize { self.data.len() }
    pub fn quant_a(&self) -> QuantParams { self.quant_a }
}

/// Allocating front end over a [`Backend`].
#[derive(Debug, Clone, Default)]
pub struct Gemm<B: Backend> {
    backend: B,
}

impl<B: Backend> Gemm<B> {
    pub fn new(backend: B) -> Self { Self { backend } }
    pub fn backend(&self) -> &B { &self.backend }

    pub fn prepare_a(&self, input: &[f32], quant: QuantParams, rows: Index, width: Index) -> Result<PreparedA<B>> {
        let mut data = AlignedVec::zeroed(rows as usize * width as usize);
        self.backend.prepare_a(input, quant, rows, width, &mut data)?;
        Ok(PreparedA { data, quant, rows, width, _backend: PhantomData })
    }

    pub fn prepare_b(&self, input: &[f32], quant: QuantParams, width: Index, cols: Index) -> Result<PreparedB<B>> {
        let mut data = AlignedVec::zeroed(width as usize * cols as usize);
        self.backend.prepare_b(input, quant, width, cols, &mut data)?;
        Ok(PreparedB { data, quant, width, cols, _backend: PhantomData })
    }

    /// `input` is B stored column-major (`cols` runs of `width` floats).
    pub fn prepare_b_from_transposed(&self, input: &[f32], quant: QuantParams, width: Index, cols: Index) -> Result<PreparedB<B>> {
        let mut data = AlignedVec::zeroed(width as usize * cols as usize);
        self.backend.prepare_b_from_transposed(input, quant, width, cols, &mut data)?;
        Ok(PreparedB { data, quant, width, cols, _backend: PhantomData })
    }

    /// `input` is B already quantized with `quant`, stored column-major.
    pub fn prepare_b_from_quantized_transposed(&self, input: &[i8], quant: QuantParams, width: Index, cols: Index) -> Result<PreparedB<B>> {
        let mut data = AlignedVec::zeroed(width as usize * cols as usize);
        self.backend.prepare_b_from_quantized_transposed(input, width, cols, &mut data)?;
        Ok(PreparedB { data, quant, width, cols, _backend: PhantomData })
    }

    pub fn prepare_bias(&self, quant_a: QuantParams, b: &PreparedB<B>, bias: &[f32]) -> Result<PreparedBias<B>> {
        let mut data = vec![0f32; b.cols as usize];
        self.backend.prepare_bias(&b.data, quant_a, b.quant, b.width, b.cols, bias, &mut data)?;
        Ok(PreparedBias { data, quant_a, _backend: PhantomData })
    }

    /// Row-major `a.rows() x b.cols()` result.
    pub fn multiply_and_add_bias(&self, a: &PreparedA<B>, b: &PreparedB<B>, bias: &PreparedBias<B>, output_scale: f32) -> Result<Vec<f32>> {
        if a.width != b.width {
            return Err(GemmError::ShapeMismatch(format!("A width {} vs B width {}", a.width, b.width)));
        }
        if bias.cols() != b.cols as usize {
            return Err(GemmError::ShapeMismatch(format!("bias has {} columns, B has {}", bias.cols(), b.cols)));
        }
        if bias.quant_a.scale != a.quant.scale {
            return Err(GemmError::ShapeMismatch(format!("bias prepared for scale_A {}, A has scale {}", bias.quant_a.scale, a.quant.scale)));
        }
        let mut out = vec![0f32; a.rows as usize * b.cols as usize];
        self.backend.multiply_and_add_bias(&a.data, a.quant, &b.data, b.quant, &bias.data, output_scale, a.rows, a.width, b.cols, &mut out)?;
        Ok(out)
    }

    /// New prepared B holding the listed columns, in order.
    pub fn select_columns(&self, b: &PreparedB<B>, cols: &[Index]) -> Result<PreparedB<B>> {
        let mut data = AlignedVec::zeroed(b.width as usize * cols.len());
        self.backend.select_columns_of_b(&b.data, b.width, b.cols, cols, &mut data)?;
        Ok(PreparedB { data, quant: b.quant, width: b.width, cols: cols.len() as Index, _backend: PhantomData })
    }
}
