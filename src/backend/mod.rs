//! The int8 multiply contract and its two implementations.
//!
//! Every operation works on caller-owned buffers in the argument order of the
//! C interface. Prepared buffers are backend specific: a prepared B from one
//! backend fed to the other computes garbage. The typed API in
//! [`crate::prepared`] rules that out at compile time; this layer cannot.

pub mod shifted;
pub mod signed;

pub use shifted::ShiftedBackend;
pub use signed::SignedBackend;

use crate::config::GemmConfig;
use crate::error::Result;
use crate::kernels::{self, Preprocess};
use crate::shape::{check_len, check_scale, Index, Shape};
use serde::{Deserialize, Serialize};

/// Per-matrix quantization parameters. `scale` maps floats into the integer
/// domain (`round(value * scale)`). Both backends quantize symmetrically and
/// ignore `zero_point`; the shifted backend applies its own fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: f32,
}

impl QuantParams {
    pub fn new(scale: f32, zero_point: f32) -> Self { Self { scale, zero_point } }
    pub fn symmetric(scale: f32) -> Self { Self { scale, zero_point: 0.0 } }
}

/// Kernels plus threading threshold, injected into a backend.
#[derive(Debug, Clone, Copy)]
pub struct BackendContext {
    pub kernels: &'static dyn Preprocess,
    pub parallel_min_rows: usize,
}

impl BackendContext {
    pub fn with_config(cfg: &GemmConfig) -> Self {
        Self { kernels: kernels::select(cfg), parallel_min_rows: cfg.parallel_min_rows }
    }

    pub fn with_kernels(kernels: &'static dyn Preprocess) -> Self {
        Self { kernels, parallel_min_rows: GemmConfig::default().parallel_min_rows }
    }
}

impl Default for BackendContext {
    fn default() -> Self {
        Self { kernels: kernels::active(), parallel_min_rows: GemmConfig::global().parallel_min_rows }
    }
}

pub trait Backend: Send + Sync + Sized {
    const NAME: &'static str;

    fn from_context(ctx: BackendContext) -> Self;
    fn context(&self) -> &BackendContext;

    fn with_config(cfg: &GemmConfig) -> Self { Self::from_context(BackendContext::with_config(cfg)) }
    fn with_kernels(kernels: &'static dyn Preprocess) -> Self { Self::from_context(BackendContext::with_kernels(kernels)) }
    fn kernels(&self) -> &'static dyn Preprocess { self.context().kernels }

    /// Quantizes row-major A (`rows_a x width`).
    fn prepare_a(&self, input: &[f32], quant: QuantParams, rows_a: Index, width: Index, output: &mut [i8]) -> Result<()>;

    /// Quantizes row-major B (`width x cols_b`) into this backend's layout.
    fn prepare_b(&self, input: &[f32], quant: QuantParams, width: Index, cols_b: Index, output: &mut [i8]) -> Result<()>;

    /// Same as [`Backend::prepare_b`] from a column-major (transposed) B.
    fn prepare_b_from_transposed(&self, input: &[f32], quant: QuantParams, width: Index, cols_b: Index, output: &mut [i8]) -> Result<()>;

    /// Re-lays a column-major B that is already quantized.
    fn prepare_b_from_quantized_transposed(&self, input: &[i8], width: Index, cols_b: Index, output: &mut [i8]) -> Result<()>;

    /// Final per-column bias for [`Backend::multiply_and_add_bias`].
    #[allow(clippy::too_many_arguments)]
    fn prepare_bias(&self, b_prepared: &[i8], quant_a: QuantParams, quant_b: QuantParams, width: Index, cols_b: Index, bias: &[f32], output: &mut [f32]) -> Result<()>;

    /// `output = (A * B) * output_scale / (scale_a * scale_b) + bias_prepared`, row-major `rows_a x cols_b`.
    #[allow(clippy::too_many_arguments)]
    fn multiply_and_add_bias(
        &self,
        a_prepared: &[i8],
        quant_a: QuantParams,
        b_prepared: &[i8],
        quant_b: QuantParams,
        bias_prepared: &[f32],
        output_scale: f32,
        rows_a: Index,
        width: Index,
        cols_b: Index,
        output: &mut [f32],
    ) -> Result<()>;

    /// Copies the listed columns of a prepared B into a new prepared B of `cols.len()` columns.
    fn select_columns_of_b(&self, b_prepared: &[i8], width: Index, cols_b: Index, cols: &[Index], output: &mut [i8]) -> Result<()>;
}

pub(crate) fn check_prepare_a(input: &[f32], quant: QuantParams, rows_a: Index, width: Index, output: &[i8]) -> Result<usize> {
    let shape = Shape::new(rows_a, width, 0);
    shape.check()?;
    check_scale("scale", quant.scale)?;
    check_len("input A", shape.a_len(), input.len())?;
    check_len("prepared A", shape.a_len(), output.len())?;
    Ok(shape.a_len())
}

pub(crate) fn check_prepare_b(input_len: usize, width: Index, cols_b: Index, output: &[i8]) -> Result<usize> {
    let shape = Shape::new(0, width, cols_b);
    shape.check()?;
    check_len("input B", shape.b_len(), input_len)?;
    check_len("prepared B", shape.b_len(), output.len())?;
    Ok(shape.b_len())
}

pub(crate) fn check_prepare_bias(b_prepared: &[i8], quant_a: QuantParams, quant_b: QuantParams, width: Index, cols_b: Index, bias: &[f32], output: &[f32]) -> Result<()> {
    let shape = Shape::new(0, width, cols_b);
    shape.check()?;
    check_scale("scale_A", quant_a.scale)?;
    check_scale("scale_B", quant_b.scale)?;
    check_len("prepared B", shape.b_len(), b_prepared.len())?;
    check_len("bias", cols_b as usize, bias.len())?;
    check_len("prepared bias", cols_b as usize, output.len())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn check_multiply(a: &[i8], quant_a: QuantParams, b: &[i8], quant_b: QuantParams, bias: &[f32], output_scale: f32, shape: Shape, output: &[f32]) -> Result<()> {
    shape.check()?;
    check_scale("scale_A", quant_a.scale)?;
    check_scale("scale_B", quant_b.scale)?;
    if !output_scale.is_finite() {
        return Err(crate::error::GemmError::Scale { what: "output scale", value: output_scale });
    }
    check_len("prepared A", shape.a_len(), a.len())?;
    check_len("prepared B", shape.b_len(), b.len())?;
    check_len("prepared bias", shape.cols_b as usize, bias.len())?;
    check_len("output", shape.out_len(), output.len())
}

pub(crate) fn check_select(b_prepared: &[i8], width: Index, cols_b: Index, cols: &[Index], output: &[i8]) -> Result<()> {
    let shape = Shape::new(0, width, cols_b);
    shape.check()?;
    crate::shape::check_columns(cols, cols_b)?;
    check_len("prepared B", shape.b_len(), b_prepared.len())?;
    check_len("selected B", width as usize * cols.len(), output.len())
}

/// Folds the forward scales of A and B and the requested output scale into one factor.
#[inline]
pub fn unquant_multiplier(output_scale: f32, quant_a: QuantParams, quant_b: QuantParams) -> f32 {
    output_scale / (quant_a.scale * quant_b.scale)
}
