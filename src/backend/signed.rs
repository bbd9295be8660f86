use super::{check_multiply, check_prepare_a, check_prepare_b, check_prepare_bias, check_select, unquant_multiplier, Backend, BackendContext, QuantParams};
use crate::aligned::AlignedVec;
use crate::error::Result;
use crate::gemm;
use crate::select;
use crate::shape::{Index, Shape};
use log::trace;

/// Plain signed int8 x int8 backend.
///
/// Prepared A is the quantized row-major A. Prepared B is column-major, one
/// contiguous run of `width` bytes per column, so every output element is a
/// dot product of two contiguous vectors. No offsets are involved, so the bias
/// is used as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedBackend {
    ctx: BackendContext,
}

impl Backend for SignedBackend {
    const NAME: &'static str = "signed";

    fn from_context(ctx: BackendContext) -> Self { Self { ctx } }
    fn context(&self) -> &BackendContext { &self.ctx }

    fn prepare_a(&self, input: &[f32], quant: QuantParams, rows_a: Index, width: Index, output: &mut [i8]) -> Result<()> {
        let n = check_prepare_a(input, quant, rows_a, width, output)?;
        trace!("{}: prepare_a {}x{}", Self::NAME, rows_a, width);
        self.kernels().quantize(&input[..n], quant.scale, &mut output[..n]);
        Ok(())
    }

    fn prepare_b(&self, input: &[f32], quant: QuantParams, width: Index, cols_b: Index, output: &mut [i8]) -> Result<()> {
        let n = check_prepare_b(input.len(), width, cols_b, output)?;
        check_quant(quant)?;
        trace!("{}: prepare_b {}x{}", Self::NAME, width, cols_b);
        let mut quantized = AlignedVec::<i8>::zeroed(n);
        self.kernels().quantize(&input[..n], quant.scale, &mut quantized);
        self.kernels().transpose_i8(&quantized, width as usize, cols_b as usize, &mut output[..n]);
        Ok(())
    }

    fn prepare_b_from_transposed(&self, input: &[f32], quant: QuantParams, width: Index, cols_b: Index, output: &mut [i8]) -> Result<()> {
        let n = check_prepare_b(input.len(), width, cols_b, output)?;
        check_quant(quant)?;
        trace!("{}: prepare_b_from_transposed {}x{}", Self::NAME, width, cols_b);
        // Already in the column-major orientation this backend multiplies with.
        self.kernels().quantize(&input[..n], quant.scale, &mut output[..n]);
        Ok(())
    }

    fn prepare_b_from_quantized_transposed(&self, input: &[i8], width: Index, cols_b: Index, output: &mut [i8]) -> Result<()> {
        let n = check_prepare_b(input.len(), width, cols_b, output)?;
        trace!("{}: prepare_b_from_quantized_transposed {}x{}", Self::NAME, width, cols_b);
        output[..n].copy_from_slice(&input[..n]);
        Ok(())
    }

    fn prepare_bias(&self, b_prepared: &[i8], quant_a: QuantParams, quant_b: QuantParams, width: Index, cols_b: Index, bias: &[f32], output: &mut [f32]) -> Result<()> {
        check_prepare_bias(b_prepared, quant_a, quant_b, width, cols_b, bias, output)?;
        let n = cols_b as usize;
        output[..n].copy_from_slice(&bias[..n]);
        Ok(())
    }

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
    ) -> Result<()> {
        let shape = Shape::new(rows_a, width, cols_b);
        check_multiply(a_prepared, quant_a, b_prepared, quant_b, bias_prepared, output_scale, shape, output)?;
        trace!("{}: multiply {}x{}x{}", Self::NAME, rows_a, width, cols_b);
        let (rows, width, cols) = (rows_a as usize, width as usize, cols_b as usize);
        let mut acc = AlignedVec::<i32>::zeroed(shape.out_len());
        gemm::multiply_signed(a_prepared, b_prepared, rows, width, cols, &mut acc, self.ctx.parallel_min_rows);
        let unquant = unquant_multiplier(output_scale, quant_a, quant_b);
        self.kernels().unquantize_add_bias(&acc, bias_prepared, unquant, rows, cols, &mut output[..shape.out_len()]);
        Ok(())
    }

    fn select_columns_of_b(&self, b_prepared: &[i8], width: Index, cols_b: Index, cols: &[Index], output: &mut [i8]) -> Result<()> {
        check_select(b_prepared, width, cols_b, cols, output)?;
        trace!("{}: select {} of {} columns", Self::NAME, cols.len(), cols_b);
        select::select_columns_col_major(b_prepared, width as usize, cols, output);
        Ok(())
    }
}

pub(super) fn check_quant(quant: QuantParams) -> Result<()> { crate::shape::check_scale("scale", quant.scale) }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::scalar::Scalar;

    #[test]
    fn prepare_b_is_column_major() {
        let be = SignedBackend::with_kernels(&Scalar);
        // 4 x 8 row-major, value = 10*row + col
        let b: Vec<f32> = (0..4).flat_map(|k| (0..8).map(move |j| (10 * k + j) as f32)).collect();
        let mut out = vec![0i8; 32];
        be.prepare_b(&b, QuantParams::symmetric(1.0), 4, 8, &mut out).unwrap();
        assert_eq!(&out[..8], &[0, 10, 20, 30, 1, 11, 21, 31]);
    }

    #[test]
    fn bias_is_copied() {
        let be = SignedBackend::with_kernels(&Scalar);
        let bias: Vec<f32> = (0..8).map(|j| j as f32 + 0.5).collect();
        let mut out = vec![0f32; 8];
        be.prepare_bias(&[0i8; 32], QuantParams::symmetric(2.0), QuantParams::symmetric(3.0), 4, 8, &bias, &mut out).unwrap();
        assert_eq!(out, bias);
    }
}
