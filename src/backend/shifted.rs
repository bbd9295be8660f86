use super::signed::check_quant;
use super::{check_multiply, check_prepare_a, check_prepare_b, check_prepare_bias, check_select, unquant_multiplier, Backend, BackendContext, QuantParams};
use crate::aligned::AlignedVec;
use crate::error::Result;
use crate::gemm;
use crate::layout::{pack_blocked_from_col_major, BlockedLayout, BLOCK_COLS, QUAD};
use crate::select;
use crate::shape::{Index, Shape};
use log::trace;

/// Offset added to quantized A so it can be fed to an unsigned x signed dot product.
pub const A_SHIFT: i32 = 127;

/// Unsigned-A backend.
///
/// Prepared A holds `q + 127` as raw bytes (`0..=254`). Prepared B is signed
/// and packed in [`BlockedLayout`]. The shift contributes `127 * colsum_j(B)`
/// to every output of column `j`; [`Backend::prepare_bias`] folds the
/// negation of that term into the bias for an output scale of 1;
/// [`Backend::multiply_and_add_bias`] adds the remainder for any other scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftedBackend {
    ctx: BackendContext,
}

/// Multiplier applied to the column sums of B when preparing the bias.
pub fn shift_compensation(quant_a: QuantParams, quant_b: QuantParams) -> f32 {
    let shift = A_SHIFT as f32;
    -((shift / quant_a.scale) * (shift / quant_b.scale)) / shift
}

/// Column sums of a blocked B.
pub fn column_sums(b_prepared: &[i8], width: usize, cols: usize) -> Vec<i32> {
    let layout = BlockedLayout { width, cols };
    let mut sums = vec![0i32; cols];
    for (cb, block) in b_prepared[..width * cols].chunks_exact(layout.block_len().max(1)).enumerate() {
        for quads in block.chunks_exact(BLOCK_COLS * QUAD) {
            for (c, quad) in quads.chunks_exact(QUAD).enumerate() {
                sums[cb * BLOCK_COLS + c] += quad.iter().map(|&v| v as i32).sum::<i32>();
            }
        }
    }
    sums
}

impl ShiftedBackend {
    fn pack(&self, col_major: &[i8], width: Index, cols_b: Index, output: &mut [i8]) {
        pack_blocked_from_col_major(col_major, BlockedLayout::new(width, cols_b), output);
    }
}

impl Backend for ShiftedBackend {
    const NAME: &'static str = "shifted";

    fn from_context(ctx: BackendContext) -> Self { Self { ctx } }
    fn context(&self) -> &BackendContext { &self.ctx }

    fn prepare_a(&self, input: &[f32], quant: QuantParams, rows_a: Index, width: Index, output: &mut [i8]) -> Result<()> {
        let n = check_prepare_a(input, quant, rows_a, width, output)?;
        trace!("{}: prepare_a {}x{}", Self::NAME, rows_a, width);
        let out = &mut output[..n];
        self.kernels().quantize(&input[..n], quant.scale, out);
        for v in out.iter_mut() {
            *v = (*v as u8).wrapping_add(A_SHIFT as u8) as i8;
        }
        Ok(())
    }

    fn prepare_b(&self, input: &[f32], quant: QuantParams, width: Index, cols_b: Index, output: &mut [i8]) -> Result<()> {
        let n = check_prepare_b(input.len(), width, cols_b, output)?;
        check_quant(quant)?;
        trace!("{}: prepare_b {}x{}", Self::NAME, width, cols_b);
        let mut quantized = AlignedVec::<i8>::zeroed(n);
        self.kernels().quantize(&input[..n], quant.scale, &mut quantized);
        let mut col_major = AlignedVec::<i8>::zeroed(n);
        self.kernels().transpose_i8(&quantized, width as usize, cols_b as usize, &mut col_major);
        self.pack(&col_major, width, cols_b, output);
        Ok(())
    }

    fn prepare_b_from_transposed(&self, input: &[f32], quant: QuantParams, width: Index, cols_b: Index, output: &mut [i8]) -> Result<()> {
        let n = check_prepare_b(input.len(), width, cols_b, output)?;
        check_quant(quant)?;
        trace!("{}: prepare_b_from_transposed {}x{}", Self::NAME, width, cols_b);
        let mut col_major = AlignedVec::<i8>::zeroed(n);
        self.kernels().quantize(&input[..n], quant.scale, &mut col_major);
        self.pack(&col_major, width, cols_b, output);
        Ok(())
    }

    fn prepare_b_from_quantized_transposed(&self, input: &[i8], width: Index, cols_b: Index, output: &mut [i8]) -> Result<()> {
        check_prepare_b(input.len(), width, cols_b, output)?;
        trace!("{}: prepare_b_from_quantized_transposed {}x{}", Self::NAME, width, cols_b);
        self.pack(input, width, cols_b, output);
        Ok(())
    }

    fn prepare_bias(&self, b_prepared: &[i8], quant_a: QuantParams, quant_b: QuantParams, width: Index, cols_b: Index, bias: &[f32], output: &mut [f32]) -> Result<()> {
        check_prepare_bias(b_prepared, quant_a, quant_b, width, cols_b, bias, output)?;
        let cols = cols_b as usize;
        let sums = column_sums(b_prepared, width as usize, cols);
        let factor = shift_compensation(quant_a, quant_b);
        trace!("{}: prepare_bias cols {} factor {}", Self::NAME, cols, factor);
        self.kernels().unquantize_add_bias(&sums, &bias[..cols], factor, 1, cols, &mut output[..cols]);
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
        gemm::multiply_shifted(a_prepared, b_prepared, rows, width, cols, &mut acc, self.ctx.parallel_min_rows);
        let unquant = unquant_multiplier(output_scale, quant_a, quant_b);
        if output_scale == 1.0 {
            self.kernels().unquantize_add_bias(&acc, bias_prepared, unquant, rows, cols, &mut output[..shape.out_len()]);
            return Ok(());
        }
        // Prepared bias cancels the shift at output scale 1 only.
        let sums = column_sums(b_prepared, width, cols);
        let extra = (output_scale - 1.0) * shift_compensation(quant_a, quant_b);
        let mut bias = AlignedVec::<f32>::zeroed(cols);
        self.kernels().unquantize_add_bias(&sums, &bias_prepared[..cols], extra, 1, cols, &mut bias);
        self.kernels().unquantize_add_bias(&acc, &bias, unquant, rows, cols, &mut output[..shape.out_len()]);
        Ok(())
    }

    fn select_columns_of_b(&self, b_prepared: &[i8], width: Index, cols_b: Index, cols: &[Index], output: &mut [i8]) -> Result<()> {
        check_select(b_prepared, width, cols_b, cols, output)?;
        trace!("{}: select {} of {} columns", Self::NAME, cols.len(), cols_b);
        select::select_columns_blocked(b_prepared, width as usize, cols_b as usize, cols, output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::scalar::Scalar;

    #[test]
    fn prepare_a_shifts_into_unsigned_range() {
        let be = ShiftedBackend::with_kernels(&Scalar);
        let a = [-1.0f32, -0.5, 0.0, 1.0];
        let mut out = [0i8; 4];
        be.prepare_a(&a, QuantParams::symmetric(127.0), 1, 4, &mut out).unwrap();
        let bytes: Vec<u8> = out.iter().map(|&v| v as u8).collect();
        assert_eq!(bytes, vec![0, 63, 127, 254]);
    }

    #[test]
    fn column_sums_follow_blocked_layout() {
        let (width, cols) = (8usize, 16usize);
        // column j holds the value j in every row
        let col_major: Vec<i8> = (0..cols).flat_map(|j| std::iter::repeat(j as i8).take(width)).collect();
        let mut blocked = vec![0i8; width * cols];
        pack_blocked_from_col_major(&col_major, BlockedLayout { width, cols }, &mut blocked);
        let sums = column_sums(&blocked, width, cols);
        let expected: Vec<i32> = (0..cols as i32).map(|j| j * width as i32).collect();
        assert_eq!(sums, expected);
    }

    fn constant_product<B: Backend>(be: B, output_scale: f32) -> Vec<f32> {
        let q = QuantParams::symmetric(1.0);
        let (mut ap, mut bp, mut bias, mut out) = (vec![0i8; 64], vec![0i8; 512], vec![0f32; 8], vec![0f32; 8]);
        be.prepare_a(&[2.0; 64], q, 1, 64, &mut ap).unwrap();
        be.prepare_b(&[3.0; 512], q, 64, 8, &mut bp).unwrap();
        be.prepare_bias(&bp, q, q, 64, 8, &[1.0; 8], &mut bias).unwrap();
        be.multiply_and_add_bias(&ap, q, &bp, q, &bias, output_scale, 1, 64, 8, &mut out).unwrap();
        out
    }

    #[test]
    fn non_unit_output_scale_matches_signed() {
        use crate::backend::SignedBackend;
        // 64 * 2 * 3 * 0.5 + 1
        assert_eq!(constant_product(SignedBackend::with_kernels(&Scalar), 0.5), vec![193.0; 8]);
        assert_eq!(constant_product(ShiftedBackend::with_kernels(&Scalar), 0.5), vec![193.0; 8]);
        assert_eq!(constant_product(ShiftedBackend::with_kernels(&Scalar), 1.0), vec![385.0; 8]);
    }

    #[test]
    fn bias_cancels_shift_at_unit_scale() {
        let be = ShiftedBackend::with_kernels(&Scalar);
        let (width, cols) = (4u32, 8u32);
        let b: Vec<f32> = (0..32).map(|v| (v % 5) as f32 - 2.0).collect();
        let mut b_prep = vec![0i8; 32];
        be.prepare_b(&b, QuantParams::symmetric(1.0), width, cols, &mut b_prep).unwrap();
        let mut bias = vec![0f32; 8];
        be.prepare_bias(&b_prep, QuantParams::symmetric(1.0), QuantParams::symmetric(1.0), width, cols, &[0.0; 8], &mut bias).unwrap();
        let sums = column_sums(&b_prep, 4, 8);
        for (got, s) in bias.iter().zip(sums) {
            assert_eq!(*got, -127.0 * s as f32);
        }
    }
}
