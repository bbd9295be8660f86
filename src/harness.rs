//! Matrix generation, the naive reference multiply and whole-pipeline drivers,
//! shared by the integration tests, the benches and the `crosscheck` binary.

use crate::backend::{Backend, QuantParams};
use crate::error::Result;
use crate::layout::Layout;
use crate::prepared::Gemm;
use crate::shape::Index;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::Uniform;
use serde::Serialize;

pub fn random_matrix(rng: &mut SmallRng, len: usize, lo: f32, hi: f32) -> Vec<f32> {
    let dist = Uniform::new_inclusive(lo, hi);
    (0..len).map(|_| rng.sample(dist)).collect()
}

/// Integer-valued floats in `[lo, hi]`.
pub fn random_int_matrix(rng: &mut SmallRng, len: usize, lo: i32, hi: i32) -> Vec<f32> {
    let dist = Uniform::new_inclusive(lo, hi);
    (0..len).map(|_| rng.sample(dist) as f32).collect()
}

/// Operands of one `rows x width x cols` problem, all row-major.
#[derive(Debug, Clone)]
pub struct Problem {
    pub rows: Index,
    pub width: Index,
    pub cols: Index,
    pub a: Vec<f32>,
    pub b: Vec<f32>,
    pub bias: Vec<f32>,
}

/// Floats in `[-1, 1]` for A, B and the bias.
pub fn generate_input(rng: &mut SmallRng, rows: Index, width: Index, cols: Index) -> Problem {
    let (m, n, p) = (rows as usize, width as usize, cols as usize);
    Problem {
        rows,
        width,
        cols,
        a: random_matrix(rng, m * n, -1.0, 1.0),
        b: random_matrix(rng, n * p, -1.0, 1.0),
        bias: random_matrix(rng, p, -1.0, 1.0),
    }
}

/// A in `[0, 127]`, B in `[-8, 8]`, bias in `[0, 127]`, all integers. Exact at scale 1.
pub fn generate_integral_input(rng: &mut SmallRng, rows: Index, width: Index, cols: Index) -> Problem {
    let (m, n, p) = (rows as usize, width as usize, cols as usize);
    Problem {
        rows,
        width,
        cols,
        a: random_int_matrix(rng, m * n, 0, 127),
        b: random_int_matrix(rng, n * p, -8, 8),
        bias: random_int_matrix(rng, p, 0, 127),
    }
}

/// `out[i][j] = sum_k a[i][k] * b[k][j] + bias[j]`, row-major `m x p`.
pub fn reference_multiply(a: &[f32], b: &[f32], bias: &[f32], m: usize, n: usize, p: usize) -> Vec<f32> {
    let mut out = vec![0f32; m * p];
    for i in 0..m {
        for j in 0..p {
            let mut acc = 0f32;
            for k in 0..n {
                acc += a[i * n + k] * b[k * p + j];
            }
            out[i * p + j] = acc + bias[j];
        }
    }
    out
}

/// Mean of squared differences over the common prefix.
pub fn mean_squared_error(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = a.iter().zip(b).map(|(&x, &y)| { let d = x as f64 - y as f64; d * d }).sum();
    sum / n as f64
}

/// Columns `cols` of a row-major `rows x num_cols` matrix, as a row-major `rows x cols.len()` matrix.
pub fn index_select(input: &[f32], rows: usize, num_cols: usize, cols: &[Index]) -> Vec<f32> {
    let mut out = Vec::with_capacity(rows * cols.len());
    for i in 0..rows {
        let row = &input[i * num_cols..(i + 1) * num_cols];
        out.extend(cols.iter().map(|&c| row[c as usize]));
    }
    out
}

/// Row-major `rows x cols` into column-major storage of the same matrix.
pub fn to_col_major<T: Copy + Default>(input: &[T], rows: usize, cols: usize) -> Vec<T> {
    let (src, dst) = (Layout::row_major(rows, cols), Layout::col_major(rows, cols));
    let mut out = vec![T::default(); dst.num_elem()];
    for i in 0..rows {
        for j in 0..cols {
            out[dst.index(i, j)] = input[src.index(i, j)];
        }
    }
    out
}

/// Scales that map `[-1, 1]`-ranged data to the full int8 range. Integral data uses 1.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Scales {
    pub a: f32,
    pub b: f32,
}

impl Scales {
    pub fn unit() -> Self { Self { a: 1.0, b: 1.0 } }
    pub fn full_range() -> Self { Self { a: 127.0, b: 127.0 } }
}

/// `PrepareA -> PrepareB -> PrepareBias -> MultiplyAndAddBias` with output scale 1.
pub fn run_pipeline<B: Backend>(gemm: &Gemm<B>, p: &Problem, scales: Scales) -> Result<Vec<f32>> {
    let qa = QuantParams::symmetric(scales.a);
    let qb = QuantParams::symmetric(scales.b);
    let a = gemm.prepare_a(&p.a, qa, p.rows, p.width)?;
    let b = gemm.prepare_b(&p.b, qb, p.width, p.cols)?;
    let bias = gemm.prepare_bias(qa, &b, &p.bias)?;
    gemm.multiply_and_add_bias(&a, &b, &bias, 1.0)
}

/// Same pipeline on the columns `cols` of B, selected after preparation.
pub fn run_selected<B: Backend>(gemm: &Gemm<B>, p: &Problem, scales: Scales, cols: &[Index]) -> Result<Vec<f32>> {
    let qa = QuantParams::symmetric(scales.a);
    let qb = QuantParams::symmetric(scales.b);
    let a = gemm.prepare_a(&p.a, qa, p.rows, p.width)?;
    let b = gemm.prepare_b(&p.b, qb, p.width, p.cols)?;
    let selected = gemm.select_columns(&b, cols)?;
    let bias_sel = index_select(&p.bias, 1, p.cols as usize, cols);
    let bias = gemm.prepare_bias(qa, &selected, &bias_sel)?;
    gemm.multiply_and_add_bias(&a, &selected, &bias, 1.0)
}

/// Pipeline starting from B quantized with scale `scales.b` and stored column-major.
pub fn run_from_quantized_transposed<B: Backend>(gemm: &Gemm<B>, p: &Problem, scales: Scales) -> Result<Vec<f32>> {
    let qa = QuantParams::symmetric(scales.a);
    let qb = QuantParams::symmetric(scales.b);
    let (width, cols) = (p.width as usize, p.cols as usize);
    let mut quantized = vec![0i8; width * cols];
    gemm.backend().kernels().quantize(&to_col_major(&p.b, width, cols), qb.scale, &mut quantized);
    let a = gemm.prepare_a(&p.a, qa, p.rows, p.width)?;
    let b = gemm.prepare_b_from_quantized_transposed(&quantized, qb, p.width, p.cols)?;
    let bias = gemm.prepare_bias(qa, &b, &p.bias)?;
    gemm.multiply_and_add_bias(&a, &b, &bias, 1.0)
}

/// Random distinct-or-repeated column indices, `count` of them, all `< cols_b`.
pub fn random_columns(rng: &mut SmallRng, cols_b: Index, count: usize) -> Vec<Index> {
    (0..count).map(|_| rng.gen_range(0..cols_b)).collect()
}
