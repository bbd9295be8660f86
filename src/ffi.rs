//! C ABI. Each backend exports the same seven functions under its own prefix
//! (`signed_int8PrepareA`, `shifted_int8PrepareA`, ...).
//!
//! Buffer sizes are implied by the dimensions, so pointers must be valid for
//! the element counts of the contract. Dimension, scale, index and null
//! pointer violations are logged at error level. Debug builds then panic,
//! which aborts the process at the `extern "C"` boundary; release builds
//! return with the output untouched.
#![allow(non_snake_case, clippy::too_many_arguments)]

use crate::backend::{Backend, BackendContext, QuantParams, ShiftedBackend, SignedBackend};
use crate::error::{GemmError, Result};
use crate::shape::{check_columns, Index, Shape};
use log::error;
use std::slice;

unsafe fn input<'a, T>(what: &'static str, ptr: *const T, len: usize) -> Result<&'a [T]> {
    if ptr.is_null() {
        return Err(GemmError::NullPointer(what));
    }
    Ok(slice::from_raw_parts(ptr, len))
}

unsafe fn output<'a, T>(what: &'static str, ptr: *mut T, len: usize) -> Result<&'a mut [T]> {
    if ptr.is_null() {
        return Err(GemmError::NullPointer(what));
    }
    Ok(slice::from_raw_parts_mut(ptr, len))
}

fn run<B: Backend>(op: &str, f: impl FnOnce(&B) -> Result<()>) {
    let backend = B::from_context(BackendContext::default());
    if let Err(e) = f(&backend) {
        error!("{}_int8{}: contract violation: {}", B::NAME, op, e);
        if cfg!(debug_assertions) {
            panic!("{}_int8{}: {}", B::NAME, op, e);
        }
    }
}

unsafe fn prepare_a<B: Backend>(a: *const f32, scale: f32, zero_point: f32, rows_a: Index, width: Index, out: *mut i8) {
    run::<B>("PrepareA", |be| {
        let shape = Shape::new(rows_a, width, 0);
        shape.check_interface()?;
        let a = input("A", a, shape.a_len())?;
        let out = output("output", out, shape.a_len())?;
        be.prepare_a(a, QuantParams::new(scale, zero_point), rows_a, width, out)
    })
}

unsafe fn prepare_b<B: Backend>(b: *const f32, scale: f32, zero_point: f32, width: Index, cols_b: Index, out: *mut i8) {
    run::<B>("PrepareB", |be| {
        let shape = Shape::new(0, width, cols_b);
        shape.check_interface()?;
        let b = input("B", b, shape.b_len())?;
        let out = output("output", out, shape.b_len())?;
        be.prepare_b(b, QuantParams::new(scale, zero_point), width, cols_b, out)
    })
}

unsafe fn prepare_b_from_transposed<B: Backend>(bt: *const f32, scale: f32, zero_point: f32, width: Index, cols_b: Index, out: *mut i8) {
    run::<B>("PrepareBFromTransposed", |be| {
        let shape = Shape::new(0, width, cols_b);
        shape.check_interface()?;
        let bt = input("B transposed", bt, shape.b_len())?;
        let out = output("output", out, shape.b_len())?;
        be.prepare_b_from_transposed(bt, QuantParams::new(scale, zero_point), width, cols_b, out)
    })
}

unsafe fn prepare_b_from_quantized_transposed<B: Backend>(bqt: *const i8, width: Index, cols_b: Index, out: *mut i8) {
    run::<B>("PrepareBFromQuantizedTransposed", |be| {
        let shape = Shape::new(0, width, cols_b);
        shape.check_interface()?;
        let bqt = input("B quantized transposed", bqt, shape.b_len())?;
        let out = output("output", out, shape.b_len())?;
        be.prepare_b_from_quantized_transposed(bqt, width, cols_b, out)
    })
}

unsafe fn prepare_bias<B: Backend>(b_prep: *const i8, scale_a: f32, zp_a: f32, scale_b: f32, zp_b: f32, width: Index, cols_b: Index, bias: *const f32, out: *mut f32) {
    run::<B>("PrepareBias", |be| {
        let shape = Shape::new(0, width, cols_b);
        shape.check_interface()?;
        let b_prep = input("prepared B", b_prep, shape.b_len())?;
        let bias = input("bias", bias, cols_b as usize)?;
        let out = output("output", out, cols_b as usize)?;
        be.prepare_bias(b_prep, QuantParams::new(scale_a, zp_a), QuantParams::new(scale_b, zp_b), width, cols_b, bias, out)
    })
}

unsafe fn multiply_and_add_bias<B: Backend>(
    a_prep: *const i8,
    scale_a: f32,
    zp_a: f32,
    b_prep: *const i8,
    scale_b: f32,
    zp_b: f32,
    bias_prep: *const f32,
    out_scale: f32,
    rows_a: Index,
    width: Index,
    cols_b: Index,
    out: *mut f32,
) {
    run::<B>("MultiplyAndAddBias", |be| {
        let shape = Shape::new(rows_a, width, cols_b);
        shape.check_interface()?;
        let a_prep = input("prepared A", a_prep, shape.a_len())?;
        let b_prep = input("prepared B", b_prep, shape.b_len())?;
        let bias_prep = input("prepared bias", bias_prep, cols_b as usize)?;
        let out = output("output", out, shape.out_len())?;
        be.multiply_and_add_bias(a_prep, QuantParams::new(scale_a, zp_a), b_prep, QuantParams::new(scale_b, zp_b), bias_prep, out_scale, rows_a, width, cols_b, out)
    })
}

unsafe fn select_columns_of_b<B: Backend>(b_prep: *const i8, width: Index, cols_b: Index, cols: *const Index, num_cols: Index, out: *mut i8) {
    run::<B>("SelectColumnsOfB", |be| {
        let shape = Shape::new(0, width, cols_b);
        shape.check_interface()?;
        let b_prep = input("prepared B", b_prep, shape.b_len())?;
        let cols = input("cols", cols, num_cols as usize)?;
        check_columns(cols, cols_b)?;
        let out = output("output", out, width as usize * num_cols as usize)?;
        be.select_columns_of_b(b_prep, width, cols_b, cols, out)
    })
}

/// # Safety
/// `A` holds `rows_A * width` floats, `out` has room for as many bytes.
#[no_mangle]
pub unsafe extern "C" fn signed_int8PrepareA(A: *const f32, scale: f32, zero_point: f32, rows_A: Index, width: Index, out: *mut i8) {
    prepare_a::<SignedBackend>(A, scale, zero_point, rows_A, width, out)
}

/// # Safety
/// `B` holds `width * cols_B` floats, `out` has room for as many bytes.
#[no_mangle]
pub unsafe extern "C" fn signed_int8PrepareB(B: *const f32, scale: f32, zero_point: f32, width: Index, cols_B: Index, out: *mut i8) {
    prepare_b::<SignedBackend>(B, scale, zero_point, width, cols_B, out)
}

/// # Safety
/// As [`signed_int8PrepareB`], with `Bt` column-major.
#[no_mangle]
pub unsafe extern "C" fn signed_int8PrepareBFromTransposed(Bt: *const f32, scale: f32, zero_point: f32, width: Index, cols_B: Index, out: *mut i8) {
    prepare_b_from_transposed::<SignedBackend>(Bt, scale, zero_point, width, cols_B, out)
}

/// # Safety
/// `Bqt` and `out` each hold `width * cols_B` bytes.
#[no_mangle]
pub unsafe extern "C" fn signed_int8PrepareBFromQuantizedTransposed(Bqt: *const i8, width: Index, cols_B: Index, out: *mut i8) {
    prepare_b_from_quantized_transposed::<SignedBackend>(Bqt, width, cols_B, out)
}

/// # Safety
/// `Bprep` holds `width * cols_B` bytes; `bias` and `out` hold `cols_B` floats.
#[no_mangle]
pub unsafe extern "C" fn signed_int8PrepareBias(Bprep: *const i8, scaleA: f32, zpA: f32, scaleB: f32, zpB: f32, width: Index, cols_B: Index, bias: *const f32, out: *mut f32) {
    prepare_bias::<SignedBackend>(Bprep, scaleA, zpA, scaleB, zpB, width, cols_B, bias, out)
}

/// # Safety
/// Buffers hold `rows_A * width`, `width * cols_B`, `cols_B` and `rows_A * cols_B` elements.
#[no_mangle]
pub unsafe extern "C" fn signed_int8MultiplyAndAddBias(
    Aprep: *const i8,
    scaleA: f32,
    zpA: f32,
    Bprep: *const i8,
    scaleB: f32,
    zpB: f32,
    biasPrep: *const f32,
    outScale: f32,
    rows_A: Index,
    width: Index,
    cols_B: Index,
    out: *mut f32,
) {
    multiply_and_add_bias::<SignedBackend>(Aprep, scaleA, zpA, Bprep, scaleB, zpB, biasPrep, outScale, rows_A, width, cols_B, out)
}

/// # Safety
/// `Bprep` holds `width * cols_B` bytes, `cols` holds `num_cols` indices, `out` has room for `width * num_cols` bytes.
#[no_mangle]
pub unsafe extern "C" fn signed_int8SelectColumnsOfB(Bprep: *const i8, width: Index, cols_B: Index, cols: *const Index, num_cols: Index, out: *mut i8) {
    select_columns_of_b::<SignedBackend>(Bprep, width, cols_B, cols, num_cols, out)
}

/// # Safety
/// See [`signed_int8PrepareA`].
#[no_mangle]
pub unsafe extern "C" fn shifted_int8PrepareA(A: *const f32, scale: f32, zero_point: f32, rows_A: Index, width: Index, out: *mut i8) {
    prepare_a::<ShiftedBackend>(A, scale, zero_point, rows_A, width, out)
}

/// # Safety
/// See [`signed_int8PrepareB`].
#[no_mangle]
pub unsafe extern "C" fn shifted_int8PrepareB(B: *const f32, scale: f32, zero_point: f32, width: Index, cols_B: Index, out: *mut i8) {
    prepare_b::<ShiftedBackend>(B, scale, zero_point, width, cols_B, out)
}

/// # Safety
/// See [`signed_int8PrepareBFromTransposed`].
#[no_mangle]
pub unsafe extern "C" fn shifted_int8PrepareBFromTransposed(Bt: *const f32, scale: f32, zero_point: f32, width: Index, cols_B: Index, out: *mut i8) {
    prepare_b_from_transposed::<ShiftedBackend>(Bt, scale, zero_point, width, cols_B, out)
}

/// # Safety
/// See [`signed_int8PrepareBFromQuantizedTransposed`].
#[no_mangle]
pub unsafe extern "C" fn shifted_int8PrepareBFromQuantizedTransposed(Bqt: *const i8, width: Index, cols_B: Index, out: *mut i8) {
    prepare_b_from_quantized_transposed::<ShiftedBackend>(Bqt, width, cols_B, out)
}

/// # Safety
/// See [`signed_int8PrepareBias`].
#[no_mangle]
pub unsafe extern "C" fn shifted_int8PrepareBias(Bprep: *const i8, scaleA: f32, zpA: f32, scaleB: f32, zpB: f32, width: Index, cols_B: Index, bias: *const f32, out: *mut f32) {
    prepare_bias::<ShiftedBackend>(Bprep, scaleA, zpA, scaleB, zpB, width, cols_B, bias, out)
}

/// # Safety
/// See [`signed_int8MultiplyAndAddBias`].
#[no_mangle]
pub unsafe extern "C" fn shifted_int8MultiplyAndAddBias(
    Aprep: *const i8,
    scaleA: f32,
    zpA: f32,
    Bprep: *const i8,
    scaleB: f32,
    zpB: f32,
    biasPrep: *const f32,
    outScale: f32,
    rows_A: Index,
    width: Index,
    cols_B: Index,
    out: *mut f32,
) {
    multiply_and_add_bias::<ShiftedBackend>(Aprep, scaleA, zpA, Bprep, scaleB, zpB, biasPrep, outScale, rows_A, width, cols_B, out)
}

/// # Safety
/// See [`signed_int8SelectColumnsOfB`].
#[no_mangle]
pub unsafe extern "C" fn shifted_int8SelectColumnsOfB(Bprep: *const i8, width: Index, cols_B: Index, cols: *const Index, num_cols: Index, out: *mut i8) {
    select_columns_of_b::<ShiftedBackend>(Bprep, width, cols_B, cols, num_cols, out)
}
