//! Quantize / transpose / dequantize kernels behind a runtime-selected strategy object.

pub mod scalar;
#[cfg(all(feature = "simd", target_arch = "x86_64"))]
pub mod x86;
#[cfg(all(feature = "simd", target_arch = "aarch64"))]
pub mod neon;

use crate::config::GemmConfig;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelPath {
    Scalar,
    Avx2,
    Neon,
}

impl KernelPath {
    pub const ALL: [KernelPath; 3] = [KernelPath::Scalar, KernelPath::Avx2, KernelPath::Neon];
}

impl fmt::Display for KernelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelPath::Scalar => write!(f, "scalar"),
            KernelPath::Avx2 => write!(f, "avx2"),
            KernelPath::Neon => write!(f, "neon"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown kernel path '{0}' (expected scalar, avx2 or neon)")]
pub struct ParseKernelPathError(String);

impl FromStr for KernelPath {
    type Err = ParseKernelPathError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scalar" | "standard" => Ok(KernelPath::Scalar),
            "avx2" => Ok(KernelPath::Avx2),
            "neon" => Ok(KernelPath::Neon),
            other => Err(ParseKernelPathError(other.to_string())),
        }
    }
}

/// Per-architecture preprocessing kernels.
///
/// All implementations compute identical results: quantization rounds half to
/// even and saturates to `[-127, 127]` (NaN maps to 0), dequantization is a
/// separate multiply then add. Kernels panic when a buffer is shorter than the
/// shape it is asked to process.
pub trait Preprocess: Send + Sync {
    fn path(&self) -> KernelPath;

    /// `output[i] = clamp(round(scale * input[i]), -127, 127)` for every element of `output`.
    fn quantize(&self, input: &[f32], scale: f32, output: &mut [i8]);

    /// Row-major `rows x cols` into row-major `cols x rows`.
    fn transpose_i8(&self, input: &[i8], rows: usize, cols: usize, output: &mut [i8]);
    fn transpose_i16(&self, input: &[i16], rows: usize, cols: usize, output: &mut [i16]);
    fn transpose_i32(&self, input: &[i32], rows: usize, cols: usize, output: &mut [i32]);

    /// `output[i*cols+j] = input[i*cols+j] * unquant_multiplier + bias[j]`.
    fn unquantize_add_bias(&self, input: &[i32], bias: &[f32], unquant_multiplier: f32, rows: usize, cols: usize, output: &mut [f32]);
}

impl fmt::Debug for dyn Preprocess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Preprocess({})", self.path()) }
}

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
fn avx2_kernels() -> Option<&'static dyn Preprocess> {
    if is_x86_feature_detected!("avx2") { Some(&x86::Avx2) } else { None }
}

#[cfg(not(all(feature = "simd", target_arch = "x86_64")))]
fn avx2_kernels() -> Option<&'static dyn Preprocess> { None }

#[cfg(all(feature = "simd", target_arch = "aarch64"))]
fn neon_kernels() -> Option<&'static dyn Preprocess> { Some(&neon::Neon) }

#[cfg(not(all(feature = "simd", target_arch = "aarch64")))]
fn neon_kernels() -> Option<&'static dyn Preprocess> { None }

/// Kernels for `path`, or `None` when this build or CPU cannot run them.
pub fn for_path(path: KernelPath) -> Option<&'static dyn Preprocess> {
    match path {
        KernelPath::Scalar => Some(&scalar::Scalar),
        KernelPath::Avx2 => avx2_kernels(),
        KernelPath::Neon => neon_kernels(),
    }
}

/// Every path runnable here, scalar first.
pub fn available() -> Vec<&'static dyn Preprocess> {
    KernelPath::ALL.iter().filter_map(|&p| for_path(p)).collect()
}

/// Fastest path supported by the running CPU.
pub fn detect() -> KernelPath {
    [KernelPath::Avx2, KernelPath::Neon]
        .into_iter()
        .find(|&p| for_path(p).is_some())
        .unwrap_or(KernelPath::Scalar)
}

/// Resolves the configured override, falling back to detection when it cannot run here.
pub fn select(cfg: &GemmConfig) -> &'static dyn Preprocess {
    if let Some(path) = cfg.kernel_path {
        match for_path(path) {
            Some(k) => return k,
            None => warn!("kernel path {} unavailable on this CPU/build, detecting instead", path),
        }
    }
    for_path(detect()).unwrap_or(&scalar::Scalar)
}

/// Process-wide kernels, chosen once from the environment configuration.
pub fn active() -> &'static dyn Preprocess {
    static ACTIVE: OnceLock<&'static dyn Preprocess> = OnceLock::new();
    *ACTIVE.get_or_init(|| {
        let k = select(GemmConfig::global());
        info!("int8gemm kernel path: {}", k.path());
        k
    })
}

/// Transposes one `n x n` tile; strides are in elements.
#[allow(dead_code)]
pub(crate) type TileKernel<T> = unsafe fn(src: *const T, src_stride: usize, dst: *mut T, dst_stride: usize);

/// Tiled transpose: whole `tile x tile` blocks go through `kernel`, the
/// leftover right and bottom strips through the scalar loop.
#[allow(dead_code)]
pub(crate) fn transpose_tiled<T: Copy>(input: &[T], rows: usize, cols: usize, output: &mut [T], tile: usize, kernel: TileKernel<T>) {
    let n = rows * cols;
    assert!(input.len() >= n && output.len() >= n, "transpose: buffers shorter than {}x{}", rows, cols);
    let rows_t = rows - rows % tile;
    let cols_t = cols - cols % tile;
    for i in (0..rows_t).step_by(tile) {
        for j in (0..cols_t).step_by(tile) {
            // Tile reads input rows i..i+tile at columns j..j+tile, writes output rows j..j+tile at columns i..i+tile.
            unsafe { kernel(input.as_ptr().add(i * cols + j), cols, output.as_mut_ptr().add(j * rows + i), rows) };
        }
    }
    for i in 0..rows {
        for j in cols_t..cols {
            output[j * rows + i] = input[i * cols + j];
        }
    }
    for i in rows_t..rows {
        for j in 0..cols_t {
            output[j * rows + i] = input[i * cols + j];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kernel_path() {
        assert_eq!("AVX2".parse::<KernelPath>(), Ok(KernelPath::Avx2));
        assert_eq!(" scalar ".parse::<KernelPath>(), Ok(KernelPath::Scalar));
        assert!("sse9".parse::<KernelPath>().is_err());
        assert_eq!(KernelPath::Neon.to_string(), "neon");
    }

    #[test]
    fn scalar_always_available() {
        assert_eq!(for_path(KernelPath::Scalar).map(|k| k.path()), Some(KernelPath::Scalar));
        assert_eq!(available()[0].path(), KernelPath::Scalar);
        assert!(for_path(detect()).is_some());
    }

    #[test]
    fn select_honors_override() {
        let cfg = GemmConfig { kernel_path: Some(KernelPath::Scalar), ..GemmConfig::default() };
        assert_eq!(select(&cfg).path(), KernelPath::Scalar);
    }

    #[test]
    fn tiled_driver_handles_ragged_edges() {
        unsafe fn copy_tile(src: *const i32, ss: usize, dst: *mut i32, ds: usize) {
            for r in 0..2 {
                for c in 0..2 {
                    *dst.add(c * ds + r) = *src.add(r * ss + c);
                }
            }
        }
        let (rows, cols) = (5, 7);
        let input: Vec<i32> = (0..(rows * cols) as i32).collect();
        let mut fast = vec![0; rows * cols];
        let mut reference = vec![0; rows * cols];
        transpose_tiled(&input, rows, cols, &mut fast, 2, copy_tile);
        scalar::transpose(&input, rows, cols, &mut reference);
        assert_eq!(fast, reference);
    }
}
