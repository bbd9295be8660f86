// Int8 quantized matrix multiply: preprocessing kernels plus two backends
pub mod aligned;
pub mod backend;
pub mod config;
pub mod error;
pub mod ffi;
pub mod gemm;
#[cfg(feature = "harness")]
pub mod harness;
pub mod kernels;
pub mod layout;
pub mod prepared;
pub mod select;
pub mod shape;

pub use backend::{Backend, BackendContext, QuantParams, ShiftedBackend, SignedBackend};
pub use config::GemmConfig;
pub use error::{GemmError, Result};
pub use kernels::{KernelPath, Preprocess};
pub use prepared::{Gemm, PreparedA, PreparedB, PreparedBias};
pub use shape::{Index, Shape};
