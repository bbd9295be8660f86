use crate::kernels::KernelPath;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Forces a kernel path (`scalar`, `avx2`, `neon`).
pub const ENV_KERNEL_PATH: &str = "INT8GEMM_KERNEL_PATH";
/// Rows of A at or above which the multiply runs rows in parallel.
pub const ENV_PARALLEL_MIN_ROWS: &str = "INT8GEMM_PARALLEL_MIN_ROWS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemmConfig {
    pub kernel_path: Option<KernelPath>,
    pub parallel_min_rows: usize,
}

impl Default for GemmConfig {
    fn default() -> Self { Self { kernel_path: None, parallel_min_rows: 64 } }
}

impl GemmConfig {
    /// Defaults overridden by the environment; unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var(ENV_KERNEL_PATH) {
            match v.parse::<KernelPath>() {
                Ok(p) => cfg.kernel_path = Some(p),
                Err(e) => warn!("ignoring {}={}: {}", ENV_KERNEL_PATH, v, e),
            }
        }
        if let Ok(v) = std::env::var(ENV_PARALLEL_MIN_ROWS) {
            match v.trim().parse::<usize>() {
                Ok(n) => cfg.parallel_min_rows = n.max(1),
                Err(e) => warn!("ignoring {}={}: {}", ENV_PARALLEL_MIN_ROWS, v, e),
            }
        }
        cfg
    }

    /// Environment configuration, read once per process.
    pub fn global() -> &'static GemmConfig {
        static GLOBAL: OnceLock<GemmConfig> = OnceLock::new();
        GLOBAL.get_or_init(GemmConfig::from_env)
    }
}
