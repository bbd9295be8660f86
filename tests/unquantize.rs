use int8gemm::kernels::{self, scalar};

#[test]
fn bias_cycles_per_row() {
    let (rows, cols) = (3usize, 8usize);
    let input: Vec<i32> = (0..(rows * cols) as i32).collect();
    let bias: Vec<f32> = (0..cols).map(|j| 100.0 * j as f32).collect();
    let mut out = vec![0f32; rows * cols];
    scalar::unquantize_add_bias(&input, &bias, 0.5, rows, cols, &mut out);
    assert_eq!(out[0], 0.0);
    assert_eq!(out[cols + 1], (cols + 1) as f32 * 0.5 + 100.0);
    assert_eq!(out[2 * cols + 7], (2 * cols + 7) as f32 * 0.5 + 700.0);
}

#[test]
fn fast_paths_are_bit_exact() {
    let (rows, cols) = (5usize, 72usize);
    let input: Vec<i32> = (0..(rows * cols) as i32).map(|v| v * 37 - 5000).collect();
    let bias: Vec<f32> = (0..cols).map(|j| j as f32 * 0.25 - 3.0).collect();
    let mult = 1.0 / (127.0 * 127.0);
    let mut reference = vec![0f32; rows * cols];
    scalar::unquantize_add_bias(&input, &bias, mult, rows, cols, &mut reference);
    for k in kernels::available() {
        let mut out = vec![0f32; rows * cols];
        k.unquantize_add_bias(&input, &bias, mult, rows, cols, &mut out);
        assert_eq!(out, reference, "{}", k.path());
    }
}
