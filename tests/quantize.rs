#![cfg(feature = "harness")]

use int8gemm::harness::{mean_squared_error, random_matrix};
use int8gemm::kernels::{self, scalar, KernelPath};
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn as_f32(v: &[i8]) -> Vec<f32> { v.iter().map(|&x| x as f32).collect() }

#[test]
fn fast_paths_match_scalar_on_8x64() {
    let mut rng = SmallRng::seed_from_u64(42);
    let input = random_matrix(&mut rng, 8 * 64, -1.0, 1.0);
    let mut reference = vec![0i8; input.len()];
    scalar::quantize(&input, 127.0, &mut reference);
    for k in kernels::available() {
        let mut out = vec![0i8; input.len()];
        k.quantize(&input, 127.0, &mut out);
        let mse = mean_squared_error(&as_f32(&out), &as_f32(&reference));
        assert!(mse < 1e-9, "{} quantize mse {}", k.path(), mse);
    }
}

#[test]
fn saturates_and_rounds_half_to_even() {
    let input = [1000.0f32, -1000.0, 0.5, 1.5, 2.5, -0.5, -2.5, 126.6, f32::NAN, f32::INFINITY, f32::NEG_INFINITY, 0.0];
    let expected = [127i8, -127, 0, 2, 2, 0, -2, 127, 0, 127, -127, 0];
    for k in kernels::available() {
        // odd lengths exercise the vector body and the tail
        let big: Vec<f32> = input.iter().cycle().take(input.len() * 5).copied().collect();
        let mut out = vec![0i8; big.len()];
        k.quantize(&big, 1.0, &mut out);
        for (i, &v) in out.iter().enumerate() {
            assert_eq!(v, expected[i % input.len()], "{} at {} (input {})", k.path(), i, big[i]);
        }
    }
}

#[test]
fn round_trip_error_bounded_by_inverse_scale() {
    let scale = 127.0f32;
    let mut rng = SmallRng::seed_from_u64(3);
    let input = random_matrix(&mut rng, 1024, -1.0, 1.0);
    let k = kernels::for_path(KernelPath::Scalar).unwrap();
    let mut q = vec![0i8; input.len()];
    k.quantize(&input, scale, &mut q);
    for (x, &v) in input.iter().zip(&q) {
        let back = v as f32 / scale;
        assert!((back - x).abs() <= 1.0 / scale, "{} -> {} -> {}", x, v, back);
    }
}
