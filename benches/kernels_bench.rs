use criterion::{criterion_group, criterion_main, Criterion, black_box};
use int8gemm::harness;
use int8gemm::kernels;
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn bench_kernels(c: &mut Criterion) {
    let (rows, cols) = (256usize, 256usize);
    let mut rng = SmallRng::seed_from_u64(11);
    let input = harness::random_matrix(&mut rng, rows * cols, -1.0, 1.0);
    let acc: Vec<i32> = (0..(rows * cols) as i32).map(|v| v % 4096 - 2048).collect();
    let bias = harness::random_matrix(&mut rng, cols, -1.0, 1.0);

    for k in kernels::available() {
        let path = k.path();
        let mut q = vec![0i8; rows * cols];
        c.bench_function(&format!("quantize_{}_{}x{}", path, rows, cols), |ben| {
            ben.iter(|| k.quantize(black_box(&input), 127.0, &mut q))
        });
        let mut t = vec![0i8; rows * cols];
        c.bench_function(&format!("transpose_i8_{}_{}x{}", path, rows, cols), |ben| {
            ben.iter(|| k.transpose_i8(black_box(&q), rows, cols, &mut t))
        });
        let mut out = vec![0f32; rows * cols];
        c.bench_function(&format!("unquantize_add_bias_{}_{}x{}", path, rows, cols), |ben| {
            ben.iter(|| k.unquantize_add_bias(black_box(&acc), &bias, 1.0 / (127.0 * 127.0), rows, cols, &mut out))
        });
    }
}

criterion_group!(benches, bench_kernels);
criterion_main!(benches);
