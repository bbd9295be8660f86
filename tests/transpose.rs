use int8gemm::kernels::{self, scalar};

#[test]
fn transpose_i8_twice_is_identity() {
    for &(rows, cols) in &[(16usize, 16usize), (32, 64), (64, 16), (48, 80)] {
        let input: Vec<i8> = (0..rows * cols).map(|v| (v % 251) as i8).collect();
        for k in kernels::available() {
            let mut t = vec![0i8; rows * cols];
            let mut back = vec![0i8; rows * cols];
            k.transpose_i8(&input, rows, cols, &mut t);
            k.transpose_i8(&t, cols, rows, &mut back);
            assert_eq!(back, input, "{} {}x{}", k.path(), rows, cols);
        }
    }
}

#[test]
fn transpose_matches_scalar_on_ragged_shapes() {
    // cols_B = 8 mod 16 leaves a strip for the scalar loop
    for &(rows, cols) in &[(64usize, 8usize), (64, 24), (20, 40), (7, 9)] {
        let input: Vec<i8> = (0..rows * cols).map(|v| (v * 7 % 255) as i8).collect();
        let mut reference = vec![0i8; rows * cols];
        scalar::transpose(&input, rows, cols, &mut reference);
        for k in kernels::available() {
            let mut out = vec![0i8; rows * cols];
            k.transpose_i8(&input, rows, cols, &mut out);
            assert_eq!(out, reference, "{} {}x{}", k.path(), rows, cols);
        }
    }
}

#[test]
fn transpose_i16_and_i32() {
    let (rows, cols) = (24usize, 40usize);
    let input16: Vec<i16> = (0..(rows * cols) as i16).map(|v| v * 3 - 1000).collect();
    let input32: Vec<i32> = (0..(rows * cols) as i32).map(|v| v * 100_003).collect();
    let mut ref16 = vec![0i16; rows * cols];
    let mut ref32 = vec![0i32; rows * cols];
    scalar::transpose(&input16, rows, cols, &mut ref16);
    scalar::transpose(&input32, rows, cols, &mut ref32);
    assert_eq!(ref16[1], input16[cols]);
    for k in kernels::available() {
        let mut out16 = vec![0i16; rows * cols];
        let mut out32 = vec![0i32; rows * cols];
        k.transpose_i16(&input16, rows, cols, &mut out16);
        k.transpose_i32(&input32, rows, cols, &mut out32);
        assert_eq!(out16, ref16, "{} i16", k.path());
        assert_eq!(out32, ref32, "{} i32", k.path());
    }
}
