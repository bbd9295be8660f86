#![cfg(feature = "harness")]

use int8gemm::harness::{self, to_col_major, Scales};
use int8gemm::kernels;
use int8gemm::{Backend, Gemm, QuantParams, ShiftedBackend, SignedBackend};
use pretty_assertions::assert_eq;
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn variants_agree<B: Backend + Default>() {
    let gemm = Gemm::new(B::default());
    let mut rng = SmallRng::seed_from_u64(12);
    let (width, cols) = (128u32, 64u32);
    let b = harness::random_matrix(&mut rng, (width * cols) as usize, -1.0, 1.0);
    let q = QuantParams::symmetric(127.0);

    let direct = gemm.prepare_b(&b, q, width, cols).unwrap();
    let bt = to_col_major(&b, width as usize, cols as usize);
    let from_t = gemm.prepare_b_from_transposed(&bt, q, width, cols).unwrap();
    let mut bqt = vec![0i8; bt.len()];
    kernels::active().quantize(&bt, q.scale, &mut bqt);
    let from_qt = gemm.prepare_b_from_quantized_transposed(&bqt, q, width, cols).unwrap();

    assert_eq!(direct.as_slice(), from_t.as_slice(), "{} from transposed", B::NAME);
    assert_eq!(direct.as_slice(), from_qt.as_slice(), "{} from quantized transposed", B::NAME);
}

#[test]
fn signed_prepare_b_variants() { variants_agree::<SignedBackend>(); }

#[test]
fn shifted_prepare_b_variants() { variants_agree::<ShiftedBackend>(); }

#[test]
fn quantized_transposed_pipelines_agree_across_backends() {
    let mut rng = SmallRng::seed_from_u64(13);
    let prob = harness::generate_integral_input(&mut rng, 64, 64, 128);
    let signed = harness::run_from_quantized_transposed(&Gemm::new(SignedBackend::default()), &prob, Scales::unit()).unwrap();
    let shifted = harness::run_from_quantized_transposed(&Gemm::new(ShiftedBackend::default()), &prob, Scales::unit()).unwrap();
    let reference = harness::reference_multiply(&prob.a, &prob.b, &prob.bias, 64, 64, 128);
    assert_eq!(signed, shifted);
    assert_eq!(signed, reference);
}

#[test]
fn signed_layout_is_column_major() {
    let gemm = Gemm::new(SignedBackend::default());
    let (width, cols) = (4u32, 8u32);
    let b: Vec<f32> = (0..32).map(|v| v as f32).collect();
    let prepared = gemm.prepare_b(&b, QuantParams::symmetric(1.0), width, cols).unwrap();
    let expected: Vec<i8> = to_col_major(&b, 4, 8).iter().map(|&v| v as i8).collect();
    assert_eq!(prepared.as_slice(), &expected[..]);
}
