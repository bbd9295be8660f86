use int8gemm::{Backend, GemmError, QuantParams, Shape, ShiftedBackend, SignedBackend};

fn contract_errors<B: Backend + Default>() {
    let be = B::default();
    let q = QuantParams::symmetric(1.0);
    let mut out = vec![0i8; 64 * 64];

    assert_eq!(be.prepare_a(&[0.0; 6], q, 1, 6, &mut out).unwrap_err(), GemmError::Width { width: 6, multiple: 4 });
    assert_eq!(be.prepare_b(&[0.0; 64 * 12], q, 64, 12, &mut out).unwrap_err(), GemmError::Cols { cols: 12, multiple: 8 });
    assert_eq!(
        be.prepare_b(&[0.0; 100], q, 64, 8, &mut out).unwrap_err(),
        GemmError::BufferLength { what: "input B", expected: 512, actual: 100 }
    );
    assert_eq!(
        be.prepare_b(&[0.0; 512], q, 64, 8, &mut out[..10]).unwrap_err(),
        GemmError::BufferLength { what: "prepared B", expected: 512, actual: 10 }
    );

    // longer buffers are fine, only the prefix is written
    let mut long = vec![99i8; 600];
    be.prepare_b(&[0.0; 512], q, 64, 8, &mut long).unwrap();
    assert!(long[512..].iter().all(|&v| v == 99));
}

#[test]
fn signed_contract() { contract_errors::<SignedBackend>(); }

#[test]
fn shifted_contract() { contract_errors::<ShiftedBackend>(); }

#[test]
fn interface_contract_is_stricter() {
    let s = Shape::new(1, 16, 8);
    assert!(s.check().is_ok());
    assert_eq!(s.check_interface().unwrap_err(), GemmError::Width { width: 16, multiple: 64 });
    assert!(Shape::new(3, 128, 24).check_interface().is_ok());
}

#[test]
fn multiply_checks_every_buffer() {
    let be = SignedBackend::default();
    let q = QuantParams::symmetric(1.0);
    let (a, b, bias) = (vec![0i8; 64], vec![0i8; 64 * 8], vec![0f32; 8]);
    let mut out = vec![0f32; 8];
    assert!(be.multiply_and_add_bias(&a, q, &b, q, &bias, 1.0, 1, 64, 8, &mut out).is_ok());
    let err = be.multiply_and_add_bias(&a, q, &b, q, &bias[..4], 1.0, 1, 64, 8, &mut out).unwrap_err();
    assert_eq!(err, GemmError::BufferLength { what: "prepared bias", expected: 8, actual: 4 });
    let err = be.multiply_and_add_bias(&a, q, &b, q, &bias, f32::NAN, 1, 64, 8, &mut out).unwrap_err();
    assert!(matches!(err, GemmError::Scale { what: "output scale", .. }));
}
