use qconv::testing::{fingerprint, random_qtensor, RecordingBackend};
use qconv::{Conv2dOptions, QConvError, QTensor, QuantDType, QuantParams, QuantizedConv2d, Tensor};

fn wparams() -> QuantParams { QuantParams::new(0.05, 0, QuantDType::QInt8).unwrap() }

fn layer(groups: usize) -> QuantizedConv2d<RecordingBackend> {
    let w = random_qtensor(vec![8, 4, 3, 3], wparams(), 1).unwrap();
    QuantizedConv2d::new(
        RecordingBackend::new(),
        w,
        Tensor::zeros(vec![8]),
        QuantParams::new(0.1, 0, QuantDType::QUInt8).unwrap(),
        Conv2dOptions::default().with_groups(groups),
    )
    .unwrap()
}

#[test]
fn read_returns_packed_form_of_current_weight() {
    let l = layer(1);
    let raw = l.raw_weight().unwrap();
    let packed = l.get_packed_weight().unwrap();
    assert_eq!(packed.fingerprint, fingerprint(raw));
    assert_eq!(packed.shape, [8, 4, 3, 3]);
}

#[test]
fn second_set_replaces_packed_weight() {
    let mut l = layer(2);
    let first = random_qtensor(vec![8, 4, 3, 3], wparams(), 2).unwrap();
    let second = random_qtensor(vec![8, 4, 3, 3], wparams(), 3).unwrap();
    assert_ne!(first, second);

    l.set_weight(first.clone()).unwrap();
    assert_eq!(l.get_packed_weight().unwrap().fingerprint, fingerprint(&first));
    l.set_weight(second.clone()).unwrap();
    let packed = l.get_packed_weight().unwrap();
    assert_eq!(packed.fingerprint, fingerprint(&second));
    assert_ne!(packed.fingerprint, fingerprint(&first));
    // repacked with the layer's groups
    assert_eq!(packed.groups, 2);
    assert_eq!(l.raw_weight(), Some(&second));
    assert_eq!(l.backend().prepack_calls(), 3);
}

#[test]
fn set_weight_rederives_kernel_and_channels() {
    let mut l = layer(1);
    let w = random_qtensor(vec![8, 2, 5, 1], wparams(), 4).unwrap();
    l.set_weight(w).unwrap();
    assert_eq!(l.in_channels(), 2);
    assert_eq!(l.out_channels(), 8);
    assert_eq!(l.kernel_size(), (5, 1));
}

#[test]
fn failed_set_keeps_previous_weight() {
    let mut l = layer(1);
    let before = l.get_packed_weight().unwrap().clone();

    let bad_rank = random_qtensor(vec![8, 4, 9], wparams(), 5).unwrap();
    assert!(matches!(l.set_weight(bad_rank), Err(QConvError::Shape(_))));
    // bias holds 8 outputs
    let bad_out = random_qtensor(vec![6, 4, 3, 3], wparams(), 6).unwrap();
    assert!(matches!(l.set_weight(bad_out), Err(QConvError::Shape(_))));

    assert_eq!(l.get_packed_weight().unwrap(), &before);
    assert_eq!(l.in_channels(), 4);
    assert_eq!(l.backend().prepack_calls(), 1);
}

#[test]
fn clear_then_read_signals_unset() {
    let mut l = layer(1);
    let raw = l.clear_weight();
    assert!(raw.is_some());
    assert!(!l.has_weight());
    assert!(l.raw_weight().is_none());
    assert!(matches!(l.get_packed_weight(), Err(QConvError::WeightUnset)));
    // second clear is a no-op
    assert!(l.clear_weight().is_none());
}

#[test]
fn set_after_clear_restores_layer() {
    let mut l = layer(1);
    let raw: QTensor = l.clear_weight().unwrap();
    l.set_weight(raw.clone()).unwrap();
    assert!(l.has_weight());
    assert_eq!(l.get_packed_weight().unwrap().fingerprint, fingerprint(&raw));
}
