use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qconv::shape::compute_output_dim;
use qconv::testing::{random_qtensor, RecordingBackend};
use qconv::{Conv2dOptions, QTensor, QuantDType, QuantParams, QuantizedConv2d, Tensor};

fn make_layer(out_channels: usize, in_channels: usize) -> QuantizedConv2d<RecordingBackend> {
    let wp = QuantParams::new(0.05, 0, QuantDType::QInt8).unwrap();
    let w = random_qtensor(vec![out_channels, in_channels, 3, 3], wp, 0x1234_5678).unwrap();
    QuantizedConv2d::new(
        RecordingBackend::new(),
        w,
        Tensor::zeros(vec![out_channels]),
        QuantParams::new(0.1, 128, QuantDType::QUInt8).unwrap(),
        Conv2dOptions::default().with_padding(1),
    )
    .unwrap()
}

fn bench_shape(c: &mut Criterion) {
    c.bench_function("compute_output_dim", |b| {
        b.iter(|| compute_output_dim(black_box(224), black_box(7), 3, 2, 1, 0))
    });
}

fn bench_set_weight(c: &mut Criterion) {
    let mut layer = make_layer(64, 32);
    let wp = QuantParams::new(0.05, 0, QuantDType::QInt8).unwrap();
    let next = random_qtensor(vec![64, 32, 3, 3], wp, 42).unwrap();
    c.bench_function("set_weight_repack_64x32x3x3", |b| {
        b.iter(|| layer.set_weight(black_box(next.clone())).unwrap())
    });
}

fn bench_forward(c: &mut Criterion) {
    let layer = make_layer(64, 32);
    let ap = QuantParams::new(0.02, 0, QuantDType::QUInt8).unwrap();
    let x = QTensor::filled(vec![1, 32, 56, 56], 0, ap).unwrap();
    c.bench_function("forward_dispatch_1x32x56x56", |b| {
        b.iter(|| black_box(layer.forward(black_box(&x)).unwrap()))
    });
}

criterion_group!(benches, bench_shape, bench_set_weight, bench_forward);
criterion_main!(benches);
