//! Test doubles for exercising layers without a real operator library.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, ensure};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::backend::{Conv2dArgs, QuantizedKernelBackend};
use crate::quant::{QuantDType, QuantParams};
use crate::shape::conv2d_output_hw;
use crate::tensor::{QTensor, Tensor};

/// Weight reordered to `[groups][out/groups][kH][kW][in/groups]` plus a
/// fingerprint of the source tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedWeight {
    pub groups: usize,
    pub shape: [usize; 4],
    pub fingerprint: u64,
    pub data: Vec<i32>,
}

impl PackedWeight {
    pub fn out_channels(&self) -> usize { self.shape[0] }
    pub fn in_channels(&self) -> usize { self.shape[1] * self.groups }
    pub fn kernel_size(&self) -> (usize, usize) { (self.shape[2], self.shape[3]) }
}

/// FNV-1a over shape and elements.
pub fn fingerprint(t: &QTensor) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    let mut mix = |bytes: &[u8]| {
        for b in bytes {
            h ^= *b as u64;
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
    };
    for d in t.shape() { mix(&(*d as u64).to_le_bytes()); }
    for v in t.data() { mix(&v.to_le_bytes()); }
    h
}

/// Backend that records calls and returns outputs filled with the output
/// zero point. Produces correctly shaped results, not convolution values.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    prepacks: AtomicUsize,
    convs: AtomicUsize,
    last_args: Mutex<Option<Conv2dArgs>>,
}

impl RecordingBackend {
    pub fn new() -> Self { Self::default() }

    pub fn prepack_calls(&self) -> usize { self.prepacks.load(Ordering::Relaxed) }
    pub fn conv_calls(&self) -> usize { self.convs.load(Ordering::Relaxed) }

    pub fn last_args(&self) -> Option<Conv2dArgs> {
        self.last_args.lock().ok().and_then(|g| *g)
    }
}

impl QuantizedKernelBackend for RecordingBackend {
    type PackedWeight = PackedWeight;

    fn name(&self) -> &'static str { "recording" }

    fn prepack(&self, weight: &QTensor, groups: usize) -> anyhow::Result<PackedWeight> {
        let &[oc, icg, kh, kw] = weight.shape() else {
            bail!("prepack expects a 4-D weight, got {:?}", weight.shape());
        };
        ensure!(groups > 0 && oc % groups == 0, "out_channels {oc} not divisible by groups {groups}");
        self.prepacks.fetch_add(1, Ordering::Relaxed);
        let src = weight.data();
        let mut data = Vec::with_capacity(src.len());
        // oc is already group-major; move the input channel innermost
        for o in 0..oc {
            for y in 0..kh {
                for x in 0..kw {
                    for i in 0..icg {
                        data.push(src[((o * icg + i) * kh + y) * kw + x]);
                    }
                }
            }
        }
        Ok(PackedWeight { groups, shape: [oc, icg, kh, kw], fingerprint: fingerprint(weight), data })
    }

    fn conv2d(
        &self,
        input: &QTensor,
        packed: &PackedWeight,
        bias: &Tensor,
        args: &Conv2dArgs,
        output: &QuantParams,
    ) -> anyhow::Result<QTensor> {
        let &[n, c, h, w] = input.shape() else {
            bail!("conv2d expects a 4-D input, got {:?}", input.shape());
        };
        ensure!(
            c == packed.in_channels(),
            "input has {c} channels, weight expects {}",
            packed.in_channels()
        );
        ensure!(bias.numel() == packed.out_channels(), "bias length mismatch");
        self.convs.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut g) = self.last_args.lock() {
            *g = Some(*args);
        }
        let (oh, ow) = conv2d_output_hw((h, w), packed.kernel_size(), args.padding, args.stride, args.dilation, (0, 0));
        ensure!(oh > 0 && ow > 0, "empty output {oh}x{ow} for input {h}x{w}");
        let shape = vec![n, packed.out_channels(), oh as usize, ow as usize];
        Ok(QTensor::filled(shape, output.zero_point(), *output)?)
    }
}

/// Uniformly random elements over the full dtype range, clipped to
/// `[-1000, 1000]` for `qint32`.
pub fn random_qtensor(shape: Vec<usize>, params: QuantParams, seed: u64) -> crate::error::Result<QTensor> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let (lo, hi) = match params.dtype() {
        QuantDType::QInt32 => (-1000, 1000),
        d => (d.min_value(), d.max_value()),
    };
    let n: usize = shape.iter().product();
    let data = (0..n).map(|_| rng.gen_range(lo..=hi)).collect();
    QTensor::new(shape, data, params)
}
