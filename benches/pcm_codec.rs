//! Benchmarks for the wire codec hot path.
//!
//! The framer runs inside the capture poll loop and the unframer on every
//! service audio payload; both must stay comfortably under the capture
//! window period (256ms).

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use voxlink::audio::codec::{FrameAssembler, decode_blob, encode_blob};
use voxlink::defaults;

fn bench_encode_window(c: &mut Criterion) {
    let window: Vec<f32> = (0..defaults::CAPTURE_WINDOW)
        .map(|i| ((i as f32) * 0.01).sin())
        .collect();

    c.bench_function("encode_4096_sample_window", |b| {
        b.iter(|| encode_blob(black_box(&window), defaults::INPUT_SAMPLE_RATE))
    });
}

fn bench_decode_half_second_payload(c: &mut Criterion) {
    // 0.5s of 24kHz mono as the service delivers it.
    let samples: Vec<f32> = (0..12000).map(|i| ((i as f32) * 0.01).sin()).collect();
    let blob = encode_blob(&samples, defaults::OUTPUT_SAMPLE_RATE);

    c.bench_function("decode_half_second_payload", |b| {
        b.iter(|| decode_blob(black_box(&blob.data), defaults::OUTPUT_SAMPLE_RATE, 1).unwrap())
    });
}

fn bench_assembler_throughput(c: &mut Criterion) {
    // Device-sized deliveries (1024 samples) reframed into capture windows.
    let delivery = vec![0.1f32; 1024];

    c.bench_function("assemble_one_second_of_deliveries", |b| {
        b.iter(|| {
            let mut assembler = FrameAssembler::with_default_window();
            let mut frames = 0;
            for _ in 0..16 {
                frames += assembler.push(black_box(&delivery)).len();
            }
            frames
        })
    });
}

criterion_group!(
    benches,
    bench_encode_window,
    bench_decode_half_second_payload,
    bench_assembler_throughput
);
criterion_main!(benches);
