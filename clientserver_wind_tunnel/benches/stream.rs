// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use clientserver_stream::{ByteOrder, Command, Id, Stream};

/// Entry point for `clientserver_stream` wind-tunnel benchmarks.
///
/// Covers the three representations a stream moves between: the in-memory buffer, the binary
/// form in both byte orders, and the text form.
fn bench_stream(c: &mut Criterion) {
    bench_encode(c);
    bench_decode(c);
    bench_text(c);
}

/// A stream of `n` `Invoke` messages mixing scalars, a string and a float array.
fn build_invokes(n: usize) -> Stream {
    let samples: Vec<f64> = (0..32).map(|i| f64::from(i) * 0.5).collect();
    let mut s = Stream::new();
    for i in 0..n {
        let i = u32::try_from(i).unwrap();
        s.begin(Command::Invoke)
            .arg(Id(i + 1))
            .arg("SetSamples")
            .arg(i)
            .arg(samples.as_slice())
            .end();
    }
    s
}

/// A chain of `depth` streams, each nested inside the next.
fn build_nested(depth: usize) -> Stream {
    let mut s = Stream::new();
    s.begin(Command::Reply).arg(1_i32).end();
    for _ in 0..depth {
        let mut outer = Stream::new();
        outer.begin(Command::Reply).arg(s).end();
        s = outer;
    }
    s
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream/encode");
    for n in [16_usize, 256, 4096] {
        let s = build_invokes(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("native", n), &s, |b, s| {
            b.iter(|| black_box(s.data()));
        });
        group.bench_with_input(BenchmarkId::new("big_endian", n), &s, |b, s| {
            b.iter(|| black_box(s.data_with_order(ByteOrder::Big)));
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream/decode");
    for n in [16_usize, 256, 4096] {
        let s = build_invokes(n);
        let native = s.data();
        let big = s.data_with_order(ByteOrder::Big);
        group.throughput(Throughput::Bytes(native.len() as u64));
        group.bench_with_input(BenchmarkId::new("native", n), &native, |b, bytes| {
            b.iter(|| black_box(Stream::from_data(bytes).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("big_endian", n), &big, |b, bytes| {
            b.iter(|| black_box(Stream::from_data(bytes).unwrap()));
        });
    }
    for depth in [8_usize, 48] {
        let bytes = build_nested(depth).data();
        group.bench_with_input(BenchmarkId::new("nested", depth), &bytes, |b, bytes| {
            b.iter(|| black_box(Stream::from_data(bytes).unwrap()));
        });
    }
    group.finish();
}

fn bench_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream/text");
    for n in [16_usize, 256] {
        let s = build_invokes(n);
        let text = s.to_text();
        group.bench_with_input(BenchmarkId::new("print", n), &s, |b, s| {
            b.iter(|| black_box(s.to_text()));
        });
        group.bench_with_input(BenchmarkId::new("parse", n), &text, |b, text| {
            b.iter(|| black_box(text.parse::<Stream>().unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_stream);
criterion_main!(benches);
