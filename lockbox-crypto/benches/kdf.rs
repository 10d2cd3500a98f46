//! Benchmarks for key derivation and share blob coding.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lockbox_crypto::{derive_key, share};
use serde_json::json;

fn bench_derive_key(c: &mut Criterion) {
    c.bench_function("derive_key_8192_rounds", |b| {
        b.iter(|| derive_key(black_box(b"benchmark-password"), black_box(b"0123456789")));
    });
}

fn bench_share_encode(c: &mut Criterion) {
    let payload = json!({"model": "gpt-x", "temperature": 0.7, "system": "x".repeat(1024)});

    c.bench_function("share_encode_1kb", |b| {
        b.iter(|| share::encode(black_box(&payload), black_box("correct-horse")).unwrap());
    });
}

fn bench_share_decode(c: &mut Criterion) {
    let payload = json!({"model": "gpt-x", "system": "x".repeat(1024)});
    let blob = share::encode(&payload, "correct-horse").unwrap();

    c.bench_function("share_decode_1kb", |b| {
        b.iter(|| {
            share::decode::<serde_json::Value>(black_box(&blob), black_box("correct-horse"))
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_derive_key, bench_share_encode, bench_share_decode);
criterion_main!(benches);
