// SPDX-License-Identifier: MIT OR Apache-2.0
//! Benchmarks for Ed25519 OPE sign/verify over canonical content bytes.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use odin_keystore::Keypair;
use odin_ope::{sign_over_content, verify};

fn bench_sign(c: &mut Criterion) {
    let keypair = Keypair::generate("bench-k1");
    let content = b"{\"intent\":\"echo\",\"user\":\"a\"}".to_vec();
    c.bench_function("ope_sign_over_content", |b| {
        b.iter(|| sign_over_content(black_box(&keypair), black_box(&content)));
    });
}

fn bench_verify(c: &mut Criterion) {
    let keypair = Keypair::generate("bench-k1");
    let content = b"{\"intent\":\"echo\",\"user\":\"a\"}".to_vec();
    let ope = sign_over_content(&keypair, &content);
    let jwks = {
        let mut ks = odin_keystore::Keystore::new();
        ks.insert(keypair);
        ks.to_jwks()
    };
    c.bench_function("ope_verify", |b| {
        b.iter(|| verify(black_box(&ope), black_box(&content), black_box(&jwks)).unwrap());
    });
}

criterion_group!(benches, bench_sign, bench_verify);
criterion_main!(benches);
