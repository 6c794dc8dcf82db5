//! Benchmarks for the optimizer.
//!
//! Measures the codec and the folding drivers on synthetic method bodies:
//! - Decoding and re-encoding a long straight-line body
//! - Folding a chain of dependent arithmetic
//! - Scanning a body with nothing to fold

extern crate classfold;

use classfold::{
    assembly::{decode_code, encode_code},
    metadata::{ClassModel, Code, ConstantPool, Method, MethodAccessFlags},
    optimizer::{Optimizer, OptimizerConfig},
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

/// `iconst_1 (iconst_2 iadd)* ireturn` with `links` additions.
fn chain(links: usize) -> Vec<u8> {
    let mut code = vec![0x04];
    for _ in 0..links {
        code.extend_from_slice(&[0x05, 0x60]);
    }
    code.push(0xAC);
    code
}

/// `(iload_0 iconst_1 iadd istore_0)* iload_0 ireturn`: every match has a parameter operand.
fn parameters(statements: usize) -> Vec<u8> {
    let mut code = Vec::new();
    for _ in 0..statements {
        code.extend_from_slice(&[0x1A, 0x04, 0x60, 0x3B]);
    }
    code.extend_from_slice(&[0x1A, 0xAC]);
    code
}

fn class_with(descriptor: &str, code: Vec<u8>) -> ClassModel {
    let mut class = ClassModel::new("bench/Folds");
    class.methods.push(
        Method::new("run", descriptor, MethodAccessFlags::STATIC)
            .with_code(Code::new(4, 1, code)),
    );
    class
}

/// Benchmark decoding and re-encoding 2000 instructions.
fn bench_codec_round_trip(c: &mut Criterion) {
    let code = Code::new(4, 1, parameters(500));
    let pool = ConstantPool::new();

    c.bench_function("codec_round_trip", |b| {
        b.iter(|| {
            let mut list = decode_code(black_box(&code), &pool).unwrap();
            black_box(encode_code(&mut list).unwrap())
        });
    });
}

/// Benchmark folding a chain of 200 dependent additions.
fn bench_fold_chain(c: &mut Criterion) {
    let class = class_with("()I", chain(200));

    // Fresh optimizer per run, the event log is append-only
    c.bench_function("fold_chain_200", |b| {
        b.iter(|| black_box(Optimizer::default().optimize_class(black_box(&class)).unwrap()));
    });
}

/// Benchmark scanning 500 statements that cannot be folded.
fn bench_scan_unfoldable(c: &mut Criterion) {
    let class = class_with("(I)I", parameters(500));
    let config = OptimizerConfig::default().with_fold_comparisons(false);

    c.bench_function("scan_unfoldable_500", |b| {
        b.iter(|| {
            let optimizer = Optimizer::new(config.clone());
            black_box(optimizer.optimize_class(black_box(&class)).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_codec_round_trip,
    bench_fold_chain,
    bench_scan_unfoldable
);
criterion_main!(benches);
