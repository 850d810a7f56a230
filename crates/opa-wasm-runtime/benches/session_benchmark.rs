//! Criterion benchmarks for policy loading and evaluation.
//!
//! Run with: cargo bench --package opa-wasm-runtime

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use opa_core::RuntimeConfig;
use opa_wasm_runtime::PolicyRuntime;
use serde_json::json;
use std::hint::black_box;

fn policy_bytes() -> Vec<u8> {
    wat::parse_str(include_str!("../tests/wasm/policy.wat")).expect("Failed to parse WAT")
}

/// Loading with and without a cached compilation.
fn bench_load_policy(c: &mut Criterion) {
    let bytes = policy_bytes();
    let mut group = c.benchmark_group("load_policy");

    group.bench_function("uncached", |b| {
        let runtime = PolicyRuntime::new(RuntimeConfig::default()).expect("runtime");
        b.iter(|| {
            runtime.clear_cache();
            black_box(runtime.load_policy(black_box(&bytes)).expect("load"))
        });
    });

    group.bench_function("cached", |b| {
        let runtime = PolicyRuntime::new(RuntimeConfig::default()).expect("runtime");
        let _ = runtime.load_policy(&bytes).expect("warm up");
        b.iter(|| black_box(runtime.load_policy(black_box(&bytes)).expect("load")));
    });

    group.finish();
}

/// Evaluation throughput across input sizes.
fn bench_evaluate(c: &mut Criterion) {
    let runtime = PolicyRuntime::new(RuntimeConfig::default()).expect("runtime");
    let mut session = runtime.load_policy(&policy_bytes()).expect("load");
    session
        .set_data(&json!({"roles": {"alice": ["admin"], "bob": ["viewer"]}}))
        .expect("set data");

    let mut group = c.benchmark_group("evaluate");
    for size in [16_usize, 1024, 64 * 1024] {
        let input = json!({"payload": "x".repeat(size)});
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| black_box(session.evaluate(black_box(input)).expect("evaluate")));
        });
    }
    group.finish();
}

/// Builtin callbacks: decode arguments, call, encode the result.
fn bench_builtin_dispatch(c: &mut Criterion) {
    let runtime = PolicyRuntime::new(RuntimeConfig::default()).expect("runtime");
    let mut session = runtime.load_policy(&policy_bytes()).expect("load");
    session.set_data(&json!("/")).expect("set data");
    let parts = json!(["", "usr", "local", "bin"]);

    c.bench_function("builtin_concat", |b| {
        b.iter(|| {
            black_box(
                session
                    .evaluate_entrypoint("concat", black_box(&parts))
                    .expect("evaluate"),
            )
        });
    });
}

/// Replacing data, which rewinds the heap to the base checkpoint.
fn bench_set_data(c: &mut Criterion) {
    let runtime = PolicyRuntime::new(RuntimeConfig::default()).expect("runtime");
    let mut session = runtime.load_policy(&policy_bytes()).expect("load");
    let data = json!({
        "users": (0..100).map(|i| json!({"id": i, "name": format!("user{i}")})).collect::<Vec<_>>()
    });

    c.bench_function("set_data", |b| {
        b.iter(|| session.set_data(black_box(&data)).expect("set data"));
    });
}

criterion_group!(
    benches,
    bench_load_policy,
    bench_evaluate,
    bench_builtin_dispatch,
    bench_set_data
);
criterion_main!(benches);
