// Criterion benchmarks for the rpcengine dispatch path
//
// Run benchmarks with:
//   cargo bench -p rpcengine
//
// For detailed output with plots:
//   cargo bench -p rpcengine -- --save-baseline main

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rpcengine::loopback::{pair, pair_with_codec};
use rpcengine::{handler_fn, parse_params, EngineConfig, Interface};
use serde_json::{json, Value};

fn adder() -> Interface {
    Interface::new().method(
        "add",
        handler_fn(|params: Vec<Value>| async move {
            let (a, b): (i64, i64) = parse_params(params)?;
            Ok(json!(a + b))
        }),
    )
}

fn bench_loopback_call(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("loopback_call");

    let (client, server) = rt.block_on(async { pair(EngineConfig::default(), EngineConfig::default()) });
    server.mount("", adder());
    group.bench_function("structured", |b| {
        b.to_async(&rt)
            .iter(|| client.call("add", black_box(vec![json!(1), json!(1336)])));
    });

    let (client, server) =
        rt.block_on(async { pair_with_codec(EngineConfig::default(), EngineConfig::default()) });
    server.mount("deeply.nested.math", adder());
    group.bench_function("json_codec_nested_path", |b| {
        b.to_async(&rt).iter(|| {
            client.call(
                "deeply.nested.math.add",
                black_box(vec![json!(1), json!(1336)]),
            )
        });
    });

    group.finish();
}

fn bench_concurrent_calls(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("concurrent_calls");

    let (client, server) = rt.block_on(async { pair(EngineConfig::default(), EngineConfig::default()) });
    server.mount("", adder());

    for width in [1usize, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.to_async(&rt).iter(|| {
                let calls = (0..width).map(|i| client.call("add", vec![json!(i), json!(1)]));
                futures::future::join_all(calls)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_loopback_call, bench_concurrent_calls);
criterion_main!(benches);
