// Criterion benchmarks for rpcengine-common protocol layer
//
// Run benchmarks with:
//   cargo bench -p rpcengine-common

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rpcengine_common::{Codec, Id, JsonCodec, Message, Request, Response, RpcError};
use serde_json::json;

fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");

    let request = json!({"jsonrpc": "2.0", "id": 1, "method": "add", "params": [1, 2]});
    let response = json!({"jsonrpc": "2.0", "id": 1, "result": {"sum": 3}});
    let invalid = json!({"error": {"message": "parse error", "code": -32700}});

    group.bench_function("request", |b| {
        b.iter(|| Message::classify(black_box(request.clone())));
    });

    group.bench_function("response", |b| {
        b.iter(|| Message::classify(black_box(response.clone())));
    });

    group.bench_function("invalid", |b| {
        b.iter(|| Message::classify(black_box(invalid.clone())));
    });

    group.finish();
}

fn bench_json_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_codec");

    let small = Request::call(Id::Number(1), "method", Some(json!([42]))).to_value();
    let data: Vec<String> = (0..100).map(|i| format!("item_{}", i)).collect();
    let large = Request::call(Id::Number(1), "method", Some(json!({ "data": data }))).to_value();
    let large_bytes = JsonCodec.encode(&large).unwrap();

    group.bench_function("encode_small", |b| {
        b.iter(|| JsonCodec.encode(black_box(&small)));
    });

    group.bench_function("encode_large", |b| {
        b.iter(|| JsonCodec.encode(black_box(&large)));
    });

    group.bench_function("decode_large", |b| {
        b.iter(|| JsonCodec.decode(black_box(&large_bytes)));
    });

    group.bench_function("recover_id_truncated", |b| {
        let truncated = &large_bytes[..large_bytes.len() / 2];
        b.iter(|| JsonCodec.recover_id(black_box(truncated)));
    });

    group.finish();
}

fn bench_response_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_serialization");

    let success_response = Response::success(Id::Number(1), json!({"result": 42}));
    let error_response = Response::error(Id::Number(1), RpcError::internal_error("send failed"));

    group.bench_function("serialize_success", |b| {
        b.iter(|| serde_json::to_string(black_box(&success_response)));
    });

    group.bench_function("serialize_error", |b| {
        b.iter(|| serde_json::to_string(black_box(&error_response)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_classification,
    bench_json_codec,
    bench_response_serialization,
);
criterion_main!(benches);
