//! Predicate building and evaluation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use routescope_core::{build_predicate, PostFilter, PredicateEvaluator, Row};
use routescope_lang::compile_query;
use routescope_proto::{
    BboxFields, Block, BlockOperator, Condition, ExecutionContext, LatLng, SpatialQuery,
};
use serde_json::json;

fn native_ctx() -> ExecutionContext {
    ExecutionContext::new()
        .with_service_id_field("service_id")
        .with_native_geometry("geometry")
        .with_mode_field("mode")
        .with_operator_fields(["operatorCode", "operatorName"])
        .with_point(55.9533, -3.1883)
}

fn query() -> SpatialQuery {
    SpatialQuery::new()
        .with_condition(Condition::Within)
        .with_block(Block::exclude(BlockOperator::Mode).with_value("Rail"))
        .with_block(Block::include(BlockOperator::Operator).with_value("LOTH"))
        .with_block(Block::also_include(BlockOperator::NearPoint).with_distance(1000.0))
}

/// Rows laid out on a grid around the query point.
fn rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            let dx = (i % 100) as f64 * 0.0005;
            let dy = (i / 100) as f64 * 0.0005;
            [
                ("service_id".to_string(), json!(format!("S{}", i))),
                ("mode".to_string(), json!(if i % 3 == 0 { "Rail" } else { "Bus" })),
                ("operatorCode".to_string(), json!("LOTH")),
                (
                    "geometry".to_string(),
                    json!({"type": "LineString", "coordinates": [
                        [-3.2 + dx, 55.94 + dy],
                        [-3.19 + dx, 55.95 + dy]
                    ]}),
                ),
            ]
            .into_iter()
            .collect()
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate/build");
    let ctx = native_ctx();
    let compiled = compile_query(&query(), &ctx).unwrap();

    group.bench_function("native", |b| {
        b.iter(|| black_box(build_predicate(&compiled, &ctx).unwrap()));
    });

    let bbox_ctx = ExecutionContext::new()
        .with_service_id_field("service_id")
        .with_bbox_fields(BboxFields::default())
        .with_mode_field("mode")
        .with_operator_fields(["operatorCode"])
        .with_point(55.9533, -3.1883);
    let bbox_compiled = compile_query(&query(), &bbox_ctx).unwrap();
    group.bench_function("bbox", |b| {
        b.iter(|| black_box(build_predicate(&bbox_compiled, &bbox_ctx).unwrap()));
    });

    group.bench_function("to_sql", |b| {
        let predicate = build_predicate(&compiled, &ctx).unwrap();
        b.iter(|| black_box(predicate.to_sql()));
    });

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("predicate/evaluate");
    let ctx = native_ctx();
    let predicate = build_predicate(&compile_query(&query(), &ctx).unwrap(), &ctx).unwrap();

    for size in [100, 1_000, 10_000] {
        let data = rows(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| black_box(PredicateEvaluator::filter(&predicate, data).unwrap().len()));
        });
    }

    group.finish();
}

fn bench_postfilter(c: &mut Criterion) {
    let mut group = c.benchmark_group("postfilter");
    let filter = PostFilter::within(LatLng::new(55.9533, -3.1883), 500.0, "service_id", "geometry");

    for size in [100, 1_000, 10_000] {
        let data = rows(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| black_box(filter.apply(data)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_evaluate, bench_postfilter);
criterion_main!(benches);
