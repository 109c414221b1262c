//! Benchmarks for message trees and port delivery
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dataflow_rt::{Message, Port};

/// Root with `width` children, each holding three readings
fn wide_message(width: usize) -> Message {
    let mut msg = Message::named("root");
    for i in 0..width {
        let mut child = msg.child_at_mut(i);
        child.add_with("temperature", 21.5 + i as f64);
        child.add_with("pressure", 101_325.0);
        child.add_with("humidity", 40.0);
    }
    msg
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_build");

    for width in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*width as u64 * 4));
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, &width| {
            b.iter(|| black_box(wide_message(width)));
        });
    }

    group.finish();
}

fn bench_clone(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_clone");

    for width in [10, 100, 1000].iter() {
        let msg = wide_message(*width);
        group.throughput(Throughput::Elements(msg.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &msg, |b, msg| {
            b.iter(|| black_box(msg.clone()));
        });
    }

    group.finish();
}

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_iterate");

    for width in [10, 100, 1000].iter() {
        let msg = wide_message(*width);
        group.throughput(Throughput::Elements(msg.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &msg, |b, msg| {
            b.iter(|| {
                let deepest = msg.iter().map(|(level, _)| level).max();
                black_box(deepest)
            });
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let msg = wide_message(100);

    c.bench_function("message_lookup_by_index", |b| {
        b.iter(|| {
            let node = msg.child_at(black_box(99)).and_then(|n| n.child("humidity"));
            black_box(node.map(|n| n.get::<f64>()).is_ok())
        });
    });
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("port_fan_out");
    let msg = wide_message(10);

    for consumers in [1, 4, 16].iter() {
        let out = Port::output("out");
        let inputs: Vec<Port> = (0..*consumers).map(|_| Port::input("in", 1)).collect();
        for input in &inputs {
            Port::connect(&out, input);
        }

        group.throughput(Throughput::Elements(*consumers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(consumers), &msg, |b, msg| {
            b.iter(|| {
                out.send(msg).ok();
                for input in &inputs {
                    black_box(input.try_receive().ok());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_clone,
    bench_iterate,
    bench_lookup,
    bench_fan_out
);
criterion_main!(benches);
