//! Benchmarks for reversible arithmetic synthesis and evaluation
//!
//! Run with: cargo bench -p arvak-arith

use arvak_arith::{add, divide, multiply};
use arvak_rev::Circuit;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn mask(bits: usize) -> u64 {
    (1u64 << bits) - 1
}

/// Benchmark adder synthesis
fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("add");

    for width in &[4, 8, 16, 32] {
        group.bench_with_input(BenchmarkId::new("synthesize", width), width, |b, &n| {
            b.iter(|| {
                let mut circuit = Circuit::new("bench");
                let x = circuit.register(n, Some("a"), mask(n)).unwrap();
                let y = circuit.register(n + 1, Some("b"), 1).unwrap();
                add(&mut circuit, black_box(&x), black_box(&y), None).unwrap();
                circuit
            });
        });

        group.bench_with_input(BenchmarkId::new("evaluate", width), width, |b, &n| {
            let mut circuit = Circuit::new("bench");
            let x = circuit.register(n, Some("a"), mask(n)).unwrap();
            let y = circuit.register(n + 1, Some("b"), 1).unwrap();
            add(&mut circuit, &x, &y, None).unwrap();
            b.iter(|| circuit.read_value(black_box(&y)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark multiplier synthesis plus evaluation
fn bench_multiply(c: &mut Criterion) {
    let mut group = c.benchmark_group("multiply");

    for width in &[4, 8, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, &n| {
            b.iter(|| {
                let mut circuit = Circuit::new("bench");
                let x = circuit.register(n, Some("a"), mask(n)).unwrap();
                let y = circuit.register(n, Some("b"), mask(n)).unwrap();
                let product = multiply(&mut circuit, &x, &y).unwrap();
                circuit.read_value(&product).unwrap()
            });
        });
    }

    group.finish();
}

/// Benchmark divider synthesis plus evaluation
fn bench_divide(c: &mut Criterion) {
    let mut group = c.benchmark_group("divide");

    for width in &[4, 8, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, &n| {
            b.iter(|| {
                let mut circuit = Circuit::new("bench");
                let x = circuit.register(2 * n, Some("a"), mask(2 * n)).unwrap();
                let y = circuit.register(n, Some("b"), 1 << (n - 1)).unwrap();
                let division = divide(&mut circuit, &x, &y).unwrap();
                circuit.read_value(&division.quotient).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_add, bench_multiply, bench_divide);
criterion_main!(benches);
