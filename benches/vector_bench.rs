use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use dist_la::comm::NoComm;
use dist_la::la::{BackendKind, DistributedVector, NormKind};

const BACKENDS: [BackendKind; 3] = [BackendKind::Dense, BackendKind::Petsc, BackendKind::Tpetra];

fn ramp(n: u64, backend: BackendKind) -> DistributedVector<NoComm> {
    let mut v = DistributedVector::with_size(NoComm, n, backend);
    let values: Vec<f64> = (0..n).map(|i| i as f64 * 0.5 - 3.0).collect();
    v.set_local(&values).expect("local block matches partition");
    v
}

fn bench_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_kernels");

    for backend in BACKENDS {
        let n = 1u64 << 16;
        let x = ramp(n, backend);
        let y = ramp(n, backend);

        group.bench_with_input(BenchmarkId::new("axpy", backend), &n, |b, _| {
            let mut z = x.clone();
            b.iter(|| {
                z.axpy(black_box(0.5), &y).expect("same layout");
            });
        });

        group.bench_with_input(BenchmarkId::new("inner", backend), &n, |b, _| {
            b.iter(|| black_box(x.inner(&y).expect("same layout")));
        });

        group.bench_with_input(BenchmarkId::new("norm_l2", backend), &n, |b, _| {
            b.iter(|| black_box(x.norm(NormKind::L2).expect("serial reduction")));
        });
    }
    group.finish();
}

fn bench_gather(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_gather");
    for &n in &[1u64 << 10, 1u64 << 14] {
        let x = ramp(n, BackendKind::Dense);
        let indices: Vec<u64> = (0..n).rev().step_by(3).collect();
        group.bench_with_input(BenchmarkId::new("gather_reversed", n), &n, |b, _| {
            b.iter(|| black_box(x.gather(&indices).expect("indices in range")));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_kernels, bench_gather);
criterion_main!(benches);
