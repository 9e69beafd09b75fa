use criterion::Criterion;
use starry_process::RecurrentSinCos;
use std::hint::black_box;

fn plain(n: usize, x: f64) {
    for i in 0..n {
        black_box(f64::sin_cos(x * (i as f64)));
    }
}

fn rec(n: usize, x: f64) {
    for s_c in RecurrentSinCos::multiples_of(x).take(n) {
        black_box(s_c);
    }
}

pub fn bench_sin_cos(c: &mut Criterion) {
    const COUNTS: [usize; 3] = [6, 16, 31];

    for &n in COUNTS.iter() {
        c.bench_function(format!("Plain sin_cos {n}").as_str(), |b| {
            b.iter(|| plain(black_box(n), 0.01))
        });
        c.bench_function(format!("Recurrent sin_cos {n}").as_str(), |b| {
            b.iter(|| rec(black_box(n), 0.01))
        });
    }
}
