//! Benchmarks for the consensus-ADMM solver.
//!
//! Run with: cargo bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use consensus_admm_rs::prelude::*;

/// Hinge/squared-hinge chains with a sprinkling of satisfiable inequality
/// constraints, mirroring the shape of a grounded rule set.
fn synthetic_problem(seed: u64, num_variables: usize, num_terms: usize) -> TermStore<DenseAtomStore> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut store = TermStore::new(DenseAtomStore::new(vec![0.5; num_variables]));

    let n = num_variables as u32;
    for global in 0..n {
        store
            .add_term(
                TermKind::Hinge {
                    weight: rng.gen_range(0.1..2.0),
                },
                Hyperplane::new(vec![1.0, -1.0], 0.0),
                &[global, (global + 1) % n],
            )
            .unwrap();
    }

    for i in 0..num_terms {
        let a = rng.gen_range(0..num_variables);
        let b = (a + 1 + rng.gen_range(0..num_variables - 1)) % num_variables;
        let pair = [a as u32, b as u32];

        if i % 7 == 0 {
            store
                .add_term(
                    TermKind::LinearInequality {
                        sense: Sense::LessEqual,
                    },
                    Hyperplane::new(vec![1.0, 1.0], rng.gen_range(1.5..2.0)),
                    &pair,
                )
                .unwrap();
        } else {
            store
                .add_term(
                    TermKind::SquaredHinge {
                        weight: rng.gen_range(0.1..2.0),
                    },
                    Hyperplane::new(vec![1.0, 1.0], rng.gen_range(-0.5..1.0)),
                    &pair,
                )
                .unwrap();
        }
    }

    store
}

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");

    for &(num_variables, num_terms) in &[(50usize, 200usize), (200, 1_000), (500, 4_000)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{num_variables}v_{num_terms}t")),
            &(num_variables, num_terms),
            |bencher, &(num_variables, num_terms)| {
                let config = AdmmConfig::builder()
                    .max_iterations(500)
                    .initial_consensus(InitialValue::Zero)
                    .initial_local(InitialValue::Zero)
                    .build();
                let reasoner = AdmmReasoner::new(config).unwrap();

                bencher.iter(|| {
                    let mut store = synthetic_problem(17, num_variables, num_terms);
                    reasoner.optimize(&mut store).unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_solve);
criterion_main!(benches);
