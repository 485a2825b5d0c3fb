//! Criterion benchmarks for the estimator scoring hot path.
//!
//! Measures the add-partial/commit cycle across bin counts and entity
//! counts to characterise scoring overhead per history.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use transport_core::{ParticleState, ParticleType};
use transport_event::{
    CompletionCriterion, Estimator, EstimatorKind, ObservedState, PhaseSpaceDiscretization,
};

fn energy_boundaries(n_bins: usize) -> Vec<f64> {
    (0..=n_bins).map(|i| i as f64).collect()
}

fn binned_estimator(n_entities: u64, n_bins: usize) -> Estimator {
    let discretization = PhaseSpaceDiscretization::new()
        .with_energy_boundaries(energy_boundaries(n_bins))
        .unwrap();

    let mut builder =
        Estimator::builder(0, EstimatorKind::CellTrackLengthFlux).discretization(discretization);
    for entity in 0..n_entities {
        builder = builder.add_entity(entity, 1.0);
    }
    builder.build().unwrap()
}

/// Benchmark one history's add-partial/commit cycle.
fn bench_score_and_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_and_commit");

    for (n_entities, n_bins) in [(1_u64, 1_usize), (2, 16), (8, 64)] {
        let estimator = Arc::new(binned_estimator(n_entities, n_bins));
        let mut particle = ParticleState::new(ParticleType::Neutron, 0);
        particle.set_energy(0.5);

        let label = format!("{}entities_{}bins", n_entities, n_bins);
        group.bench_with_input(
            BenchmarkId::new("history", &label),
            &estimator,
            |b, estimator| {
                b.iter(|| {
                    for entity in 0..n_entities {
                        estimator.add_partial_history_contribution(
                            black_box(entity),
                            &ObservedState::in_cell(&particle),
                            black_box(1.0),
                        );
                    }
                    estimator.commit_history_contribution();
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the completion-criterion commit/check cycle.
fn bench_criterion_commit(c: &mut Criterion) {
    let criterion = CompletionCriterion::history_count(u64::MAX / 2).unwrap();
    criterion.start();

    c.bench_function("criterion_commit_and_check", |b| {
        b.iter(|| {
            criterion.commit_history_contribution();
            black_box(criterion.is_simulation_complete())
        });
    });
}

criterion_group!(benches, bench_score_and_commit, bench_criterion_commit);
criterion_main!(benches);
