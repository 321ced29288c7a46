//! Battle prediction and composition search benchmarks.
//!
//! Run with: `cargo bench -p combat_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use combat_core::prelude::*;
use combat_test_utils::fixtures;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn mid_game_battle() -> CombatState {
    fixtures::battle(
        &[("Marine", 20), ("Marauder", 6), ("Medivac", 3), ("SiegeTank", 2)],
        &[("Zergling", 30), ("Roach", 12), ("Hydralisk", 8), ("Queen", 2)],
    )
}

pub fn predict_benchmark(c: &mut Criterion) {
    let predictor = fixtures::predictor();
    let settings = CombatSettings::default();

    let mut group = c.benchmark_group("predict_engage");
    for marines in [5_u32, 20, 60] {
        let state = fixtures::battle(&[("Marine", marines)], &[("Zergling", marines * 2)]);
        group.bench_with_input(BenchmarkId::new("marines_vs_lings", marines), &state, |b, state| {
            b.iter(|| {
                predictor.predict_engage(
                    black_box(state.clone()),
                    &settings,
                    Defender::default(),
                    &mut SeededRng::new(1),
                )
            });
        });
    }

    let state = mid_game_battle();
    group.bench_function("mid_game", |b| {
        b.iter(|| {
            predictor.predict_engage(
                black_box(state.clone()),
                &settings,
                Defender::default(),
                &mut SeededRng::new(1),
            )
        });
    });
    group.finish();
}

pub fn search_benchmark(c: &mut Criterion) {
    let predictor = fixtures::predictor();
    let catalog = fixtures::catalog();
    let opponent = fixtures::battle(&[], &[("Zergling", 16), ("Roach", 4)]);
    let available = AvailableUnitTypes::from_names(
        &catalog,
        &[("Marine", 40), ("Marauder", 20), ("SiegeTank", 10)],
    )
    .expect("bundled names");
    let settings = CompositionSearchSettings::default()
        .with_population(10, 3)
        .with_generations(5);

    c.bench_function("composition_search_small", |b| {
        b.iter(|| {
            find_best_composition_genetic(
                &predictor,
                black_box(&opponent),
                &available,
                SearchSetup::new(),
                &settings,
                &mut SeededRng::new(7),
            )
        });
    });
}

criterion_group!(benches, predict_benchmark, search_benchmark);
criterion_main!(benches);
