use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use surfacegen::{CellCoord, Resolution, Settings, SparseGrid, SurfaceCoordinator};

fn filled_cube_grid(side: i32) -> SparseGrid {
    let mut grid = SparseGrid::new(0.32, Resolution::Cm32);
    for x in 0..side {
        for y in 0..side {
            for z in 0..side {
                grid.set(CellCoord::new(x, y, z), true);
            }
        }
    }
    grid
}

fn benchmark_extraction(c: &mut Criterion) {
    let small = filled_cube_grid(4);
    let large = filled_cube_grid(12);
    let coordinator = SurfaceCoordinator::new();
    let settings = Settings::default();

    c.bench_function("extraction_4x4x4", |b| {
        b.iter(|| {
            coordinator
                .generate_surface(black_box(&small), black_box(&settings), black_box(&|| false), None)
                .unwrap()
        })
    });

    c.bench_function("extraction_12x12x12", |b| {
        b.iter(|| {
            coordinator
                .generate_surface(black_box(&large), black_box(&settings), black_box(&|| false), None)
                .unwrap()
        })
    });
}

fn benchmark_smoothing(c: &mut Criterion) {
    let grid = filled_cube_grid(8);
    let coordinator = SurfaceCoordinator::new();

    let mut unsmoothed = Settings::default();
    unsmoothed.smoothing_level = 0;

    let mut laplacian = Settings::default();
    laplacian.smoothing_level = 3;

    let mut bilaplacian = Settings::default();
    bilaplacian.smoothing_level = 12;

    c.bench_function("smoothing_none", |b| {
        b.iter(|| {
            coordinator
                .generate_surface(black_box(&grid), black_box(&unsmoothed), black_box(&|| false), None)
                .unwrap()
        })
    });

    c.bench_function("smoothing_laplacian_level_3", |b| {
        b.iter(|| {
            coordinator
                .generate_surface(black_box(&grid), black_box(&laplacian), black_box(&|| false), None)
                .unwrap()
        })
    });

    c.bench_function("smoothing_bilaplacian_level_12", |b| {
        b.iter(|| {
            coordinator
                .generate_surface(black_box(&grid), black_box(&bilaplacian), black_box(&|| false), None)
                .unwrap()
        })
    });
}

fn benchmark_simplification(c: &mut Criterion) {
    let grid = filled_cube_grid(10);
    let coordinator = SurfaceCoordinator::new();

    let mut half = Settings::default();
    half.simplification_ratio = 0.5;

    let mut aggressive = Settings::default();
    aggressive.simplification_ratio = 0.1;

    c.bench_function("simplification_ratio_0_5", |b| {
        b.iter(|| {
            coordinator
                .generate_surface(black_box(&grid), black_box(&half), black_box(&|| false), None)
                .unwrap()
        })
    });

    c.bench_function("simplification_ratio_0_1", |b| {
        b.iter(|| {
            coordinator
                .generate_surface(black_box(&grid), black_box(&aggressive), black_box(&|| false), None)
                .unwrap()
        })
    });
}

fn benchmark_cache_hit(c: &mut Criterion) {
    let grid = filled_cube_grid(6);
    let coordinator = SurfaceCoordinator::new();
    let settings = Settings::default();
    coordinator.generate_surface(&grid, &settings, &|| false, None).unwrap();

    c.bench_function("cache_hit_repeat_generation", |b| {
        b.iter(|| {
            coordinator
                .generate_surface(black_box(&grid), black_box(&settings), black_box(&|| false), None)
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    benchmark_extraction,
    benchmark_smoothing,
    benchmark_simplification,
    benchmark_cache_hit
);
criterion_main!(benches);
