//! Broad-phase and emitter benchmarks.
//!
//! Measures the per-tick costs that scale with the body count: re-indexing
//! every body in the grid, querying every body's neighbours, and polling the
//! emitters.
//!
//! Run with: `cargo bench --bench spatial_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use stardrift_core::body::BodyId;
use stardrift_core::emitter::{Emitter, EmitterConfig};
use stardrift_core::physics::WorldBounds;
use stardrift_core::spatial::{Aabb, SpatialGrid};
use stardrift_core::spawn::SpawnConfig;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const WORLD: f64 = 4000.0;

fn random_boxes(count: usize, seed: u64) -> Vec<(BodyId, Aabb)> {
    let mut rng = Pcg64::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let x = rng.gen_range(0.0..WORLD);
            let y = rng.gen_range(0.0..WORLD);
            let size = rng.gen_range(4.0..40.0);
            (BodyId::new(i as u32, 0), Aabb::around(x, y, size))
        })
        .collect()
}

fn populated_grid(boxes: &[(BodyId, Aabb)]) -> SpatialGrid {
    let mut grid = SpatialGrid::new(WorldBounds::new(WORLD, WORLD), 128.0, 1512).unwrap();
    for &(id, aabb) in boxes {
        grid.upsert(id, aabb);
    }
    grid
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_grid_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_refresh");
    for &count in &[1_000usize, 5_000] {
        let boxes = random_boxes(count, 1);
        let moved = random_boxes(count, 2);
        let mut grid = populated_grid(&boxes);
        let mut flip = false;
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                flip = !flip;
                let source = if flip { &moved } else { &boxes };
                for &(id, aabb) in source {
                    grid.upsert(id, aabb);
                }
            });
        });
    }
    group.finish();
}

fn bench_neighbor_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("neighbor_queries");
    for &count in &[1_000usize, 5_000] {
        let boxes = random_boxes(count, 3);
        let grid = populated_grid(&boxes);
        let mut out = Vec::new();
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut total = 0usize;
                for &(id, _) in &boxes {
                    grid.query_neighbors(id, &mut out);
                    total += out.len();
                }
                black_box(total)
            });
        });
    }
    group.finish();
}

fn bench_emitter_polling(c: &mut Criterion) {
    let config = EmitterConfig::single_shot(20.0, SpawnConfig::projectile("bullet", 2.0, 400.0))
        .with_burst(3, 200.0)
        .with_ammo(30, 1.0);
    let emitters: Vec<Emitter> = (0..5_000)
        .map(|_| Emitter::new(config.clone()).unwrap())
        .collect();

    c.bench_function("emitter_poll_5k", |b| {
        b.iter(|| {
            let mut fired = 0usize;
            for emitter in &emitters {
                emitter.register_request();
                if emitter.must_emit_now(1.0 / 60.0) {
                    fired += 1;
                }
            }
            black_box(fired)
        });
    });
}

criterion_group!(
    benches,
    bench_grid_refresh,
    bench_neighbor_queries,
    bench_emitter_polling
);
criterion_main!(benches);
