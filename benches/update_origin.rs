use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use glam::Vec2;

use costmap_runtime::types::COST_UNKNOWN;
use costmap_runtime::{Grid2d, MapInfo};

fn bench_update_origin(c: &mut Criterion) {
    let info = MapInfo::square(256, 0.05);
    let grid = Grid2d::<u8>::filled(info, 0);

    c.bench_function("grid2d_update_origin_shift", |b| {
        b.iter_batched(
            || grid.clone(),
            |mut grid| {
                grid.update_origin(&Vec2::new(0.5, 0.25), COST_UNKNOWN);
                black_box(grid);
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_update_origin);
criterion_main!(benches);
