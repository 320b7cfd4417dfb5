use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

use costmap_runtime::costmap::LayerKind;
use costmap_runtime::layers::PolygonLayerConfig;
use costmap_runtime::types::COST_FREE;
use costmap_runtime::{Grid2d, LayeredCostmap, MapInfo, PolygonLayer, StaticTransformTree};

fn bench_resize_map(c: &mut Criterion) {
    let info = MapInfo::square(256, 0.05);
    let grid = Grid2d::<u8>::filled(info, COST_FREE);
    let larger = MapInfo::square(320, 0.05);

    c.bench_function("grid2d_resize_map", |b| {
        b.iter_batched(
            || grid.clone(),
            |mut grid| {
                grid.resize_map(larger, COST_FREE);
                black_box(grid);
            },
            BatchSize::SmallInput,
        );
    });

    let mut layered = LayeredCostmap::new("map", info, false, false);
    let transforms = std::sync::Arc::new(StaticTransformTree::new());
    for i in 0..4 {
        let offset = i as f32 * 2.0;
        let layer = PolygonLayer::new(PolygonLayerConfig {
            polygons: vec![vec![
                [offset + 1.0, 1.0],
                [offset + 2.0, 1.0],
                [offset + 2.0, 2.0],
                [offset + 1.0, 2.0],
            ]],
            ..Default::default()
        });
        layered
            .add_plugin(
                LayerKind::Layer,
                &format!("zone_{i}"),
                Box::new(layer),
                transforms.clone(),
                &serde_yaml::Value::Null,
            )
            .expect("polygon layer initializes");
    }

    let mut flip = false;
    c.bench_function("layered_resize_map_4_layers", |b| {
        b.iter(|| {
            flip = !flip;
            let target = if flip { larger } else { info };
            layered.resize_map(black_box(target), false);
        });
    });
}

criterion_group!(benches, bench_resize_map);
criterion_main!(benches);
