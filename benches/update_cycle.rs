use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use costmap_runtime::costmap::LayerKind;
use costmap_runtime::layers::PolygonLayerConfig;
use costmap_runtime::types::{FREE, OCCUPIED};
use costmap_runtime::{
    LayeredCostmap, MapInfo, OccupancyGrid, PolygonLayer, Pose2, StaticLayer, StaticTransformTree,
};

fn warehouse(width: u32, height: u32) -> OccupancyGrid {
    let info = MapInfo {
        width,
        height,
        resolution: 0.05,
        ..Default::default()
    };
    let data = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| if x % 40 < 2 || y % 60 < 2 { OCCUPIED } else { FREE })
        .collect();
    OccupancyGrid::new(info, data).expect("matching size")
}

fn layered(rolling_window: bool) -> LayeredCostmap {
    let info = MapInfo::square(200, 0.05);
    let mut layered = LayeredCostmap::new("map", info, rolling_window, false);
    let transforms = Arc::new(StaticTransformTree::new());
    layered
        .add_plugin(
            LayerKind::Layer,
            "static_layer",
            Box::new(StaticLayer::from_occupancy(warehouse(800, 600))),
            transforms.clone(),
            &serde_yaml::Value::Null,
        )
        .expect("static layer initializes");
    layered
        .add_plugin(
            LayerKind::Filter,
            "keepout",
            Box::new(PolygonLayer::new(PolygonLayerConfig {
                polygons: vec![vec![[5.0, 5.0], [8.0, 5.0], [8.0, 9.0], [5.0, 9.0]]],
                ..Default::default()
            })),
            transforms,
            &serde_yaml::Value::Null,
        )
        .expect("polygon layer initializes");
    layered
}

fn bench_update_cycle(c: &mut Criterion) {
    let mut fixed = layered(false);
    c.bench_function("update_map_fixed_full", |b| {
        b.iter(|| {
            fixed.reset_layers();
            black_box(fixed.update_map(Pose2::from_xy_yaw(20.0, 15.0, 0.0)));
        });
    });

    let mut rolling = layered(true);
    let mut x = 5.0_f32;
    c.bench_function("update_map_rolling_moving_robot", |b| {
        b.iter(|| {
            x = if x > 35.0 { 5.0 } else { x + 0.1 };
            black_box(rolling.update_map(Pose2::from_xy_yaw(x, 15.0, 0.0)));
        });
    });
}

criterion_group!(benches, bench_update_cycle);
criterion_main!(benches);
