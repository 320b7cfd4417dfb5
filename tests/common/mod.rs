#![allow(dead_code)]

use std::sync::Arc;

use costmap_runtime::types::{FREE, OCCUPIED};
use costmap_runtime::{
    CostmapConfig, CostmapNode, MapInfo, OccupancyGrid, PluginRegistry, Pose2, StaticLayer,
    StaticTransformTree,
};
use glam::Vec2;

/// Type id under which [`registry_with_map`] serves [`occupancy_map`].
pub const TEST_MAP_PLUGIN: &str = "test::StaticMap";

/// 5 m x 5 m at 0.1 m with a lethal square keep-out zone over [1.0, 1.5] m.
pub const KEEPOUT_YAML: &str = r#"
robot_radius: 0.3
update_frequency: 0.0
publish_frequency: 0.0
initial_transform_timeout: 1.0
plugins:
  - name: keepout
    plugin: costmap_runtime::PolygonLayer
    params:
      polygons:
        - [[1.0, 1.0], [1.5, 1.0], [1.5, 1.5], [1.0, 1.5]]
"#;

pub fn keepout_config() -> CostmapConfig {
    CostmapConfig::from_yaml_str(KEEPOUT_YAML).expect("valid yaml")
}

/// A tree holding `map -> base_link` at `(x, y)`.
pub fn transforms_at(x: f32, y: f32) -> Arc<StaticTransformTree> {
    let tree = Arc::new(StaticTransformTree::new());
    tree.set_transform("map", "base_link", Pose2::from_xy_yaw(x, y, 0.0));
    tree
}

pub fn node_with(config: CostmapConfig, transforms: Arc<StaticTransformTree>) -> CostmapNode {
    CostmapNode::new("test_costmap", config, transforms, PluginRegistry::with_builtin())
}

/// 40 x 40 cells at 0.1 m, free except an occupied 4 x 4 block at cells 10..14.
pub fn occupancy_map() -> OccupancyGrid {
    let info = MapInfo {
        width: 40,
        height: 40,
        resolution: 0.1,
        origin: Vec2::ZERO,
    };
    let mut data = vec![FREE; info.cell_count()];
    for y in 10..14 {
        for x in 10..14 {
            data[y * 40 + x] = OCCUPIED;
        }
    }
    OccupancyGrid::new(info, data).expect("matching size")
}

pub fn registry_with_map() -> PluginRegistry {
    let mut registry = PluginRegistry::with_builtin();
    let map = occupancy_map();
    registry.register(TEST_MAP_PLUGIN, move || {
        Box::new(StaticLayer::from_occupancy(map.clone()))
    });
    registry
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
