//! Static map layer.
//!
//! Serves a fixed occupancy map, either handed over directly or loaded from a
//! ROS2 map YAML file named in the layer parameters. In a fixed-window costmap
//! the master grid is reshaped to the map's geometry and size-locked, so
//! runtime reconfiguration cannot change it.

use std::path::PathBuf;

use glam::UVec2;
use serde::Deserialize;

use crate::costmap::{CombinationMethod, Costmap, Layer, LayerContext, merge_region};
use crate::grid::OccupancyGrid;
use crate::loaders::load_occupancy_grid;
use crate::types::{Bounds, CellRegion, CostmapError, MapInfo, OCCUPIED, Pose2};

/// Parameters of [`StaticLayer`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticLayerConfig {
    pub enabled: bool,
    /// Map YAML file. Not needed when the layer was built from a grid.
    pub map: Option<PathBuf>,
    /// Occupancy at or above this value is lethal.
    pub lethal_cost_threshold: i8,
    /// Keep unknown map cells unknown. Inherits the costmap setting when unset.
    pub track_unknown_space: Option<bool>,
    /// Combine with the master by maximum instead of overwriting.
    pub use_maximum: bool,
}

impl Default for StaticLayerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            map: None,
            lethal_cost_threshold: OCCUPIED,
            track_unknown_space: None,
            use_maximum: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct StaticLayer {
    config: StaticLayerConfig,
    source: Option<OccupancyGrid>,
    costs: Option<Costmap>,
    rolling_window: bool,
    has_updated_data: bool,
}

impl StaticLayer {
    pub const PLUGIN_TYPE: &'static str = "costmap_runtime::StaticLayer";

    /// A layer serving `map` instead of loading one from disk.
    pub fn from_occupancy(map: OccupancyGrid) -> Self {
        Self {
            source: Some(map),
            ..Default::default()
        }
    }

    pub fn config(&self) -> &StaticLayerConfig {
        &self.config
    }

    fn combination(&self) -> CombinationMethod {
        if self.config.use_maximum {
            CombinationMethod::Max
        } else {
            CombinationMethod::Overwrite
        }
    }
}

impl Layer for StaticLayer {
    fn initialize(&mut self, ctx: &mut LayerContext<'_>) -> Result<(), CostmapError> {
        self.config = ctx.params()?;
        self.rolling_window = ctx.rolling_window();
        let track_unknown = self
            .config
            .track_unknown_space
            .unwrap_or(ctx.track_unknown_space());

        let map = match (self.source.take(), &self.config.map) {
            (Some(map), _) => map,
            (None, Some(path)) => {
                log::info!("{}: loading map from {}", ctx.name(), path.display());
                load_occupancy_grid(path)?
            }
            (None, None) => {
                return Err(CostmapError::InvalidParameter {
                    name: format!("{}.map", ctx.name()),
                    reason: "no map file given".to_string(),
                });
            }
        };

        let info = *map.info();
        let threshold = self.config.lethal_cost_threshold;
        let data = (0..info.height)
            .flat_map(|y| (0..info.width).map(move |x| UVec2::new(x, y)))
            .map(|cell| {
                map.cost_at(cell, threshold, track_unknown)
                    .unwrap_or_default()
            })
            .collect();
        self.costs = Some(Costmap::new(info, data)?);

        if !self.rolling_window {
            ctx.resize_master(info, true);
        }

        self.has_updated_data = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.has_updated_data = true;
    }

    fn is_clearable(&self) -> bool {
        false
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn update_bounds(&mut self, _robot: Pose2, bounds: &mut Bounds) {
        // A rolling window moves over the map, so it is repainted every cycle.
        if !self.rolling_window && !self.has_updated_data {
            return;
        }
        let Some(costs) = &self.costs else {
            return;
        };
        let info = costs.info();
        bounds.expand_to_include(info.origin);
        bounds.expand_to_include(costs.map_to_world(&glam::Vec2::new(
            info.width as f32 - 0.5,
            info.height as f32 - 0.5,
        )));
        self.has_updated_data = false;
    }

    fn update_costs(&mut self, master: &mut Costmap, region: CellRegion) {
        let Some(costs) = &self.costs else {
            return;
        };
        let method = self.combination();

        if !self.rolling_window && master.info() == costs.info() {
            merge_region(master, costs, region, method);
            return;
        }

        // Different geometry (rolling window): sample the map at each cell center.
        for y in region.min.y..region.max.y.min(master.height()) {
            for x in region.min.x..region.max.x.min(master.width()) {
                let cell = UVec2::new(x, y);
                let world = master.cell_center(cell);
                let Some(value) = costs.world_to_cell(&world).and_then(|c| costs.get(c)) else {
                    continue;
                };
                if let Some(slot) = master.get_mut(cell) {
                    if let Some(cost) = method.combine(*slot, *value) {
                        *slot = cost;
                    }
                }
            }
        }
    }

    fn match_size(&mut self, _info: &MapInfo) {
        self.has_updated_data = true;
    }

    fn costmap(&self) -> Option<&Costmap> {
        self.costs.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec2;

    use super::*;
    use crate::costmap::{LayerKind, LayeredCostmap};
    use crate::transform::StaticTransformTree;
    use crate::types::{COST_FREE, COST_LETHAL, COST_UNKNOWN, FREE, UNKNOWN};

    fn occupancy() -> OccupancyGrid {
        let info = MapInfo {
            width: 4,
            height: 3,
            resolution: 0.5,
            origin: Vec2::new(-1.0, -1.0),
        };
        let mut data = vec![FREE; 12];
        data[5] = OCCUPIED;
        data[11] = UNKNOWN;
        OccupancyGrid::new(info, data).unwrap()
    }

    fn layered_with(layer: StaticLayer, rolling: bool, track_unknown: bool) -> LayeredCostmap {
        let mut layered =
            LayeredCostmap::new("map", MapInfo::square(10, 0.1), rolling, track_unknown);
        layered
            .add_plugin(
                LayerKind::Layer,
                "static_layer",
                Box::new(layer),
                Arc::new(StaticTransformTree::new()),
                &serde_yaml::Value::Null,
            )
            .unwrap();
        layered
    }

    #[test]
    fn fixed_window_adopts_map_geometry() {
        let mut layered = layered_with(StaticLayer::from_occupancy(occupancy()), false, true);
        assert!(layered.is_size_locked());
        assert_eq!(*layered.grid().read().info(), *occupancy().info());

        layered.update_map(Pose2::default());
        let grid = layered.grid().read();
        assert_eq!(grid.get(UVec2::new(1, 1)), Some(&COST_LETHAL));
        assert_eq!(grid.get(UVec2::new(0, 0)), Some(&COST_FREE));
        assert_eq!(grid.get(UVec2::new(3, 2)), Some(&COST_UNKNOWN));
    }

    #[test]
    fn rolling_window_samples_the_map() {
        let mut layered = layered_with(StaticLayer::from_occupancy(occupancy()), true, false);
        assert!(!layered.is_size_locked());

        layered.update_map(Pose2::default());
        let grid = layered.grid().read();
        // Map cell (1, 1) covers world [-0.5, 0.0) on both axes.
        let cell = grid.world_to_cell(&Vec2::new(-0.25, -0.25)).unwrap();
        assert_eq!(grid.get(cell), Some(&COST_LETHAL));
    }

    #[test]
    fn static_layer_is_not_clearable() {
        let layer = StaticLayer::from_occupancy(occupancy());
        assert!(!layer.is_clearable());
        assert_eq!(layer.config().lethal_cost_threshold, OCCUPIED);
    }

    #[test]
    fn missing_map_fails_initialization() {
        let mut layered = LayeredCostmap::new("map", MapInfo::square(10, 0.1), false, false);
        let err = layered
            .add_plugin(
                LayerKind::Layer,
                "static_layer",
                Box::new(StaticLayer::default()),
                Arc::new(StaticTransformTree::new()),
                &serde_yaml::Value::Null,
            )
            .unwrap_err();
        assert!(matches!(err, CostmapError::PluginInit { .. }));
    }
}
