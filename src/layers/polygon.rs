//! Fixed polygons stamped into the costmap, e.g. keep-out zones.
//!
//! Works as a regular layer or as a filter. As a filter it runs after every
//! layer, so its cost wins over whatever the layers wrote.

use glam::Vec2;
use serde::Deserialize;

use crate::costmap::{Costmap, Layer, LayerContext};
use crate::types::{Bounds, COST_LETHAL, CellRegion, CostmapError, MapInfo, Pose2};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolygonLayerConfig {
    pub enabled: bool,
    /// Polygons as `[x, y]` vertices in the global frame.
    pub polygons: Vec<Vec<[f32; 2]>>,
    pub cost: u8,
    /// Replace lower and higher costs alike. Otherwise only raise them.
    pub overwrite: bool,
}

impl Default for PolygonLayerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            polygons: Vec::new(),
            cost: COST_LETHAL,
            overwrite: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct PolygonLayer {
    config: PolygonLayerConfig,
    polygons: Vec<Vec<Vec2>>,
    needs_repaint: bool,
}

impl PolygonLayer {
    pub const PLUGIN_TYPE: &'static str = "costmap_runtime::PolygonLayer";

    pub fn new(config: PolygonLayerConfig) -> Self {
        let mut layer = Self::default();
        layer.apply(config);
        layer
    }

    pub fn polygons(&self) -> &[Vec<Vec2>] {
        &self.polygons
    }

    fn apply(&mut self, config: PolygonLayerConfig) {
        self.polygons = config
            .polygons
            .iter()
            .map(|poly| poly.iter().map(|&[x, y]| Vec2::new(x, y)).collect())
            .collect();
        self.config = config;
        self.needs_repaint = true;
    }
}

impl Layer for PolygonLayer {
    fn initialize(&mut self, ctx: &mut LayerContext<'_>) -> Result<(), CostmapError> {
        // Parameters win over a config given at construction.
        if !ctx.raw_params().is_null() {
            self.apply(ctx.params()?);
        }
        if let Some(i) = self.polygons.iter().position(|p| p.len() < 3) {
            return Err(CostmapError::InvalidParameter {
                name: format!("{}.polygons", ctx.name()),
                reason: format!("polygon {i} has fewer than 3 vertices"),
            });
        }
        log::debug!("{}: {} polygon(s)", ctx.name(), self.polygons.len());
        self.needs_repaint = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.needs_repaint = true;
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn update_bounds(&mut self, _robot: Pose2, bounds: &mut Bounds) {
        if !std::mem::take(&mut self.needs_repaint) {
            return;
        }
        for &point in self.polygons.iter().flatten() {
            bounds.expand_to_include(point);
        }
    }

    fn update_costs(&mut self, master: &mut Costmap, region: CellRegion) {
        let cost = self.config.cost;
        for polygon in &self.polygons {
            let Some(cells) = master.polygon(polygon) else {
                continue;
            };
            let cells: Vec<_> = cells
                .filter(|c| {
                    c.x >= region.min.x
                        && c.x < region.max.x
                        && c.y >= region.min.y
                        && c.y < region.max.y
                })
                .collect();
            for cell in cells {
                if let Some(slot) = master.get_mut(cell) {
                    if self.config.overwrite || *slot < cost {
                        *slot = cost;
                    }
                }
            }
        }
    }

    fn match_size(&mut self, _info: &MapInfo) {
        self.needs_repaint = true;
    }
}
