//! Layered costmap: ordered layers and filters that write into a shared master grid.
//!
//! An update aggregates bounds from every enabled layer then every enabled
//! filter, resets the master inside that region, and asks each of them in
//! turn to write their costs. The master grid lives behind its own lock
//! ([`SharedGrid`]); each contribution takes the write lock separately so
//! readers only ever wait for one layer. The reset is done under the first
//! layer's lock, so a reader sees either the previous costs or the first
//! layer's output for the region.

use std::sync::Arc;

use glam::Vec2;
use parking_lot::RwLock;

use super::{Costmap, Layer, LayerContext, LayerKind, LayerRegistry, SharedGrid};
use crate::transform::TransformProvider;
use crate::types::{
    Bounds, COST_FREE, COST_UNKNOWN, CellRegion, CostmapError, Footprint, MapInfo, Pose2,
};

/// Value of a master cell that no layer has written.
pub(crate) fn default_cost(track_unknown_space: bool) -> u8 {
    if track_unknown_space {
        COST_UNKNOWN
    } else {
        COST_FREE
    }
}

/// How an update reaches the master grid.
enum GridAccess<'a> {
    /// Take the write lock for each step.
    Shared(&'a SharedGrid),
    /// The caller already holds the write lock for the whole pass.
    Held(&'a mut Costmap),
}

impl GridAccess<'_> {
    fn with<R>(&mut self, f: impl FnOnce(&mut Costmap) -> R) -> R {
        match self {
            Self::Shared(grid) => f(&mut *grid.write()),
            Self::Held(master) => f(master),
        }
    }
}

pub struct LayeredCostmap {
    grid: SharedGrid,
    registry: LayerRegistry,
    global_frame: String,
    rolling_window: bool,
    track_unknown_space: bool,
    size_locked: bool,
    footprint: Footprint,
    inscribed_radius: f32,
    circumscribed_radius: f32,
    updated_region: CellRegion,
    updated_bounds: Bounds,
    force_full_update: bool,
    initialized: bool,
}

impl LayeredCostmap {
    pub fn new(
        global_frame: impl Into<String>,
        info: MapInfo,
        rolling_window: bool,
        track_unknown_space: bool,
    ) -> Self {
        let master = Costmap::filled(info, default_cost(track_unknown_space));
        Self {
            grid: Arc::new(RwLock::new(master)),
            registry: LayerRegistry::new(),
            global_frame: global_frame.into(),
            rolling_window,
            track_unknown_space,
            size_locked: false,
            footprint: Footprint::default(),
            inscribed_radius: 0.0,
            circumscribed_radius: 0.0,
            updated_region: CellRegion::empty(),
            updated_bounds: Bounds::empty(),
            force_full_update: true,
            initialized: false,
        }
    }

    /// Handle to the master grid and its lock.
    pub fn grid(&self) -> &SharedGrid {
        &self.grid
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut LayerRegistry {
        &mut self.registry
    }

    pub fn global_frame(&self) -> &str {
        &self.global_frame
    }

    pub fn is_rolling(&self) -> bool {
        self.rolling_window
    }

    pub fn is_tracking_unknown(&self) -> bool {
        self.track_unknown_space
    }

    pub fn is_size_locked(&self) -> bool {
        self.size_locked
    }

    /// True once a full update pass has completed since construction.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    pub fn inscribed_radius(&self) -> f32 {
        self.inscribed_radius
    }

    pub fn circumscribed_radius(&self) -> f32 {
        self.circumscribed_radius
    }

    /// Cell region written by the last update.
    pub fn updated_region(&self) -> CellRegion {
        self.updated_region
    }

    /// World bounds reported by the layers in the last update.
    pub fn updated_bounds(&self) -> Bounds {
        self.updated_bounds
    }

    /// Initialize `layer` against the master grid and append it.
    ///
    /// The master grid is write-locked for the whole `initialize` call. If the
    /// layer reshaped the master, every registered layer is told about the
    /// new geometry.
    pub fn add_plugin(
        &mut self,
        kind: LayerKind,
        name: &str,
        mut layer: Box<dyn Layer>,
        transforms: Arc<dyn TransformProvider>,
        params: &serde_yaml::Value,
    ) -> Result<(), CostmapError> {
        let resize = {
            let mut master = self.grid.write();
            let mut ctx = LayerContext::new(
                name,
                &self.global_frame,
                self.rolling_window,
                self.track_unknown_space,
                transforms,
                params,
                &mut master,
            );
            layer
                .initialize(&mut ctx)
                .map_err(|e| CostmapError::PluginInit {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
            ctx.take_resize()
        };

        if self.footprint.is_valid() {
            layer.on_footprint_changed(&self.footprint);
        }

        match kind {
            LayerKind::Layer => self.registry.add_layer(name, layer),
            LayerKind::Filter => self.registry.add_filter(name, layer),
        }

        if let Some((info, locked)) = resize {
            log::info!(
                "{name} resized the master grid to {}x{} at {} m/cell{}",
                info.width,
                info.height,
                info.resolution,
                if locked { " (size locked)" } else { "" }
            );
            self.size_locked |= locked;
            self.force_full_update = true;
            for entry in self.registry.iter_mut() {
                entry.layer.match_size(&info);
            }
        }
        Ok(())
    }

    /// Reallocate the master grid and tell every layer about it.
    pub fn resize_map(&mut self, info: MapInfo, size_locked: bool) {
        let grid = Arc::clone(&self.grid);
        self.resize_with(GridAccess::Shared(&grid), info, size_locked);
    }

    /// [`resize_map`](Self::resize_map) for a caller already holding the grid lock.
    pub fn resize_map_locked(&mut self, master: &mut Costmap, info: MapInfo, size_locked: bool) {
        self.resize_with(GridAccess::Held(master), info, size_locked);
    }

    fn resize_with(&mut self, mut access: GridAccess<'_>, info: MapInfo, size_locked: bool) {
        let fill = default_cost(self.track_unknown_space);
        access.with(|master| master.resize_map(info, fill));
        self.size_locked = size_locked;
        self.force_full_update = true;
        for entry in self.registry.iter_mut() {
            entry.layer.match_size(&info);
        }
    }

    /// Run one update pass for a robot at `robot` and return the region written.
    pub fn update_map(&mut self, robot: Pose2) -> CellRegion {
        let grid = Arc::clone(&self.grid);
        self.update_with(GridAccess::Shared(&grid), robot)
    }

    /// [`update_map`](Self::update_map) for a caller already holding the grid lock.
    pub fn update_map_locked(&mut self, master: &mut Costmap, robot: Pose2) -> CellRegion {
        self.update_with(GridAccess::Held(master), robot)
    }

    fn update_with(&mut self, mut access: GridAccess<'_>, robot: Pose2) -> CellRegion {
        let fill = default_cost(self.track_unknown_space);

        if self.rolling_window {
            access.with(|master| {
                let info = *master.info();
                let half = Vec2::new(info.world_width(), info.world_height()) * 0.5;
                master.update_origin(&(robot.position - half), fill);
            });
        }

        let mut bounds = Bounds::empty();
        for entry in self.registry.iter_mut().filter(|e| e.layer.is_enabled()) {
            let before = bounds;
            entry.layer.update_bounds(robot, &mut bounds);
            if shrinks(&before, &bounds) {
                log::warn!(
                    "{} shrank the update bounds from {:?} to {:?}; layers may only grow them",
                    entry.name,
                    before,
                    bounds
                );
            }
        }

        let force_full = std::mem::take(&mut self.force_full_update);
        let region = access.with(|master| {
            if force_full {
                CellRegion::full(master.width(), master.height())
            } else if bounds.is_empty() {
                CellRegion::empty()
            } else {
                master.world_bounds_to_region(bounds.min, bounds.max)
            }
        });

        log::debug!(
            "update region [{}, {}) x [{}, {})",
            region.min.x,
            region.max.x,
            region.min.y,
            region.max.y
        );

        if !region.is_empty() {
            // The reset shares the first layer's lock so readers never see a
            // cleared region before it is repainted.
            let mut reset_pending = true;
            for entry in self.registry.iter_mut().filter(|e| e.layer.is_enabled()) {
                access.with(|master| {
                    if std::mem::take(&mut reset_pending) {
                        master.fill_region(region.min, region.max, fill);
                    }
                    entry.layer.update_costs(master, region);
                });
            }
            if reset_pending {
                access.with(|master| master.fill_region(region.min, region.max, fill));
            }
        }

        self.updated_bounds = bounds;
        self.updated_region = region;
        self.initialized = true;
        region
    }

    /// Replace the padded footprint used by the layers.
    pub fn set_footprint(&mut self, footprint: Footprint) {
        let (inscribed, circumscribed) = footprint.min_max_distances();
        self.inscribed_radius = inscribed;
        self.circumscribed_radius = circumscribed;
        for entry in self.registry.iter_mut() {
            entry.layer.on_footprint_changed(&footprint);
        }
        self.footprint = footprint;
    }

    /// Reset the master to its default cost and every layer and filter to its
    /// initial state.
    pub fn reset_layers(&mut self) {
        let fill = default_cost(self.track_unknown_space);
        self.grid.write().data_mut().fill(fill);
        self.registry.reset_all();
        self.force_full_update = true;
    }

    /// Reset clearable layers only; the next update repaints the whole grid.
    pub fn reset_clearable_layers(&mut self) {
        self.registry.reset_clearable();
        self.force_full_update = true;
    }

    /// True when every enabled layer and filter reports fresh inputs.
    pub fn is_current(&self) -> bool {
        self.registry.is_current()
    }
}

/// Whether `after` no longer covers `before`.
fn shrinks(before: &Bounds, after: &Bounds) -> bool {
    if before.is_empty() {
        return false;
    }
    after.min.x > before.min.x
        || after.min.y > before.min.y
        || after.max.x < before.max.x
        || after.max.y < before.max.y
}
