//! The layer plugin contract.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::costmap::Costmap;
use crate::transform::TransformProvider;
use crate::types::{Bounds, CellRegion, CostmapError, Footprint, MapInfo, Pose2};

/// A pluggable contributor to the master costmap.
///
/// Lifecycle: `initialize` exactly once (with the master grid write-locked),
/// then any number of `activate`/`deactivate` pairs. Every update cycle calls
/// `update_bounds` on all enabled layers and filters, then `update_costs` on
/// each of them in registration order with the merged region.
///
/// Layers only expand the bounds they are given, never shrink them, and only
/// write master cells inside the region passed to `update_costs`.
pub trait Layer: Send {
    /// One-time setup against the master grid and the layer's parameters.
    fn initialize(&mut self, ctx: &mut LayerContext<'_>) -> Result<(), CostmapError>;

    /// Start consuming inputs. Called on every transition into the running state.
    fn activate(&mut self) {}

    /// Stop consuming inputs. Called on every transition out of the running state.
    fn deactivate(&mut self) {}

    /// Reset the layer to its initial state.
    fn reset(&mut self);

    /// Whether a "clear except static" request should reset this layer.
    fn is_clearable(&self) -> bool {
        true
    }

    /// Disabled layers are skipped by the update loop.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Whether the layer's inputs are fresh.
    fn is_current(&self) -> bool {
        true
    }

    /// Expand the world bounds that this layer needs to update.
    fn update_bounds(&mut self, robot: Pose2, bounds: &mut Bounds);

    /// Write into the master grid only within `region`.
    fn update_costs(&mut self, master: &mut Costmap, region: CellRegion);

    /// Called when the robot footprint changes. Default: no-op.
    fn on_footprint_changed(&mut self, _footprint: &Footprint) {}

    /// Called when the master grid is resized. Default: no-op.
    fn match_size(&mut self, _info: &MapInfo) {}

    /// The layer's own grid, for layers that keep one. Such layers get their
    /// own publisher.
    fn costmap(&self) -> Option<&Costmap> {
        None
    }
}

/// Everything a layer may touch during [`Layer::initialize`].
///
/// The master grid is write-locked for the lifetime of the context, so no
/// update cycle or query can observe a half-initialized layer.
pub struct LayerContext<'a> {
    name: &'a str,
    global_frame: &'a str,
    rolling_window: bool,
    track_unknown_space: bool,
    transforms: Arc<dyn TransformProvider>,
    params: &'a serde_yaml::Value,
    master: &'a mut Costmap,
    resize: Option<(MapInfo, bool)>,
}

impl<'a> LayerContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: &'a str,
        global_frame: &'a str,
        rolling_window: bool,
        track_unknown_space: bool,
        transforms: Arc<dyn TransformProvider>,
        params: &'a serde_yaml::Value,
        master: &'a mut Costmap,
    ) -> Self {
        Self {
            name,
            global_frame,
            rolling_window,
            track_unknown_space,
            transforms,
            params,
            master,
            resize: None,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn global_frame(&self) -> &str {
        self.global_frame
    }

    pub fn rolling_window(&self) -> bool {
        self.rolling_window
    }

    pub fn track_unknown_space(&self) -> bool {
        self.track_unknown_space
    }

    pub fn transforms(&self) -> Arc<dyn TransformProvider> {
        Arc::clone(&self.transforms)
    }

    pub fn master(&self) -> &Costmap {
        self.master
    }

    /// Raw parameter block of this layer.
    pub fn raw_params(&self) -> &serde_yaml::Value {
        self.params
    }

    /// Deserialize this layer's parameter block. A missing block yields the
    /// default configuration.
    pub fn params<T>(&self) -> Result<T, CostmapError>
    where
        T: DeserializeOwned + Default,
    {
        if self.params.is_null() {
            return Ok(T::default());
        }
        serde_yaml::from_value(self.params.clone()).map_err(|e| CostmapError::InvalidParameter {
            name: self.name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Reshape the master grid, optionally locking its size against later
    /// reconfiguration (e.g. a layer that serves a fixed map).
    pub fn resize_master(&mut self, info: MapInfo, lock_size: bool) {
        let fill = crate::costmap::layered::default_cost(self.track_unknown_space);
        self.master.resize_map(info, fill);
        let locked = lock_size || self.resize.is_some_and(|(_, locked)| locked);
        self.resize = Some((info, locked));
    }

    pub(crate) fn take_resize(&mut self) -> Option<(MapInfo, bool)> {
        self.resize.take()
    }
}
