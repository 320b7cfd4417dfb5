//! The layered master costmap and the contracts its layers implement.

pub mod layer;
pub mod layered;
pub mod merge;
pub mod plugin;
pub mod registry;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::grid::Grid2d;

pub use layer::{Layer, LayerContext};
pub use layered::LayeredCostmap;
pub use merge::{CombinationMethod, merge_region};
pub use plugin::{LayerFactory, PluginRegistry};
pub use registry::{LayerEntry, LayerKind, LayerRegistry};

pub type Costmap = Grid2d<u8>;

/// The master grid behind its lock. Queries take read access for one lookup;
/// the update loop takes write access for one layer's contribution at a time.
pub type SharedGrid = Arc<RwLock<Costmap>>;
