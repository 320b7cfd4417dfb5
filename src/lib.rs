//! A live layered 2D costmap.
//!
//! [`CostmapNode`] owns a master grid built from plugin layers. After
//! activation a background thread updates the grid around the robot at a fixed
//! rate and publishes changes, while other threads query costs and change
//! parameters concurrently.

pub mod clock;
pub mod config;
pub mod costmap;
pub mod footprint;
pub mod grid;
pub mod iterators;
pub mod layers;
pub mod loaders;
pub mod node;
pub mod publisher;
pub mod transform;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CostmapConfig, PluginConfig};
pub use costmap::{
    CombinationMethod, Costmap, Layer, LayerContext, LayeredCostmap, PluginRegistry, SharedGrid,
};
pub use footprint::FootprintManager;
pub use grid::{Grid2d, OccupancyGrid};
pub use layers::{PolygonLayer, StaticLayer};
pub use loaders::ros2::load_occupancy_grid;
pub use node::{
    ClearMode, CostRequest, CostResponse, CostmapNode, LifecycleState, Parameter, ParameterValue,
    RunState, SetParametersResult,
};
pub use publisher::{ChannelPublisher, CostmapMessage, CostmapPublisher, PublisherFactory};
pub use transform::{StaticTransformTree, TransformProvider};
pub use types::{Bounds, CellRegion, CostmapError, Footprint, MapInfo, Pose2, PoseStamped};
