pub mod constants;
pub mod error;
pub mod geometry;
pub mod info;

pub use constants::*;
pub use error::CostmapError;
pub use geometry::{Bounds, CellRegion, Footprint, Pose2, PoseStamped};
pub use info::MapInfo;
