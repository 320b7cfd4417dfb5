pub mod ros2;

pub use ros2::{MapMetadata, MapMode, load_occupancy_grid};
