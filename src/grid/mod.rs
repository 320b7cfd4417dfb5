pub mod grid2d;
pub mod helpers;
pub mod occupancy;

pub use grid2d::Grid2d;
pub use occupancy::{OccupancyGrid, occupancy_to_cost};
