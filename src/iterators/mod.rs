pub mod polygon;

pub use polygon::{PolygonIterator, PolygonValueIterator};
