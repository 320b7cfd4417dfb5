//! Layers shipped with the crate.

pub mod polygon;
pub mod static_layer;

pub use polygon::{PolygonLayer, PolygonLayerConfig};
pub use static_layer::{StaticLayer, StaticLayerConfig};
