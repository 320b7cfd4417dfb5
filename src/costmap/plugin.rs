//! Layer construction by type identifier.
//!
//! Configuration names each layer's type as a string (for example
//! `"costmap_runtime::StaticLayer"`). The registry maps those identifiers to
//! constructors so compositions can change without recompiling the engine.

use std::collections::HashMap;
use std::fmt;

use super::Layer;
use crate::layers::{PolygonLayer, StaticLayer};
use crate::types::CostmapError;

pub type LayerFactory = Box<dyn Fn() -> Box<dyn Layer> + Send + Sync>;

#[derive(Default)]
pub struct PluginRegistry {
    factories: HashMap<String, LayerFactory>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that knows the layers shipped with this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(StaticLayer::PLUGIN_TYPE, || Box::new(StaticLayer::default()));
        registry.register(PolygonLayer::PLUGIN_TYPE, || {
            Box::new(PolygonLayer::default())
        });
        registry
    }

    /// Register a constructor, replacing any previous one for `plugin_type`.
    pub fn register<F>(&mut self, plugin_type: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Layer> + Send + Sync + 'static,
    {
        self.factories.insert(plugin_type.into(), Box::new(factory));
    }

    pub fn contains(&self, plugin_type: &str) -> bool {
        self.factories.contains_key(plugin_type)
    }

    /// Build a fresh, uninitialized layer.
    pub fn create(&self, plugin_type: &str) -> Result<Box<dyn Layer>, CostmapError> {
        self.factories
            .get(plugin_type)
            .map(|factory| factory())
            .ok_or_else(|| CostmapError::UnknownPluginType(plugin_type.to_string()))
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.factories.keys().collect();
        types.sort();
        f.debug_struct("PluginRegistry")
            .field("types", &types)
            .finish()
    }
}
