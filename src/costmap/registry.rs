//! Ordered ownership of layers and filters.

use std::fmt;

use super::Layer;

/// Where an entry sits in the update order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// A regular layer. Layers run first, in registration order.
    Layer,
    /// A post-process over the composited grid. Filters run after every layer.
    Filter,
}

pub struct LayerEntry {
    pub name: String,
    pub kind: LayerKind,
    pub layer: Box<dyn Layer>,
    active: bool,
}

impl LayerEntry {
    fn new(name: String, kind: LayerKind, layer: Box<dyn Layer>) -> Self {
        Self {
            name,
            kind,
            layer,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl fmt::Debug for LayerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("active", &self.active)
            .field("enabled", &self.layer.is_enabled())
            .finish()
    }
}

/// Registration order is composite precedence: later entries may overwrite
/// earlier ones.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    layers: Vec<LayerEntry>,
    filters: Vec<LayerEntry>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an already-initialized layer.
    pub fn add_layer(&mut self, name: impl Into<String>, layer: Box<dyn Layer>) {
        self.layers
            .push(LayerEntry::new(name.into(), LayerKind::Layer, layer));
    }

    /// Append an already-initialized filter.
    pub fn add_filter(&mut self, name: impl Into<String>, layer: Box<dyn Layer>) {
        self.filters
            .push(LayerEntry::new(name.into(), LayerKind::Filter, layer));
    }

    pub fn layers(&self) -> &[LayerEntry] {
        &self.layers
    }

    pub fn filters(&self) -> &[LayerEntry] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.layers.len() + self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry, layers first then filters.
    pub fn iter(&self) -> impl Iterator<Item = &LayerEntry> {
        self.layers.iter().chain(self.filters.iter())
    }

    /// Every entry, layers first then filters.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LayerEntry> {
        self.layers.iter_mut().chain(self.filters.iter_mut())
    }

    /// Activate in registration order. Entries that are already active are
    /// left alone, so repeated calls are harmless.
    pub fn activate_all(&mut self) {
        for entry in self.iter_mut().filter(|e| !e.active) {
            log::debug!("activating {}", entry.name);
            entry.layer.activate();
            entry.active = true;
        }
    }

    pub fn deactivate_all(&mut self) {
        for entry in self.iter_mut().filter(|e| e.active) {
            log::debug!("deactivating {}", entry.name);
            entry.layer.deactivate();
            entry.active = false;
        }
    }

    pub fn reset_all(&mut self) {
        for entry in self.iter_mut() {
            entry.layer.reset();
        }
    }

    /// Reset only the entries that allow clearing.
    pub fn reset_clearable(&mut self) {
        for entry in self.iter_mut().filter(|e| e.layer.is_clearable()) {
            entry.layer.reset();
        }
    }

    /// True when every enabled layer and filter reports fresh inputs.
    pub fn is_current(&self) -> bool {
        self.iter()
            .filter(|e| e.layer.is_enabled())
            .all(|e| e.layer.is_current())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::costmap::{Costmap, LayerContext};
    use crate::types::{Bounds, CellRegion, CostmapError, Pose2};

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        clearable: bool,
        current: bool,
    }

    impl Recorder {
        fn boxed(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn Layer> {
            Box::new(Self {
                name,
                log: Arc::clone(log),
                clearable: true,
                current: true,
            })
        }

        fn push(&self, event: &str) {
            self.log.lock().push(format!("{event} {}", self.name));
        }
    }

    impl Layer for Recorder {
        fn initialize(&mut self, _ctx: &mut LayerContext<'_>) -> Result<(), CostmapError> {
            Ok(())
        }
        fn activate(&mut self) {
            self.push("activate");
        }
        fn deactivate(&mut self) {
            self.push("deactivate");
        }
        fn reset(&mut self) {
            self.push("reset");
        }
        fn is_clearable(&self) -> bool {
            self.clearable
        }
        fn is_current(&self) -> bool {
            self.current
        }
        fn update_bounds(&mut self, _robot: Pose2, _bounds: &mut Bounds) {}
        fn update_costs(&mut self, _master: &mut Costmap, _region: CellRegion) {}
    }

    #[test]
    fn activation_is_ordered_and_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = LayerRegistry::new();
        registry.add_filter("keepout", Recorder::boxed("keepout", &log));
        registry.add_layer("static", Recorder::boxed("static", &log));
        registry.add_layer("obstacles", Recorder::boxed("obstacles", &log));

        registry.activate_all();
        registry.activate_all();
        assert_eq!(
            *log.lock(),
            vec!["activate static", "activate obstacles", "activate keepout"]
        );
        assert!(registry.iter().all(LayerEntry::is_active));

        log.lock().clear();
        registry.deactivate_all();
        registry.deactivate_all();
        assert_eq!(log.lock().len(), 3);
        assert!(registry.iter().all(|e| !e.is_active()));
    }

    #[test]
    fn reset_clearable_skips_static() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = LayerRegistry::new();
        registry.add_layer(
            "static",
            Box::new(Recorder {
                name: "static",
                log: Arc::clone(&log),
                clearable: false,
                current: true,
            }),
        );
        registry.add_layer("obstacles", Recorder::boxed("obstacles", &log));

        registry.reset_clearable();
        assert_eq!(*log.lock(), vec!["reset obstacles"]);

        log.lock().clear();
        registry.reset_all();
        assert_eq!(*log.lock(), vec!["reset static", "reset obstacles"]);
    }

    #[test]
    fn current_requires_every_layer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = LayerRegistry::new();
        assert!(registry.is_current());
        registry.add_layer("fresh", Recorder::boxed("fresh", &log));
        assert!(registry.is_current());
        registry.add_filter(
            "stale",
            Box::new(Recorder {
                name: "stale",
                log,
                clearable: true,
                current: false,
            }),
        );
        assert!(!registry.is_current());
    }
}
