//! Costmap node parameters.
//!
//! Loaded from a YAML file whose keys mirror the node's parameter names.
//! Every key is optional; the defaults describe a 5 m x 5 m fixed-window
//! costmap in the `map` frame.

use std::path::Path;
use std::time::Duration;

use glam::Vec2;
use serde::Deserialize;

use crate::types::{CostmapError, MapInfo};

/// One layer or filter to instantiate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PluginConfig {
    /// Instance name, unique within the costmap.
    pub name: String,
    /// Type identifier looked up in the plugin registry.
    pub plugin: String,
    /// Opaque parameter block handed to the layer.
    #[serde(default)]
    pub params: serde_yaml::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CostmapConfig {
    pub footprint_padding: f64,
    pub footprint: String,
    pub global_frame: String,
    pub robot_base_frame: String,
    pub width: f64,
    pub height: f64,
    pub resolution: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    pub publish_frequency: f64,
    pub update_frequency: f64,
    pub robot_radius: f64,
    pub rolling_window: bool,
    pub track_unknown_space: bool,
    /// Seconds.
    pub transform_tolerance: f64,
    /// Seconds.
    pub initial_transform_timeout: f64,
    pub always_send_full_costmap: bool,
    pub plugins: Vec<PluginConfig>,
    pub filters: Vec<PluginConfig>,
}

impl Default for CostmapConfig {
    fn default() -> Self {
        Self {
            footprint_padding: 0.01,
            footprint: "[]".to_string(),
            global_frame: "map".to_string(),
            robot_base_frame: "base_link".to_string(),
            width: 5.0,
            height: 5.0,
            resolution: 0.1,
            origin_x: 0.0,
            origin_y: 0.0,
            publish_frequency: 1.0,
            update_frequency: 5.0,
            robot_radius: 0.1,
            rolling_window: false,
            track_unknown_space: false,
            transform_tolerance: 0.3,
            initial_transform_timeout: 60.0,
            always_send_full_costmap: false,
            plugins: Vec::new(),
            filters: Vec::new(),
        }
    }
}

impl CostmapConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CostmapError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CostmapError> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    /// Check the geometry. Degenerate values are reported but not fatal.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.width <= 0.0 || self.height <= 0.0 {
            problems.push(format!(
                "width and height must be positive, got {} x {}",
                self.width, self.height
            ));
        }
        if self.resolution <= 0.0 {
            problems.push(format!("resolution must be positive, got {}", self.resolution));
        }
        if self.update_frequency < 0.0 {
            problems.push(format!(
                "update_frequency must not be negative, got {}",
                self.update_frequency
            ));
        }
        let mut names: Vec<_> = self.plugins.iter().chain(&self.filters).map(|p| &p.name).collect();
        names.sort();
        if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
            problems.push(format!("plugin name \"{}\" is used twice", pair[0]));
        }
        problems
    }

    /// Grid geometry described by the parameters.
    pub fn map_info(&self) -> MapInfo {
        MapInfo::from_meters(
            self.width,
            self.height,
            self.resolution,
            Vec2::new(self.origin_x as f32, self.origin_y as f32),
        )
    }

    /// Publish period, or `None` when publishing is disabled.
    pub fn publish_period(&self) -> Option<Duration> {
        frequency_to_period(self.publish_frequency)
    }

    /// Update loop period, or `None` when the loop is disabled.
    pub fn update_period(&self) -> Option<Duration> {
        frequency_to_period(self.update_frequency)
    }

    pub fn transform_tolerance(&self) -> Duration {
        seconds(self.transform_tolerance)
    }

    pub fn initial_transform_timeout(&self) -> Duration {
        seconds(self.initial_transform_timeout)
    }
}

fn frequency_to_period(frequency: f64) -> Option<Duration> {
    (frequency > 0.0 && frequency.is_finite()).then(|| Duration::from_secs_f64(1.0 / frequency))
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
