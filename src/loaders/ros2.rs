//! ROS2 `map_server` map files: a YAML metadata file next to a PGM/PNG image.

use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::Deserialize;

use crate::grid::OccupancyGrid;
use crate::types::{
    CostmapError, DEFAULT_FREE_THRESH, DEFAULT_OCCUPIED_THRESH, FREE, MapInfo, OCCUPIED, UNKNOWN,
};

/// Parsed contents of a map YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct MapMetadata {
    pub image: PathBuf,
    pub resolution: f32,
    /// `[x, y, yaw]` of the lower-left pixel. Yaw is ignored.
    pub origin: [f32; 3],
    #[serde(
        default = "default_occupied_thresh",
        deserialize_with = "deserialize_threshold"
    )]
    pub occupied_thresh: f32,
    #[serde(
        default = "default_free_thresh",
        deserialize_with = "deserialize_threshold"
    )]
    pub free_thresh: f32,
    #[serde(default, deserialize_with = "deserialize_negate")]
    pub negate: bool,
    #[serde(default)]
    pub mode: MapMode,
}

/// How pixel lightness is turned into occupancy.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapMode {
    #[default]
    Trinary,
    Scale,
    Raw,
}

fn default_occupied_thresh() -> f32 {
    DEFAULT_OCCUPIED_THRESH
}

fn default_free_thresh() -> f32 {
    DEFAULT_FREE_THRESH
}

fn deserialize_threshold<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f32::deserialize(deserializer)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(serde::de::Error::custom(
            "thresholds must be in the range [0.0, 1.0]",
        ))
    }
}

/// `negate` is written as either `0`/`1` or `true`/`false` in the wild.
fn deserialize_negate<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Negate {
        Bool(bool),
        Int(i64),
    }

    Ok(match Negate::deserialize(deserializer)? {
        Negate::Bool(value) => value,
        Negate::Int(value) => value != 0,
    })
}

impl MapMetadata {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CostmapError> {
        let metadata: Self = serde_yaml::from_str(yaml)?;
        if metadata.resolution <= 0.0 {
            return Err(CostmapError::InvalidMetadata(format!(
                "resolution must be positive, got {}",
                metadata.resolution
            )));
        }
        if metadata.mode != MapMode::Raw && metadata.occupied_thresh <= metadata.free_thresh {
            return Err(CostmapError::InvalidMetadata(
                "occupied_thresh must be greater than free_thresh".to_string(),
            ));
        }
        Ok(metadata)
    }

    /// Occupancy for one RGBA pixel.
    pub fn occupancy(&self, rgba: [u8; 4]) -> i8 {
        let [r, g, b, a] = rgba;
        let lightness = (r as f32 + g as f32 + b as f32) / (3.0 * 255.0);
        // Dark pixels are occupied unless the map is negated.
        let occupancy = if self.negate { lightness } else { 1.0 - lightness };

        match self.mode {
            MapMode::Trinary => self.threshold(occupancy).unwrap_or(UNKNOWN),
            MapMode::Scale => {
                if a < u8::MAX {
                    return UNKNOWN;
                }
                self.threshold(occupancy).unwrap_or_else(|| {
                    let ratio = (occupancy - self.free_thresh)
                        / (self.occupied_thresh - self.free_thresh);
                    (ratio * 100.0).round().clamp(0.0, 100.0) as i8
                })
            }
            MapMode::Raw => {
                // Raw maps store the occupancy value directly in the gray level.
                let value = (r as u16 + g as u16 + b as u16) / 3;
                if value <= 100 { value as i8 } else { UNKNOWN }
            }
        }
    }

    fn threshold(&self, occupancy: f32) -> Option<i8> {
        if occupancy >= self.occupied_thresh {
            Some(OCCUPIED)
        } else if occupancy <= self.free_thresh {
            Some(FREE)
        } else {
            None
        }
    }
}

/// Load a map YAML file and its image into an [`OccupancyGrid`].
///
/// Image row 0 is the top of the map, so rows are flipped to make cell
/// `(0, 0)` the lower-left corner at `origin`.
pub fn load_occupancy_grid(yaml_path: impl AsRef<Path>) -> Result<OccupancyGrid, CostmapError> {
    let yaml_path = yaml_path.as_ref();
    let metadata = MapMetadata::from_yaml_str(&std::fs::read_to_string(yaml_path)?)?;

    let image_path = resolve_image_path(yaml_path, &metadata.image);
    let image = image::open(&image_path)?.to_rgba8();
    let (width, height) = image.dimensions();

    let mut data = vec![UNKNOWN; (width as usize) * (height as usize)];
    for (x, y, pixel) in image.enumerate_pixels() {
        let row = (height - y - 1) as usize;
        data[row * width as usize + x as usize] = metadata.occupancy(pixel.0);
    }

    let info = MapInfo {
        width,
        height,
        resolution: metadata.resolution,
        origin: Vec2::new(metadata.origin[0], metadata.origin[1]),
    };
    log::debug!(
        "loaded {}x{} map from {} at {} m/cell",
        width,
        height,
        image_path.display(),
        metadata.resolution
    );

    OccupancyGrid::new(info, data)
}

fn resolve_image_path(yaml_path: &Path, image: &Path) -> PathBuf {
    if image.is_absolute() {
        return image.to_path_buf();
    }
    yaml_path
        .parent()
        .map_or_else(|| image.to_path_buf(), |parent| parent.join(image))
}
