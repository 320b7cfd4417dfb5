//! Map metadata.

use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapInfo {
    pub width: u32,
    pub height: u32,
    pub resolution: f32,
    /// Origin of cell (0, 0) in world coordinates (meters).
    pub origin: Vec2,
}

impl Default for MapInfo {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
            resolution: 0.05,
            origin: Vec2::ZERO,
        }
    }
}

impl MapInfo {
    pub fn square(width: u32, resolution: f32) -> Self {
        Self {
            width,
            height: width,
            resolution,
            ..Default::default()
        }
    }

    /// Build metadata from a metric extent. Cell counts are truncated, so a 5 m
    /// extent at 0.1 m resolution gives 50 cells. Non-positive extents give 0 cells.
    pub fn from_meters(width_m: f64, height_m: f64, resolution: f64, origin: Vec2) -> Self {
        Self {
            width: cells_for(width_m, resolution),
            height: cells_for(height_m, resolution),
            resolution: resolution as f32,
            origin,
        }
    }

    /// Width of the map in world units (meters).
    #[inline]
    pub fn world_width(&self) -> f32 {
        self.width as f32 * self.resolution
    }

    /// Height of the map in world units (meters).
    #[inline]
    pub fn world_height(&self) -> f32 {
        self.height as f32 * self.resolution
    }

    /// Center of the map in 2D world coordinates.
    #[inline]
    pub fn world_center(&self) -> Vec2 {
        self.origin + Vec2::new(0.5 * self.world_width(), 0.5 * self.world_height())
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

fn cells_for(extent_m: f64, resolution: f64) -> u32 {
    if extent_m <= 0.0 || resolution <= 0.0 {
        return 0;
    }
    // Small epsilon so 5.0 / 0.1 = 49.999... still yields 50 cells.
    ((extent_m / resolution) + 1e-9).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_meters_truncates_to_cells() {
        let info = MapInfo::from_meters(5.0, 5.0, 0.1, Vec2::ZERO);
        assert_eq!(info.width, 50);
        assert_eq!(info.height, 50);

        let info = MapInfo::from_meters(1.05, 2.0, 0.1, Vec2::new(-1.0, 0.0));
        assert_eq!(info.width, 10);
        assert_eq!(info.height, 20);
        assert_eq!(info.origin, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn from_meters_rejects_degenerate_extent() {
        let info = MapInfo::from_meters(-3.0, 0.0, 0.1, Vec2::ZERO);
        assert_eq!(info.cell_count(), 0);
    }
}
