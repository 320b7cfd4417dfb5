//! Robot footprint management.
//!
//! Keeps the footprint both as configured (`unpadded`) and inflated by the
//! padding distance (`padded`). Padding is always recomputed from the
//! unpadded shape, so changing it repeatedly never accumulates.

use glam::Vec2;

use crate::types::{CostmapError, Footprint, Pose2};

/// Where the current footprint came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FootprintSource {
    /// Circle approximation of this radius.
    Radius(f32),
    /// An explicit polygon.
    Polygon,
}

#[derive(Debug, Clone)]
pub struct FootprintManager {
    source: FootprintSource,
    padding: f32,
    unpadded: Footprint,
    padded: Footprint,
}

impl FootprintManager {
    /// A circular footprint of `radius`.
    pub fn from_radius(radius: f32, padding: f32) -> Self {
        let mut manager = Self {
            source: FootprintSource::Radius(radius),
            padding,
            unpadded: Footprint::default(),
            padded: Footprint::default(),
        };
        manager.set_footprint_from_radius(radius);
        manager
    }

    /// Pick the footprint the way the costmap parameters describe it: a
    /// non-empty polygon string wins, otherwise the radius is used. A polygon
    /// string that does not parse falls back to the radius.
    pub fn from_params(radius: f32, footprint: &str, padding: f32) -> Self {
        let mut manager = Self::from_radius(radius, padding);
        if !is_empty_footprint_string(footprint) {
            match Footprint::parse(footprint) {
                Ok(polygon) => manager.set_footprint(polygon),
                Err(e) => log::error!("{e}; using robot_radius {radius} instead"),
            }
        }
        manager
    }

    /// Use an explicit polygon.
    pub fn set_footprint(&mut self, footprint: Footprint) {
        self.source = FootprintSource::Polygon;
        self.unpadded = footprint;
        self.repad();
    }

    /// Use a circle approximation.
    pub fn set_footprint_from_radius(&mut self, radius: f32) {
        self.source = FootprintSource::Radius(radius);
        self.unpadded = Footprint::from_radius(radius);
        self.repad();
    }

    /// Update the robot radius. Only takes effect while the footprint is
    /// radius-derived; returns whether it did.
    pub fn set_radius(&mut self, radius: f32) -> bool {
        if !self.uses_radius() {
            return false;
        }
        self.set_footprint_from_radius(radius);
        true
    }

    pub fn set_padding(&mut self, padding: f32) {
        self.padding = padding;
        self.repad();
    }

    /// Apply a footprint parameter string. `""` and `"[]"` switch back to the
    /// circle of `radius`. A string that does not parse leaves the current
    /// footprint untouched.
    pub fn set_footprint_string(
        &mut self,
        footprint: &str,
        radius: f32,
    ) -> Result<(), CostmapError> {
        if is_empty_footprint_string(footprint) {
            self.set_footprint_from_radius(radius);
            return Ok(());
        }
        let polygon = Footprint::parse(footprint)?;
        self.set_footprint(polygon);
        Ok(())
    }

    fn repad(&mut self) {
        self.padded = self.unpadded.padded(self.padding);
    }

    pub fn source(&self) -> FootprintSource {
        self.source
    }

    pub fn uses_radius(&self) -> bool {
        matches!(self.source, FootprintSource::Radius(_))
    }

    pub fn padding(&self) -> f32 {
        self.padding
    }

    pub fn unpadded(&self) -> &Footprint {
        &self.unpadded
    }

    pub fn padded(&self) -> &Footprint {
        &self.padded
    }

    /// The padded footprint placed at `pose` in world coordinates.
    pub fn oriented(&self, pose: Pose2) -> Vec<Vec2> {
        self.padded.transform(pose)
    }
}

fn is_empty_footprint_string(footprint: &str) -> bool {
    let trimmed = footprint.trim();
    trimmed.is_empty() || trimmed == "[]"
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn radius_footprint_is_padded_circle() {
        let manager = FootprintManager::from_radius(0.3, 0.01);
        assert!(manager.uses_radius());
        for p in &manager.padded().points {
            // Per-axis padding moves a circle vertex by up to sqrt(2) * padding.
            let r = p.length();
            assert!(r >= 0.3 && r <= 0.3 + 0.01 * std::f32::consts::SQRT_2 + 1e-5);
        }
    }

    #[test]
    fn padding_never_compounds() {
        let mut manager =
            FootprintManager::from_params(0.1, "[[1, 1], [1, -1], [-1, -1], [-1, 1]]", 0.1);
        assert!(!manager.uses_radius());
        assert_relative_eq!(manager.padded().points[0].x, 1.1);

        manager.set_padding(0.2);
        manager.set_padding(0.2);
        assert_relative_eq!(manager.padded().points[0].x, 1.2);
        assert_relative_eq!(manager.padded().points[2].y, -1.2);
        assert_relative_eq!(manager.unpadded().points[0].x, 1.0);
    }

    #[test]
    fn invalid_polygon_falls_back_to_radius() {
        let manager = FootprintManager::from_params(0.25, "[[1, 1], [2]]", 0.0);
        assert!(manager.uses_radius());
        assert!(manager.padded().is_valid());
        assert_eq!(manager.source(), FootprintSource::Radius(0.25));
    }

    #[test]
    fn radius_ignored_for_polygon_footprint() {
        let mut manager =
            FootprintManager::from_params(0.1, "[[0.5, 0.5], [0.5, -0.5], [-0.5, 0.0]]", 0.0);
        let before = manager.padded().clone();
        assert!(!manager.set_radius(2.0));
        assert_eq!(*manager.padded(), before);
    }

    #[test]
    fn footprint_string_updates() {
        let mut manager = FootprintManager::from_radius(0.2, 0.0);
        assert!(
            manager
                .set_footprint_string("[[0.5, 0.5], [0.5, -0.5], [-0.5, 0.0]]", 0.2)
                .is_ok()
        );
        assert!(!manager.uses_radius());

        let before = manager.padded().clone();
        assert!(manager.set_footprint_string("not a polygon", 0.2).is_err());
        assert_eq!(*manager.padded(), before);

        assert!(manager.set_footprint_string("[]", 0.4).is_ok());
        assert_eq!(manager.source(), FootprintSource::Radius(0.4));
    }

    #[test]
    fn oriented_footprint_follows_pose() {
        let manager = FootprintManager::from_params(0.1, "[[1, 0], [0, 1], [-1, 0]]", 0.0);
        let placed = manager.oriented(Pose2::from_xy_yaw(2.0, 3.0, std::f32::consts::FRAC_PI_2));
        assert_relative_eq!(placed[0].x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(placed[0].y, 4.0, epsilon = 1e-5);
    }
}
