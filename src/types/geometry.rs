//! Geometric and spatial types used across the grid and costmap APIs.

use glam::{UVec2, Vec2};

use crate::types::CostmapError;

/// Robot pose in world coordinates (meters).
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Pose2 {
    pub position: Vec2,
    pub yaw: f32,
}

impl Pose2 {
    pub fn new(position: Vec2, yaw: f32) -> Self {
        Self { position, yaw }
    }

    pub fn from_xy_yaw(x: f32, y: f32, yaw: f32) -> Self {
        Self::new(Vec2::new(x, y), yaw)
    }

    /// Apply `other` in this pose's frame, i.e. `self * other`.
    pub fn compose(&self, other: &Pose2) -> Pose2 {
        Pose2 {
            position: self.position + Vec2::from_angle(self.yaw).rotate(other.position),
            yaw: normalize_angle(self.yaw + other.yaw),
        }
    }

    pub fn inverse(&self) -> Pose2 {
        let rot = Vec2::from_angle(-self.yaw);
        Pose2 {
            position: -rot.rotate(self.position),
            yaw: normalize_angle(-self.yaw),
        }
    }

    /// Transform a point expressed in this pose's frame into world coordinates.
    #[inline]
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        self.position + Vec2::from_angle(self.yaw).rotate(p)
    }
}

/// Wrap an angle to `(-pi, pi]`.
pub fn normalize_angle(angle: f32) -> f32 {
    let wrapped = angle.sin().atan2(angle.cos());
    if wrapped <= -std::f32::consts::PI {
        wrapped + 2.0 * std::f32::consts::PI
    } else {
        wrapped
    }
}

/// A pose tagged with the frame it is expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseStamped {
    pub frame_id: String,
    pub pose: Pose2,
}

impl PoseStamped {
    pub fn new(frame_id: impl Into<String>, pose: Pose2) -> Self {
        Self {
            frame_id: frame_id.into(),
            pose,
        }
    }
}

/// World-axis-aligned rectangle in meters.
/// Convention: [min.x, max.x) x [min.y, max.y) in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    /// Create bounds that represent "no region" (empty). Use this as the initial
    /// value before layers expand it; layers should only expand, never shrink.
    pub fn empty() -> Self {
        Self {
            min: Vec2::new(f32::INFINITY, f32::INFINITY),
            max: Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Returns true if no layer has expanded the bounds (min > max in either axis).
    /// A single point is not empty.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Expand this bounds to include the point (in place).
    pub fn expand_to_include(&mut self, p: Vec2) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Expand by a margin in meters in all directions (e.g. for inflation halo).
    pub fn expand_by(&mut self, margin: f32) {
        self.min.x -= margin;
        self.min.y -= margin;
        self.max.x += margin;
        self.max.y += margin;
    }

    /// Grow to cover `other`.
    pub fn merge(&mut self, other: &Bounds) {
        if other.is_empty() {
            return;
        }
        self.expand_to_include(other.min);
        self.expand_to_include(other.max);
    }
}

/// Update window in cell indices. Region is [min.x, max.x) x [min.y, max.y).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRegion {
    pub min: UVec2,
    pub max: UVec2,
}

impl CellRegion {
    pub fn new(min: UVec2, max: UVec2) -> Self {
        Self { min, max }
    }

    /// The region covering a whole `width` x `height` grid.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            min: UVec2::ZERO,
            max: UVec2::new(width, height),
        }
    }

    pub fn empty() -> Self {
        Self {
            min: UVec2::ZERO,
            max: UVec2::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    /// Smallest region covering both. Empty regions are ignored.
    pub fn union(&self, other: &CellRegion) -> CellRegion {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        CellRegion {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.max.x.saturating_sub(self.min.x)
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.max.y.saturating_sub(self.min.y)
    }
}

/// Number of vertices used to approximate a circular footprint.
pub const CIRCLE_FOOTPRINT_POINTS: usize = 16;

/// Footprint: polygon relative to the robot center (meters), or in world
/// coordinates once oriented with [`Footprint::transform`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Footprint {
    pub points: Vec<Vec2>,
}

impl Footprint {
    pub fn new(points: Vec<Vec2>) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle centered on the robot, `length` along x.
    pub fn rectangle(length: f32, width: f32) -> Self {
        let hl = 0.5 * length;
        let hw = 0.5 * width;
        Self {
            points: vec![
                Vec2::new(hl, hw),
                Vec2::new(hl, -hw),
                Vec2::new(-hl, -hw),
                Vec2::new(-hl, hw),
            ],
        }
    }

    /// Regular polygon approximation of a circle of `radius`.
    pub fn from_radius(radius: f32) -> Self {
        let step = std::f32::consts::TAU / CIRCLE_FOOTPRINT_POINTS as f32;
        let points = (0..CIRCLE_FOOTPRINT_POINTS)
            .map(|i| Vec2::from_angle(i as f32 * step) * radius)
            .collect();
        Self { points }
    }

    /// Parse a footprint string of the form `[[x, y], [x, y], ...]`.
    ///
    /// At least three points are required and every point needs exactly two
    /// coordinates.
    pub fn parse(spec: &str) -> Result<Self, CostmapError> {
        let raw: Vec<Vec<f32>> = serde_yaml::from_str(spec)
            .map_err(|e| CostmapError::InvalidFootprint(format!("\"{spec}\": {e}")))?;

        if raw.len() < 3 {
            return Err(CostmapError::InvalidFootprint(format!(
                "\"{spec}\": need at least 3 points, got {}",
                raw.len()
            )));
        }

        let mut points = Vec::with_capacity(raw.len());
        for (i, p) in raw.iter().enumerate() {
            let [x, y] = p.as_slice() else {
                return Err(CostmapError::InvalidFootprint(format!(
                    "\"{spec}\": point {i} has {} coordinates, expected 2",
                    p.len()
                )));
            };
            if !x.is_finite() || !y.is_finite() {
                return Err(CostmapError::InvalidFootprint(format!(
                    "\"{spec}\": point {i} is not finite"
                )));
            }
            points.push(Vec2::new(*x, *y));
        }

        Ok(Self { points })
    }

    /// A polygon needs at least three vertices.
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 3
    }

    /// Push every vertex away from the robot center by `padding` on each axis.
    /// Coordinates that are exactly zero stay on the axis.
    pub fn padded(&self, padding: f32) -> Self {
        let points = self
            .points
            .iter()
            .map(|p| Vec2::new(p.x + sign0(p.x) * padding, p.y + sign0(p.y) * padding))
            .collect();
        Self { points }
    }

    /// Place the footprint at `pose` (world coordinates).
    pub fn transform(&self, pose: Pose2) -> Vec<Vec2> {
        self.points
            .iter()
            .map(|p| pose.transform_point(*p))
            .collect()
    }

    /// Inscribed (minimum distance to an edge) and circumscribed (maximum
    /// distance to a vertex) radii, measured from the robot center.
    pub fn min_max_distances(&self) -> (f32, f32) {
        if self.points.is_empty() {
            return (0.0, 0.0);
        }

        let mut min_dist = f32::MAX;
        let mut max_dist = 0.0_f32;
        let n = self.points.len();
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            max_dist = max_dist.max(a.length());
            min_dist = min_dist.min(a.length());
            min_dist = min_dist.min(distance_to_segment(Vec2::ZERO, a, b));
        }

        (min_dist, max_dist)
    }
}

fn sign0(x: f32) -> f32 {
    if x < 0.0 {
        -1.0
    } else if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + t * ab)
}
