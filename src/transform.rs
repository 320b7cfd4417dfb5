//! Pose lookups between coordinate frames.
//!
//! The costmap never owns a transform tree. It asks a [`TransformProvider`]
//! for the robot pose in the global frame on every update cycle, for each
//! query pose that arrives in another frame, and once during activation to
//! confirm the robot can be localized at all.

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::types::{CostmapError, Pose2, PoseStamped};

/// Interval between availability checks in [`StaticTransformTree::can_transform`].
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Source of frame-to-frame transforms.
pub trait TransformProvider: Send + Sync {
    /// Pose of `source_frame`'s origin expressed in `target_frame`.
    ///
    /// `tolerance` bounds how stale the underlying data may be.
    fn lookup_pose(
        &self,
        target_frame: &str,
        source_frame: &str,
        tolerance: Duration,
    ) -> Result<Pose2, CostmapError>;

    /// Wait up to `timeout` for the transform to become available.
    fn can_transform(&self, target_frame: &str, source_frame: &str, timeout: Duration) -> bool;

    /// Re-express a stamped pose in `target_frame`.
    fn transform_pose(
        &self,
        pose: &PoseStamped,
        target_frame: &str,
        tolerance: Duration,
    ) -> Result<PoseStamped, CostmapError> {
        if pose.frame_id == target_frame {
            return Ok(pose.clone());
        }
        let frame = self.lookup_pose(target_frame, &pose.frame_id, tolerance)?;
        Ok(PoseStamped::new(target_frame, frame.compose(&pose.pose)))
    }
}

/// A small in-memory transform tree of fixed parent/child edges.
///
/// Lookups follow parent links from both frames up to their root and succeed
/// when the roots match, which covers the `map -> odom -> base_link` shape the
/// costmap needs. Transforms can be replaced or removed at any time from any
/// thread.
#[derive(Debug, Default)]
pub struct StaticTransformTree {
    /// child frame -> (parent frame, pose of child in parent)
    edges: RwLock<HashMap<String, (String, Pose2)>>,
}

impl StaticTransformTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pose of `child` expressed in `parent`.
    pub fn set_transform(&self, parent: impl Into<String>, child: impl Into<String>, pose: Pose2) {
        self.edges
            .write()
            .insert(child.into(), (parent.into(), pose));
    }

    pub fn remove_transform(&self, child: &str) {
        self.edges.write().remove(child);
    }

    /// Pose of `frame` in its root, following parents.
    fn chain_to_root(edges: &HashMap<String, (String, Pose2)>, frame: &str) -> (String, Pose2) {
        let mut current = frame.to_string();
        let mut pose = Pose2::default();
        // Bounded walk so a cycle in the edges cannot hang a lookup.
        for _ in 0..edges.len() {
            let Some((parent, edge)) = edges.get(&current) else {
                break;
            };
            pose = edge.compose(&pose);
            current = parent.clone();
        }
        (current, pose)
    }

    fn resolve(&self, target_frame: &str, source_frame: &str) -> Option<Pose2> {
        if target_frame == source_frame {
            return Some(Pose2::default());
        }
        let edges = self.edges.read();
        let (source_root, source_in_root) = Self::chain_to_root(&edges, source_frame);
        let (target_root, target_in_root) = Self::chain_to_root(&edges, target_frame);
        (source_root == target_root).then(|| target_in_root.inverse().compose(&source_in_root))
    }
}

impl TransformProvider for StaticTransformTree {
    fn lookup_pose(
        &self,
        target_frame: &str,
        source_frame: &str,
        _tolerance: Duration,
    ) -> Result<Pose2, CostmapError> {
        self.resolve(target_frame, source_frame)
            .ok_or_else(|| CostmapError::Transform {
                target_frame: target_frame.to_string(),
                source_frame: source_frame.to_string(),
                reason: "frames are not connected".to_string(),
            })
    }

    fn can_transform(&self, target_frame: &str, source_frame: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.resolve(target_frame, source_frame).is_some() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::Vec2;

    use super::*;

    #[test]
    fn identity_for_same_frame() {
        let tree = StaticTransformTree::new();
        let pose = tree
            .lookup_pose("map", "map", Duration::ZERO)
            .expect("identity");
        assert_eq!(pose, Pose2::default());
    }

    #[test]
    fn chains_through_parents() {
        let tree = StaticTransformTree::new();
        tree.set_transform("map", "odom", Pose2::from_xy_yaw(1.0, 0.0, 0.0));
        tree.set_transform("odom", "base_link", Pose2::from_xy_yaw(0.5, 2.0, 0.0));

        let pose = tree
            .lookup_pose("map", "base_link", Duration::ZERO)
            .expect("connected");
        assert_relative_eq!(pose.position.x, 1.5);
        assert_relative_eq!(pose.position.y, 2.0);

        let inverse = tree
            .lookup_pose("base_link", "map", Duration::ZERO)
            .expect("connected");
        assert_relative_eq!(inverse.position.x, -1.5);
        assert_relative_eq!(inverse.position.y, -2.0);
    }

    #[test]
    fn disconnected_frames_fail() {
        let tree = StaticTransformTree::new();
        tree.set_transform("map", "base_link", Pose2::default());
        assert!(tree.lookup_pose("map", "laser", Duration::ZERO).is_err());
        assert!(!tree.can_transform("map", "laser", Duration::from_millis(20)));
        assert!(tree.can_transform("map", "base_link", Duration::ZERO));
    }

    #[test]
    fn transform_pose_into_target_frame() {
        let tree = StaticTransformTree::new();
        tree.set_transform(
            "map",
            "base_link",
            Pose2::from_xy_yaw(1.0, 1.0, std::f32::consts::FRAC_PI_2),
        );
        let local = PoseStamped::new("base_link", Pose2::new(Vec2::new(1.0, 0.0), 0.0));
        let global = tree
            .transform_pose(&local, "map", Duration::ZERO)
            .expect("transform");
        assert_eq!(global.frame_id, "map");
        assert_relative_eq!(global.pose.position.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(global.pose.position.y, 2.0, epsilon = 1e-5);
    }
}
