use super::Grid2d;
use crate::types::{Footprint, Pose2};

impl<T> Grid2d<T> {
    /// Get the maximum cost value under a robot footprint at a given pose.
    ///
    /// This is the collision check used by cost queries: it looks for the
    /// highest cost anywhere under the robot's footprint when placed at `pose`.
    ///
    /// # Arguments
    ///
    /// * `pose` - Robot position (x, y) and yaw in world coordinates
    /// * `footprint` - Footprint polygon vertices relative to robot center (meters)
    ///
    /// # Returns
    ///
    /// `None` if any vertex of the placed footprint falls outside the map, so
    /// callers can treat a partially-off-map robot conservatively. An invalid
    /// footprint (fewer than three vertices) yields the cost of the cell under
    /// the robot center.
    ///
    /// # Example
    ///
    /// ```
    /// use costmap_runtime::{Footprint, Grid2d, MapInfo, Pose2};
    /// use costmap_runtime::types::COST_LETHAL;
    /// use glam::Vec2;
    ///
    /// let info = MapInfo {
    ///     width: 100,
    ///     height: 100,
    ///     ..Default::default()
    /// };
    /// let costmap = Grid2d::<u8>::empty(info);
    ///
    /// // Define a rectangular robot footprint (0.6m x 0.4m)
    /// let footprint = Footprint::rectangle(0.6, 0.4);
    ///
    /// // Check cost at a specific pose
    /// let pose = Pose2::new(Vec2::new(2.5, 2.5), 0.0);
    /// let max_cost = costmap.footprint_cost(pose, &footprint);
    ///
    /// assert!(matches!(max_cost, Some(cost) if cost < COST_LETHAL));
    /// ```
    pub fn footprint_cost(&self, pose: Pose2, footprint: &Footprint) -> Option<T>
    where
        T: Ord + Copy,
    {
        if !footprint.is_valid() {
            let cell = self.world_to_cell(&pose.position)?;
            return self.get(cell).copied();
        }

        let transformed_footprint = footprint.transform(pose);

        // Every vertex must be on the map; also seeds the maximum so that
        // footprints smaller than a cell still report something.
        let mut max_cost: Option<T> = None;
        for vertex in &transformed_footprint {
            let cell = self.world_to_cell(vertex)?;
            let cost = *self.get(cell)?;
            max_cost = Some(max_cost.map_or(cost, |m| m.max(cost)));
        }

        if let Some(iter) = self.polygon_value(&transformed_footprint) {
            for &cost in iter {
                max_cost = Some(max_cost.map_or(cost, |m| m.max(cost)));
            }
        }

        max_cost
    }
}

#[cfg(test)]
mod tests {
    use glam::{UVec2, Vec2};

    use crate::grid::Grid2d;
    use crate::types::{COST_LETHAL, Footprint, MapInfo, Pose2};

    fn grid() -> Grid2d<u8> {
        Grid2d::<u8>::empty(MapInfo {
            width: 20,
            height: 20,
            resolution: 0.1,
            origin: Vec2::ZERO,
        })
    }

    #[test]
    fn footprint_cost_finds_obstacle_under_robot() {
        let mut grid = grid();
        grid.set(UVec2::new(10, 10), COST_LETHAL).unwrap();

        let footprint = Footprint::rectangle(0.4, 0.4);
        let cost = grid.footprint_cost(Pose2::new(Vec2::new(1.05, 1.05), 0.0), &footprint);
        assert_eq!(cost, Some(COST_LETHAL));

        let cost = grid.footprint_cost(Pose2::new(Vec2::new(0.5, 0.5), 0.0), &footprint);
        assert_eq!(cost, Some(0));
    }

    #[test]
    fn footprint_cost_off_map_is_none() {
        let grid = grid();
        let footprint = Footprint::rectangle(0.4, 0.4);
        assert_eq!(
            grid.footprint_cost(Pose2::new(Vec2::new(0.1, 1.0), 0.0), &footprint),
            None
        );
    }

    #[test]
    fn degenerate_footprint_uses_center_cell() {
        let mut grid = grid();
        grid.set(UVec2::new(3, 4), 77).unwrap();
        let cost =
            grid.footprint_cost(Pose2::new(Vec2::new(0.35, 0.45), 0.0), &Footprint::default());
        assert_eq!(cost, Some(77));
    }
}
