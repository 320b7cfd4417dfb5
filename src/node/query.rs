//! Cost lookups against the live grid.

use crate::types::{COST_LETHAL, NO_INFORMATION, PoseStamped};

use super::CostmapNode;

/// Poses to look up, in any frame the transform provider knows.
#[derive(Debug, Clone, Default)]
pub struct CostRequest {
    pub poses: Vec<PoseStamped>,
    /// Report the highest cost under the padded footprint instead of the cost
    /// of the single cell under the pose.
    pub use_footprint: bool,
}

impl CostRequest {
    pub fn points(poses: Vec<PoseStamped>) -> Self {
        Self {
            poses,
            use_footprint: false,
        }
    }

    pub fn footprints(poses: Vec<PoseStamped>) -> Self {
        Self {
            poses,
            use_footprint: true,
        }
    }
}

/// One cost per requested pose, in request order.
///
/// `success` is false if any entry failed. Failed entries still hold a value:
/// `NO_INFORMATION` when the pose could not be transformed, `COST_LETHAL`
/// when it lies off the grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostResponse {
    pub costs: Vec<f32>,
    pub success: bool,
}

impl CostmapNode {
    /// Look up costs without waiting for an update cycle or a reconfiguration.
    pub fn get_costs(&self, request: &CostRequest) -> CostResponse {
        let Some(grid) = self.costmap() else {
            log::error!("{}: cost query before configure", self.name());
            return CostResponse {
                costs: vec![f32::from(NO_INFORMATION); request.poses.len()],
                success: false,
            };
        };
        let footprint = request
            .use_footprint
            .then(|| self.shared.footprint.read().padded().clone());

        let mut response = CostResponse {
            costs: Vec::with_capacity(request.poses.len()),
            success: true,
        };

        for pose in &request.poses {
            let transformed = match self.shared.transform_pose_to_global_frame(pose) {
                Ok(transformed) => transformed,
                Err(e) => {
                    log::error!(
                        "{}: cannot get cost for pose ({:.2}, {:.2}): {e}",
                        self.name(),
                        pose.pose.position.x,
                        pose.pose.position.y
                    );
                    response.success = false;
                    response.costs.push(f32::from(NO_INFORMATION));
                    continue;
                }
            };

            let master = grid.read();
            let cost = match &footprint {
                Some(footprint) => master.footprint_cost(transformed.pose, footprint),
                None => master
                    .world_to_cell(&transformed.pose.position)
                    .and_then(|cell| master.get(cell).copied()),
            };
            drop(master);

            match cost {
                Some(cost) => response.costs.push(f32::from(cost)),
                None => {
                    log::debug!(
                        "{}: pose ({:.2}, {:.2}) is off the grid",
                        self.name(),
                        transformed.pose.position.x,
                        transformed.pose.position.y
                    );
                    response.success = false;
                    response.costs.push(f32::from(COST_LETHAL));
                }
            }
        }

        response
    }
}
