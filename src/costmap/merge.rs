//! Merge policies for writing a layer grid into the master costmap.
//!
//! **Assumption:** `master` and `source` share the same dimensions and alignment so that
//! cell `(x, y)` in `region` is valid in both grids.

use serde::Deserialize;

use crate::types::{COST_UNKNOWN, CellRegion};

use super::Costmap;

/// How a layer's private grid is combined into the master.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationMethod {
    /// Copy every known source cell.
    #[default]
    Overwrite,
    /// Keep the larger cost; unknown master cells are always replaced.
    Max,
    /// Keep the larger cost but never replace an unknown master cell.
    MaxKeepUnknown,
}

impl CombinationMethod {
    /// Resulting master value, or `None` to leave the master cell alone.
    #[inline]
    pub fn combine(self, master: u8, source: u8) -> Option<u8> {
        if source == COST_UNKNOWN {
            return None;
        }
        let replace = match self {
            Self::Overwrite => true,
            Self::Max => master == COST_UNKNOWN || master < source,
            Self::MaxKeepUnknown => master != COST_UNKNOWN && master < source,
        };
        replace.then_some(source)
    }
}

/// Combine `source` into `master` inside `region` (clamped to both grids).
pub fn merge_region(
    master: &mut Costmap,
    source: &Costmap,
    region: CellRegion,
    method: CombinationMethod,
) {
    let width = master.width().min(source.width());
    let height = master.height().min(source.height());
    let max_x = region.max.x.min(width);
    let max_y = region.max.y.min(height);
    if region.min.x >= max_x || region.min.y >= max_y {
        return;
    }

    let master_width = master.width() as usize;
    let source_width = source.width() as usize;
    let src = source.data();
    let dst = master.data_mut();
    for y in region.min.y as usize..max_y as usize {
        for x in region.min.x as usize..max_x as usize {
            let d = y * master_width + x;
            if let Some(cost) = method.combine(dst[d], src[y * source_width + x]) {
                dst[d] = cost;
            }
        }
    }
}
