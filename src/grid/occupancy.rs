use glam::UVec2;

use crate::types::{COST_FREE, COST_LETHAL, COST_UNKNOWN, CostmapError, MapInfo, UNKNOWN};

/// Occupancy probabilities as loaded from a map file: `-1` unknown, `0..=100`
/// percent occupied.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    info: MapInfo,
    data: Vec<i8>,
}

impl OccupancyGrid {
    pub fn new(info: MapInfo, data: Vec<i8>) -> Result<Self, CostmapError> {
        let expected_len = info.cell_count();
        if data.len() != expected_len {
            return Err(CostmapError::InvalidMetadata(format!(
                "data length {} does not match map size {}",
                data.len(),
                expected_len
            )));
        }

        Ok(Self { info, data })
    }

    pub fn info(&self) -> &MapInfo {
        &self.info
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<i8> {
        if x >= self.info.width || y >= self.info.height {
            return None;
        }
        let idx = self.index(x, y);
        Some(self.data[idx])
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.info.width as usize) + (x as usize)
    }

    /// Interpret an occupancy value as a cost.
    ///
    /// Values at or above `lethal_threshold` become lethal, unknown stays
    /// unknown when `track_unknown` is set (free otherwise) and everything
    /// else is scaled into the non-lethal range.
    pub fn cost_at(&self, cell: UVec2, lethal_threshold: i8, track_unknown: bool) -> Option<u8> {
        let value = self.get(cell.x, cell.y)?;
        Some(occupancy_to_cost(value, lethal_threshold, track_unknown))
    }
}

pub fn occupancy_to_cost(value: i8, lethal_threshold: i8, track_unknown: bool) -> u8 {
    if value == UNKNOWN {
        return if track_unknown { COST_UNKNOWN } else { COST_FREE };
    }
    if value >= lethal_threshold {
        return COST_LETHAL;
    }
    let scale = value.max(0) as f32 / lethal_threshold.max(1) as f32;
    (scale * (COST_LETHAL - 1) as f32).round() as u8
}
