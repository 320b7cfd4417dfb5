use glam::{IVec2, UVec2, Vec2};

use crate::types::{CellRegion, CostmapError, MapInfo};

#[derive(Debug, Clone)]
pub struct Grid2d<T> {
    info: MapInfo,
    data: Vec<T>,
}

impl<T> Grid2d<T> {
    pub fn new(info: MapInfo, data: Vec<T>) -> Result<Self, CostmapError> {
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

    /// Grid with every cell set to `T::default()`.
    pub fn empty(info: MapInfo) -> Self
    where
        T: Default + Clone,
    {
        Self::filled(info, T::default())
    }

    /// Grid with every cell set to `value`.
    pub fn filled(info: MapInfo, value: T) -> Self
    where
        T: Clone,
    {
        Self {
            data: vec![value; info.cell_count()],
            info,
        }
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

    pub fn resolution(&self) -> f32 {
        self.info.resolution
    }

    pub fn get(&self, cell: UVec2) -> Option<&T> {
        if !self.contains(cell) {
            return None;
        }
        let idx = self.index(cell);
        Some(&self.data[idx])
    }

    pub fn get_mut(&mut self, cell: UVec2) -> Option<&mut T> {
        if !self.contains(cell) {
            return None;
        }
        let idx = self.index(cell);
        Some(&mut self.data[idx])
    }

    pub fn set(&mut self, cell: UVec2, value: T) -> Result<(), CostmapError> {
        if !self.contains(cell) {
            return Err(CostmapError::OutOfBounds(format!(
                "cell ({}, {}) out of bounds for map {}x{}",
                cell.x, cell.y, self.info.width, self.info.height
            )));
        }
        let idx = self.index(cell);
        self.data[idx] = value;
        Ok(())
    }

    #[inline]
    pub fn contains(&self, cell: UVec2) -> bool {
        cell.x < self.info.width && cell.y < self.info.height
    }

    #[inline]
    fn index(&self, cell: UVec2) -> usize {
        (cell.y as usize) * (self.info.width as usize) + (cell.x as usize)
    }

    /// Continuous map coordinates to world coordinates (no cell-center offset).
    pub fn map_to_world(&self, pos: &Vec2) -> Vec2 {
        Vec2::new(
            self.info.origin.x + pos.x * self.info.resolution,
            self.info.origin.y + pos.y * self.info.resolution,
        )
    }

    /// World coordinates of the center of `cell`.
    pub fn cell_center(&self, cell: UVec2) -> Vec2 {
        self.map_to_world(&(cell.as_vec2() + Vec2::splat(0.5)))
    }

    /// World coordinates to continuous map coordinates, `None` outside the map.
    pub fn world_to_map(&self, pos: &Vec2) -> Option<Vec2> {
        let mx = (pos.x - self.info.origin.x) / self.info.resolution;
        let my = (pos.y - self.info.origin.y) / self.info.resolution;
        // Written as a positive range check so that NaN lands outside the map.
        let in_x = mx >= 0.0 && mx < self.info.width as f32;
        let in_y = my >= 0.0 && my < self.info.height as f32;
        if !(in_x && in_y) {
            return None;
        }
        Some(Vec2::new(mx, my))
    }

    /// World coordinates to the containing cell, `None` outside the map.
    pub fn world_to_cell(&self, pos: &Vec2) -> Option<UVec2> {
        let map_pos = self.world_to_map(pos)?;
        let cell = UVec2::new(map_pos.x as u32, map_pos.y as u32);
        // Guard against float rounding right at the far edge.
        self.contains(cell).then_some(cell)
    }

    /// World coordinates to a cell index without bounds checking. May be negative
    /// or beyond the grid.
    pub fn world_to_cell_unbounded(&self, pos: &Vec2) -> IVec2 {
        let m = (*pos - self.info.origin) / self.info.resolution;
        IVec2::new(m.x.floor() as i32, m.y.floor() as i32)
    }

    /// Convert world bounds into a cell region clamped to the grid.
    pub fn world_bounds_to_region(&self, min: Vec2, max: Vec2) -> CellRegion {
        let size = IVec2::new(self.info.width as i32, self.info.height as i32);
        let lo = self.world_to_cell_unbounded(&min).clamp(IVec2::ZERO, size);
        let hi = (self.world_to_cell_unbounded(&max) + IVec2::ONE).clamp(IVec2::ZERO, size);
        CellRegion::new(lo.as_uvec2(), hi.as_uvec2())
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Clone> Grid2d<T> {
    /// Reallocate the grid with new geometry. All cells are set to `fill`.
    pub fn resize_map(&mut self, info: MapInfo, fill: T) {
        self.data.clear();
        self.data.resize(info.cell_count(), fill);
        self.info = info;
    }

    /// Set every cell in `[min, max)` (clamped to the grid) to `value`.
    pub fn fill_region(&mut self, min: UVec2, max: UVec2, value: T) {
        let max = max.min(UVec2::new(self.info.width, self.info.height));
        if min.x >= max.x || min.y >= max.y {
            return;
        }
        let width = self.info.width as usize;
        for y in min.y..max.y {
            let row = y as usize * width;
            self.data[row + min.x as usize..row + max.x as usize].fill(value.clone());
        }
    }

    /// Move the origin to `new_origin`, snapped to a whole number of cells.
    ///
    /// Cells that remain inside the map keep their values; newly exposed cells
    /// are set to `fill`.
    pub fn update_origin(&mut self, new_origin: &Vec2, fill: T) {
        let shift = ((*new_origin - self.info.origin) / self.info.resolution).as_ivec2();
        if shift == IVec2::ZERO {
            return;
        }

        let size = IVec2::new(self.info.width as i32, self.info.height as i32);
        let lower = shift.max(IVec2::ZERO).min(size);
        let upper = (shift + size).max(IVec2::ZERO).min(size);

        let mut data = vec![fill; self.data.len()];
        let width = self.info.width as usize;
        if lower.x < upper.x {
            for y in lower.y..upper.y {
                let src_row = y as usize * width;
                let dst_row = (y - shift.y) as usize * width;
                let src = src_row + lower.x as usize..src_row + upper.x as usize;
                let dst_start = dst_row + (lower.x - shift.x) as usize;
                data[dst_start..dst_start + src.len()].clone_from_slice(&self.data[src]);
            }
        }

        self.data = data;
        self.info.origin += shift.as_vec2() * self.info.resolution;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_10x10() -> Grid2d<u8> {
        Grid2d::<u8>::empty(MapInfo {
            width: 10,
            height: 10,
            resolution: 1.0,
            origin: Vec2::ZERO,
        })
    }

    fn world_to_map_to_world(grid: &Grid2d<u8>, pos: Vec2) -> Vec2 {
        let map_pos = grid.world_to_map(&pos).unwrap();
        grid.map_to_world(&map_pos)
    }

    #[test]
    fn test_world_to_map_to_world() {
        let grid = grid_10x10();

        for pos in [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.5, 0.5),
            Vec2::new(1.5, 1.5),
            Vec2::new(0.5, 1.5),
            Vec2::new(1.5, 0.5),
        ] {
            assert_eq!(world_to_map_to_world(&grid, pos), pos);
        }
    }

    #[test]
    fn world_to_cell_rejects_outside() {
        let grid = grid_10x10();
        assert_eq!(grid.world_to_cell(&Vec2::new(2.5, 3.5)), Some(UVec2::new(2, 3)));
        assert_eq!(grid.world_to_cell(&Vec2::new(-0.1, 3.5)), None);
        assert_eq!(grid.world_to_cell(&Vec2::new(10.0, 3.5)), None);
    }

    #[test]
    fn world_to_map_rejects_non_finite() {
        let grid = grid_10x10();
        assert_eq!(grid.world_to_map(&Vec2::new(f32::NAN, 1.0)), None);
        assert_eq!(grid.world_to_cell(&Vec2::new(1.0, f32::NAN)), None);
        assert_eq!(grid.world_to_cell(&Vec2::splat(f32::INFINITY)), None);
    }

    #[test]
    fn set_out_of_bounds_is_an_error() {
        let mut grid = grid_10x10();
        assert!(grid.set(UVec2::new(10, 0), 1).is_err());
        assert!(grid.set(UVec2::new(9, 9), 1).is_ok());
        assert_eq!(grid.get(UVec2::new(9, 9)), Some(&1));
    }

    #[test]
    fn fill_region_clamps_to_grid() {
        let mut grid = grid_10x10();
        grid.fill_region(UVec2::new(8, 8), UVec2::new(20, 20), 7);
        assert_eq!(grid.get(UVec2::new(9, 9)), Some(&7));
        assert_eq!(grid.get(UVec2::new(8, 8)), Some(&7));
        assert_eq!(grid.get(UVec2::new(7, 9)), Some(&0));
    }

    #[test]
    fn world_bounds_to_region_clamps() {
        let grid = grid_10x10();
        let region = grid.world_bounds_to_region(Vec2::new(-5.0, 2.2), Vec2::new(3.5, 50.0));
        assert_eq!(region.min, UVec2::new(0, 2));
        assert_eq!(region.max, UVec2::new(4, 10));
    }

    #[test]
    fn resize_map_clears_and_reshapes() {
        let mut grid = grid_10x10();
        grid.set(UVec2::new(1, 1), 9).unwrap();
        grid.resize_map(
            MapInfo {
                width: 4,
                height: 6,
                resolution: 0.5,
                origin: Vec2::new(-1.0, -1.0),
            },
            3,
        );
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 6);
        assert_eq!(grid.data().len(), 24);
        assert!(grid.data().iter().all(|&c| c == 3));
    }

    #[test]
    fn update_origin_preserves_overlap() {
        let mut grid = grid_10x10();
        grid.set(UVec2::new(5, 5), 42).unwrap();
        grid.set(UVec2::new(0, 0), 11).unwrap();

        grid.update_origin(&Vec2::new(2.0, 3.0), 255);

        assert_eq!(grid.info().origin, Vec2::new(2.0, 3.0));
        // World (5.5, 5.5) is now cell (3, 2).
        assert_eq!(grid.get(UVec2::new(3, 2)), Some(&42));
        // Newly exposed cells on the far side take the fill value.
        assert_eq!(grid.get(UVec2::new(9, 9)), Some(&255));
        // Cell (0, 0) moved out of the window.
        assert!(!grid.data().contains(&11));
    }

    #[test]
    fn update_origin_snaps_to_cells() {
        let mut grid = grid_10x10();
        grid.update_origin(&Vec2::new(-1.7, 0.4), 0);
        assert_eq!(grid.info().origin, Vec2::new(-1.0, 0.0));
    }
}
