use glam::{IVec2, UVec2, Vec2};

use crate::grid::Grid2d;

/// Iterator over all grid cells inside a convex polygon.
///
/// Points are expected in world coordinates (meters). Only in-bounds cells are
/// yielded.
#[derive(Debug)]
pub struct PolygonIterator {
    points: Vec<Vec2>,
    y: i32,
    y_max: i32,
    x_end: i32,
    has_span: bool,
    grid_size: IVec2,
    cell: IVec2,
    poly_min_y: f32,
    poly_max_y: f32,
}

impl PolygonIterator {
    pub fn new<T>(grid: &Grid2d<T>, points: &[Vec2]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let info = grid.info();
        let resolution = info.resolution;
        let origin = info.origin;
        let map_points = points.iter().map(|p| (*p - origin) / resolution).collect();
        Some(Self::new_map(map_points, info.width, info.height))
    }

    fn new_map(points: Vec<Vec2>, width: u32, height: u32) -> Self {
        let (min_y, max_y) = points
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min_y, max_y), p| {
                (min_y.min(p.y), max_y.max(p.y))
            });
        let y_min = min_y.floor() as i32;
        let y_max = max_y.ceil() as i32;
        let grid_size = IVec2::new(width as i32, height as i32);

        Self {
            points,
            y: y_min - 1,
            y_max,
            x_end: -1,
            has_span: false,
            grid_size,
            cell: IVec2::ZERO,
            poly_min_y: min_y,
            poly_max_y: max_y,
        }
    }

    fn advance_row(&mut self) -> bool {
        let mut xs = Vec::with_capacity(self.points.len());
        while self.y <= self.y_max {
            // Scan at the row center, clamped into the polygon's y range so
            // thin polygons still produce a span.
            let y_scan = (self.y as f32 + 0.5).clamp(self.poly_min_y, self.poly_max_y);
            xs.clear();

            for i in 0..self.points.len() {
                let p0 = self.points[i];
                let p1 = self.points[(i + 1) % self.points.len()];
                if (p0.y - p1.y).abs() < f32::EPSILON {
                    continue;
                }
                let (lo, hi) = if p0.y < p1.y { (p0, p1) } else { (p1, p0) };
                if y_scan >= lo.y && y_scan <= hi.y {
                    let t = (y_scan - p0.y) / (p1.y - p0.y);
                    xs.push(p0.x + t * (p1.x - p0.x));
                }
            }

            if xs.len() >= 2 {
                xs.sort_by(f32::total_cmp);
                let x_start = (xs[0].ceil() as i32).max(0);
                let x_end = (xs[xs.len() - 1].floor() as i32).min(self.grid_size.x - 1);

                if x_start <= x_end && self.y >= 0 && self.y < self.grid_size.y {
                    self.cell = IVec2::new(x_start, self.y);
                    self.x_end = x_end;
                    self.has_span = true;
                    return true;
                }
            }

            self.y += 1;
        }

        false
    }
}

impl Iterator for PolygonIterator {
    type Item = UVec2;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.has_span && self.cell.x <= self.x_end {
                let cell = self.cell.as_uvec2();
                self.cell.x += 1;
                return Some(cell);
            }

            self.has_span = false;
            self.y += 1;
            if !self.advance_row() {
                return None;
            }
        }
    }
}

/// Values of the cells inside a convex polygon.
#[derive(Debug)]
pub struct PolygonValueIterator<'a, T> {
    grid: &'a Grid2d<T>,
    iter: PolygonIterator,
}

impl<'a, T> PolygonValueIterator<'a, T> {
    pub fn new(grid: &'a Grid2d<T>, points: &[Vec2]) -> Option<Self> {
        Some(Self {
            iter: PolygonIterator::new(grid, points)?,
            grid,
        })
    }
}

impl<'a, T> Iterator for PolygonValueIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let grid = self.grid;
        self.iter.by_ref().find_map(|cell| grid.get(cell))
    }
}

impl<T> Grid2d<T> {
    pub fn polygon(&self, points: &[Vec2]) -> Option<PolygonIterator> {
        PolygonIterator::new(self, points)
    }

    pub fn polygon_value<'a>(&'a self, points: &[Vec2]) -> Option<PolygonValueIterator<'a, T>> {
        PolygonValueIterator::new(self, points)
    }

    /// Set every cell inside the polygon to `value`. Returns false if the
    /// polygon has fewer than three vertices.
    pub fn set_polygon_value(&mut self, points: &[Vec2], value: T) -> bool
    where
        T: Clone,
    {
        let Some(iter) = PolygonIterator::new(self, points) else {
            return false;
        };
        for cell in iter {
            if let Some(slot) = self.get_mut(cell) {
                *slot = value.clone();
            }
        }
        true
    }
}
