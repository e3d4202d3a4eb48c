//! Uniform-grid broad phase.
//!
//! The world rectangle is divided into square cells of a fixed size. Every
//! indexed body is registered in each cell its bounding box overlaps; two
//! bodies are collision candidates when they share at least one cell. The
//! grid is rebuilt incrementally once per tick, after integration and before
//! collision detection, and is read-only while candidates are queried.
//!
//! # Example
//!
//! ```
//! use stardrift_core::body::BodyId;
//! use stardrift_core::physics::WorldBounds;
//! use stardrift_core::spatial::{Aabb, SpatialGrid};
//!
//! let mut grid = SpatialGrid::new(WorldBounds::new(512.0, 512.0), 128.0, 16).unwrap();
//! let a = BodyId::new(0, 0);
//! let b = BodyId::new(1, 0);
//! grid.upsert(a, Aabb::around(10.0, 10.0, 8.0));
//! grid.upsert(b, Aabb::around(20.0, 20.0, 8.0));
//!
//! let mut near = Vec::new();
//! grid.query_neighbors(a, &mut near);
//! assert_eq!(near, vec![b]);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::body::BodyId;
use crate::physics::WorldBounds;
use crate::CoreError;

// ---------------------------------------------------------------------------
// Aabb
// ---------------------------------------------------------------------------

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Aabb {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Box of side `size` centred on `(x, y)`.
    pub fn around(x: f64, y: f64, size: f64) -> Self {
        let half = size * 0.5;
        Self::new(x - half, y - half, x + half, y + half)
    }
}

// ---------------------------------------------------------------------------
// SpatialGridStatistics
// ---------------------------------------------------------------------------

/// Occupancy figures for tuning the cell size.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpatialGridStatistics {
    pub non_empty_cells: usize,
    pub empty_cells: usize,
    /// Mean bucket length over non-empty cells.
    pub avg_bodies_per_cell: f64,
    pub max_bodies_in_cell: usize,
    /// Sum over cells of `n * (n - 1) / 2`.
    pub estimated_pair_checks: usize,
    pub tracked_bodies: usize,
    pub cell_size: f64,
    pub cells_x: usize,
    pub cells_y: usize,
    pub max_cells_per_body: usize,
}

// ---------------------------------------------------------------------------
// SpatialGrid
// ---------------------------------------------------------------------------

/// Fixed-topology uniform grid mapping cells to the bodies overlapping them.
#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f64,
    cells_x: usize,
    cells_y: usize,
    max_cells_per_body: usize,
    buckets: Vec<Vec<BodyId>>,
    /// Reverse index: the cells each body is currently registered in.
    cells_of: HashMap<BodyId, Vec<usize>>,
}

impl SpatialGrid {
    /// Create a grid covering `bounds`.
    ///
    /// Fails if the cell size is not a positive finite number, the bounds are
    /// empty, or `max_cells_per_body` is zero.
    pub fn new(
        bounds: WorldBounds,
        cell_size: f64,
        max_cells_per_body: usize,
    ) -> Result<Self, CoreError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(CoreError::invalid(
                "spatial grid",
                format!("cell size must be positive and finite, got {cell_size}"),
            ));
        }
        if !(bounds.width > 0.0 && bounds.height > 0.0) {
            return Err(CoreError::invalid(
                "spatial grid",
                format!("world must be non-empty, got {}x{}", bounds.width, bounds.height),
            ));
        }
        if max_cells_per_body == 0 {
            return Err(CoreError::invalid(
                "spatial grid",
                "max cells per body must be at least 1",
            ));
        }
        let cells_x = (bounds.width / cell_size).ceil() as usize;
        let cells_y = (bounds.height / cell_size).ceil() as usize;
        Ok(Self {
            cell_size,
            cells_x,
            cells_y,
            max_cells_per_body,
            buckets: vec![Vec::new(); cells_x * cells_y],
            cells_of: HashMap::new(),
        })
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of bodies currently indexed.
    pub fn len(&self) -> usize {
        self.cells_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells_of.is_empty()
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.cells_of.contains_key(&id)
    }

    /// The cells `id` is registered in, row-major indices.
    pub fn cells_of(&self, id: BodyId) -> &[usize] {
        self.cells_of.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Insert `id` or move it to the cells overlapped by `aabb`.
    ///
    /// Boxes are clamped to the grid, so bodies outside the world occupy the
    /// border cells. When a box spans more than `max_cells_per_body` cells the
    /// registration is truncated and a warning is logged.
    pub fn upsert(&mut self, id: BodyId, aabb: Aabb) {
        let mut cells = Vec::with_capacity(self.cells_of(id).len().max(4));
        self.covered_cells(aabb, &mut cells, id);

        match self.cells_of.get_mut(&id) {
            Some(old) if *old == cells => {}
            Some(old) => {
                for &cell in old.iter() {
                    Self::remove_from_bucket(&mut self.buckets[cell], id);
                }
                for &cell in &cells {
                    self.buckets[cell].push(id);
                }
                std::mem::swap(old, &mut cells);
            }
            None => {
                for &cell in &cells {
                    self.buckets[cell].push(id);
                }
                self.cells_of.insert(id, cells);
            }
        }
    }

    /// Remove `id` from every cell. Returns `false` if it was not indexed.
    pub fn remove(&mut self, id: BodyId) -> bool {
        let Some(cells) = self.cells_of.remove(&id) else {
            return false;
        };
        for cell in cells {
            Self::remove_from_bucket(&mut self.buckets[cell], id);
        }
        true
    }

    /// Fill `out` with every other body sharing at least one cell with `id`,
    /// deduplicated and in ascending order.
    pub fn query_neighbors(&self, id: BodyId, out: &mut Vec<BodyId>) {
        out.clear();
        for &cell in self.cells_of(id) {
            out.extend(self.buckets[cell].iter().copied().filter(|&other| other != id));
        }
        out.sort_unstable();
        out.dedup();
    }

    /// Fill `out` with every body registered in a cell overlapping `aabb`,
    /// deduplicated and in ascending order.
    pub fn query_region(&self, aabb: Aabb, out: &mut Vec<BodyId>) {
        out.clear();
        let (x0, y0, x1, y1) = self.cell_range(aabb);
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                out.extend_from_slice(&self.buckets[cy * self.cells_x + cx]);
            }
        }
        out.sort_unstable();
        out.dedup();
    }

    /// Drop every registration.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.cells_of.clear();
    }

    pub fn statistics(&self) -> SpatialGridStatistics {
        let mut stats = SpatialGridStatistics {
            tracked_bodies: self.cells_of.len(),
            cell_size: self.cell_size,
            cells_x: self.cells_x,
            cells_y: self.cells_y,
            max_cells_per_body: self.max_cells_per_body,
            ..Default::default()
        };
        let mut occupied = 0usize;
        for bucket in &self.buckets {
            let n = bucket.len();
            if n == 0 {
                stats.empty_cells += 1;
                continue;
            }
            stats.non_empty_cells += 1;
            occupied += n;
            stats.max_bodies_in_cell = stats.max_bodies_in_cell.max(n);
            stats.estimated_pair_checks += n * (n - 1) / 2;
        }
        if stats.non_empty_cells > 0 {
            stats.avg_bodies_per_cell = occupied as f64 / stats.non_empty_cells as f64;
        }
        stats
    }

    // -- internals ----------------------------------------------------------

    /// Inclusive clamped cell range `(x0, y0, x1, y1)` covered by `aabb`.
    fn cell_range(&self, aabb: Aabb) -> (usize, usize, usize, usize) {
        let clamp = |v: f64, cells: usize| -> usize {
            let c = (v / self.cell_size).floor();
            if c <= 0.0 {
                0
            } else {
                (c as usize).min(cells - 1)
            }
        };
        (
            clamp(aabb.min_x, self.cells_x),
            clamp(aabb.min_y, self.cells_y),
            clamp(aabb.max_x, self.cells_x),
            clamp(aabb.max_y, self.cells_y),
        )
    }

    /// Collect the cells covered by `aabb` into `out`, truncated to the
    /// per-body limit.
    fn covered_cells(&self, aabb: Aabb, out: &mut Vec<usize>, id: BodyId) {
        let (x0, y0, x1, y1) = self.cell_range(aabb);
        let wanted = (x1 - x0 + 1) * (y1 - y0 + 1);
        if wanted > self.max_cells_per_body {
            warn!(
                body = %id,
                wanted,
                max = self.max_cells_per_body,
                "body spans too many grid cells; registration truncated"
            );
        }
        'rows: for cy in y0..=y1 {
            for cx in x0..=x1 {
                if out.len() == self.max_cells_per_body {
                    break 'rows;
                }
                out.push(cy * self.cells_x + cx);
            }
        }
    }

    fn remove_from_bucket(bucket: &mut Vec<BodyId>, id: BodyId) {
        if let Some(pos) = bucket.iter().position(|&b| b == id) {
            bucket.swap_remove(pos);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
