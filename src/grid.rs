// --- File: grid.rs ---
// Uniform spatial hash over the simulation plane.
//
// Every cell is the head of an intrusive singly-linked list threaded through the
// per-particle `next` array: `head[cell] -> i -> next[i] -> ... -> GRID_EMPTY`. Lists are
// rebuilt from scratch every tick. Insertion is an atomic exchange on the cell head
// followed by a private write of the particle's own `next` slot, so any number of workers
// can insert at once without losing entries.

use std::sync::atomic::{AtomicI32, Ordering};

use glam::Vec2;
use rayon::prelude::*;

use crate::constants::{GRID_EMPTY, GRID_MARGIN_CELLS, MAX_GRID_CELLS_PER_AXIS};
use crate::error::SolverError;
use crate::particles::Particle;

pub type GridKey = (i32, i32);

/// Dimensions of the grid for the current simulation bounds.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GridLayout {
    pub origin: Vec2,
    pub cell_size: f32,
    pub width: i32,
    pub height: i32,
}

impl GridLayout {
    /// Covers `[-bounds, bounds]` plus a margin ring of cells. `min_cell_size` must be at
    /// least the largest contact distance so a 3x3 neighbourhood sees every pair.
    pub fn for_bounds(bounds: Vec2, min_cell_size: f32) -> Self {
        let half = bounds.abs().max(Vec2::splat(min_cell_size));
        let usable = (MAX_GRID_CELLS_PER_AXIS - 2 * GRID_MARGIN_CELLS) as f32;
        let cell_size = min_cell_size.max(2.0 * half.max_element() / usable);

        let margin = GRID_MARGIN_CELLS as i32;
        let width = (2.0 * half.x / cell_size).ceil() as i32 + 2 * margin;
        let height = (2.0 * half.y / cell_size).ceil() as i32 + 2 * margin;
        let origin = -half - Vec2::splat(margin as f32 * cell_size);

        Self {
            origin,
            cell_size,
            width: width.max(1),
            height: height.max(1),
        }
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Cell coordinates for a planar position, clamped to the grid.
    #[inline]
    pub fn grid_key(&self, position: Vec2) -> GridKey {
        let local = (position - self.origin) / self.cell_size;
        let cell_x = local.x.floor() as i32;
        let cell_y = local.y.floor() as i32;
        (
            cell_x.clamp(0, self.width - 1),
            cell_y.clamp(0, self.height - 1),
        )
    }

    #[inline]
    pub fn flat_index(&self, key: GridKey) -> usize {
        (key.0 + key.1 * self.width) as usize
    }

    #[inline]
    pub fn cell_of(&self, position: Vec2) -> usize {
        self.flat_index(self.grid_key(position))
    }
}

pub struct SpatialGrid {
    layout: GridLayout,
    heads: Vec<AtomicI32>,
    next: Vec<i32>,
}

impl SpatialGrid {
    pub fn new(layout: GridLayout, particle_capacity: usize) -> Result<Self, SolverError> {
        if particle_capacity > i32::MAX as usize {
            return Err(SolverError::IndexSpaceExceeded(particle_capacity));
        }
        let mut next = Vec::new();
        next.try_reserve_exact(particle_capacity)?;
        next.resize(particle_capacity, GRID_EMPTY);

        Ok(Self {
            layout,
            heads: Self::empty_heads(layout.cell_count()),
            next,
        })
    }

    fn empty_heads(count: usize) -> Vec<AtomicI32> {
        (0..count).map(|_| AtomicI32::new(GRID_EMPTY)).collect()
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Swaps in a new layout. Head storage is only reallocated when the cell count changes.
    pub fn relayout(&mut self, layout: GridLayout) {
        if layout == self.layout {
            return;
        }
        if layout.cell_count() != self.heads.len() {
            self.heads = Self::empty_heads(layout.cell_count());
        }
        log::debug!(
            "Grid re-laid out to {}x{} (cell size {:.3})",
            layout.width,
            layout.height,
            layout.cell_size
        );
        self.layout = layout;
    }

    /// Resets every cell head to the empty sentinel.
    pub fn clear(&self) {
        self.heads
            .par_iter()
            .for_each(|head| head.store(GRID_EMPTY, Ordering::Relaxed));
    }

    /// Atomically links `particle` in front of `cell`'s list and returns the previous head,
    /// which the caller stores as the particle's `next`.
    #[inline]
    pub fn push(&self, cell: usize, particle: i32) -> i32 {
        self.heads[cell].swap(particle, Ordering::AcqRel)
    }

    /// Inserts every particle of the slice. Must follow [`SpatialGrid::clear`].
    pub fn insert_all(&mut self, particles: &[Particle]) {
        let layout = self.layout;
        let heads = &self.heads;
        self.next[..particles.len()]
            .par_iter_mut()
            .zip(particles.par_iter())
            .enumerate()
            .for_each(|(index, (next, particle))| {
                let cell = layout.cell_of(particle.planar());
                *next = heads[cell].swap(index as i32, Ordering::AcqRel);
            });
    }

    #[inline]
    pub fn head(&self, cell: usize) -> i32 {
        self.heads[cell].load(Ordering::Acquire)
    }

    #[inline]
    pub fn next(&self, particle: usize) -> i32 {
        self.next[particle]
    }

    /// Walks one cell's list.
    pub fn cell_iter(&self, cell: usize) -> CellIter<'_> {
        CellIter {
            grid: self,
            cursor: self.head(cell),
        }
    }

    /// Calls `visit` for every particle in the 3x3 block of cells around `position`.
    #[inline]
    pub fn for_each_neighbor<F>(&self, position: Vec2, mut visit: F)
    where
        F: FnMut(usize),
    {
        let (cx, cy) = self.layout.grid_key(position);
        for dy in -1..=1 {
            let y = cy + dy;
            if y < 0 || y >= self.layout.height {
                continue;
            }
            for dx in -1..=1 {
                let x = cx + dx;
                if x < 0 || x >= self.layout.width {
                    continue;
                }
                for j in self.cell_iter(self.layout.flat_index((x, y))) {
                    visit(j);
                }
            }
        }
    }

    /// Number of list entries across all cells. Equal to the active particle count after a
    /// complete insert.
    pub fn reachable_count(&self) -> usize {
        (0..self.heads.len())
            .map(|cell| self.cell_iter(cell).count())
            .sum()
    }
}

pub struct CellIter<'a> {
    grid: &'a SpatialGrid,
    cursor: i32,
}

impl Iterator for CellIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cursor == GRID_EMPTY {
            return None;
        }
        let current = self.cursor as usize;
        self.cursor = self.grid.next(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn particle_at(x: f32, z: f32) -> Particle {
        Particle::new(Vec3::new(x, 0.0, z), 1.0, 0.1, 0, false)
    }

    #[test]
    fn layout_keeps_cells_at_least_contact_sized() {
        let layout = GridLayout::for_bounds(Vec2::new(10.0, 5.0), 0.3);
        assert!(layout.cell_size >= 0.3);
        assert!(layout.width as f32 * layout.cell_size >= 20.0);

        let huge = GridLayout::for_bounds(Vec2::new(1.0e5, 1.0e5), 0.3);
        assert!(huge.width as u32 <= MAX_GRID_CELLS_PER_AXIS);
        assert!(huge.cell_size > 0.3);
    }

    #[test]
    fn outside_positions_clamp_to_edge_cells() {
        let layout = GridLayout::for_bounds(Vec2::splat(4.0), 1.0);
        assert_eq!(layout.grid_key(Vec2::new(-100.0, 100.0)), (0, layout.height - 1));
    }

    #[test]
    fn every_particle_is_reachable_exactly_once() {
        let particles: Vec<Particle> = (0..500)
            .map(|i| {
                let t = i as f32 * 0.37;
                particle_at(t.sin() * 6.0, t.cos() * 3.0)
            })
            .collect();
        let layout = GridLayout::for_bounds(Vec2::new(5.0, 5.0), 0.5);
        let mut grid = SpatialGrid::new(layout, particles.len()).unwrap();
        grid.clear();
        grid.insert_all(&particles);

        let mut seen = vec![0u32; particles.len()];
        for cell in 0..layout.cell_count() {
            for i in grid.cell_iter(cell) {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
        assert_eq!(grid.reachable_count(), particles.len());
    }

    #[test]
    fn neighbor_scan_finds_close_pairs_across_cell_edges() {
        let layout = GridLayout::for_bounds(Vec2::splat(4.0), 1.0);
        let a = particle_at(0.99, 0.0);
        let b = particle_at(1.01, 0.0);
        let particles = [a, b];
        let mut grid = SpatialGrid::new(layout, 2).unwrap();
        grid.clear();
        grid.insert_all(&particles);

        let mut found = Vec::new();
        grid.for_each_neighbor(a.planar(), |j| found.push(j));
        found.sort_unstable();
        assert_eq!(found, vec![0, 1]);
    }

    #[test]
    fn push_links_in_front() {
        let layout = GridLayout::for_bounds(Vec2::splat(1.0), 1.0);
        let grid = SpatialGrid::new(layout, 4).unwrap();
        grid.clear();
        assert_eq!(grid.push(0, 3), GRID_EMPTY);
        assert_eq!(grid.push(0, 1), 3);
        assert_eq!(grid.head(0), 1);
    }
}
