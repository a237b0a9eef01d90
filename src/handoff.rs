// --- File: handoff.rs ---
// Read-only view of the latest solved state for drawing.

use std::f32::consts::TAU;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::constants::{CORE_SPLAT_RADIUS_FACTOR, MEMBRANE_START, PARTICLES_PER_ORGANISM, VISUAL_RADIUS_MULTIPLIER};
use crate::organism::OrganismAggregate;
use crate::particles::Particle;
use crate::utils::planar;

// --- GPU Data Structure ---
// One metaball splat. Must match `SplatInstance` in metaball.wgsl.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SplatInstance {
    pub center: [f32; 2],
    pub radius: f32,
    pub weight: f32,
    pub color: [f32; 4],
}

/// Borrowed snapshot handed from the solver to a renderer. Holds no state of its own beyond
/// the interpolation fraction.
#[derive(Debug, Clone, Copy)]
pub struct RenderView<'a> {
    particles: &'a [Particle],
    aggregates: &'a [OrganismAggregate],
    alpha: f32,
}

impl<'a> RenderView<'a> {
    pub fn new(particles: &'a [Particle], aggregates: &'a [OrganismAggregate], alpha: f32) -> Self {
        Self {
            particles,
            aggregates,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn organism_count(&self) -> usize {
        self.aggregates.len()
    }

    pub fn particles(&self) -> &'a [Particle] {
        self.particles
    }

    pub fn aggregates(&self) -> &'a [OrganismAggregate] {
        self.aggregates
    }

    /// Planar position of particle `index`, blended between the last two ticks.
    #[inline]
    pub fn position(&self, index: usize) -> Vec2 {
        planar(self.particles[index].interpolated(self.alpha))
    }

    /// Interpolated centre of an organism, from its particles rather than its aggregate so
    /// it moves in step with them.
    pub fn center(&self, organism: usize) -> Vec2 {
        let block = self.block(organism);
        let sum: Vec2 = block.iter().map(|p| planar(p.interpolated(self.alpha))).sum();
        sum / block.len() as f32
    }

    fn block(&self, organism: usize) -> &'a [Particle] {
        let start = organism * PARTICLES_PER_ORGANISM;
        &self.particles[start..start + PARTICLES_PER_ORGANISM]
    }

    /// Closed outline of an organism's membrane: points ordered by angle around the centre,
    /// then smoothed with a closed Catmull-Rom spline. `subdivisions` extra points are
    /// inserted between each pair; 0 returns the sorted membrane points.
    pub fn membrane_outline(&self, organism: usize, subdivisions: usize) -> Vec<Vec2> {
        if organism >= self.aggregates.len() {
            return Vec::new();
        }
        let center = self.center(organism);
        let mut ring: Vec<(f32, Vec2)> = self.block(organism)[MEMBRANE_START..]
            .iter()
            .map(|p| {
                let point = planar(p.interpolated(self.alpha));
                let angle = (point - center).to_angle().rem_euclid(TAU);
                (angle, point)
            })
            .collect();
        ring.sort_by(|a, b| a.0.total_cmp(&b.0));
        let points: Vec<Vec2> = ring.into_iter().map(|(_, point)| point).collect();
        catmull_rom_closed(&points, subdivisions)
    }

    /// Splats for the metaball field: every membrane particle plus one larger core splat
    /// per organism.
    pub fn splats(&self) -> Vec<SplatInstance> {
        let mut out = Vec::with_capacity(self.splat_count());
        self.write_splats(&mut out);
        out
    }

    pub fn splat_count(&self) -> usize {
        self.aggregates.len() * (PARTICLES_PER_ORGANISM - MEMBRANE_START + 1)
    }

    /// Like [`RenderView::splats`] but reuses `out`.
    pub fn write_splats(&self, out: &mut Vec<SplatInstance>) {
        out.clear();
        for (organism, aggregate) in self.aggregates.iter().enumerate() {
            let block = self.block(organism);
            // Squished organisms read slightly brighter.
            let weight = 1.0 + aggregate.squish * 0.5;

            let center = self.center(organism);
            out.push(SplatInstance {
                center: center.into(),
                radius: aggregate.radius * CORE_SPLAT_RADIUS_FACTOR,
                weight,
                color: aggregate.color,
            });
            out.extend(block[MEMBRANE_START..].iter().map(|p| SplatInstance {
                center: planar(p.interpolated(self.alpha)).into(),
                radius: p.radius * VISUAL_RADIUS_MULTIPLIER,
                weight,
                color: aggregate.color,
            }));
        }
    }
}

/// Uniform Catmull-Rom through a closed loop of control points.
pub fn catmull_rom_closed(points: &[Vec2], subdivisions: usize) -> Vec<Vec2> {
    let n = points.len();
    if n < 3 || subdivisions == 0 {
        return points.to_vec();
    }
    let steps = subdivisions + 1;
    let mut out = Vec::with_capacity(n * steps);
    for i in 0..n {
        let p0 = points[(i + n - 1) % n];
        let p1 = points[i];
        let p2 = points[(i + 1) % n];
        let p3 = points[(i + 2) % n];
        for s in 0..steps {
            let t = s as f32 / steps as f32;
            let t2 = t * t;
            let t3 = t2 * t;
            let point = 0.5
                * ((2.0 * p1)
                    + (p2 - p0) * t
                    + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
                    + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3);
            out.push(point);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spline_passes_through_control_points() {
        let square = [
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(0.0, -1.0),
        ];
        let smooth = catmull_rom_closed(&square, 3);
        assert_eq!(smooth.len(), 16);
        for (i, control) in square.iter().enumerate() {
            assert!((smooth[i * 4] - *control).length() < 1e-6);
        }
        assert_eq!(catmull_rom_closed(&square, 0), square.to_vec());
    }

    #[test]
    fn splat_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<SplatInstance>(), 32);
    }
}
