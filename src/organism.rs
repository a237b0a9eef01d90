// --- File: organism.rs ---
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OrganismKind {
    /// Skeleton rings under an elastic membrane. The only body plan with a full topology.
    Amoeba,
}

impl OrganismKind {
    pub fn raw(self) -> u32 {
        match self {
            Self::Amoeba => 0,
        }
    }

    pub fn base_color(self) -> Vec4 {
        match self {
            Self::Amoeba => Vec4::new(0.35, 0.78, 0.62, 0.9),
        }
    }
}

// --- GPU Data Structure ---
// Per-organism projection of its particles, rewritten every tick.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct OrganismAggregate {
    pub center: Vec3,
    pub radius: f32,
    pub color: [f32; 4],
    pub kind: u32,
    pub stiffness: f32,
    pub seed: u32,
    pub squish: f32,
    pub bounds_min: Vec2,
    pub bounds_max: Vec2,
}

impl OrganismAggregate {
    pub fn new(kind: OrganismKind, center: Vec3, radius: f32, color: Vec4, stiffness: f32, seed: u32) -> Self {
        Self {
            center,
            radius,
            color: color.into(),
            kind: kind.raw(),
            stiffness,
            seed,
            squish: 0.0,
            bounds_min: Vec2::new(center.x - radius, center.z - radius),
            bounds_max: Vec2::new(center.x + radius, center.z + radius),
        }
    }

    #[inline]
    pub fn planar_center(&self) -> Vec2 {
        Vec2::new(self.center.x, self.center.z)
    }

    /// Folds this tick's observed overlap into the running squish metric: an exponential
    /// decay toward zero that is immediately overridden by any larger new overlap.
    pub fn absorb_squish(&mut self, observed: f32, decay_rate: f32, dt: f32) {
        let decayed = self.squish * (-decay_rate.max(0.0) * dt).exp();
        self.squish = decayed.max(observed.clamp(0.0, 1.0));
    }

    /// Moves the centre and box along with a rigid translation of the organism's particles.
    pub fn translate(&mut self, offset: Vec3) {
        self.center += offset;
        let planar = Vec2::new(offset.x, offset.z);
        self.bounds_min += planar;
        self.bounds_max += planar;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate() -> OrganismAggregate {
        OrganismAggregate::new(OrganismKind::Amoeba, Vec3::ZERO, 1.0, Vec4::ONE, 1.0, 3)
    }

    #[test]
    fn squish_decays_monotonically_without_new_overlap() {
        let mut agg = aggregate();
        agg.absorb_squish(0.8, 1.5, 1.0 / 60.0);
        assert_eq!(agg.squish, 0.8);

        let mut previous = agg.squish;
        for _ in 0..600 {
            agg.absorb_squish(0.0, 1.5, 1.0 / 60.0);
            assert!(agg.squish < previous);
            previous = agg.squish;
        }
        assert!(agg.squish < 1e-4, "squish = {}", agg.squish);
    }

    #[test]
    fn larger_overlap_overrides_decay() {
        let mut agg = aggregate();
        agg.absorb_squish(0.2, 1.5, 1.0 / 60.0);
        agg.absorb_squish(0.5, 1.5, 1.0 / 60.0);
        assert_eq!(agg.squish, 0.5);
    }

    #[test]
    fn translate_moves_box_with_center() {
        let mut agg = aggregate();
        agg.translate(Vec3::new(2.0, 0.0, -1.0));
        assert_eq!(agg.planar_center(), Vec2::new(2.0, -1.0));
        assert_eq!(agg.bounds_min, Vec2::new(1.0, -2.0));
        assert_eq!(agg.bounds_max, Vec2::new(3.0, 0.0));
    }
}
