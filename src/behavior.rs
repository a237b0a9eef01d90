// --- File: behavior.rs ---
// Per-organism steering: what each organism "wants" to do this tick, expressed as an
// acceleration for the whole body plus a heading its membrane bulges toward.

use std::f32::consts::TAU;

use glam::Vec2;

use crate::config::SolverConfig;
use crate::constants::EPSILON;
use crate::organism::OrganismAggregate;
use crate::utils::{hash_u32, unit_from_hash};

/// World-level inputs shared by every organism in one tick.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BehaviorContext {
    /// Simulated seconds since the solver was created.
    pub time: f32,
    pub bounds: Vec2,
    pub cursor: Option<Vec2>,
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Directive {
    /// Applied to every particle of the organism.
    pub acceleration: Vec2,
    /// Unit wander heading, or zero.
    pub heading: Vec2,
    /// Extra acceleration for membrane particles facing `heading`.
    pub pseudopod: f32,
}

impl Directive {
    /// Acceleration for a particle sitting at `outward` (unit direction from the centre).
    #[inline]
    pub fn acceleration_at(&self, outward: Vec2, membrane: bool) -> Vec2 {
        if !membrane || self.pseudopod == 0.0 {
            return self.acceleration;
        }
        let facing = outward.dot(self.heading).max(0.0);
        self.acceleration + self.heading * (self.pseudopod * facing)
    }
}

/// Wander heading for an organism: a seed-dependent base direction swinging sinusoidally
/// over time. Depends only on `(seed, time)`.
pub fn wander_heading(seed: u32, time: f32, config: &SolverConfig) -> Vec2 {
    let base = unit_from_hash(hash_u32(seed)) * TAU;
    let phase = unit_from_hash(hash_u32(seed ^ 0x9e37_79b9)) * TAU;
    let swing = config.wander_amplitude * (time * config.wander_frequency * TAU + phase).sin();
    Vec2::from_angle(base + swing)
}

pub fn compute_directive(
    aggregate: &OrganismAggregate,
    external: Vec2,
    context: &BehaviorContext,
    config: &SolverConfig,
) -> Directive {
    let center = aggregate.planar_center();
    let vigor = (1.0 - aggregate.squish * config.squish_modulation).max(0.0);

    let heading = wander_heading(aggregate.seed, context.time, config);
    let mut acceleration = heading * (config.locomotion_force * vigor);

    if let Some(cursor) = context.cursor {
        acceleration += cursor_pull(center, cursor, config);
    }
    acceleration += boundary_steer(center, context.bounds, config);
    acceleration += external;

    Directive {
        acceleration,
        heading,
        pseudopod: config.pseudopod_force * vigor,
    }
}

// Linear falloff to zero at `cursor_radius`.
fn cursor_pull(center: Vec2, cursor: Vec2, config: &SolverConfig) -> Vec2 {
    let offset = cursor - center;
    let distance = offset.length();
    if distance < EPSILON || distance >= config.cursor_radius {
        return Vec2::ZERO;
    }
    let falloff = 1.0 - distance / config.cursor_radius;
    offset / distance * (config.cursor_strength * falloff)
}

// Pushes inward once the centre is within `boundary_margin` of an edge, growing linearly
// with depth into the margin.
fn boundary_steer(center: Vec2, bounds: Vec2, config: &SolverConfig) -> Vec2 {
    if config.boundary_steer_force == 0.0 || config.boundary_margin <= 0.0 {
        return Vec2::ZERO;
    }
    let inner = (bounds - Vec2::splat(config.boundary_margin)).max(Vec2::ZERO);
    let over_high = (center - inner).max(Vec2::ZERO);
    let over_low = (-center - inner).max(Vec2::ZERO);
    (over_low - over_high) / config.boundary_margin * config.boundary_steer_force
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organism::OrganismKind;
    use glam::{Vec3, Vec4};

    fn aggregate_at(x: f32, z: f32) -> OrganismAggregate {
        OrganismAggregate::new(OrganismKind::Amoeba, Vec3::new(x, 0.0, z), 1.0, Vec4::ONE, 1.0, 11)
    }

    fn still() -> SolverConfig {
        let mut config = SolverConfig::default();
        config.locomotion_force = 0.0;
        config
    }

    fn context(cursor: Option<Vec2>) -> BehaviorContext {
        BehaviorContext {
            time: 0.0,
            bounds: Vec2::new(20.0, 20.0),
            cursor,
        }
    }

    #[test]
    fn wander_is_deterministic_and_unit() {
        let config = SolverConfig::default();
        let a = wander_heading(5, 1.25, &config);
        assert_eq!(a, wander_heading(5, 1.25, &config));
        assert!((a.length() - 1.0).abs() < 1e-5);
        assert_ne!(a, wander_heading(6, 1.25, &config));
    }

    #[test]
    fn cursor_attracts_and_repels() {
        let mut config = still();
        let agg = aggregate_at(0.0, 0.0);
        let pull = compute_directive(&agg, Vec2::ZERO, &context(Some(Vec2::new(2.0, 0.0))), &config);
        assert!(pull.acceleration.x > 0.0);

        config.cursor_strength = -config.cursor_strength;
        let push = compute_directive(&agg, Vec2::ZERO, &context(Some(Vec2::new(2.0, 0.0))), &config);
        assert!(push.acceleration.x < 0.0);

        let far = compute_directive(&agg, Vec2::ZERO, &context(Some(Vec2::new(50.0, 0.0))), &config);
        assert_eq!(far.acceleration, Vec2::ZERO);
    }

    #[test]
    fn boundary_steer_points_inward_near_edges() {
        let config = still();
        let agg = aggregate_at(19.5, -19.5);
        let d = compute_directive(&agg, Vec2::ZERO, &context(None), &config);
        assert!(d.acceleration.x < 0.0);
        assert!(d.acceleration.y > 0.0);
    }

    #[test]
    fn squish_dampens_locomotion() {
        let config = SolverConfig::default();
        let relaxed = aggregate_at(0.0, 0.0);
        let mut squished = relaxed;
        squished.squish = 1.0;
        let a = compute_directive(&relaxed, Vec2::ZERO, &context(None), &config);
        let b = compute_directive(&squished, Vec2::ZERO, &context(None), &config);
        assert!(b.acceleration.length() < a.acceleration.length());
        assert!(b.pseudopod < a.pseudopod);
    }

    #[test]
    fn pseudopod_only_pushes_membrane_facing_heading() {
        let directive = Directive {
            acceleration: Vec2::ZERO,
            heading: Vec2::X,
            pseudopod: 2.0,
        };
        assert_eq!(directive.acceleration_at(Vec2::X, true), Vec2::new(2.0, 0.0));
        assert_eq!(directive.acceleration_at(-Vec2::X, true), Vec2::ZERO);
        assert_eq!(directive.acceleration_at(Vec2::X, false), Vec2::ZERO);
    }
}
