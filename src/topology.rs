// --- File: topology.rs ---
// Body plans: where an organism's particles start and which pairs are linked.
//
// Positions are seeded; the edge list is purely index-driven, so every organism of a kind
// shares the same connectivity and only differs in rest lengths and per-organism scalars.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SolverConfig;
use crate::constants::{
    ANGULAR_JITTER_FRACTION, COLOR_MUTATION_MAX_DELTA, CONSTRAINTS_PER_ORGANISM,
    INNER_RING_RADIUS_FACTOR, INNER_RING_START, MEMBRANE_COUNT, MEMBRANE_RADIUS_FACTOR,
    MEMBRANE_START, OUTER_RING_RADIUS_FACTOR, OUTER_RING_START, PARTICLES_PER_ORGANISM,
    RADIAL_JITTER_FRACTION, SKELETON_INNER_COUNT, SKELETON_OUTER_COUNT,
};
use crate::constraints::{Constraint, ConstraintKind};
use crate::organism::{OrganismAggregate, OrganismKind};
use crate::particles::Particle;
use crate::utils::{lift, mutate_color};

const STIFFNESS_RANGE: std::ops::RangeInclusive<f32> = 0.8..=1.2;

/// A link between two particles of the same organism, in organism-local indices.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Edge {
    pub a: u16,
    pub b: u16,
    pub kind: ConstraintKind,
}

impl Edge {
    fn new(a: usize, b: usize, kind: ConstraintKind) -> Self {
        Self {
            a: a as u16,
            b: b as u16,
            kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BodyPlan {
    kind: OrganismKind,
    edges: Vec<Edge>,
}

impl BodyPlan {
    pub fn for_kind(kind: OrganismKind) -> Self {
        let edges = match kind {
            OrganismKind::Amoeba => amoeba_edges(),
        };
        debug_assert!(edges.len() <= CONSTRAINTS_PER_ORGANISM);
        debug_assert!(edges.iter().all(|e| e.a != e.b));
        Self { kind, edges }
    }

    pub fn kind(&self) -> OrganismKind {
        self.kind
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Lays out organism number `organism` around `center` and produces its particle block,
    /// its padded constraint block (global indices) and its initial aggregate.
    pub fn instantiate(
        &self,
        organism: usize,
        center: Vec2,
        seed: u32,
        config: &SolverConfig,
    ) -> OrganismBlueprint {
        let mut rng = StdRng::seed_from_u64(seed as u64);
        let rotation = rng.gen_range(0.0..TAU);
        let stiffness = rng.gen_range(STIFFNESS_RANGE);
        let color = mutate_color(self.kind.base_color(), &mut rng, COLOR_MUTATION_MAX_DELTA);

        let radius = config.organism_radius;
        let mut offsets = Vec::with_capacity(PARTICLES_PER_ORGANISM);
        offsets.push(Vec2::ZERO);
        push_ring(&mut offsets, &mut rng, SKELETON_INNER_COUNT, radius * INNER_RING_RADIUS_FACTOR, rotation);
        push_ring(&mut offsets, &mut rng, SKELETON_OUTER_COUNT, radius * OUTER_RING_RADIUS_FACTOR, rotation);
        push_ring(&mut offsets, &mut rng, MEMBRANE_COUNT, radius * MEMBRANE_RADIUS_FACTOR, rotation);

        let base = organism * PARTICLES_PER_ORGANISM;
        let particles: Vec<Particle> = offsets
            .iter()
            .enumerate()
            .map(|(local, offset)| {
                let membrane = local >= MEMBRANE_START;
                let inverse_mass = if membrane {
                    config.membrane_inverse_mass
                } else {
                    config.skeleton_inverse_mass
                };
                Particle::new(
                    lift(center + *offset),
                    inverse_mass,
                    config.particle_radius,
                    organism as u32,
                    membrane,
                )
            })
            .collect();

        let mut constraints: Vec<Constraint> = self
            .edges
            .iter()
            .map(|edge| {
                let (a, b) = (edge.a as usize, edge.b as usize);
                let rest = offsets[a].distance(offsets[b]);
                let compliance = compliance_for(edge.kind, config) / stiffness;
                Constraint::new((base + a) as u32, (base + b) as u32, rest, compliance, edge.kind)
            })
            .collect();
        constraints.resize(CONSTRAINTS_PER_ORGANISM, Constraint::padding(base as u32));

        let aggregate = OrganismAggregate::new(self.kind, lift(center), radius, color, stiffness, seed);

        OrganismBlueprint {
            particles,
            constraints,
            aggregate,
        }
    }
}

/// One organism's worth of store entries, ready to be appended.
#[derive(Debug, Clone)]
pub struct OrganismBlueprint {
    pub particles: Vec<Particle>,
    pub constraints: Vec<Constraint>,
    pub aggregate: OrganismAggregate,
}

fn compliance_for(kind: ConstraintKind, config: &SolverConfig) -> f32 {
    match kind {
        ConstraintKind::Skeleton => config.skeleton_compliance,
        ConstraintKind::Membrane => config.membrane_compliance,
        ConstraintKind::Bending => config.bending_compliance,
        ConstraintKind::Attachment => config.attachment_compliance,
        ConstraintKind::Padding => 0.0,
    }
}

fn push_ring(out: &mut Vec<Vec2>, rng: &mut StdRng, count: usize, radius: f32, rotation: f32) {
    let spacing = TAU / count as f32;
    for k in 0..count {
        let angle_jitter = rng.gen_range(-ANGULAR_JITTER_FRACTION..=ANGULAR_JITTER_FRACTION) * spacing;
        let radial_jitter = rng.gen_range(-RADIAL_JITTER_FRACTION..=RADIAL_JITTER_FRACTION);
        let angle = rotation + k as f32 * spacing + angle_jitter;
        out.push(Vec2::from_angle(angle) * radius * (1.0 + radial_jitter));
    }
}

fn amoeba_edges() -> Vec<Edge> {
    let mut edges = Vec::with_capacity(CONSTRAINTS_PER_ORGANISM);
    let inner = |i: usize| INNER_RING_START + i % SKELETON_INNER_COUNT;
    let outer = |j: usize| OUTER_RING_START + j % SKELETON_OUTER_COUNT;
    let membrane = |m: usize| MEMBRANE_START + m % MEMBRANE_COUNT;

    // Skeleton
    for i in 0..SKELETON_INNER_COUNT {
        edges.push(Edge::new(inner(i), inner(i + 1), ConstraintKind::Skeleton));
    }
    for j in 0..SKELETON_OUTER_COUNT {
        edges.push(Edge::new(outer(j), outer(j + 1), ConstraintKind::Skeleton));
    }
    for i in 0..SKELETON_INNER_COUNT {
        edges.push(Edge::new(0, inner(i), ConstraintKind::Skeleton));
    }
    // Two outer points per inner point; odd ones sit between two inner points.
    for j in 0..SKELETON_OUTER_COUNT {
        edges.push(Edge::new(outer(j), inner(j / 2), ConstraintKind::Skeleton));
        if j % 2 == 1 {
            edges.push(Edge::new(outer(j), inner(j / 2 + 1), ConstraintKind::Skeleton));
        }
    }

    // Membrane
    for m in 0..MEMBRANE_COUNT {
        edges.push(Edge::new(membrane(m), membrane(m + 1), ConstraintKind::Membrane));
    }
    for m in 0..MEMBRANE_COUNT {
        edges.push(Edge::new(membrane(m), membrane(m + 2), ConstraintKind::Bending));
    }
    // Attachments only reach the outer ring; the inner ring and centre hang off it.
    for m in 0..MEMBRANE_COUNT {
        let j = m * SKELETON_OUTER_COUNT / MEMBRANE_COUNT;
        edges.push(Edge::new(membrane(m), outer(j), ConstraintKind::Attachment));
        edges.push(Edge::new(membrane(m), outer(j + 1), ConstraintKind::Attachment));
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn count(plan: &BodyPlan, kind: ConstraintKind) -> usize {
        plan.edges().iter().filter(|e| e.kind == kind).count()
    }

    #[test]
    fn amoeba_edge_counts() {
        let plan = BodyPlan::for_kind(OrganismKind::Amoeba);
        assert_eq!(plan.edges().len(), 131);
        assert_eq!(count(&plan, ConstraintKind::Skeleton), 35);
        assert_eq!(count(&plan, ConstraintKind::Membrane), 24);
        assert_eq!(count(&plan, ConstraintKind::Bending), 24);
        assert_eq!(count(&plan, ConstraintKind::Attachment), 48);
    }

    #[test]
    fn attachments_follow_index_proportion_onto_outer_ring() {
        let plan = BodyPlan::for_kind(OrganismKind::Amoeba);
        let attachments: Vec<&Edge> = plan
            .edges()
            .iter()
            .filter(|e| e.kind == ConstraintKind::Attachment)
            .collect();
        let outer_ring = OUTER_RING_START..MEMBRANE_START;

        let mut per_outer = [0usize; SKELETON_OUTER_COUNT];
        for edge in &attachments {
            let (a, b) = (edge.a as usize, edge.b as usize);
            let (m, s) = if a >= MEMBRANE_START { (a, b) } else { (b, a) };
            assert!(m >= MEMBRANE_START);
            assert!(outer_ring.contains(&s), "attachment to {s} outside the outer ring");

            let expected = (m - MEMBRANE_START) * SKELETON_OUTER_COUNT / MEMBRANE_COUNT;
            let j = s - OUTER_RING_START;
            assert!(j == expected || j == (expected + 1) % SKELETON_OUTER_COUNT);
            per_outer[j] += 1;
        }
        assert!(per_outer.iter().all(|&n| n > 0));
    }

    #[test]
    fn edges_are_unique_pairs() {
        let plan = BodyPlan::for_kind(OrganismKind::Amoeba);
        let mut pairs: Vec<(u16, u16)> = plan
            .edges()
            .iter()
            .map(|e| (e.a.min(e.b), e.a.max(e.b)))
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        assert_eq!(pairs.len(), plan.edges().len());
    }

    #[test]
    fn blueprint_uses_global_indices_and_measured_rest_lengths() {
        let config = SolverConfig::default();
        let plan = BodyPlan::for_kind(OrganismKind::Amoeba);
        let blueprint = plan.instantiate(3, Vec2::new(5.0, -2.0), 77, &config);
        let base = 3 * PARTICLES_PER_ORGANISM;

        assert_eq!(blueprint.particles.len(), PARTICLES_PER_ORGANISM);
        assert_eq!(blueprint.constraints.len(), CONSTRAINTS_PER_ORGANISM);
        for c in blueprint.constraints.iter().filter(|c| c.is_live()) {
            let (a, b) = (c.a as usize - base, c.b as usize - base);
            assert!(a < PARTICLES_PER_ORGANISM && b < PARTICLES_PER_ORGANISM);
            let measured = blueprint.particles[a]
                .position
                .distance(blueprint.particles[b].position);
            assert_relative_eq!(c.rest_length, measured, epsilon = 1e-4);
        }
        assert!(blueprint.particles.iter().all(|p| p.organism == 3 && p.position.y == 0.0));
    }

    #[test]
    fn stiffness_scales_compliance() {
        let config = SolverConfig::default();
        let plan = BodyPlan::for_kind(OrganismKind::Amoeba);
        let blueprint = plan.instantiate(0, Vec2::ZERO, 9, &config);
        let stiffness = blueprint.aggregate.stiffness;
        assert!(STIFFNESS_RANGE.contains(&stiffness));
        let membrane = blueprint
            .constraints
            .iter()
            .find(|c| c.kind() == ConstraintKind::Membrane)
            .unwrap();
        assert_relative_eq!(membrane.compliance * stiffness, config.membrane_compliance, epsilon = 1e-9);
    }

    #[test]
    fn same_seed_same_body() {
        let config = SolverConfig::default();
        let plan = BodyPlan::for_kind(OrganismKind::Amoeba);
        let a = plan.instantiate(0, Vec2::ZERO, 42, &config);
        let b = plan.instantiate(0, Vec2::ZERO, 42, &config);
        let c = plan.instantiate(0, Vec2::ZERO, 43, &config);
        assert_eq!(a.particles, b.particles);
        assert_ne!(a.particles, c.particles);
    }
}
