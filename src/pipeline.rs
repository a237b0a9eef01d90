// --- File: pipeline.rs ---
// The stages of one solver tick.
//
// Each function is a single data-parallel pass. A pass returns only after every worker has
// finished, so calling them in sequence gives a full barrier between stages. Within a pass
// a worker writes only its own element; the grid head array is the one exception and is
// updated with atomic exchanges.

use glam::{Vec2, Vec3};
use rayon::prelude::*;

use crate::behavior::{BehaviorContext, Directive, compute_directive};
use crate::config::SolverConfig;
use crate::constants::{CONSTRAINTS_PER_ORGANISM, EPSILON, MEMBRANE_START, PARTICLES_PER_ORGANISM};
use crate::constraints::Constraint;
use crate::grid::SpatialGrid;
use crate::organism::OrganismAggregate;
use crate::particles::Particle;
use crate::utils::{lift, planar, separation_axis};
use crate::xpbd::solve_block;

/// Stage 0: one directive per organism from its aggregate and the world inputs.
pub fn compute_directives(
    aggregates: &[OrganismAggregate],
    external_forces: &[Vec2],
    directives: &mut [Directive],
    context: &BehaviorContext,
    config: &SolverConfig,
) {
    directives
        .par_iter_mut()
        .zip(aggregates.par_iter())
        .zip(external_forces.par_iter())
        .for_each(|((directive, aggregate), external)| {
            *directive = compute_directive(aggregate, *external, context, config);
        });
}

/// Stage 1: explicit integration to a tentative position. Also clears every constraint's
/// accumulated multiplier for the coming solve.
pub fn predict(
    particles: &mut [Particle],
    constraints: &mut [Constraint],
    aggregates: &[OrganismAggregate],
    directives: &[Directive],
    dt: f32,
    config: &SolverConfig,
) {
    let damping = (1.0 - config.linear_damping * dt).clamp(0.0, 1.0);
    let max_speed = config.max_speed;

    particles.par_iter_mut().for_each(|particle| {
        particle.previous_position = particle.position;
        if particle.inverse_mass == 0.0 {
            return;
        }
        let organism = particle.organism as usize;
        let outward = (particle.planar() - aggregates[organism].planar_center()).normalize_or_zero();
        let acceleration = directives[organism].acceleration_at(outward, particle.is_membrane());

        let mut velocity = particle.velocity + lift(acceleration) * dt;
        velocity.y = 0.0;
        velocity *= damping;
        velocity = velocity.clamp_length_max(max_speed);

        particle.velocity = velocity;
        particle.position += velocity * dt;
    });

    constraints
        .par_iter_mut()
        .for_each(|constraint| constraint.lambda = 0.0);
}

/// Stage 2: rebuilds the cell lists from the tentative positions.
pub fn rebuild_grid(grid: &mut SpatialGrid, particles: &[Particle]) {
    grid.clear();
    grid.insert_all(particles);
}

/// Stage 3a: pairwise separation between particles of different organisms. Pairs within one
/// organism are skipped: neighbouring membrane points sit closer than the contact distance
/// and their spacing is held by the organism's own constraints. Corrected
/// positions go to `corrected` so every worker reads a consistent snapshot; the largest
/// overlap per particle (relative to the contact distance) goes to `overlap`.
/// Returns the number of contacts seen, counting each pair from both sides.
pub fn resolve_collisions(
    particles: &[Particle],
    grid: &SpatialGrid,
    corrected: &mut [Vec3],
    overlap: &mut [f32],
    config: &SolverConfig,
) -> usize {
    let response = config.collision_response * 0.5;

    corrected
        .par_iter_mut()
        .zip(overlap.par_iter_mut())
        .enumerate()
        .map(|(i, (out, worst))| {
            let particle = &particles[i];
            let mut correction = Vec3::ZERO;
            let mut deepest = 0.0_f32;
            let mut contacts = 0;

            grid.for_each_neighbor(particle.planar(), |j| {
                let other = &particles[j];
                if j == i || other.organism == particle.organism {
                    return;
                }
                let contact = particle.radius + other.radius;
                if (particle.position - other.position).length_squared() >= contact * contact {
                    return;
                }
                let (normal, distance) = separation_axis(other.position, particle.position, j, i);
                let depth = contact - distance;
                correction += normal * (depth * response);
                deepest = deepest.max(depth / contact);
                contacts += 1;
            });

            *out = particle.position + correction;
            *worst = deepest;
            contacts
        })
        .sum()
}

/// Stage 3b: publishes the corrected positions.
pub fn commit_positions(particles: &mut [Particle], corrected: &[Vec3]) {
    particles
        .par_iter_mut()
        .zip(corrected.par_iter())
        .for_each(|(particle, position)| particle.position = *position);
}

/// Stage 4: XPBD sweeps, one organism per task. Records the largest relative compression
/// of any live constraint after the sweeps.
pub fn solve_constraints(
    particles: &mut [Particle],
    constraints: &mut [Constraint],
    compression: &mut [f32],
    iterations: usize,
    dt: f32,
) {
    particles
        .par_chunks_mut(PARTICLES_PER_ORGANISM)
        .zip(constraints.par_chunks_mut(CONSTRAINTS_PER_ORGANISM))
        .zip(compression.par_iter_mut())
        .enumerate()
        .for_each(|(organism, ((block, links), squeezed))| {
            let offset = organism * PARTICLES_PER_ORGANISM;
            solve_block(block, links, offset, iterations, dt);
            *squeezed = max_compression(block, links, offset);
        });
}

fn max_compression(particles: &[Particle], constraints: &[Constraint], offset: usize) -> f32 {
    constraints
        .iter()
        .filter(|c| c.is_live() && c.rest_length > EPSILON)
        .map(|c| {
            let a = particles[c.a as usize - offset].position;
            let b = particles[c.b as usize - offset].position;
            (c.rest_length - a.distance(b)) / c.rest_length
        })
        .fold(0.0, f32::max)
}

/// Stage 5: velocities from the net displacement of the tick.
pub fn finalize_velocities(particles: &mut [Particle], dt: f32) {
    let inv_dt = 1.0 / dt;
    particles.par_iter_mut().for_each(|particle| {
        particle.velocity = (particle.position - particle.previous_position) * inv_dt;
    });
}

/// Stage 6: centre, extent, bounding box and squish per organism.
pub fn update_aggregates(
    particles: &[Particle],
    aggregates: &mut [OrganismAggregate],
    overlap: &[f32],
    compression: &[f32],
    dt: f32,
    config: &SolverConfig,
) {
    aggregates
        .par_iter_mut()
        .zip(particles.par_chunks(PARTICLES_PER_ORGANISM))
        .zip(overlap.par_chunks(PARTICLES_PER_ORGANISM))
        .zip(compression.par_iter())
        .for_each(|(((aggregate, block), overlaps), squeezed)| {
            let sum: Vec3 = block.iter().map(|p| p.position).sum();
            let center = sum / block.len() as f32;

            let mut min = Vec2::splat(f32::MAX);
            let mut max = Vec2::splat(f32::MIN);
            for particle in block {
                let p = particle.planar();
                min = min.min(p - Vec2::splat(particle.radius));
                max = max.max(p + Vec2::splat(particle.radius));
            }

            let radius = block[MEMBRANE_START..]
                .iter()
                .map(|p| p.position.distance(center))
                .fold(0.0, f32::max);

            let compressed = (*squeezed - config.squish_compression_threshold).max(0.0);
            let observed = overlaps.iter().copied().fold(compressed, f32::max);

            aggregate.center = center;
            aggregate.radius = radius;
            aggregate.bounds_min = min;
            aggregate.bounds_max = max;
            aggregate.absorb_squish(observed, config.squish_decay_rate, dt);
        });
}

/// Rigid shift that brings an organism's centre back inside `bounds`, inset by its radius
/// when there is room.
#[inline]
pub fn containment_shift(aggregate: &OrganismAggregate, bounds: Vec2) -> Vec2 {
    let limit = (bounds - Vec2::splat(aggregate.radius)).max(Vec2::ZERO);
    let center = aggregate.planar_center();
    center.clamp(-limit, limit) - center
}

/// Stage 7: translates escaped organisms back inside. Positions and previous positions move
/// together so no velocity is injected; the outward velocity component is reflected and
/// damped by `boundary_bounce`.
pub fn enforce_bounds(
    particles: &mut [Particle],
    aggregates: &mut [OrganismAggregate],
    shifts: &mut [Vec2],
    bounds: Vec2,
    config: &SolverConfig,
) {
    shifts
        .par_iter_mut()
        .zip(aggregates.par_iter())
        .for_each(|(shift, aggregate)| *shift = containment_shift(aggregate, bounds));

    let bounce = config.boundary_bounce;
    let shifts = &*shifts;
    particles.par_iter_mut().for_each(|particle| {
        let shift = shifts[particle.organism as usize];
        if shift == Vec2::ZERO {
            return;
        }
        let offset = lift(shift);
        particle.position += offset;
        particle.previous_position += offset;

        let mut velocity = planar(particle.velocity);
        if shift.x != 0.0 && velocity.x * shift.x < 0.0 {
            velocity.x = -velocity.x * bounce;
        }
        if shift.y != 0.0 && velocity.y * shift.y < 0.0 {
            velocity.y = -velocity.y * bounce;
        }
        particle.velocity = lift(velocity);
    });

    aggregates
        .par_iter_mut()
        .zip(shifts.par_iter())
        .for_each(|(aggregate, shift)| {
            if *shift == Vec2::ZERO {
                return;
            }
            aggregate.translate(lift(*shift));
            aggregate.center.x = aggregate.center.x.clamp(-bounds.x, bounds.x);
            aggregate.center.z = aggregate.center.z.clamp(-bounds.y, bounds.y);
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridLayout;
    use crate::organism::OrganismKind;
    use glam::Vec4;

    fn particle(x: f32, z: f32, organism: u32) -> Particle {
        Particle::new(Vec3::new(x, 0.0, z), 1.0, 0.5, organism, false)
    }

    #[test]
    fn overlapping_particles_of_different_organisms_separate() {
        let particles = vec![particle(0.0, 0.0, 0), particle(0.6, 0.0, 1)];
        let mut grid = SpatialGrid::new(GridLayout::for_bounds(Vec2::splat(4.0), 1.0), 2).unwrap();
        rebuild_grid(&mut grid, &particles);

        let mut corrected = vec![Vec3::ZERO; 2];
        let mut overlap = vec![0.0; 2];
        let config = SolverConfig::default();
        let contacts = resolve_collisions(&particles, &grid, &mut corrected, &mut overlap, &config);

        assert_eq!(contacts, 2);
        assert!(corrected[0].x < 0.0 && corrected[1].x > 0.6);
        assert!((overlap[0] - 0.4).abs() < 1e-5);
        assert_eq!(overlap[0], overlap[1]);
    }

    #[test]
    fn same_organism_particles_do_not_collide() {
        let particles = vec![particle(0.0, 0.0, 0), particle(0.1, 0.0, 0)];
        let mut grid = SpatialGrid::new(GridLayout::for_bounds(Vec2::splat(4.0), 1.0), 2).unwrap();
        rebuild_grid(&mut grid, &particles);
        let mut corrected = vec![Vec3::ZERO; 2];
        let mut overlap = vec![0.0; 2];
        let contacts = resolve_collisions(
            &particles,
            &grid,
            &mut corrected,
            &mut overlap,
            &SolverConfig::default(),
        );
        assert_eq!(contacts, 0);
        assert_eq!(corrected[1], particles[1].position);
    }

    #[test]
    fn coincident_particles_split_in_opposite_directions() {
        let particles = vec![particle(1.0, 1.0, 0), particle(1.0, 1.0, 1)];
        let mut grid = SpatialGrid::new(GridLayout::for_bounds(Vec2::splat(4.0), 1.0), 2).unwrap();
        rebuild_grid(&mut grid, &particles);
        let mut corrected = vec![Vec3::ZERO; 2];
        let mut overlap = vec![0.0; 2];
        resolve_collisions(&particles, &grid, &mut corrected, &mut overlap, &SolverConfig::default());
        assert!(corrected[0].x < 1.0 && corrected[1].x > 1.0);
    }

    #[test]
    fn containment_shift_is_zero_inside() {
        let mut aggregate =
            OrganismAggregate::new(OrganismKind::Amoeba, Vec3::new(3.0, 0.0, -2.0), 1.0, Vec4::ONE, 1.0, 0);
        assert_eq!(containment_shift(&aggregate, Vec2::new(10.0, 10.0)), Vec2::ZERO);
        aggregate.center.x = 14.0;
        assert_eq!(containment_shift(&aggregate, Vec2::new(10.0, 10.0)), Vec2::new(-5.0, 0.0));
    }

    #[test]
    fn predict_caches_previous_and_resets_lambda() {
        let mut particles = vec![particle(0.0, 0.0, 0)];
        particles[0].velocity = Vec3::new(1.0, 0.0, 0.0);
        let mut constraints = vec![Constraint::padding(0)];
        constraints[0].lambda = 3.0;
        let aggregates =
            vec![OrganismAggregate::new(OrganismKind::Amoeba, Vec3::ZERO, 1.0, Vec4::ONE, 1.0, 0)];
        let directives = vec![Directive::default()];
        let mut config = SolverConfig::default();
        config.linear_damping = 0.0;

        predict(&mut particles, &mut constraints, &aggregates, &directives, 0.5, &config);

        assert_eq!(particles[0].previous_position, Vec3::ZERO);
        assert_eq!(particles[0].position, Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(constraints[0].lambda, 0.0);
    }
}
