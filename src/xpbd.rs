// --- File: xpbd.rs ---
// XPBD distance projection.
//
// `C(a, b) = |p_b - p_a| - rest`, with compliance scaled by `1 / dt²` so the result is
// independent of the tick rate and iteration count.

use crate::constants::EPSILON;
use crate::constraints::Constraint;
use crate::particles::Particle;
use crate::utils::separation_axis;

/// Projects one constraint against `particles`, where the slice starts at global particle
/// index `offset`. Returns the absolute constraint error before the projection.
#[inline]
pub fn project_distance(
    particles: &mut [Particle],
    offset: usize,
    constraint: &mut Constraint,
    dt: f32,
) -> f32 {
    if !constraint.is_live() {
        return 0.0;
    }
    let ia = constraint.a as usize - offset;
    let ib = constraint.b as usize - offset;
    let pa = particles[ia].position;
    let pb = particles[ib].position;
    let wa = particles[ia].inverse_mass;
    let wb = particles[ib].inverse_mass;

    let alpha_tilde = constraint.compliance / (dt * dt);
    let denominator = wa + wb + alpha_tilde;
    if denominator < EPSILON {
        return 0.0;
    }

    let (normal, distance) = separation_axis(pa, pb, ia, ib);
    let error = distance - constraint.rest_length;
    let delta_lambda = (-error - alpha_tilde * constraint.lambda) / denominator;
    constraint.lambda += delta_lambda;

    particles[ia].position -= normal * (wa * delta_lambda);
    particles[ib].position += normal * (wb * delta_lambda);
    error.abs()
}

/// Gauss-Seidel sweeps over one organism's constraint block. The block only references
/// particles inside `particles`, so blocks of different organisms can be solved in parallel.
pub fn solve_block(
    particles: &mut [Particle],
    constraints: &mut [Constraint],
    offset: usize,
    iterations: usize,
    dt: f32,
) {
    for _ in 0..iterations {
        for constraint in constraints.iter_mut() {
            project_distance(particles, offset, constraint, dt);
        }
    }
}
