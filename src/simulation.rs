// --- File: simulation.rs ---
use std::mem::size_of;
use std::time::Instant;

use bytemuck::Zeroable;
use glam::{Vec2, Vec3};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::behavior::{BehaviorContext, Directive};
use crate::config::SolverConfig;
use crate::constants::{CONSTRAINTS_PER_ORGANISM, PARTICLES_PER_ORGANISM};
use crate::constraints::{Constraint, ConstraintStore};
use crate::error::SolverError;
use crate::grid::{GridLayout, SpatialGrid};
use crate::handoff::RenderView;
use crate::organism::{OrganismAggregate, OrganismKind};
use crate::particles::{Particle, ParticleStore};
use crate::pipeline;
use crate::profiling::{PipelineProfile, StageTimer};
use crate::topology::BodyPlan;

/// World inputs for one fixed tick.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TickInput {
    pub dt: f32,
    /// Half extents of the world on x and z.
    pub bounds: Vec2,
    pub cursor: Option<Vec2>,
}

/// Everything a tick reads or writes. Kept apart from the worker pool so the pool can run a
/// closure that borrows this mutably.
struct SolverState {
    config: SolverConfig,
    particles: ParticleStore,
    constraints: ConstraintStore,
    aggregates: Vec<OrganismAggregate>,
    organism_count: usize,
    grid: SpatialGrid,

    // --- Per-tick scratch, pre-sized to capacity ---
    directives: Vec<Directive>,
    external_forces: Vec<Vec2>,
    corrected: Vec<Vec3>,
    overlap: Vec<f32>,
    compression: Vec<f32>,
    shifts: Vec<Vec2>,

    profile: PipelineProfile,
    elapsed: f32,
}

impl SolverState {
    fn step(&mut self, dt: f32, bounds: Vec2, cursor: Option<Vec2>) {
        let started = Instant::now();
        let organisms = self.organism_count;
        let count = self.particles.len();
        self.profile.reset();

        let context = BehaviorContext {
            time: self.elapsed,
            bounds,
            cursor,
        };

        {
            let _timer = StageTimer::new(&mut self.profile.behavior_time);
            pipeline::compute_directives(
                &self.aggregates[..organisms],
                &self.external_forces[..organisms],
                &mut self.directives[..organisms],
                &context,
                &self.config,
            );
        }
        {
            let _timer = StageTimer::new(&mut self.profile.predict_time);
            pipeline::predict(
                self.particles.as_mut_slice(),
                self.constraints.as_mut_slice(),
                &self.aggregates[..organisms],
                &self.directives[..organisms],
                dt,
                &self.config,
            );
        }
        {
            let _timer = StageTimer::new(&mut self.profile.grid_time);
            pipeline::rebuild_grid(&mut self.grid, self.particles.as_slice());
        }
        {
            let _timer = StageTimer::new(&mut self.profile.collision_time);
            self.profile.contact_count = pipeline::resolve_collisions(
                self.particles.as_slice(),
                &self.grid,
                &mut self.corrected[..count],
                &mut self.overlap[..count],
                &self.config,
            );
            pipeline::commit_positions(self.particles.as_mut_slice(), &self.corrected[..count]);
        }
        {
            let _timer = StageTimer::new(&mut self.profile.constraint_time);
            pipeline::solve_constraints(
                self.particles.as_mut_slice(),
                self.constraints.as_mut_slice(),
                &mut self.compression[..organisms],
                self.config.iterations,
                dt,
            );
        }
        {
            let _timer = StageTimer::new(&mut self.profile.finalize_time);
            pipeline::finalize_velocities(self.particles.as_mut_slice(), dt);
        }
        {
            let _timer = StageTimer::new(&mut self.profile.aggregate_time);
            pipeline::update_aggregates(
                self.particles.as_slice(),
                &mut self.aggregates[..organisms],
                &self.overlap[..count],
                &self.compression[..organisms],
                dt,
                &self.config,
            );
        }
        {
            let _timer = StageTimer::new(&mut self.profile.boundary_time);
            pipeline::enforce_bounds(
                self.particles.as_mut_slice(),
                &mut self.aggregates[..organisms],
                &mut self.shifts[..organisms],
                bounds,
                &self.config,
            );
        }

        self.elapsed += dt;
        self.profile.particle_count = count;
        self.profile.total_tick_time = started.elapsed();
    }
}

/// Owns the stores, the grid and a dedicated worker pool, and advances the world one fixed
/// tick at a time.
pub struct MicrobeSolver {
    pool: ThreadPool,
    state: SolverState,
    amoeba: BodyPlan,
    max_organisms: usize,
    ticks: u64,
}

impl MicrobeSolver {
    pub fn create(max_organisms: usize) -> Result<Self, SolverError> {
        Self::with_config(max_organisms, SolverConfig::default())
    }

    /// Pre-sizes every store for `max_organisms`. Fails instead of building a solver that
    /// could not hold its full capacity.
    pub fn with_config(max_organisms: usize, config: SolverConfig) -> Result<Self, SolverError> {
        if max_organisms == 0 {
            return Err(SolverError::ZeroCapacity);
        }
        let particle_capacity = max_organisms
            .checked_mul(PARTICLES_PER_ORGANISM)
            .ok_or(SolverError::CapacityOverflow)?;
        let constraint_capacity = max_organisms
            .checked_mul(CONSTRAINTS_PER_ORGANISM)
            .ok_or(SolverError::CapacityOverflow)?;
        if particle_capacity > i32::MAX as usize {
            return Err(SolverError::IndexSpaceExceeded(particle_capacity));
        }

        let particle_bytes = byte_size::<Particle>(particle_capacity)?;
        let constraint_bytes = byte_size::<Constraint>(constraint_capacity)?;
        let largest = particle_bytes.max(constraint_bytes);
        if largest > config.max_buffer_bytes {
            return Err(SolverError::BufferTooLarge {
                requested: largest,
                limit: config.max_buffer_bytes,
            });
        }

        let mut builder = ThreadPoolBuilder::new()
            .thread_name(|index| format!("protoplasm-worker-{index}"));
        if config.worker_threads > 0 {
            builder = builder.num_threads(config.worker_threads);
        }
        let pool = builder.build()?;

        let contact = config.contact_distance();
        let layout = GridLayout::for_bounds(Vec2::splat(config.organism_radius * 4.0), contact);

        let state = SolverState {
            particles: ParticleStore::with_capacity(particle_capacity)?,
            constraints: ConstraintStore::with_capacity(constraint_capacity)?,
            aggregates: presized(max_organisms, OrganismAggregate::zeroed())?,
            organism_count: 0,
            grid: SpatialGrid::new(layout, particle_capacity)?,
            directives: presized(max_organisms, Directive::default())?,
            external_forces: presized(max_organisms, Vec2::ZERO)?,
            corrected: presized(particle_capacity, Vec3::ZERO)?,
            overlap: presized(particle_capacity, 0.0)?,
            compression: presized(max_organisms, 0.0)?,
            shifts: presized(max_organisms, Vec2::ZERO)?,
            profile: PipelineProfile::default(),
            elapsed: 0.0,
            config,
        };

        log::info!(
            "Solver ready: {} organisms, {} particles, {} constraint slots, {} workers",
            max_organisms,
            particle_capacity,
            constraint_capacity,
            pool.current_num_threads()
        );

        Ok(Self {
            pool,
            state,
            amoeba: BodyPlan::for_kind(OrganismKind::Amoeba),
            max_organisms,
            ticks: 0,
        })
    }

    fn plan(&self, kind: OrganismKind) -> &BodyPlan {
        match kind {
            OrganismKind::Amoeba => &self.amoeba,
        }
    }

    /// Adds one organism centred at `(x, z)`. Returns its index, or `None` once the solver
    /// is full.
    pub fn spawn(&mut self, x: f32, z: f32, kind: OrganismKind, seed: u32) -> Option<usize> {
        let organism = self.state.organism_count;
        if organism >= self.max_organisms {
            log::debug!("Spawn refused: capacity of {} organisms reached", self.max_organisms);
            return None;
        }
        if !(x.is_finite() && z.is_finite()) {
            log::debug!("Spawn refused: non-finite position ({x}, {z})");
            return None;
        }

        let blueprint = self
            .plan(kind)
            .instantiate(organism, Vec2::new(x, z), seed, &self.state.config);

        let state = &mut self.state;
        state.particles.append(&blueprint.particles)?;
        state.constraints.append(&blueprint.constraints)?;
        state.aggregates[organism] = blueprint.aggregate;
        state.external_forces[organism] = Vec2::ZERO;
        state.organism_count += 1;
        Some(organism)
    }

    /// Advances one tick with the cursor given as plain coordinates. A non-finite cursor
    /// coordinate means "no cursor".
    pub fn update(&mut self, dt: f32, bounds_x: f32, bounds_z: f32, cursor_x: f32, cursor_z: f32) {
        let cursor = (cursor_x.is_finite() && cursor_z.is_finite()).then(|| Vec2::new(cursor_x, cursor_z));
        self.tick(&TickInput {
            dt,
            bounds: Vec2::new(bounds_x, bounds_z),
            cursor,
        });
    }

    pub fn tick(&mut self, input: &TickInput) {
        if !(input.dt.is_finite() && input.dt > 0.0) {
            log::warn!("Skipping tick with invalid dt {}", input.dt);
            return;
        }
        let bounds = input.bounds.abs();
        if !(bounds.is_finite() && bounds.min_element() > 0.0) {
            log::warn!("Skipping tick with degenerate bounds {}", input.bounds);
            return;
        }

        let layout = GridLayout::for_bounds(bounds, self.state.config.contact_distance());
        self.state.grid.relayout(layout);

        let state = &mut self.state;
        let (dt, cursor) = (input.dt, input.cursor);
        self.pool.install(|| state.step(dt, bounds, cursor));
        self.ticks += 1;
    }

    /// Read-only snapshot for drawing, blended `alpha` of the way from the previous tick.
    pub fn render_view(&self, alpha: f32) -> RenderView<'_> {
        RenderView::new(self.particles(), self.aggregates(), alpha)
    }

    /// Per-organism acceleration added on top of its own behaviour until cleared.
    /// Returns `false` for an organism that has not been spawned.
    pub fn set_external_force(&mut self, organism: usize, force: Vec2) -> bool {
        if organism >= self.state.organism_count || !force.is_finite() {
            return false;
        }
        self.state.external_forces[organism] = force;
        true
    }

    pub fn clear_external_forces(&mut self) {
        self.state.external_forces.fill(Vec2::ZERO);
    }

    /// Removes every organism. Capacity and the worker pool are kept.
    pub fn reset(&mut self) {
        let state = &mut self.state;
        state.particles.clear();
        state.constraints.clear();
        state.aggregates[..state.organism_count].fill(OrganismAggregate::zeroed());
        state.external_forces.fill(Vec2::ZERO);
        state.organism_count = 0;
        state.elapsed = 0.0;
        state.profile.reset();
        self.ticks = 0;
        log::info!("Solver reset");
    }

    // --- Introspection ---

    pub fn organism_count(&self) -> usize {
        self.state.organism_count
    }

    pub fn particle_count(&self) -> usize {
        self.state.particles.len()
    }

    /// Active constraint slots, padding included.
    pub fn constraint_count(&self) -> usize {
        self.state.constraints.len()
    }

    pub fn capacity(&self) -> usize {
        self.max_organisms
    }

    pub fn particles(&self) -> &[Particle] {
        self.state.particles.as_slice()
    }

    pub fn constraints(&self) -> &[Constraint] {
        self.state.constraints.as_slice()
    }

    pub fn aggregates(&self) -> &[OrganismAggregate] {
        &self.state.aggregates[..self.state.organism_count]
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.state.grid
    }

    pub fn profile(&self) -> &PipelineProfile {
        &self.state.profile
    }

    pub fn config(&self) -> &SolverConfig {
        &self.state.config
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulated seconds since creation or the last reset.
    pub fn elapsed(&self) -> f32 {
        self.state.elapsed
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

fn byte_size<T>(count: usize) -> Result<u64, SolverError> {
    count
        .checked_mul(size_of::<T>())
        .map(|bytes| bytes as u64)
        .ok_or(SolverError::CapacityOverflow)
}

fn presized<T: Clone>(len: usize, value: T) -> Result<Vec<T>, SolverError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len)?;
    buffer.resize(len, value);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_threaded() -> SolverConfig {
        let mut config = SolverConfig::default();
        config.worker_threads = 1;
        config
    }

    #[test]
    fn spawn_fills_contiguous_blocks() {
        let mut solver = MicrobeSolver::with_config(3, single_threaded()).unwrap();
        assert_eq!(solver.spawn(0.0, 0.0, OrganismKind::Amoeba, 1), Some(0));
        assert_eq!(solver.spawn(4.0, 0.0, OrganismKind::Amoeba, 2), Some(1));
        assert_eq!(solver.particle_count(), 2 * PARTICLES_PER_ORGANISM);
        assert_eq!(solver.constraint_count(), 2 * CONSTRAINTS_PER_ORGANISM);
        assert!(solver.particles()[PARTICLES_PER_ORGANISM..]
            .iter()
            .all(|p| p.organism == 1));
    }

    #[test]
    fn invalid_ticks_are_ignored() {
        let mut solver = MicrobeSolver::with_config(1, single_threaded()).unwrap();
        solver.spawn(0.0, 0.0, OrganismKind::Amoeba, 1);
        let before = solver.particles().to_vec();
        solver.update(0.0, 10.0, 10.0, f32::NAN, f32::NAN);
        solver.update(1.0 / 60.0, 0.0, 10.0, f32::NAN, f32::NAN);
        assert_eq!(solver.ticks(), 0);
        assert_eq!(solver.particles(), before.as_slice());
    }

    #[test]
    fn external_force_requires_spawned_organism() {
        let mut solver = MicrobeSolver::with_config(2, single_threaded()).unwrap();
        assert!(!solver.set_external_force(0, Vec2::X));
        solver.spawn(0.0, 0.0, OrganismKind::Amoeba, 1);
        assert!(solver.set_external_force(0, Vec2::X));
        assert!(!solver.set_external_force(0, Vec2::new(f32::INFINITY, 0.0)));
    }

    #[test]
    fn reset_empties_the_world() {
        let mut solver = MicrobeSolver::with_config(2, single_threaded()).unwrap();
        solver.spawn(0.0, 0.0, OrganismKind::Amoeba, 1);
        solver.update(1.0 / 60.0, 10.0, 10.0, f32::NAN, f32::NAN);
        solver.reset();
        assert_eq!(solver.organism_count(), 0);
        assert_eq!(solver.particle_count(), 0);
        assert_eq!(solver.ticks(), 0);
        assert_eq!(solver.spawn(1.0, 1.0, OrganismKind::Amoeba, 3), Some(0));
    }
}
