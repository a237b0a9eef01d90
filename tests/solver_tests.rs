use glam::Vec2;
use protoplasm::constants::{CONSTRAINTS_PER_ORGANISM, PARTICLES_PER_ORGANISM};
use protoplasm::{MicrobeSolver, OrganismKind, SolverConfig, SolverError, TickInput};

const DT: f32 = 1.0 / 60.0;

fn config_with_threads(threads: usize) -> SolverConfig {
    let mut config = SolverConfig::default();
    config.worker_threads = threads;
    config
}

fn populated(threads: usize, organisms: usize) -> MicrobeSolver {
    let mut solver = MicrobeSolver::with_config(organisms, config_with_threads(threads)).unwrap();
    for i in 0..organisms {
        let x = (i % 6) as f32 * 2.3 - 6.0;
        let z = (i / 6) as f32 * 2.3 - 4.0;
        solver.spawn(x, z, OrganismKind::Amoeba, 1000 + i as u32).unwrap();
    }
    solver
}

fn run(solver: &mut MicrobeSolver, ticks: usize) {
    for _ in 0..ticks {
        solver.tick(&TickInput {
            dt: DT,
            bounds: Vec2::new(12.0, 9.0),
            cursor: Some(Vec2::new(1.0, -1.0)),
        });
    }
}

#[test]
fn test_single_worker_runs_are_bit_identical() {
    let mut a = populated(1, 24);
    let mut b = populated(1, 24);
    run(&mut a, 120);
    run(&mut b, 120);

    assert_eq!(a.particles(), b.particles());
    assert_eq!(a.aggregates(), b.aggregates());
}

#[test]
fn test_parallel_run_matches_single_worker_within_tolerance() {
    let mut serial = populated(1, 24);
    let mut parallel = populated(4, 24);
    run(&mut serial, 10);
    run(&mut parallel, 10);

    for (s, p) in serial.particles().iter().zip(parallel.particles()) {
        assert!(
            s.position.distance(p.position) < 1e-3,
            "{:?} vs {:?}",
            s.position,
            p.position
        );
    }
}

#[test]
fn test_live_constraints_never_self_loop() {
    let solver = populated(1, 12);
    for (index, c) in solver.constraints().iter().enumerate() {
        let organism = index / CONSTRAINTS_PER_ORGANISM;
        let base = (organism * PARTICLES_PER_ORGANISM) as u32;
        let range = base..base + PARTICLES_PER_ORGANISM as u32;
        if c.is_live() {
            assert_ne!(c.a, c.b);
            assert!(range.contains(&c.a) && range.contains(&c.b));
        } else {
            assert_eq!(c.rest_length, 0.0);
            assert_eq!(c.compliance, 0.0);
        }
    }
    let live = solver.constraints().iter().filter(|c| c.is_live()).count();
    assert_eq!(live, 12 * 131);
}

#[test]
fn test_grid_reaches_every_particle_after_tick() {
    let mut solver = populated(4, 36);
    run(&mut solver, 3);
    assert_eq!(solver.grid().reachable_count(), solver.particle_count());

    let mut seen = vec![false; solver.particle_count()];
    let cells = solver.grid().layout().cell_count();
    for cell in 0..cells {
        for i in solver.grid().cell_iter(cell) {
            assert!(!seen[i], "particle {i} listed twice");
            seen[i] = true;
        }
    }
    assert!(seen.into_iter().all(|s| s));
}

#[test]
fn test_spawn_refused_at_capacity() {
    let mut solver = MicrobeSolver::with_config(2, config_with_threads(1)).unwrap();
    assert_eq!(solver.spawn(-3.0, 0.0, OrganismKind::Amoeba, 1), Some(0));
    assert_eq!(solver.spawn(3.0, 0.0, OrganismKind::Amoeba, 2), Some(1));
    let before = solver.particles().to_vec();

    assert_eq!(solver.spawn(0.0, 5.0, OrganismKind::Amoeba, 3), None);
    assert_eq!(solver.organism_count(), 2);
    assert_eq!(solver.particle_count(), 2 * PARTICLES_PER_ORGANISM);
    assert_eq!(solver.constraint_count(), 2 * CONSTRAINTS_PER_ORGANISM);
    assert_eq!(solver.particles(), before.as_slice());
}

#[test]
fn test_creation_failures() {
    assert!(matches!(MicrobeSolver::create(0), Err(SolverError::ZeroCapacity)));
    assert!(matches!(
        MicrobeSolver::create(usize::MAX),
        Err(SolverError::CapacityOverflow)
    ));
    assert!(matches!(
        MicrobeSolver::create(10_000_000),
        Err(SolverError::BufferTooLarge { .. })
    ));

    let mut unlimited = SolverConfig::default();
    unlimited.max_buffer_bytes = u64::MAX;
    let too_many = i32::MAX as usize / PARTICLES_PER_ORGANISM + 1;
    assert!(matches!(
        MicrobeSolver::with_config(too_many, unlimited),
        Err(SolverError::IndexSpaceExceeded(_))
    ));
}

#[test]
fn test_worker_count_is_honoured() {
    let solver = MicrobeSolver::with_config(1, config_with_threads(3)).unwrap();
    assert_eq!(solver.worker_threads(), 3);
}

#[test]
fn test_profile_covers_tick() {
    let mut solver = populated(2, 8);
    run(&mut solver, 1);
    let profile = solver.profile();
    assert_eq!(profile.particle_count, solver.particle_count());
    let stages: std::time::Duration = profile.stages().iter().map(|(_, t)| *t).sum();
    assert!(stages <= profile.total_tick_time);
    assert_eq!(solver.ticks(), 1);
}
