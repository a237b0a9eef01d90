// --- File: constants.rs ---
// --- Global Simulation Constants ---
pub const BACKGROUND_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.03,
    b: 0.05,
    a: 1.0,
};

pub const FIXED_TIMESTEP: f32 = 1.0 / 60.0;
// Upper bound on catch-up ticks after a stall.
pub const MAX_STEPS_PER_FRAME: usize = 5;
pub const SOLVER_ITERATIONS: usize = 6;

// --- Body Plan Layout ---
// Skeleton rings: 1 centre + 5 inner + 10 outer. Membrane is the outer visible ring.
pub const SKELETON_CENTER_COUNT: usize = 1;
pub const SKELETON_INNER_COUNT: usize = 5;
pub const SKELETON_OUTER_COUNT: usize = 10;
pub const SKELETON_COUNT: usize = SKELETON_CENTER_COUNT + SKELETON_INNER_COUNT + SKELETON_OUTER_COUNT;
pub const MEMBRANE_COUNT: usize = 24;
pub const PARTICLES_PER_ORGANISM: usize = SKELETON_COUNT + MEMBRANE_COUNT;

pub const INNER_RING_START: usize = SKELETON_CENTER_COUNT;
pub const OUTER_RING_START: usize = INNER_RING_START + SKELETON_INNER_COUNT;
pub const MEMBRANE_START: usize = SKELETON_COUNT;

// Fixed constraint stride per organism. The body plan uses fewer; the rest is padding.
pub const CONSTRAINTS_PER_ORGANISM: usize = 136;

// Ring radii as a fraction of the organism radius.
pub const INNER_RING_RADIUS_FACTOR: f32 = 0.3;
pub const OUTER_RING_RADIUS_FACTOR: f32 = 0.62;
pub const MEMBRANE_RADIUS_FACTOR: f32 = 1.0;

// Spawn jitter, fraction of the ring's angular spacing / radius.
pub const ANGULAR_JITTER_FRACTION: f32 = 0.15;
pub const RADIAL_JITTER_FRACTION: f32 = 0.06;
pub const COLOR_MUTATION_MAX_DELTA: f32 = 0.12;

pub const EPSILON: f32 = 1e-6;

// --- Grid ---
// Hard cap on cells per axis; cell size grows past the contact distance when bounds are huge.
pub const MAX_GRID_CELLS_PER_AXIS: u32 = 1024;
pub const GRID_MARGIN_CELLS: u32 = 2;
pub const GRID_EMPTY: i32 = -1;

// --- Window / Demo ---
pub const WINDOW_WIDTH: u32 = 1280;
pub const WINDOW_HEIGHT: u32 = 800;
pub const FPS_UPDATE_INTERVAL_SECS: f64 = 1.0;
pub const DEFAULT_CAMERA_HALF_HEIGHT: f32 = 26.0;
pub const CAMERA_ZOOM_STEP: f32 = 1.15;

// --- Metaballs (Tunable) ---
pub const METABALL_ISO_LEVEL: f32 = 0.55;
pub const METABALL_SMOOTHNESS: f32 = 0.12;
// Visual splat radius relative to the particle's collision radius.
pub const VISUAL_RADIUS_MULTIPLIER: f32 = 3.2;
pub const CORE_SPLAT_RADIUS_FACTOR: f32 = 0.85;
