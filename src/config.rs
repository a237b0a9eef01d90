// --- File: config.rs ---
use crate::constants::SOLVER_ITERATIONS;

// Default compliances (inverse stiffness, m/N). 0 would be perfectly rigid.
const SKELETON_COMPLIANCE: f32 = 1e-6;
const MEMBRANE_COMPLIANCE: f32 = 2e-5;
const BENDING_COMPLIANCE: f32 = 2e-4;
const ATTACHMENT_COMPLIANCE: f32 = 4e-4;

/// Tunables for the particle/constraint solver. The force magnitudes and the squish decay
/// rate were tuned by eye; they are parameters, not derived quantities.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub organism_radius: f32,
    pub particle_radius: f32,
    pub membrane_inverse_mass: f32,
    pub skeleton_inverse_mass: f32,

    pub skeleton_compliance: f32,
    pub membrane_compliance: f32,
    pub bending_compliance: f32,
    pub attachment_compliance: f32,
    pub iterations: usize,

    // Fraction of the pairwise overlap each particle resolves per tick.
    pub collision_response: f32,
    pub linear_damping: f32,
    pub max_speed: f32,

    // --- Behavior ---
    pub locomotion_force: f32,
    pub pseudopod_force: f32,
    pub wander_frequency: f32,
    pub wander_amplitude: f32,
    // Locomotion is scaled by (1 - squish * squish_modulation).
    pub squish_modulation: f32,
    // Positive attracts, negative repels.
    pub cursor_strength: f32,
    pub cursor_radius: f32,

    // --- Bounds ---
    pub boundary_margin: f32,
    pub boundary_steer_force: f32,
    pub boundary_bounce: f32,

    pub squish_decay_rate: f32,
    // Relative constraint compression below this does not register as squish.
    pub squish_compression_threshold: f32,

    // --- Resources ---
    // 0 lets rayon pick (one worker per core).
    pub worker_threads: usize,
    pub max_buffer_bytes: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        // Particle data is uploaded to the GPU as-is; stay inside the binding size every
        // wgpu device guarantees.
        let max_buffer_bytes = wgpu::Limits::default().max_storage_buffer_binding_size as u64;

        Self {
            organism_radius: 1.0,
            particle_radius: 0.14,
            membrane_inverse_mass: 1.0,
            skeleton_inverse_mass: 0.5,

            skeleton_compliance: SKELETON_COMPLIANCE,
            membrane_compliance: MEMBRANE_COMPLIANCE,
            bending_compliance: BENDING_COMPLIANCE,
            attachment_compliance: ATTACHMENT_COMPLIANCE,
            iterations: SOLVER_ITERATIONS,

            collision_response: 0.5,
            linear_damping: 0.8,
            max_speed: 12.0,

            locomotion_force: 1.6,
            pseudopod_force: 2.5,
            wander_frequency: 0.35,
            wander_amplitude: 1.2,
            squish_modulation: 0.6,
            cursor_strength: 3.0,
            cursor_radius: 8.0,

            boundary_margin: 2.0,
            boundary_steer_force: 6.0,
            boundary_bounce: 0.3,

            squish_decay_rate: 1.5,
            squish_compression_threshold: 0.05,

            worker_threads: 0,
            max_buffer_bytes,
        }
    }
}

impl SolverConfig {
    /// A config with every self-propelled force switched off. Organisms only move when
    /// pushed by collisions, bounds or an external force.
    pub fn passive() -> Self {
        let mut config = Self::default();
        config.locomotion_force = 0.0;
        config.pseudopod_force = 0.0;
        config.cursor_strength = 0.0;
        config.boundary_steer_force = 0.0;
        config
    }

    /// Largest distance at which two particles interact.
    pub fn contact_distance(&self) -> f32 {
        self.particle_radius * 2.0
    }
}

// --- Demo Settings (environment driven) ---

pub const ENV_INITIAL_ORGANISMS: &str = "PROTOPLASM_INITIAL_ORGANISMS";
pub const ENV_MAX_ORGANISMS: &str = "PROTOPLASM_MAX_ORGANISMS";
pub const ENV_BOUNDS_X: &str = "PROTOPLASM_BOUNDS_X";
pub const ENV_BOUNDS_Z: &str = "PROTOPLASM_BOUNDS_Z";
pub const ENV_SEED: &str = "PROTOPLASM_SEED";
pub const ENV_WORKER_THREADS: &str = "PROTOPLASM_THREADS";
pub const ENV_SPAWN_RATE: &str = "PROTOPLASM_SPAWN_RATE";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub initial_organisms: usize,
    pub max_organisms: usize,
    pub bounds_x: f32,
    pub bounds_z: f32,
    pub seed: u64,
    pub worker_threads: usize,
    // Organisms per second while the initial population fills in.
    pub spawn_rate: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            initial_organisms: 160,
            max_organisms: 1024,
            bounds_x: 40.0,
            bounds_z: 24.0,
            seed: 0x5eed,
            worker_threads: 0,
            spawn_rate: 40.0,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Missing keys keep their defaults;
    /// unparsable ones are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        read_into(&lookup, ENV_INITIAL_ORGANISMS, &mut settings.initial_organisms);
        read_into(&lookup, ENV_MAX_ORGANISMS, &mut settings.max_organisms);
        read_into(&lookup, ENV_BOUNDS_X, &mut settings.bounds_x);
        read_into(&lookup, ENV_BOUNDS_Z, &mut settings.bounds_z);
        read_into(&lookup, ENV_SEED, &mut settings.seed);
        read_into(&lookup, ENV_WORKER_THREADS, &mut settings.worker_threads);
        read_into(&lookup, ENV_SPAWN_RATE, &mut settings.spawn_rate);

        if settings.bounds_x <= 0.0 || settings.bounds_z <= 0.0 {
            log::warn!(
                "Non-positive world bounds ({}, {}), using defaults",
                settings.bounds_x,
                settings.bounds_z
            );
            let defaults = Self::default();
            settings.bounds_x = defaults.bounds_x;
            settings.bounds_z = defaults.bounds_z;
        }
        if settings.initial_organisms > settings.max_organisms {
            log::warn!(
                "Initial organism count {} exceeds capacity {}, clamping",
                settings.initial_organisms,
                settings.max_organisms
            );
            settings.initial_organisms = settings.max_organisms;
        }

        settings
    }
}

fn read_into<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => log::warn!("Ignoring malformed {}={:?}", key, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(Settings::from_lookup(|_| None), Settings::default());
    }

    #[test]
    fn values_are_parsed() {
        let settings = Settings::from_lookup(lookup_from(&[
            (ENV_INITIAL_ORGANISMS, "12"),
            (ENV_BOUNDS_X, " 15.5 "),
            (ENV_SEED, "99"),
        ]));
        assert_eq!(settings.initial_organisms, 12);
        assert_eq!(settings.bounds_x, 15.5);
        assert_eq!(settings.seed, 99);
    }

    #[test]
    fn malformed_and_inconsistent_values_fall_back() {
        let settings = Settings::from_lookup(lookup_from(&[
            (ENV_MAX_ORGANISMS, "8"),
            (ENV_INITIAL_ORGANISMS, "50"),
            (ENV_BOUNDS_Z, "-3"),
            (ENV_WORKER_THREADS, "lots"),
        ]));
        assert_eq!(settings.initial_organisms, 8);
        assert_eq!(settings.bounds_z, Settings::default().bounds_z);
        assert_eq!(settings.worker_threads, 0);
    }

    #[test]
    fn passive_config_disables_self_propulsion() {
        let config = SolverConfig::passive();
        assert_eq!(config.locomotion_force, 0.0);
        assert_eq!(config.pseudopod_force, 0.0);
        assert_eq!(config.cursor_strength, 0.0);
        assert!(config.contact_distance() > 0.0);
    }
}
