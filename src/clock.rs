// --- File: clock.rs ---
// Frame-rate independent stepping for callers that drive the solver from a render loop.

use crate::constants::{FIXED_TIMESTEP, MAX_STEPS_PER_FRAME};

/// Accumulates real frame time and hands out whole fixed ticks.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: f64,
    max_steps: usize,
    accumulator: f64,
}

impl Default for FixedTimestep {
    fn default() -> Self {
        Self::new(FIXED_TIMESTEP as f64, MAX_STEPS_PER_FRAME)
    }
}

impl FixedTimestep {
    pub fn new(step: f64, max_steps: usize) -> Self {
        Self {
            step,
            max_steps: max_steps.max(1),
            accumulator: 0.0,
        }
    }

    pub fn step(&self) -> f32 {
        self.step as f32
    }

    /// Adds `dt` seconds and returns how many ticks to run now. After a stall the count is
    /// capped at `max_steps` and the backlog is dropped rather than carried forward.
    pub fn advance(&mut self, dt: f64) -> usize {
        if !dt.is_finite() || dt <= 0.0 {
            return 0;
        }
        self.accumulator += dt;
        let due = (self.accumulator / self.step).floor() as usize;
        if due > self.max_steps {
            log::warn!(
                "Simulation fell behind by {} ticks, running {}",
                due,
                self.max_steps
            );
            self.accumulator = 0.0;
            return self.max_steps;
        }
        self.accumulator -= due as f64 * self.step;
        due
    }

    /// Fraction of a tick left in the accumulator, for render interpolation.
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.step).clamp(0.0, 1.0) as f32
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

/// Turns a spawn rate into whole spawns per frame until a target population is reached.
#[derive(Debug, Clone)]
pub struct SpawnPacer {
    rate: f32,
    remaining: usize,
    accumulator: f32,
}

impl SpawnPacer {
    /// `rate` is spawns per second; a non-positive rate releases everything at once.
    pub fn new(rate: f32, total: usize) -> Self {
        Self {
            rate,
            remaining: total,
            accumulator: 0.0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }

    pub fn due(&mut self, dt: f32) -> usize {
        if self.remaining == 0 {
            return 0;
        }
        if self.rate <= 0.0 {
            return std::mem::take(&mut self.remaining);
        }
        self.accumulator += self.rate * dt.max(0.0);
        let whole = (self.accumulator.floor() as usize).min(self.remaining);
        self.accumulator -= whole as f32;
        self.remaining -= whole;
        whole
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_partial_ticks() {
        let mut clock = FixedTimestep::new(0.01, 5);
        assert_eq!(clock.advance(0.004), 0);
        assert_eq!(clock.advance(0.007), 1);
        assert!((clock.alpha() - 0.1).abs() < 1e-4);
    }

    #[test]
    fn stall_is_clamped_and_dropped() {
        let mut clock = FixedTimestep::new(0.01, 5);
        assert_eq!(clock.advance(1.0), 5);
        assert_eq!(clock.alpha(), 0.0);
        assert_eq!(clock.advance(0.0), 0);
        assert_eq!(clock.advance(f64::NAN), 0);
    }

    #[test]
    fn pacer_releases_at_rate_and_stops() {
        let mut pacer = SpawnPacer::new(10.0, 4);
        assert_eq!(pacer.due(0.05), 0);
        assert_eq!(pacer.due(0.1), 1);
        assert_eq!(pacer.due(1.0), 3);
        assert!(pacer.is_done());
        assert_eq!(pacer.due(1.0), 0);

        let mut burst = SpawnPacer::new(0.0, 7);
        assert_eq!(burst.due(0.0), 7);
    }
}
