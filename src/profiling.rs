// --- File: profiling.rs ---
use std::time::{Duration, Instant};

/// Wall-clock time spent in each pipeline stage during the most recent tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineProfile {
    pub behavior_time: Duration,
    pub predict_time: Duration,
    pub grid_time: Duration,
    pub collision_time: Duration,
    pub constraint_time: Duration,
    pub finalize_time: Duration,
    pub aggregate_time: Duration,
    pub boundary_time: Duration,
    pub total_tick_time: Duration,

    pub particle_count: usize,
    pub contact_count: usize,
}

impl PipelineProfile {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn stages(&self) -> [(&'static str, Duration); 8] {
        [
            ("behavior", self.behavior_time),
            ("predict", self.predict_time),
            ("grid", self.grid_time),
            ("collision", self.collision_time),
            ("constraints", self.constraint_time),
            ("finalize", self.finalize_time),
            ("aggregates", self.aggregate_time),
            ("boundary", self.boundary_time),
        ]
    }

    pub fn report(&self) {
        let total_us = self.total_tick_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }

        log::debug!(
            "Tick {:.2} ms, {} particles, {} contacts",
            self.total_tick_time.as_secs_f32() * 1000.0,
            self.particle_count,
            self.contact_count
        );
        for (name, time) in self.stages() {
            log::debug!(
                "  {:<12} {:.3} ms ({:.1}%)",
                name,
                time.as_secs_f32() * 1000.0,
                (time.as_micros() as f32 / total_us) * 100.0
            );
        }
    }
}

/// Adds the time between construction and drop to `output`.
pub struct StageTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> StageTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl Drop for StageTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        *self.output += elapsed;
        log::trace!("stage took {:?}", elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_accumulates_on_drop() {
        let mut profile = PipelineProfile::default();
        {
            let _timer = StageTimer::new(&mut profile.predict_time);
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(profile.predict_time >= Duration::from_millis(2));
        profile.reset();
        assert_eq!(profile.predict_time, Duration::ZERO);
    }
}
