use crate::config::{animation, AnimationConfig};

/// Step count and per-step pacing of a reveal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationTiming {
    pub duration_ms: u32,
    pub base_steps: u32,
    pub step_duration_divisor: u32,
    pub initial_delay_ms: u32,
    pub final_delay_ms: u32,
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            duration_ms: animation::SPIN_DURATION_MS,
            base_steps: animation::BASE_STEP_FLOOR,
            step_duration_divisor: animation::STEP_DURATION_DIVISOR,
            initial_delay_ms: animation::INITIAL_DELAY_MS,
            final_delay_ms: animation::FINAL_DELAY_MS,
        }
    }
}

impl From<&AnimationConfig> for AnimationTiming {
    fn from(config: &AnimationConfig) -> Self {
        Self {
            duration_ms: config.spin_duration,
            base_steps: config.base_steps,
            step_duration_divisor: config.step_duration_divisor,
            initial_delay_ms: config.initial_delay,
            final_delay_ms: config.final_delay,
        }
    }
}

/// `1 - (1 - x)^3`
pub fn ease_out_cubic(x: f64) -> f64 {
    1.0 - (1.0 - x).powi(3)
}

impl AnimationTiming {
    /// Never more than `MAX_STEPS`
    pub fn total_steps(&self) -> u32 {
        self.base_steps
            .saturating_add(self.duration_ms / self.step_duration_divisor.max(1))
            .min(animation::MAX_STEPS)
    }

    /// Delay in ms to wait after `step` frames have been shown.
    /// Grows from the initial towards the final delay, fast then slow.
    pub fn delay_after(&self, step: u32) -> u64 {
        let total = self.total_steps();
        let progress = if total == 0 {
            1.0
        } else {
            (f64::from(step) / f64::from(total)).clamp(0.0, 1.0)
        };
        let initial = f64::from(self.initial_delay_ms);
        let span = f64::from(self.final_delay_ms) - initial;
        (initial + span * ease_out_cubic(progress)).max(0.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_step_count() {
        assert_eq!(AnimationTiming::default().total_steps(), 70);
        let zero_divisor = AnimationTiming {
            step_duration_divisor: 0,
            ..AnimationTiming::default()
        };
        assert_eq!(zero_divisor.total_steps(), animation::MAX_STEPS);
    }

    #[test]
    fn test_step_count_saturates() {
        let huge = AnimationTiming {
            base_steps: u32::MAX,
            duration_ms: 4000,
            ..AnimationTiming::default()
        };
        assert_eq!(huge.total_steps(), animation::MAX_STEPS);

        let long_spin = AnimationTiming {
            duration_ms: u32::MAX,
            step_duration_divisor: 1,
            ..AnimationTiming::default()
        };
        assert_eq!(long_spin.total_steps(), animation::MAX_STEPS);
        assert_eq!(long_spin.delay_after(animation::MAX_STEPS), 400);
    }

    #[test]
    fn test_delay_curve() {
        let timing = AnimationTiming::default();
        assert_eq!(timing.delay_after(0), 50);
        assert_eq!(timing.delay_after(70), 400);
        // halfway: 50 + 350 * 0.875
        assert_eq!(timing.delay_after(35), 356);

        let mut previous = 0;
        for step in 0..=70 {
            let delay = timing.delay_after(step);
            assert!(delay >= previous, "step {step}");
            previous = delay;
        }
    }

    #[test]
    fn test_from_config() {
        let mut config = AnimationConfig::default();
        config.spin_duration = 2000;
        config.base_steps = 10;
        let timing = AnimationTiming::from(&config);
        assert_eq!(timing.total_steps(), 30);
    }
}
