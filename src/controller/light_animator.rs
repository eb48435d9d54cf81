use rand::Rng;

use crate::model::AnimatedLight;

/// Candle flicker: advance phase by a fixed step, return the new intensity.
pub struct LightAnimator {
    pub step: f64,
    /// Initial phases are drawn from `[0, phase_range)`.
    pub phase_range: f64,
}

impl LightAnimator {
    pub fn new(step: f64, phase_range: f64) -> Self {
        Self { step, phase_range }
    }

    /// One tick. Wall-clock time is never consulted.
    pub fn tick(&self, light: &mut AnimatedLight) -> f32 {
        light.advance(self.step);
        light.intensity()
    }

    pub fn random_phase(&self, rng: &mut impl Rng) -> f64 {
        if self.phase_range > 0.0 {
            rng.gen_range(0.0..self.phase_range)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::TAU;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::model::{flicker_intensity, LightId};

    #[test]
    fn zero_phase_gives_base() {
        assert_eq!(flicker_intensity(100.0, 20.0, 0.0), 100.0);
    }

    #[test]
    fn intensity_is_periodic_and_bounded() {
        for i in 0..200 {
            let phase = i as f64 * 0.37;
            let a = flicker_intensity(100.0, 20.0, phase);
            let b = flicker_intensity(100.0, 20.0, phase + TAU);
            assert!((a - b).abs() < 1e-3, "phase {phase}: {a} vs {b}");
            assert!((80.0..=120.0).contains(&a));
        }
    }

    #[test]
    fn tick_advances_by_the_fixed_step() {
        let animator = LightAnimator::new(0.05, 100.0);
        let mut light = AnimatedLight::new(LightId(0), 100.0, 20.0, 1.0);
        let mut last = light.phase();
        for _ in 0..10 {
            let intensity = animator.tick(&mut light);
            assert!(light.phase() > last);
            assert!((light.phase() - last - 0.05).abs() < 1e-9);
            assert_eq!(intensity, light.intensity());
            last = light.phase();
        }
    }

    #[test]
    fn step_stays_exact_at_large_phases() {
        let animator = LightAnimator::new(0.05, 100.0);
        for start in [65_536.0, 1_048_576.0] {
            let mut light = AnimatedLight::new(LightId(0), 100.0, 20.0, start);
            let mut last = light.phase();
            for _ in 0..1000 {
                animator.tick(&mut light);
                assert!((light.phase() - last - 0.05).abs() < 1e-6, "start {start}");
                last = light.phase();
            }
            assert!((light.phase() - start - 50.0).abs() < 1e-6, "start {start}");
        }
    }

    #[test]
    fn random_phases_stay_in_range_and_differ() {
        let animator = LightAnimator::new(0.05, 100.0);
        let mut rng = StdRng::seed_from_u64(7);
        let phases: Vec<f64> = (0..16).map(|_| animator.random_phase(&mut rng)).collect();
        assert!(phases.iter().all(|p| (0.0..100.0).contains(p)));
        assert!(phases.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn empty_phase_range_starts_at_zero() {
        let animator = LightAnimator::new(0.05, 0.0);
        assert_eq!(animator.random_phase(&mut rand::thread_rng()), 0.0);
    }
}
