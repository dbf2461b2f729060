//! Deterministic in-memory microscope used by tests and `--simulate` runs.
//!
//! The simulated sample is seeded noise. Grabbed frames see the sample
//! displaced by the current drift plus the applied beam shift, so a correct
//! realignment brings the image back to its reference position exactly as
//! on the real instrument.

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_distr::Uniform;

use crate::error::{Error, Result};
use crate::imaging::masks::roll;
use crate::imaging::Frame;

use super::{GrabSettings, Microscope, MillPattern, MillingState, Vector2};

pub struct SimMicroscope {
    seed: u64,
    scene: Option<Array2<f32>>,
    /// Uncorrected sample drift in meters, hardware axes.
    drift: Vector2,
    beam_shift: Vector2,
    /// Per-component beam-shift travel limit in meters.
    shift_limit: f64,
    stage_tilt_degrees: f64,
    beam_current: f64,
    patterns: Vec<MillPattern>,
    state: MillingState,
    /// How many state polls a started job stays `Running` before finishing.
    polls_per_stage: u32,
    polls_remaining: u32,
}

impl SimMicroscope {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            scene: None,
            drift: Vector2::default(),
            beam_shift: Vector2::default(),
            shift_limit: 5e-5,
            stage_tilt_degrees: 0.0,
            beam_current: 0.0,
            patterns: Vec::new(),
            state: MillingState::Idle,
            polls_per_stage: 3,
            polls_remaining: 0,
        }
    }

    pub fn with_shift_limit(mut self, limit: f64) -> Self {
        self.shift_limit = limit;
        self
    }

    pub fn with_polls_per_stage(mut self, polls: u32) -> Self {
        self.polls_per_stage = polls;
        self
    }

    /// Inject uncorrected sample drift, as the cryo stage would.
    pub fn add_drift(&mut self, drift: Vector2) {
        self.drift = self.drift + drift;
    }

    pub fn current_beam_shift(&self) -> Vector2 {
        self.beam_shift
    }

    pub fn stage_tilt_degrees(&self) -> f64 {
        self.stage_tilt_degrees
    }

    pub fn beam_current(&self) -> f64 {
        self.beam_current
    }

    pub fn patterns(&self) -> &[MillPattern] {
        &self.patterns
    }

    fn scene(&mut self, resolution: (usize, usize)) -> &Array2<f32> {
        let (width, height) = resolution;
        if matches!(&self.scene, Some(scene) if scene.dim() != (height, width)) {
            self.scene = None;
        }
        let seed = self.seed;
        self.scene.get_or_insert_with(|| {
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            let dist = Uniform::new(0.0f32, 1.0f32);
            Array2::from_shape_fn((height, width), |_| rng.sample(dist))
        })
    }
}

impl Microscope for SimMicroscope {
    fn grab_frame(&mut self, settings: &GrabSettings) -> Result<Frame> {
        let pixel_size = settings.pixel_size;
        // Residual displacement seen by the detector. Hardware y points up,
        // image rows point down, hence the sign flip on y.
        let offset_x = ((self.drift.x + self.beam_shift.x) / pixel_size.x).round() as i64;
        let offset_y = (-(self.drift.y + self.beam_shift.y) / pixel_size.x).round() as i64;
        let scene = self.scene(settings.resolution);
        let data = roll(scene, offset_y, offset_x);
        Ok(Frame::new(data, pixel_size))
    }

    fn beam_shift(&mut self) -> Result<Vector2> {
        Ok(self.beam_shift)
    }

    fn set_beam_shift(&mut self, shift: Vector2) -> Result<()> {
        if shift.x.abs() > self.shift_limit || shift.y.abs() > self.shift_limit {
            return Err(Error::HardwareLimitExceeded {
                requested_x: shift.x,
                requested_y: shift.y,
                limit: self.shift_limit,
            });
        }
        self.beam_shift = shift;
        Ok(())
    }

    fn move_stage_relative(&mut self, tilt_degrees: f64) -> Result<()> {
        self.stage_tilt_degrees += tilt_degrees;
        Ok(())
    }

    fn set_beam_current(&mut self, amps: f64) -> Result<()> {
        self.beam_current = amps;
        Ok(())
    }

    fn clear_patterns(&mut self) -> Result<()> {
        self.patterns.clear();
        Ok(())
    }

    fn create_pattern(&mut self, pattern: &MillPattern) -> Result<()> {
        self.patterns.push(pattern.clone());
        Ok(())
    }

    fn start_milling(&mut self) -> Result<()> {
        self.state = MillingState::Running;
        self.polls_remaining = self.polls_per_stage;
        Ok(())
    }

    fn pause_milling(&mut self) -> Result<()> {
        if self.state == MillingState::Running {
            self.state = MillingState::Paused;
        }
        Ok(())
    }

    fn resume_milling(&mut self) -> Result<()> {
        if self.state == MillingState::Paused {
            self.state = MillingState::Running;
        }
        Ok(())
    }

    fn stop_milling(&mut self) -> Result<()> {
        self.state = MillingState::Idle;
        self.polls_remaining = 0;
        Ok(())
    }

    fn milling_state(&mut self) -> Result<MillingState> {
        if self.state == MillingState::Running {
            if self.polls_remaining == 0 {
                self.state = MillingState::Idle;
            } else {
                self.polls_remaining -= 1;
            }
        }
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::PixelSize;

    fn settings() -> GrabSettings {
        GrabSettings {
            resolution: (64, 64),
            dwell_time_us: 0.2,
            pixel_size: PixelSize::isotropic(1e-8),
        }
    }

    #[test]
    fn grabs_are_deterministic_for_a_seed() {
        let mut a = SimMicroscope::new(7);
        let mut b = SimMicroscope::new(7);
        let fa = a.grab_frame(&settings()).unwrap();
        let fb = b.grab_frame(&settings()).unwrap();
        assert_eq!(fa.data(), fb.data());
    }

    #[test]
    fn beam_shift_limit_preserves_previous_state() {
        let mut scope = SimMicroscope::new(1).with_shift_limit(1e-6);
        scope.set_beam_shift(Vector2::new(5e-7, 0.0)).unwrap();
        let err = scope.set_beam_shift(Vector2::new(2e-6, 0.0)).unwrap_err();
        assert!(matches!(err, Error::HardwareLimitExceeded { .. }));
        assert_eq!(scope.current_beam_shift(), Vector2::new(5e-7, 0.0));
    }

    #[test]
    fn milling_job_finishes_after_configured_polls() {
        let mut scope = SimMicroscope::new(1).with_polls_per_stage(2);
        scope.start_milling().unwrap();
        assert_eq!(scope.milling_state().unwrap(), MillingState::Running);
        assert_eq!(scope.milling_state().unwrap(), MillingState::Running);
        assert_eq!(scope.milling_state().unwrap(), MillingState::Idle);
    }
}
