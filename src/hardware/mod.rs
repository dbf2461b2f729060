//! Capability interface over the microscope.
//!
//! All hardware state (beam shift, stage tilt, the patterning queue) is
//! owned by the implementation behind this trait. Callers read it fresh for
//! every operation and never cache it; the whole system runs one
//! operator-driven workflow at a time, so no concurrent mutation exists.

pub mod sim;

use crate::error::Result;
use crate::imaging::{Frame, PixelSize, RealCoord};

pub use sim::SimMicroscope;

/// A beam-shift vector in meters, hardware axis convention (y up).
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Vector2 {
    type Output = Vector2;
    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Acquisition settings for a single image grab.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GrabSettings {
    /// (width, height) in pixels.
    pub resolution: (usize, usize),
    pub dwell_time_us: f64,
    pub pixel_size: PixelSize,
}

/// Scan direction of a cleaning cross section; material is removed stepping
/// toward the lamella face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScanDirection {
    TopToBottom,
    BottomToTop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PatternKind {
    Rectangle,
    CleaningCrossSection,
}

/// One milling pattern, placed in real-space coordinates of the current
/// ion-beam image.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MillPattern {
    pub kind: PatternKind,
    pub center: RealCoord,
    /// Pattern extent in meters.
    pub width: f64,
    pub height: f64,
    /// Milling depth in meters.
    pub depth: f64,
    pub scan_direction: ScanDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MillingState {
    Idle,
    Running,
    Paused,
}

/// The operations the workflow needs from the instrument. Every call blocks
/// until the hardware answers; no timeouts are enforced.
pub trait Microscope {
    fn grab_frame(&mut self, settings: &GrabSettings) -> Result<Frame>;

    fn beam_shift(&mut self) -> Result<Vector2>;

    /// May fail with `HardwareLimitExceeded` when the requested shift is
    /// outside the deflector's travel; the previous shift stays in effect.
    fn set_beam_shift(&mut self, shift: Vector2) -> Result<()>;

    /// Relative stage tilt in degrees (overtilt in, overtilt out).
    fn move_stage_relative(&mut self, tilt_degrees: f64) -> Result<()>;

    fn set_beam_current(&mut self, amps: f64) -> Result<()>;

    fn clear_patterns(&mut self) -> Result<()>;
    fn create_pattern(&mut self, pattern: &MillPattern) -> Result<()>;

    fn start_milling(&mut self) -> Result<()>;
    fn pause_milling(&mut self) -> Result<()>;
    fn resume_milling(&mut self) -> Result<()>;
    fn stop_milling(&mut self) -> Result<()>;
    fn milling_state(&mut self) -> Result<MillingState>;
}
