use crate::error::{Error, Result};
use crate::hardware::{Microscope, Vector2};
use crate::imaging::Frame;

use super::phase_correlation::{estimate_shift, RegistrationParams};

/// A beam-shift correction in meters, hardware axis convention.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct RealShift {
    pub x: f64,
    pub y: f64,
}

/// Measure the drift between `reference` and `current` and compensate it by
/// updating the hardware beam shift. Returns the shift actually applied.
///
/// Drift correction is best-effort: when the deflector rejects the new
/// shift as out of travel, the rejection is logged and the previous beam
/// shift stays in effect so the milling run can continue.
pub fn realign(
    scope: &mut dyn Microscope,
    reference: &Frame,
    current: &Frame,
    params: &RegistrationParams,
) -> Result<RealShift> {
    let pixel_shift = estimate_shift(reference, current, params)?;
    let pixel_size = reference.pixel_size();

    // Hardware y runs opposite the image row direction.
    let correction = RealShift {
        x: pixel_shift.dx as f64 * pixel_size.x,
        y: -pixel_shift.dy as f64 * pixel_size.x,
    };

    let current_shift = scope.beam_shift()?;
    let target = current_shift + Vector2::new(correction.x, correction.y);
    match scope.set_beam_shift(target) {
        Ok(()) => {
            tracing::debug!(
                dx_px = pixel_shift.dx,
                dy_px = pixel_shift.dy,
                shift_x_m = correction.x,
                shift_y_m = correction.y,
                "beam shift realigned"
            );
            Ok(correction)
        }
        Err(Error::HardwareLimitExceeded {
            requested_x,
            requested_y,
            limit,
        }) => {
            tracing::warn!(
                requested_x,
                requested_y,
                limit,
                "beam shift rejected by hardware, continuing uncorrected"
            );
            Ok(RealShift::default())
        }
        Err(other) => Err(other),
    }
}
