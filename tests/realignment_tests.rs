use cryomill::hardware::{GrabSettings, Microscope, SimMicroscope, Vector2};
use cryomill::imaging::PixelSize;
use cryomill::registration::{realign, RegistrationParams};

const PX: f64 = 1e-8;

fn settings() -> GrabSettings {
    GrabSettings {
        resolution: (128, 128),
        dwell_time_us: 0.2,
        pixel_size: PixelSize::isotropic(PX),
    }
}

#[test]
fn realign_cancels_injected_drift() {
    let mut scope = SimMicroscope::new(99);
    let settings = settings();
    let params = RegistrationParams::default();

    let reference = scope.grab_frame(&settings).unwrap();
    scope.add_drift(Vector2::new(5.0 * PX, -3.0 * PX));

    let current = scope.grab_frame(&settings).unwrap();
    let applied = realign(&mut scope, &reference, &current, &params).unwrap();
    assert!((applied.x - (-5.0 * PX)).abs() < 1e-12);
    assert!((applied.y - 3.0 * PX).abs() < 1e-12);

    // After correction the grabbed image matches the reference again.
    let corrected = scope.grab_frame(&settings).unwrap();
    assert_eq!(corrected.data(), reference.data());
}

#[test]
fn opposite_realignments_restore_beam_shift() {
    let mut scope = SimMicroscope::new(5);
    let settings = settings();
    let params = RegistrationParams::default();
    let original_shift = scope.current_beam_shift();

    let reference = scope.grab_frame(&settings).unwrap();

    scope.add_drift(Vector2::new(7.0 * PX, 2.0 * PX));
    let drifted = scope.grab_frame(&settings).unwrap();
    realign(&mut scope, &reference, &drifted, &params).unwrap();

    scope.add_drift(Vector2::new(-7.0 * PX, -2.0 * PX));
    let drifted_back = scope.grab_frame(&settings).unwrap();
    realign(&mut scope, &reference, &drifted_back, &params).unwrap();

    let final_shift = scope.current_beam_shift();
    assert!((final_shift.x - original_shift.x).abs() < 1e-12);
    assert!((final_shift.y - original_shift.y).abs() < 1e-12);
}

#[test]
fn limit_rejection_preserves_state_and_run() {
    // Travel limit below the needed correction: the realignment must not
    // fail, must apply nothing, and must leave the previous shift intact.
    let mut scope = SimMicroscope::new(12).with_shift_limit(2.0 * PX);
    let settings = settings();
    let params = RegistrationParams::default();

    let reference = scope.grab_frame(&settings).unwrap();
    scope.add_drift(Vector2::new(10.0 * PX, 0.0));
    let drifted = scope.grab_frame(&settings).unwrap();

    let applied = realign(&mut scope, &reference, &drifted, &params).unwrap();
    assert_eq!((applied.x, applied.y), (0.0, 0.0));
    assert_eq!(scope.current_beam_shift(), Vector2::new(0.0, 0.0));
}
