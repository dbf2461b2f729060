use cryomill::imaging::masks::{normalize, roll};
use cryomill::imaging::{Frame, PixelSize};
use cryomill::registration::{estimate_shift, RegistrationParams};
use cryomill::Error;
use ndarray::Array2;
use rand::{Rng, SeedableRng};

fn random_frame(width: usize, height: usize, seed: u64) -> Frame {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let data = Array2::from_shape_fn((height, width), |_| rng.gen::<f32>());
    Frame::new(data, PixelSize::isotropic(1e-8))
}

fn shifted_copy(frame: &Frame, sx: i64, sy: i64) -> Frame {
    Frame::new(roll(frame.data(), sy, sx), frame.pixel_size())
}

#[test]
fn known_shift_is_recovered_negated() {
    let reference = random_frame(512, 512, 42);
    let params = RegistrationParams::default();

    for &(sx, sy) in &[(7, 4), (-12, 9), (0, -25), (31, 0)] {
        let target = shifted_copy(&reference, sx, sy);
        let shift = estimate_shift(&reference, &target, &params).unwrap();
        assert_eq!(
            (shift.dx, shift.dy),
            (-sx, -sy),
            "shift ({sx}, {sy}) not corrected"
        );
    }
}

#[test]
fn zero_shift_for_identical_frames() {
    let reference = random_frame(256, 256, 7);
    let shift = estimate_shift(&reference, &reference, &RegistrationParams::default()).unwrap();
    assert_eq!((shift.dx, shift.dy), (0, 0));
}

#[test]
fn non_square_frames_register_too() {
    let reference = random_frame(320, 224, 3);
    let target = shifted_copy(&reference, -6, 11);
    let shift = estimate_shift(&reference, &target, &RegistrationParams::default()).unwrap();
    assert_eq!((shift.dx, shift.dy), (6, -11));
}

#[test]
fn shape_mismatch_is_rejected() {
    let reference = random_frame(128, 128, 1);
    let target = random_frame(128, 96, 1);
    let err = estimate_shift(&reference, &target, &RegistrationParams::default()).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}

#[test]
fn zero_frames_are_degenerate() {
    let dark = Frame::new(Array2::zeros((64, 64)), PixelSize::isotropic(1e-8));
    let err = estimate_shift(&dark, &dark, &RegistrationParams::default()).unwrap_err();
    assert!(matches!(err, Error::DegenerateImage { .. }));
}

#[test]
fn structureless_frames_still_return_a_shift() {
    // A constant frame survives masking with mask-shaped contrast; the
    // correlation surface is then dominated by the windows and the peak is
    // arbitrary. The contract is only that the call does not fail.
    let flat = Frame::new(Array2::from_elem((64, 64), 0.5), PixelSize::isotropic(1e-8));
    assert!(estimate_shift(&flat, &flat, &RegistrationParams::default()).is_ok());
}

#[test]
fn normalize_yields_zero_mean_unit_std() {
    let frame = random_frame(200, 150, 11);
    let normed = normalize(frame.data()).unwrap();
    let n = normed.len() as f32;
    let mean = normed.sum() / n;
    let std = (normed.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n).sqrt();
    assert!(mean.abs() < 1e-4);
    assert!((std - 1.0).abs() < 1e-3);
}
