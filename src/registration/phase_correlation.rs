//! FFT cross-correlation between a reference and a drifted image.
//!
//! The reference keeps a tight circular window to suppress the milled
//! fiducial frame edges; the target gets a looser rectangular window. The
//! asymmetry is a tunable default, not a load-bearing invariant.

use ndarray::Array2;
use num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::{Error, Result};
use crate::imaging::masks::{bandpass_mask, circular_mask, normalize, rectangular_mask};
use crate::imaging::Frame;

/// Integer pixel displacement, x/y order. Positive x points right,
/// positive y points down (image convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PixelShift {
    pub dx: i64,
    pub dy: i64,
}

/// Tunable registration parameters.
///
/// The bandpass defaults (outer radius a third of the smaller dimension,
/// inner radius 2 px, blur sigma 3) come from experimental tuning on SEM
/// drift series and are exposed through the config file.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegistrationParams {
    /// Blur sigma for the spatial windows on both images.
    pub mask_sigma: f32,
    /// Bandpass outer radius as a fraction of the smaller image dimension.
    pub bandpass_outer_fraction: f32,
    /// Bandpass inner radius in frequency bins; excludes DC and slow shading.
    pub bandpass_inner_radius: f32,
    /// Blur sigma for the bandpass annulus.
    pub bandpass_sigma: f32,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        Self {
            mask_sigma: 3.0,
            bandpass_outer_fraction: 1.0 / 3.0,
            bandpass_inner_radius: 2.0,
            bandpass_sigma: 3.0,
        }
    }
}

/// Estimate the integer pixel shift that moves `target` back onto
/// `reference`.
///
/// For a target drifted by `(sx, sy)` relative to the reference the result
/// is `(-sx, -sy)`, i.e. the correction to apply. If neither image carries
/// signal the correlation surface is flat and the peak location is
/// arbitrary; this is a known limitation and is not detected here.
pub fn estimate_shift(
    reference: &Frame,
    target: &Frame,
    params: &RegistrationParams,
) -> Result<PixelShift> {
    if reference.shape() != target.shape() {
        return Err(Error::ShapeMismatch {
            reference: reference.shape(),
            target: target.shape(),
        });
    }
    let shape = reference.shape();
    let (height, width) = shape;

    let ref_mask = circular_mask(shape, None, params.mask_sigma);
    let tgt_mask = rectangular_mask(shape, None, None, params.mask_sigma);
    let ref_windowed = normalize(&(reference.data() * &ref_mask))?;
    let tgt_windowed = normalize(&(target.data() * &tgt_mask))?;

    let mut ref_fft = to_complex(&ref_windowed);
    let mut tgt_fft = to_complex(&tgt_windowed);
    fft2d(&mut ref_fft, FftDirection::Forward);
    fft2d(&mut tgt_fft, FftDirection::Forward);

    // Bandpass only the drifted image; the reference spectrum stays intact.
    let outer = params.bandpass_outer_fraction * height.min(width) as f32;
    let bandpass = bandpass_mask(
        shape,
        outer,
        params.bandpass_inner_radius,
        params.bandpass_sigma,
    );
    for ((y, x), value) in tgt_fft.indexed_iter_mut() {
        *value *= bandpass[[y, x]];
    }

    let mut cross = Array2::from_shape_fn(shape, |(y, x)| {
        ref_fft[[y, x]] * tgt_fft[[y, x]].conj()
    });
    fft2d(&mut cross, FftDirection::Inverse);

    let (peak_row, peak_col) = magnitude_peak(&cross);
    Ok(PixelShift {
        dx: wrap_index(peak_col, width),
        dy: wrap_index(peak_row, height),
    })
}

/// Map a correlation peak index to a signed shift: indices past the halfway
/// point alias to their negative equivalents.
fn wrap_index(index: usize, dim: usize) -> i64 {
    if index > dim / 2 {
        index as i64 - dim as i64
    } else {
        index as i64
    }
}

fn to_complex(data: &Array2<f32>) -> Array2<Complex<f32>> {
    data.mapv(|v| Complex::new(v, 0.0))
}

enum FftDirection {
    Forward,
    Inverse,
}

/// In-place 2D FFT as a row pass followed by a column pass. The inverse
/// direction folds in the 1/(w*h) scaling.
fn fft2d(data: &mut Array2<Complex<f32>>, direction: FftDirection) {
    let (height, width) = data.dim();
    let mut planner = FftPlanner::new();

    let (row_fft, col_fft, scale) = match direction {
        FftDirection::Forward => (
            planner.plan_fft_forward(width),
            planner.plan_fft_forward(height),
            1.0,
        ),
        FftDirection::Inverse => (
            planner.plan_fft_inverse(width),
            planner.plan_fft_inverse(height),
            1.0 / (width * height) as f32,
        ),
    };

    let mut row_buf: Vec<Complex<f32>> = Vec::with_capacity(width);
    for mut row in data.rows_mut() {
        row_buf.clear();
        row_buf.extend(row.iter().copied());
        row_fft.process(&mut row_buf);
        for (slot, value) in row.iter_mut().zip(&row_buf) {
            *slot = *value;
        }
    }

    let mut col_buf: Vec<Complex<f32>> = Vec::with_capacity(height);
    for mut col in data.columns_mut() {
        col_buf.clear();
        col_buf.extend(col.iter().copied());
        col_fft.process(&mut col_buf);
        for (slot, value) in col.iter_mut().zip(&col_buf) {
            *slot = *value * scale;
        }
    }
}

fn magnitude_peak(correlation: &Array2<Complex<f32>>) -> (usize, usize) {
    let mut max_val = f32::NEG_INFINITY;
    let mut peak = (0, 0);
    for ((y, x), value) in correlation.indexed_iter() {
        let magnitude = value.norm_sqr();
        if magnitude > max_val {
            max_val = magnitude;
            peak = (y, x);
        }
    }
    peak
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_index_aliases_upper_half() {
        assert_eq!(wrap_index(0, 64), 0);
        assert_eq!(wrap_index(32, 64), 32);
        assert_eq!(wrap_index(33, 64), -31);
        assert_eq!(wrap_index(63, 64), -1);
    }
}
