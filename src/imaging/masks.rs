//! Normalization and soft-edged masks applied before Fourier transforms.
//!
//! Hard mask edges leak energy across the whole spectrum, so every spatial
//! mask is Gaussian blurred before use. The bandpass mask lives in the
//! frequency domain and is rolled so the zero-frequency bin sits at (0, 0),
//! matching the unshifted layout of the FFT output it multiplies.

use ndarray::Array2;

use crate::error::{Error, Result};

/// Zero-mean, unit-variance copy of `data`.
///
/// Fails on a flat image: a zero-variance input carries no signal to
/// register against.
pub fn normalize(data: &Array2<f32>) -> Result<Array2<f32>> {
    let n = data.len() as f32;
    let mean = data.sum() / n;
    let variance = data.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    let std = variance.sqrt();
    if std <= f32::EPSILON {
        return Err(Error::DegenerateImage {
            operation: "normalize",
        });
    }
    Ok(data.mapv(|v| (v - mean) / std))
}

/// Separable Gaussian blur with replicated edges. `sigma <= 0` is a no-op.
pub fn gaussian_blur(data: &Array2<f32>, sigma: f32) -> Array2<f32> {
    if sigma <= 0.0 {
        return data.clone();
    }
    let radius = (3.0 * sigma).ceil() as i64;
    let kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let norm: f32 = kernel.iter().sum();
    let kernel: Vec<f32> = kernel.iter().map(|v| v / norm).collect();

    let (height, width) = data.dim();
    let clamp = |i: i64, n: usize| i.clamp(0, n as i64 - 1) as usize;

    let mut rows_pass = Array2::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let xi = clamp(x as i64 + k as i64 - radius, width);
                acc += data[[y, xi]] * w;
            }
            rows_pass[[y, x]] = acc;
        }
    }

    let mut out = Array2::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let yi = clamp(y as i64 + k as i64 - radius, height);
                acc += rows_pass[[yi, x]] * w;
            }
            out[[y, x]] = acc;
        }
    }
    out
}

/// Soft circular window centered on the image.
///
/// Default radius is 45% of the smaller dimension, leaving a 5% margin to
/// the nearest edge before the blur rolls off.
pub fn circular_mask(shape: (usize, usize), radius: Option<f32>, sigma: f32) -> Array2<f32> {
    let (height, width) = shape;
    let radius = radius.unwrap_or(0.45 * height.min(width) as f32);
    let (cy, cx) = (height as f32 / 2.0, width as f32 / 2.0);

    let mask = Array2::from_shape_fn(shape, |(y, x)| {
        let dy = y as f32 - cy;
        let dx = x as f32 - cx;
        if (dx * dx + dy * dy).sqrt() <= radius {
            1.0
        } else {
            0.0
        }
    });
    gaussian_blur(&mask, sigma)
}

/// Soft rectangular window; defaults to the central 90% of the image.
///
/// `start` and `extent` are (row, col) fractions of the image shape.
pub fn rectangular_mask(
    shape: (usize, usize),
    start: Option<(f32, f32)>,
    extent: Option<(f32, f32)>,
    sigma: f32,
) -> Array2<f32> {
    let (height, width) = shape;
    let start = start.unwrap_or((0.05, 0.05));
    let extent = extent.unwrap_or((0.9, 0.9));
    let y0 = start.0 * height as f32;
    let x0 = start.1 * width as f32;
    let y1 = y0 + extent.0 * height as f32;
    let x1 = x0 + extent.1 * width as f32;

    let mask = Array2::from_shape_fn(shape, |(y, x)| {
        let (yf, xf) = (y as f32, x as f32);
        if yf >= y0 && yf < y1 && xf >= x0 && xf < x1 {
            1.0
        } else {
            0.0
        }
    });
    gaussian_blur(&mask, sigma)
}

/// Annular frequency-domain mask: 1 between `inner_radius` and
/// `outer_radius` around the spectrum center, blurred, then rolled so the
/// zero-frequency bin lands at (0, 0).
pub fn bandpass_mask(
    shape: (usize, usize),
    outer_radius: f32,
    inner_radius: f32,
    sigma: f32,
) -> Array2<f32> {
    let (height, width) = shape;
    let (cy, cx) = (height / 2, width / 2);

    let annulus = Array2::from_shape_fn(shape, |(y, x)| {
        let dy = y as f32 - cy as f32;
        let dx = x as f32 - cx as f32;
        let r = (dx * dx + dy * dy).sqrt();
        if r >= inner_radius && r <= outer_radius {
            1.0
        } else {
            0.0
        }
    });
    let blurred = gaussian_blur(&annulus, sigma);
    roll(&blurred, -(cy as i64), -(cx as i64))
}

/// Circularly shift an array; positive shifts move content toward higher
/// indices.
pub fn roll(data: &Array2<f32>, shift_y: i64, shift_x: i64) -> Array2<f32> {
    let (height, width) = data.dim();
    Array2::from_shape_fn((height, width), |(y, x)| {
        let sy = (y as i64 - shift_y).rem_euclid(height as i64) as usize;
        let sx = (x as i64 - shift_x).rem_euclid(width as i64) as usize;
        data[[sy, sx]]
    })
}
