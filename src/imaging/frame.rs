use image::GrayImage;
use ndarray::Array2;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Physical pixel size of an acquired frame, meters per pixel.
///
/// Both axes are carried, but every coordinate conversion uses `x` for both
/// directions: the y pixel size is unreliable under sample tilt.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PixelSize {
    pub x: f64,
    pub y: f64,
}

impl PixelSize {
    pub fn isotropic(meters_per_pixel: f64) -> Self {
        Self {
            x: meters_per_pixel,
            y: meters_per_pixel,
        }
    }
}

/// An acquired image: grayscale intensities in [0, 1] plus the physical
/// pixel size. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Array2<f32>,
    pixel_size: PixelSize,
}

impl Frame {
    pub fn new(data: Array2<f32>, pixel_size: PixelSize) -> Self {
        Self { data, pixel_size }
    }

    /// Load a grayscale image from disk; intensities are scaled to [0, 1].
    pub fn load<P: AsRef<Path>>(path: P, pixel_size: PixelSize) -> Result<Self> {
        let img = image::open(path)?.to_luma8();
        let (width, height) = (img.width() as usize, img.height() as usize);
        let mut data = Array2::zeros((height, width));
        for y in 0..height {
            for x in 0..width {
                data[[y, x]] = img.get_pixel(x as u32, y as u32)[0] as f32 / 255.0;
            }
        }
        Ok(Self { data, pixel_size })
    }

    /// Save as 8-bit grayscale; intensities are clamped to [0, 1].
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let (height, width) = self.data.dim();
        let img = GrayImage::from_fn(width as u32, height as u32, |x, y| {
            let v = self.data[[y as usize, x as usize]].clamp(0.0, 1.0);
            image::Luma([(v * 255.0).round() as u8])
        });
        img.save(path)?;
        Ok(())
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn pixel_size(&self) -> PixelSize {
        self.pixel_size
    }

    /// (height, width) in pixels, matching `ndarray` row/column order.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn validate_min_size(&self, min_size: usize) -> Result<()> {
        if self.width() < min_size || self.height() < min_size {
            return Err(Error::OutOfRange {
                name: "image dimension",
                value: self.width().min(self.height()) as f64,
                min: min_size as f64,
                max: f64::INFINITY,
            });
        }
        Ok(())
    }
}

/// Filename for an intermediate ion-beam image, encoding lamella index,
/// milling stage index and processing step.
pub fn step_image_path(dir: &Path, lamella: usize, stage: usize, step: &str) -> PathBuf {
    dir.join(format!("IB_lamella{lamella}_stage{stage}_{step}.tif"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_image_names_encode_indices() {
        let path = step_image_path(Path::new("/out"), 3, 1, "aligned");
        assert_eq!(
            path,
            PathBuf::from("/out/IB_lamella3_stage1_aligned.tif")
        );
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let data = Array2::from_shape_fn((16, 24), |(y, x)| ((x + y) % 8) as f32 / 8.0);
        let frame = Frame::new(data, PixelSize::isotropic(1e-6));
        frame.save(&path).unwrap();

        let loaded = Frame::load(&path, PixelSize::isotropic(1e-6)).unwrap();
        assert_eq!(loaded.shape(), (16, 24));
        for (a, b) in frame.data().iter().zip(loaded.data().iter()) {
            assert!((a - b).abs() < 1.0 / 255.0 + 1e-6);
        }
    }
}
