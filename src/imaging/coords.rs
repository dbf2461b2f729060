//! Conversions between the three coordinate spaces used on a frame.
//!
//! - **pixel**: origin top-left, y increases downward, integer valued.
//! - **real-space**: origin at the frame center, y increases upward, meters.
//! - **relative**: origin top-left, both axes in [0, 1].
//!
//! All conversions use the x pixel size for both axes: the y pixel size is
//! distorted by sample tilt, so an isotropic scale is the more robust choice.
//! Pixel results are rounded to the nearest integer (hardware addressing is
//! pixel granular), so pixel round trips are exact only to ±1 quantization;
//! the relative ↔ real-space path has no rounding stage and is exact.

use crate::error::{Error, Result};
use crate::imaging::frame::{Frame, PixelSize};

/// Pixel coordinate, origin top-left, y down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PixelCoord {
    pub x: i64,
    pub y: i64,
}

/// Real-space coordinate in meters, origin at frame center, y up.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RealCoord {
    pub x: f64,
    pub y: f64,
}

/// Relative coordinate, origin top-left, both components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RelativeCoord {
    pub x: f64,
    pub y: f64,
}

impl RelativeCoord {
    fn validate(&self) -> Result<()> {
        for (name, value) in [("relative x", self.x), ("relative y", self.y)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::OutOfRange {
                    name,
                    value,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        Ok(())
    }
}

/// Frame dimensions plus pixel size; everything a conversion needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub width: usize,
    pub height: usize,
    pub pixel_size: PixelSize,
}

impl FrameGeometry {
    pub fn new(width: usize, height: usize, pixel_size: PixelSize) -> Self {
        Self {
            width,
            height,
            pixel_size,
        }
    }

    /// Continuous pixel position of a real-space point, before rounding.
    fn real_to_pixel_f(&self, real: RealCoord) -> (f64, f64) {
        let fx = real.x / self.pixel_size.x + self.width as f64 / 2.0;
        // Real-space y increases upward, pixel y downward.
        let fy = self.height as f64 - (real.y / self.pixel_size.x + self.height as f64 / 2.0);
        (fx, fy)
    }

    pub fn real_to_pixel(&self, real: RealCoord) -> PixelCoord {
        let (fx, fy) = self.real_to_pixel_f(real);
        PixelCoord {
            x: fx.round() as i64,
            y: fy.round() as i64,
        }
    }

    pub fn pixel_to_real(&self, pixel: PixelCoord) -> RealCoord {
        RealCoord {
            x: (pixel.x as f64 - self.width as f64 / 2.0) * self.pixel_size.x,
            y: (self.height as f64 / 2.0 - pixel.y as f64) * self.pixel_size.x,
        }
    }

    pub fn real_to_relative(&self, real: RealCoord) -> RelativeCoord {
        let (fx, fy) = self.real_to_pixel_f(real);
        RelativeCoord {
            x: fx / self.width as f64,
            y: fy / self.height as f64,
        }
    }

    pub fn relative_to_real(&self, relative: RelativeCoord) -> Result<RealCoord> {
        relative.validate()?;
        let fx = relative.x * self.width as f64;
        let fy = relative.y * self.height as f64;
        Ok(RealCoord {
            x: (fx - self.width as f64 / 2.0) * self.pixel_size.x,
            y: (self.height as f64 / 2.0 - fy) * self.pixel_size.x,
        })
    }

    pub fn relative_to_pixel(&self, relative: RelativeCoord) -> Result<PixelCoord> {
        relative.validate()?;
        Ok(PixelCoord {
            x: (relative.x * self.width as f64).round() as i64,
            y: (relative.y * self.height as f64).round() as i64,
        })
    }

    pub fn pixel_to_relative(&self, pixel: PixelCoord) -> RelativeCoord {
        RelativeCoord {
            x: pixel.x as f64 / self.width as f64,
            y: pixel.y as f64 / self.height as f64,
        }
    }
}

impl From<&Frame> for FrameGeometry {
    fn from(frame: &Frame) -> Self {
        Self::new(frame.width(), frame.height(), frame.pixel_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> FrameGeometry {
        FrameGeometry::new(10, 10, PixelSize::isotropic(1e-6))
    }

    #[test]
    fn real_to_pixel_anchors() {
        let g = geometry();
        assert_eq!(
            g.real_to_pixel(RealCoord { x: 0.0, y: 0.0 }),
            PixelCoord { x: 5, y: 5 }
        );
        assert_eq!(
            g.real_to_pixel(RealCoord { x: 1e-6, y: 0.0 }),
            PixelCoord { x: 6, y: 5 }
        );
        // y flip: a point above the center lands on a smaller pixel row.
        assert_eq!(
            g.real_to_pixel(RealCoord { x: 0.0, y: 1e-6 }),
            PixelCoord { x: 5, y: 4 }
        );
    }

    #[test]
    fn relative_to_real_anchors() {
        let g = geometry();
        let center = g
            .relative_to_real(RelativeCoord { x: 0.5, y: 0.5 })
            .unwrap();
        assert_eq!(center, RealCoord { x: 0.0, y: 0.0 });

        let right = g
            .relative_to_real(RelativeCoord { x: 1.0, y: 0.5 })
            .unwrap();
        assert!((right.x - 5e-6).abs() < 1e-18);
        assert_eq!(right.y, 0.0);
    }

    #[test]
    fn relative_out_of_range_is_rejected() {
        let g = geometry();
        let err = g
            .relative_to_real(RelativeCoord { x: 1.2, y: 0.5 })
            .unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
        assert!(g.relative_to_pixel(RelativeCoord { x: 0.5, y: -0.1 }).is_err());
    }
}
