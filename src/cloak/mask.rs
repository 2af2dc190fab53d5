use opencv::{
    core::{self, Point, Scalar, Size},
    imgproc,
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::cloak::error::CloakError;

/// OpenCV stores 8-bit hue as degrees / 2.
pub const MAX_HUE: u8 = 179;

/// Inclusive lower and upper bounds in OpenCV's 8-bit HSV space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// The blue cloak: hue 90-130, saturation and value 50-255.
    pub const fn blue() -> Self {
        Self::new([90, 50, 50], [130, 255, 255])
    }

    pub fn validate(&self) -> Result<(), CloakError> {
        if self.lower[0] > MAX_HUE || self.upper[0] > MAX_HUE {
            return Err(CloakError::InvalidConfig(format!(
                "hue bounds must not exceed {}, got {}-{}",
                MAX_HUE, self.lower[0], self.upper[0]
            )));
        }
        for (channel, name) in ["hue", "saturation", "value"].iter().enumerate() {
            if self.lower[channel] > self.upper[channel] {
                return Err(CloakError::InvalidConfig(format!(
                    "lower {} bound {} is above upper bound {}",
                    name, self.lower[channel], self.upper[channel]
                )));
            }
        }
        Ok(())
    }

    fn lower_scalar(&self) -> Scalar {
        Scalar::new(
            self.lower[0] as f64,
            self.lower[1] as f64,
            self.lower[2] as f64,
            0.0,
        )
    }

    fn upper_scalar(&self) -> Scalar {
        Scalar::new(
            self.upper[0] as f64,
            self.upper[1] as f64,
            self.upper[2] as f64,
            0.0,
        )
    }
}

impl Default for ColorRange {
    fn default() -> Self {
        Self::blue()
    }
}

/// Builds the cloak mask of a BGR frame.
///
/// The raw HSV threshold is opened (erode, then dilate) to drop speckles, and dilated once
/// more to win back the border of real cloak regions. The elliptical structuring element
/// is created once and shared by every call.
pub struct MaskBuilder {
    range: ColorRange,
    kernel: Mat,
    open_iterations: i32,
    dilate_iterations: i32,
}

impl MaskBuilder {
    pub fn new(
        range: ColorRange,
        kernel_size: i32,
        open_iterations: i32,
        dilate_iterations: i32,
    ) -> Result<Self, CloakError> {
        range.validate()?;
        if kernel_size < 1 || kernel_size % 2 == 0 {
            return Err(CloakError::InvalidConfig(format!(
                "structuring element size must be a positive odd number, got {}",
                kernel_size
            )));
        }
        if open_iterations < 0 || dilate_iterations < 0 {
            return Err(CloakError::InvalidConfig(
                "morphology iteration counts must not be negative".to_string(),
            ));
        }
        let kernel = imgproc::get_structuring_element(
            imgproc::MORPH_ELLIPSE,
            Size::new(kernel_size, kernel_size),
            Point::new(-1, -1),
        )?;
        Ok(Self {
            range,
            kernel,
            open_iterations,
            dilate_iterations,
        })
    }

    pub fn range(&self) -> &ColorRange {
        &self.range
    }

    /// Raw `CV_8UC1` threshold of `frame`: 255 where its HSV value is inside the range.
    pub fn threshold(&self, frame: &Mat) -> Result<Mat, CloakError> {
        let mut hsv = Mat::default();
        imgproc::cvt_color(
            frame,
            &mut hsv,
            imgproc::COLOR_BGR2HSV,
            0,
            core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;
        let mut mask = Mat::default();
        core::in_range(
            &hsv,
            &self.range.lower_scalar(),
            &self.range.upper_scalar(),
            &mut mask,
        )?;
        Ok(mask)
    }

    /// Cleaned-up mask of `frame`. Same width and height as `frame`, 255 = cloak.
    pub fn build(&self, frame: &Mat) -> Result<Mat, CloakError> {
        let raw = self.threshold(frame)?;
        let border_value = imgproc::morphology_default_border_value()?;

        let opened = if self.open_iterations > 0 {
            let mut opened = Mat::default();
            imgproc::morphology_ex(
                &raw,
                &mut opened,
                imgproc::MORPH_OPEN,
                &self.kernel,
                Point::new(-1, -1),
                self.open_iterations,
                core::BORDER_CONSTANT,
                border_value,
            )?;
            opened
        } else {
            raw
        };

        if self.dilate_iterations == 0 {
            return Ok(opened);
        }
        let mut mask = Mat::default();
        imgproc::dilate(
            &opened,
            &mut mask,
            &self.kernel,
            Point::new(-1, -1),
            self.dilate_iterations,
            core::BORDER_CONSTANT,
            border_value,
        )?;
        Ok(mask)
    }
}
