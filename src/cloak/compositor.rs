use opencv::core::CV_8UC1;
use opencv::prelude::*;

use crate::cloak::ensure_same_shape;
use crate::cloak::error::CloakError;

/// Take `background` where `mask` is non-zero and `frame` everywhere else.
///
/// `frame` and `background` must share size and type; `mask` must be a `CV_8UC1` image of
/// the same size.
pub fn apply_cloak(frame: &Mat, mask: &Mat, background: &Mat) -> Result<Mat, CloakError> {
    ensure_same_shape("background", frame, background, true)?;
    ensure_same_shape("mask", frame, mask, false)?;
    if mask.typ() != CV_8UC1 {
        return Err(CloakError::InvalidConfig(format!(
            "mask must be a single channel 8-bit image, got type {}",
            mask.typ()
        )));
    }

    let mut result = frame.try_clone()?;
    background.copy_to_masked(&mut result, mask)?;
    Ok(result)
}
