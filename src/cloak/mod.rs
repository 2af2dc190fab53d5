/// Median background estimation from a frame source
pub mod background;

/// HSV color thresholding with morphological cleanup
pub mod mask;

/// Per-pixel merge of the live frame and the background
pub mod compositor;

/// Defines the errors of the cloak pipeline
pub mod error;

use opencv::prelude::*;

use crate::cloak::error::CloakError;

/// Make sure `found` has the same width, height and pixel type as `expected`.
pub(crate) fn ensure_same_shape(
    what: &'static str,
    expected: &Mat,
    found: &Mat,
    check_type: bool,
) -> Result<(), CloakError> {
    let expected_size = expected.size()?;
    let found_size = found.size()?;
    let same_type = !check_type || expected.typ() == found.typ();
    if expected_size != found_size || !same_type {
        return Err(CloakError::SizeMismatch {
            what,
            expected: (expected_size.width, expected_size.height),
            found: (found_size.width, found_size.height),
        });
    }
    Ok(())
}
