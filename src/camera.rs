use opencv::{prelude::*, videoio};

use crate::cloak::error::CloakError;

pub struct CameraProperty {
    /// Device index. Laptop's builtin camera is usually at index 0.
    pub index: i32,
    /// Requested capture resolution. The device may ignore it.
    pub resolution: (u32, u32),
}

impl CameraProperty {
    pub fn new(index: i32, resolution: (u32, u32)) -> Self {
        Self { index, resolution }
    }
}

impl Default for CameraProperty {
    fn default() -> Self {
        Self::new(0, (640, 480))
    }
}

/// Anything that can deliver camera frames one at a time.
///
/// `grab_frame` returns `Ok(None)` when the device is alive but has no frame to give right
/// now. Callers treat both `Ok(None)` and `Err` as a failed attempt and may retry.
pub trait FrameSource {
    fn grab_frame(&mut self) -> Result<Option<Mat>, CloakError>;

    /// Release the underlying device. Called exactly once by the owner.
    fn release(&mut self) -> Result<(), CloakError>;
}

impl FrameSource for videoio::VideoCapture {
    fn grab_frame(&mut self) -> Result<Option<Mat>, CloakError> {
        let mut frame = Mat::default();
        if !self.read(&mut frame)? || frame.size()?.width <= 0 {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn release(&mut self) -> Result<(), CloakError> {
        videoio::VideoCaptureTrait::release(self)?;
        Ok(())
    }
}

/// Open the camera described by `prop` and request its resolution.
///
/// Resolution settings the device does not support are silently ignored by OpenCV, so only
/// a device that cannot be opened at all is an error.
pub fn open_camera(prop: &CameraProperty) -> Result<videoio::VideoCapture, CloakError> {
    let mut cam = videoio::VideoCapture::new(prop.index, videoio::CAP_ANY)?;
    if !cam.is_opened()? {
        return Err(CloakError::DeviceUnavailable { index: prop.index });
    }
    cam.set(videoio::CAP_PROP_FRAME_WIDTH, prop.resolution.0 as f64)?;
    cam.set(videoio::CAP_PROP_FRAME_HEIGHT, prop.resolution.1 as f64)?;
    log::info!(
        "Camera {} opened, requested resolution {}x{}.",
        prop.index,
        prop.resolution.0,
        prop.resolution.1
    );
    Ok(cam)
}
