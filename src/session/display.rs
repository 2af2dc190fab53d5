use std::time::Duration;

use opencv::{highgui, prelude::*};

use crate::cloak::error::CloakError;

/// A surface the composited frames are shown on, which also reports key presses.
pub trait DisplaySurface {
    fn show(&mut self, image: &Mat) -> Result<(), CloakError>;

    /// Wait up to `wait` for a key press. Returns the key code, or `None` if no key was
    /// pressed.
    fn poll_key(&mut self, wait: Duration) -> Result<Option<i32>, CloakError>;

    /// Destroy the surface. Called exactly once by the owner.
    fn close(&mut self) -> Result<(), CloakError>;
}

/// A single named HighGUI window.
pub struct HighguiDisplay {
    window_name: String,
}

impl HighguiDisplay {
    pub fn new<S: Into<String>>(window_name: S) -> Result<Self, CloakError> {
        let window_name = window_name.into();
        highgui::named_window(&window_name, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self { window_name })
    }
}

impl DisplaySurface for HighguiDisplay {
    fn show(&mut self, image: &Mat) -> Result<(), CloakError> {
        highgui::imshow(&self.window_name, image)?;
        Ok(())
    }

    fn poll_key(&mut self, wait: Duration) -> Result<Option<i32>, CloakError> {
        // wait_key(0) would block forever
        let delay = (wait.as_millis() as i32).max(1);
        let key = highgui::wait_key(delay)?;
        if key < 0 { Ok(None) } else { Ok(Some(key)) }
    }

    fn close(&mut self) -> Result<(), CloakError> {
        highgui::destroy_window(&self.window_name)?;
        Ok(())
    }
}
