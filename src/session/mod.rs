use std::thread;
use std::time::Instant;

use opencv::{
    core::{Point, Scalar},
    imgproc,
    prelude::*,
};

use crate::camera::FrameSource;
use crate::cloak::background::BackgroundEstimator;
use crate::cloak::compositor::apply_cloak;
use crate::cloak::error::CloakError;
use crate::cloak::mask::MaskBuilder;
use crate::config::CloakConfig;
use crate::session::display::DisplaySurface;
use crate::session::fps::FpsCounter;

/// The window the composited frames go to
pub mod display;

/// Frame rate bookkeeping
pub mod fps;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Devices are open but no background has been captured yet.
    Initializing,
    /// Processing frames. A recapture runs synchronously inside `step` and blocks the loop
    /// without leaving this state.
    Running,
    /// Devices are released. Nothing happens anymore.
    Terminated,
}

/// Interactive commands, one key each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Recapture,
}

impl Command {
    pub fn from_key(key: i32) -> Option<Self> {
        match (key & 0xFF) as u8 {
            b'q' => Some(Self::Quit),
            b'r' => Some(Self::Recapture),
            _ => None,
        }
    }
}

/// Owns the camera, the display and everything that lives across frames.
///
/// The frame source and the display surface are released exactly once: on `q`, on a failed
/// initialization, or when the session is dropped, whichever comes first.
pub struct Session<S: FrameSource, D: DisplaySurface> {
    source: S,
    display: D,
    config: CloakConfig,
    estimator: BackgroundEstimator,
    mask_builder: MaskBuilder,
    background: Option<Mat>,
    fps: FpsCounter,
    state: SessionState,
    released: bool,
}

impl<S: FrameSource, D: DisplaySurface> Session<S, D> {
    pub fn new(mut source: S, mut display: D, config: CloakConfig) -> Result<Self, CloakError> {
        let components = config
            .validate()
            .and_then(|_| Ok((config.background_estimator()?, config.mask_builder()?)));
        let (estimator, mask_builder) = match components {
            Ok(components) => components,
            Err(e) => {
                release_devices(&mut source, &mut display);
                return Err(e);
            }
        };
        Ok(Self {
            source,
            display,
            config,
            estimator,
            mask_builder,
            background: None,
            fps: FpsCounter::new(Instant::now()),
            state: SessionState::Initializing,
            released: false,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn background(&self) -> Option<&Mat> {
        self.background.as_ref()
    }

    /// Capture the first background. On failure the devices are released and the session
    /// is terminated.
    pub fn initialize(&mut self) -> Result<(), CloakError> {
        if self.state != SessionState::Initializing {
            return Ok(());
        }
        match self.estimator.capture(&mut self.source) {
            Ok(background) => {
                self.background = Some(background);
                self.fps = FpsCounter::new(Instant::now());
                self.state = SessionState::Running;
                Ok(())
            }
            Err(e) => {
                log::error!("Error: {}", e);
                self.terminate();
                Err(e)
            }
        }
    }

    /// Initialize if needed, then process frames until the user quits.
    pub fn run(&mut self) -> Result<(), CloakError> {
        self.initialize()?;
        log::info!("Starting main loop. Press 'q' to quit or 'r' to recapture background.");
        loop {
            match self.step() {
                Ok(SessionState::Terminated) => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    log::error!("Main loop stopped: {}", e);
                    self.terminate();
                    return Err(e);
                }
            }
        }
    }

    /// One iteration of the main loop: grab, mask, composite, show, and handle one key.
    pub fn step(&mut self) -> Result<SessionState, CloakError> {
        match self.state {
            SessionState::Terminated => return Ok(SessionState::Terminated),
            SessionState::Initializing => return Err(CloakError::NotInitialized),
            SessionState::Running => {}
        }

        let frame = match self.source.grab_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::warn!("Could not read frame.");
                thread::sleep(self.config.read_retry());
                return Ok(self.state);
            }
            Err(e) => {
                log::warn!("Could not read frame: {}", e);
                thread::sleep(self.config.read_retry());
                return Ok(self.state);
            }
        };

        let fps = self.fps.tick(Instant::now());
        let result = self.render(&frame, fps)?;
        self.display.show(&result)?;

        let key = self.display.poll_key(self.config.key_wait())?;
        match key.and_then(Command::from_key) {
            Some(Command::Quit) => self.terminate(),
            Some(Command::Recapture) => self.recapture(),
            None => {}
        }
        Ok(self.state)
    }

    /// The cloaked version of `frame` with the frame rate drawn on top.
    pub fn render(&self, frame: &Mat, fps: u32) -> Result<Mat, CloakError> {
        let background = self.background.as_ref().ok_or(CloakError::NotInitialized)?;
        let mask = self.mask_builder.build(frame)?;
        let mut result = apply_cloak(frame, &mask, background)?;
        draw_fps(&mut result, fps)?;
        Ok(result)
    }

    /// Replace the background with a fresh capture. A failed capture keeps the old one.
    fn recapture(&mut self) {
        match self.estimator.capture(&mut self.source) {
            Ok(background) => {
                self.background = Some(background);
                log::info!("Background recaptured!");
            }
            Err(e) => log::error!("Error recapturing background: {}", e),
        }
    }

    /// Release the camera and close the display. Does nothing the second time.
    pub fn terminate(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.state = SessionState::Terminated;
        release_devices(&mut self.source, &mut self.display);
        log::info!("Session terminated.");
    }
}

impl<S: FrameSource, D: DisplaySurface> Drop for Session<S, D> {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn release_devices<S: FrameSource, D: DisplaySurface>(source: &mut S, display: &mut D) {
    if let Err(e) = source.release() {
        log::error!("Failed to release camera: {}", e);
    }
    if let Err(e) = display.close() {
        log::error!("Failed to close display: {}", e);
    }
}

/// Write `FPS: <fps>` in the upper left corner of `image`.
pub fn draw_fps(image: &mut Mat, fps: u32) -> Result<(), CloakError> {
    imgproc::put_text(
        image,
        &format!("FPS: {}", fps),
        Point::new(10, 30),
        imgproc::FONT_HERSHEY_SIMPLEX,
        1.0,
        Scalar::new(0.0, 255.0, 0.0, 0.0),
        2,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_from_key() {
        assert_eq!(Command::from_key('q' as i32), Some(Command::Quit));
        assert_eq!(Command::from_key('r' as i32), Some(Command::Recapture));
        // some backends set modifier bits above the low byte
        assert_eq!(Command::from_key(0x100000 | 'q' as i32), Some(Command::Quit));
        assert_eq!(Command::from_key('Q' as i32), None);
        assert_eq!(Command::from_key(27), None);
    }

    #[test]
    fn test_draw_fps_only_touches_corner() {
        use opencv::core::CV_8UC3;

        let mut image =
            Mat::new_rows_cols_with_default(100, 200, CV_8UC3, Scalar::all(0.0)).unwrap();
        draw_fps(&mut image, 30).unwrap();
        let bytes = image.data_bytes().unwrap();
        assert!(bytes.iter().any(|&b| b == 255));
        // bottom row stays black
        let row_len = 200 * 3;
        assert!(bytes[99 * row_len..].iter().all(|&b| b == 0));
    }
}
