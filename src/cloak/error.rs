use std::error::Error;
use std::fmt::{Debug, Display};

/// Errors produced while capturing, masking and compositing frames.
pub enum CloakError {
    /// The camera device at the given index could not be opened.
    DeviceUnavailable { index: i32 },

    /// Background estimation did not receive a single usable frame.
    EmptyCapture { attempts: usize },

    /// Two images that must share dimensions and pixel type do not.
    SizeMismatch {
        what: &'static str,
        expected: (i32, i32),
        found: (i32, i32),
    },

    /// A configuration value is out of its valid range.
    InvalidConfig(String),

    /// The session was asked to process frames before a background exists.
    NotInitialized,

    OpenCv(opencv::Error),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl Debug for CloakError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceUnavailable { index } => {
                write!(f, "Could not open camera device {}.", index)
            }
            Self::EmptyCapture { attempts } => write!(
                f,
                "Could not capture any frames for background ({} attempts).",
                attempts
            ),
            Self::SizeMismatch {
                what,
                expected,
                found,
            } => write!(
                f,
                "Size mismatch for {}! Expected {}x{}, got {}x{}.",
                what, expected.0, expected.1, found.0, found.1,
            ),
            Self::InvalidConfig(reason) => write!(f, "Invalid configuration: {}", reason),
            Self::NotInitialized => write!(f, "Session has no background yet. Call initialize() first."),
            Self::OpenCv(e) => write!(f, "OpenCV error: {}", e),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl Display for CloakError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Error for CloakError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::OpenCv(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<opencv::Error> for CloakError {
    fn from(value: opencv::Error) -> Self {
        Self::OpenCv(value)
    }
}

impl From<std::io::Error> for CloakError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CloakError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_debug() {
        let err = CloakError::SizeMismatch {
            what: "background",
            expected: (640, 480),
            found: (320, 240),
        };
        assert_eq!(format!("{}", err), format!("{:?}", err));
        assert!(format!("{}", err).contains("Expected 640x480, got 320x240"));
    }

    #[test]
    fn test_empty_capture_message() {
        let err = CloakError::EmptyCapture { attempts: 30 };
        assert!(err.to_string().contains("30 attempts"));
        assert!(err.source().is_none());
    }
}
