/// Camera device access and the frame source abstraction
pub mod camera;

/// Background estimation, color masking and compositing
pub mod cloak;

/// Runtime configuration of the cloak effect
pub mod config;

/// The interactive capture-mask-composite-display loop
pub mod session;
