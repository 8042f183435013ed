pub mod calibration;
pub mod config;
pub mod error;
pub mod keypoints;
pub mod mocap;
pub mod playback;
pub mod projection;
pub mod render;
pub mod session;
pub mod sync;
pub mod video;

pub use error::{OverlayError, Result};
