pub mod canvas;
pub mod letterbox;
pub mod overlay;
pub mod skeleton;
#[cfg(feature = "desktop")]
pub mod window;

pub use letterbox::Letterbox;
pub use overlay::{compose, DrawStyle, Layer, RenderContext};
pub use skeleton::{joint_pairs, palette_color, JOINT_PAIRS_17, JOINT_PAIRS_24};
#[cfg(feature = "desktop")]
pub use minifb::Key;
#[cfg(feature = "desktop")]
pub use window::MinifbRenderer;
