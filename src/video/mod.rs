pub mod blank;
pub mod decoder;
pub mod frame;
pub mod source;

#[cfg(feature = "desktop")]
pub mod capture;

pub use blank::BlankFrameSource;
pub use decoder::{Decoder, VideoFrameSource};
pub use frame::Frame;
pub use source::{Cursor, FrameSource};
