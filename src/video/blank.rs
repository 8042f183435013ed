use super::frame::Frame;
use super::source::{Cursor, FrameSource};
use crate::config::VideoConfig;
use crate::error::{OverlayError, Result};

/// 動画なしで 3D データだけを表示するための黒フレームソース
#[derive(Debug, Clone)]
pub struct BlankFrameSource {
    width: usize,
    height: usize,
    fps: f64,
    cursor: Cursor,
}

impl BlankFrameSource {
    pub fn new(width: usize, height: usize, fps: f64, frame_count: usize) -> Self {
        Self {
            width,
            height,
            fps,
            cursor: Cursor::new(frame_count),
        }
    }

    /// 最長の 3D シーケンスに合わせた長さで作る
    pub fn from_config(config: &VideoConfig, frame_count: usize) -> Self {
        Self::new(
            config.blank_width as usize,
            config.blank_height as usize,
            config.blank_fps,
            frame_count,
        )
    }
}

impl FrameSource for BlankFrameSource {
    fn frame_count(&self) -> usize {
        self.cursor.frame_count()
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn current_frame(&self) -> usize {
        self.cursor.get()
    }

    fn set_current_frame(&mut self, index: usize) {
        self.cursor.set(index);
    }

    fn get_frame(&mut self, index: usize) -> Result<Option<Frame>> {
        if index >= self.frame_count() {
            return Err(OverlayError::out_of_range(index, self.frame_count()));
        }
        Ok(Some(Frame::black(self.width, self.height)))
    }
}
