use super::frame::Frame;
use crate::error::Result;

/// フレーム番号でアクセスできる映像ソース
///
/// `frame_count` と `fps` は構築時に固定。カーソルは常に
/// `[0, frame_count - 1]` にクランプされる。
pub trait FrameSource {
    fn frame_count(&self) -> usize;
    fn fps(&self) -> f64;
    /// (width, height)
    fn resolution(&self) -> (usize, usize);

    fn current_frame(&self) -> usize;
    /// クランプして設定
    fn set_current_frame(&mut self, index: usize);

    /// 範囲外は `OutOfRange`。読み込み失敗は `Ok(None)`
    fn get_frame(&mut self, index: usize) -> Result<Option<Frame>>;

    /// キャッシュと先読みを破棄する（シーク前に呼ぶ）
    fn invalidate(&mut self) {}

    /// 処理中の先読み結果だけを捨てる。キャッシュは残す
    fn cancel_prefetch(&mut self) {}

    fn current(&mut self) -> Result<Option<Frame>> {
        let index = self.current_frame();
        self.get_frame(index)
    }

    fn current_time(&self) -> f64 {
        crate::sync::frame_to_time(self.current_frame(), self.fps())
    }

    fn next_frame(&mut self) {
        let next = self.current_frame().saturating_add(1);
        self.set_current_frame(next);
    }

    fn prev_frame(&mut self) {
        let prev = self.current_frame().saturating_sub(1);
        self.set_current_frame(prev);
    }

    /// round(seconds * fps) フレーム移動
    fn jump_seconds(&mut self, seconds: f64) {
        let delta = (seconds * self.fps()).round() as i64;
        let target = (self.current_frame() as i64).saturating_add(delta).max(0) as usize;
        self.invalidate();
        self.set_current_frame(target);
    }
}

/// クランプ付きの再生位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    current: usize,
    frame_count: usize,
}

impl Cursor {
    pub fn new(frame_count: usize) -> Self {
        Self {
            current: 0,
            frame_count,
        }
    }

    pub fn get(&self) -> usize {
        self.current
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn set(&mut self, index: usize) {
        self.current = index.min(self.frame_count.saturating_sub(1));
    }
}
